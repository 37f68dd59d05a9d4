use async_trait::async_trait;
use easel_canvas::CanvasConfig;
use easel_canvas::model::MediaKind;
use easel_canvas::view::{View, Viewport};
use easel_core::error::IngestError;
use easel_core::ingest::{IncomingFile, VideoInfo, VideoProbe, ingest};
use easel_core::store::MediaBlob;
use glam::Vec2;
use std::io::Cursor;

/// Probe that reports fixed metadata without touching the bytes.
struct FixedProbe(VideoInfo);

#[async_trait]
impl VideoProbe for FixedProbe {
    async fn probe(&self, _bytes: &[u8], _extension: &str) -> Result<VideoInfo, IngestError> {
        Ok(self.0)
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn default_view() -> View {
    View::new(Viewport::default(), Vec2::new(1200.0, 800.0))
}

fn no_video() -> FixedProbe {
    FixedProbe(VideoInfo {
        width: 0,
        height: 0,
        duration: 0.0,
    })
}

#[tokio::test]
async fn test_image_is_fitted_centred_and_selected() {
    let bytes = png(800, 400);
    let file = IncomingFile::new("wide.PNG", bytes.clone());

    let element = ingest(&file, &default_view(), &CanvasConfig::default(), &no_video())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(element.size, Vec2::new(300.0, 150.0));
    assert_eq!(element.position, Vec2::new(450.0, 325.0));
    assert!(element.is_selected());
    assert!(element.id.as_str().starts_with("image-"));
    assert_eq!(element.kind, MediaKind::Image);

    // The source carries the original bytes.
    let blob = MediaBlob::from_data_url(&element.src).unwrap();
    assert_eq!(blob.mime, "image/png");
    assert_eq!(blob.bytes, bytes);
}

#[tokio::test]
async fn test_small_image_is_scaled_up_in_zoomed_view() {
    let file = IncomingFile::new("icon.png", png(64, 32));
    let view = View::new(Viewport::new(100.0, 50.0, 2.0), Vec2::new(1200.0, 800.0));

    let element = ingest(&file, &view, &CanvasConfig::default(), &no_video())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(element.size, Vec2::new(300.0, 150.0));
    // Centre of the visible area: ((600 - 100) / 2, (400 - 50) / 2) = (250, 175)
    let centre = element.position + element.size / 2.0;
    assert!((centre - Vec2::new(250.0, 175.0)).length() < 1e-3);
}

#[tokio::test]
async fn test_video_uses_probe_metadata() {
    let probe = FixedProbe(VideoInfo {
        width: 1920,
        height: 1080,
        duration: 4.5,
    });
    let file = IncomingFile::new("clip.mp4", vec![0, 0, 0, 24, b'f', b't', b'y', b'p']);

    let element = ingest(&file, &default_view(), &CanvasConfig::default(), &probe)
        .await
        .unwrap()
        .unwrap();

    assert!(element.id.as_str().starts_with("video-"));
    assert!((element.size - Vec2::new(300.0, 168.75)).length() < 1e-3);
    assert_eq!(element.playback().map(|p| p.duration), Some(4.5));
    assert!(element.src.starts_with("data:video/mp4;base64,"));
}

#[tokio::test]
async fn test_unsupported_files_are_ignored() {
    let config = CanvasConfig::default();
    for name in ["notes.txt", "README"] {
        let file = IncomingFile::new(name, b"hello".to_vec());
        let result = ingest(&file, &default_view(), &config, &no_video()).await.unwrap();
        assert!(result.is_none(), "{name} should be ignored");
    }
}

#[tokio::test]
async fn test_corrupt_image_is_an_error() {
    let file = IncomingFile::new("broken.png", b"not an image".to_vec());
    let result = ingest(&file, &default_view(), &CanvasConfig::default(), &no_video()).await;
    assert!(matches!(result, Err(IngestError::Decode(_))));
}

#[tokio::test]
async fn test_zero_sized_video_is_an_error() {
    let file = IncomingFile::new("empty.webm", vec![1, 2, 3]);
    let result = ingest(&file, &default_view(), &CanvasConfig::default(), &no_video()).await;
    assert!(matches!(result, Err(IngestError::EmptyMedia)));
}
