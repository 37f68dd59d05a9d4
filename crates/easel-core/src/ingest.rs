//! # File Ingestion
//!
//! Turns dropped or picked files into placed elements: classify by extension,
//! read natural dimensions, fit to the placement size and centre in view.

use async_trait::async_trait;
use easel_canvas::CanvasConfig;
use easel_canvas::model::{ElementFlags, ElementId, PlacedElement};
use easel_canvas::placement::{centered_in_view, fit_within};
use easel_canvas::view::View;
use glam::Vec2;
use serde::Deserialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::IngestError;
use crate::store::media::{encode_data_url, mime_for_extension};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Video,
}

/// A file handed to the canvas by the host.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

pub fn classify(extension: &str) -> Option<MediaClass> {
    match extension.to_ascii_lowercase().as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" => Some(MediaClass::Image),
        "mp4" | "webm" | "mov" => Some(MediaClass::Video),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Seconds
    pub duration: f32,
}

/// Reads the dimensions and duration of a video payload.
#[async_trait]
pub trait VideoProbe: Send + Sync {
    async fn probe(&self, bytes: &[u8], extension: &str) -> Result<VideoInfo, IngestError>;
}

/// [`VideoProbe`] backed by the `ffprobe` executable.
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffprobe"),
        }
    }
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Extracts [`VideoInfo`] from `ffprobe -print_format json` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoInfo, IngestError> {
    let parsed: ProbeOut = serde_json::from_slice(stdout)
        .map_err(|e| IngestError::Probe(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| IngestError::Probe("no video stream found".into()))?;
    let width = video_stream
        .width
        .ok_or_else(|| IngestError::Probe("missing video width from ffprobe".into()))?;
    let height = video_stream
        .height
        .ok_or_else(|| IngestError::Probe("missing video height from ffprobe".into()))?;
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        duration,
    })
}

#[async_trait]
impl VideoProbe for FfprobeProbe {
    async fn probe(&self, bytes: &[u8], extension: &str) -> Result<VideoInfo, IngestError> {
        let path = std::env::temp_dir().join(format!("easel-probe-{}.{extension}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;

        let out = tokio::process::Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(&path)
            .output()
            .await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove probe file");
        }

        let out = out.map_err(|e| IngestError::Probe(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(IngestError::Probe(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        parse_probe_output(&out.stdout)
    }
}

/// Natural pixel size of an encoded image.
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), IngestError> {
    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Builds a placed element for `file`, or `None` if its type is not supported.
///
/// The element is fitted within `config.max_placement_size`, centred in
/// `view` and selected. Its source is a `data:` URL of the file bytes.
#[tracing::instrument(skip_all, fields(file = %file.name, bytes = file.bytes.len()))]
pub async fn ingest(
    file: &IncomingFile,
    view: &View,
    config: &CanvasConfig,
    probe: &dyn VideoProbe,
) -> Result<Option<PlacedElement>, IngestError> {
    let Some(extension) = file.extension() else {
        tracing::debug!("Ignoring file without extension");
        return Ok(None);
    };
    let (Some(class), Some(mime)) = (classify(&extension), mime_for_extension(&extension)) else {
        tracing::debug!(%extension, "Ignoring unsupported file type");
        return Ok(None);
    };

    let (natural, duration) = match class {
        MediaClass::Image => {
            let (w, h) = image_dimensions(&file.bytes)?;
            (Vec2::new(w as f32, h as f32), None)
        }
        MediaClass::Video => {
            let info = probe.probe(&file.bytes, &extension).await?;
            (
                Vec2::new(info.width as f32, info.height as f32),
                Some(info.duration),
            )
        }
    };

    let size = fit_within(natural, config.max_placement_size).ok_or(IngestError::EmptyMedia)?;
    let position = centered_in_view(size, view);
    let src = encode_data_url(mime, &file.bytes);

    let element = match duration {
        None => PlacedElement::image(ElementId::generate("image"), src, position, size),
        Some(d) => PlacedElement::video(ElementId::generate("video"), src, position, size, d),
    };
    tracing::info!(element_id = %element.id, width = size.x, height = size.y, "File ingested");
    Ok(Some(element.with_flags(ElementFlags::SELECTED)))
}
