use easel_canvas::model::{CropRect, ElementId, PlacedElement, SceneGraph};
use easel_canvas::persistence::{
    CanvasStorageState, ResolvedMedia, StoredKind, from_storage, to_storage,
};
use easel_canvas::view::Viewport;
use glam::Vec2;
use std::collections::HashMap;

const PNG_DATA: &str = "data:image/png;base64,iVBORw0KGgo=";

fn sample_scene() -> SceneGraph {
    let image = PlacedElement::image(
        ElementId::from("image-1"),
        PNG_DATA,
        Vec2::new(10.0, 20.0),
        Vec2::new(300.0, 150.0),
    )
    .with_crop(Some(CropRect::new(0.1, 0.1, 0.5, 0.5).unwrap()))
    .unwrap();

    let video = PlacedElement::video(
        ElementId::from("video-1"),
        "https://cdn.test/clip.mp4",
        Vec2::new(400.0, 0.0),
        Vec2::new(300.0, 169.0),
        5.0,
    );

    SceneGraph::from_elements([image, video]).unwrap()
}

#[test]
fn test_storage_json_shape() {
    let scene = sample_scene();
    let state = to_storage(&scene, Viewport::new(5.0, 6.0, 1.5), 1_700_000_000_000);

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["lastModified"], 1_700_000_000_000_i64);
    assert_eq!(json["viewport"]["scale"], 1.5);

    let image = &json["elements"][0];
    assert_eq!(image["type"], "image");
    assert_eq!(image["imageId"], "image-1");
    assert_eq!(image["zIndex"], 0);
    assert!(image.get("src").is_none(), "data URLs are never inlined");
    assert!((image["transform"]["cropBox"]["width"].as_f64().unwrap() - 0.5).abs() < 1e-6);

    let video = &json["elements"][1];
    assert_eq!(video["type"], "video");
    assert_eq!(video["videoId"], "video-1");
    assert_eq!(video["src"], "https://cdn.test/clip.mp4");
    assert_eq!(video["duration"], 5.0);
    assert_eq!(video["zIndex"], 1);
}

#[test]
fn test_storage_round_trip() {
    let scene = sample_scene();
    let viewport = Viewport::new(-120.0, 40.0, 0.75);
    let state = to_storage(&scene, viewport, 42);

    // Re-read through JSON like a real load would.
    let text = serde_json::to_string(&state).unwrap();
    let parsed: CanvasStorageState = serde_json::from_str(&text).unwrap();

    let blobs: HashMap<&str, &str> = HashMap::from([("image-1", PNG_DATA)]);
    let (loaded, loaded_viewport) = from_storage(&parsed, |stored| {
        blobs.get(stored.media_key()).map(|src| ResolvedMedia {
            src: src.to_string(),
            duration: None,
        })
    });

    assert_eq!(loaded_viewport, viewport);
    assert_eq!(loaded.ids(), scene.ids());

    let image = loaded.get(&ElementId::from("image-1")).unwrap();
    assert_eq!(image.src, PNG_DATA);
    assert_eq!(image.position, Vec2::new(10.0, 20.0));
    assert_eq!(image.size, Vec2::new(300.0, 150.0));
    assert_eq!(image.crop, Some(CropRect::new(0.1, 0.1, 0.5, 0.5).unwrap()));

    let video = loaded.get(&ElementId::from("video-1")).unwrap();
    assert_eq!(video.src, "https://cdn.test/clip.mp4");
    let playback = video.playback().unwrap();
    assert_eq!(playback.duration, 5.0);
    assert!(!playback.is_playing);
    assert!(!playback.is_loaded);
}

#[test]
fn test_load_skips_missing_media_and_bad_data() {
    let json = r#"{
        "elements": [
            {"id": "b", "type": "image", "imageId": "b", "transform": {"x": 1, "y": 2}, "zIndex": 1},
            {"id": "a", "type": "image", "imageId": "a", "transform": {"x": 0, "y": 0, "cropBox": {"x": 0.8, "y": 0, "width": 0.5, "height": 1}}, "zIndex": 0},
            {"id": "a", "type": "image", "imageId": "a", "transform": {"x": 9, "y": 9}, "zIndex": 2},
            {"id": "ghost", "type": "video", "videoId": "ghost", "transform": {"x": 0, "y": 0}, "zIndex": 3}
        ],
        "lastModified": 1,
        "viewport": {"x": 0, "y": 0, "scale": -3}
    }"#;
    let state: CanvasStorageState = serde_json::from_str(json).unwrap();
    assert_eq!(state.elements[3].kind, StoredKind::Video);

    let (scene, viewport) = from_storage(&state, |stored| {
        (stored.media_key() != "ghost").then(|| ResolvedMedia {
            src: format!("data:image/png;base64,{}", stored.id),
            duration: None,
        })
    });

    // Sorted by zIndex, repeated id and element without media dropped.
    assert_eq!(scene.ids(), vec![ElementId::from("a"), ElementId::from("b")]);
    let a = scene.get(&ElementId::from("a")).unwrap();
    assert_eq!(a.position, Vec2::ZERO);
    assert_eq!(a.crop, None, "crop box past the right edge is discarded");
    assert_eq!(a.size, Vec2::splat(300.0));

    assert_eq!(viewport, Viewport::default());
}
