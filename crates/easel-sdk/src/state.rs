//! Application state owned by the [`Studio`](crate::Studio) and the actions that change it.

use easel_canvas::Canvas;
use easel_canvas::model::{CropRect, ElementId, PlacedElement, SceneGraph, VideoPlayback};
use easel_canvas::view::Viewport;
use easel_core::generation::GenerationTracker;
use easel_core::inference::ImageSize;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Prompt and style used by the next text-to-image or image-to-image run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub prompt: String,
    pub lora_url: Option<String>,
    pub style_id: Option<String>,
    pub image_size: ImageSize,
}

/// Everything the editor knows at one moment.
pub struct AppState {
    pub scene: SceneGraph,
    /// Viewport, drawing-surface size and pointer mode.
    pub canvas: Canvas,
    pub settings: GenerationSettings,
    pub generations: GenerationTracker,
}

/// A change to the playback attributes of a video element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackChange {
    Play,
    Pause,
    /// Seconds; clamped to the clip.
    Seek(f32),
    /// 0.0 - 1.0
    SetVolume(f32),
    SetMuted(bool),
    /// The host finished loading the media. Carries the measured duration.
    Loaded(f32),
}

impl PlaybackChange {
    pub fn apply(self, playback: VideoPlayback) -> VideoPlayback {
        match self {
            Self::Play => VideoPlayback {
                is_playing: true,
                ..playback
            },
            Self::Pause => VideoPlayback {
                is_playing: false,
                ..playback
            },
            Self::Seek(time) => {
                let end = if playback.duration > 0.0 {
                    playback.duration
                } else {
                    f32::MAX
                };
                VideoPlayback {
                    current_time: time.clamp(0.0, end),
                    ..playback
                }
            }
            Self::SetVolume(volume) => VideoPlayback {
                volume: volume.clamp(0.0, 1.0),
                ..playback
            },
            Self::SetMuted(muted) => VideoPlayback { muted, ..playback },
            Self::Loaded(duration) => VideoPlayback {
                is_loaded: true,
                duration: if duration.is_finite() && duration > 0.0 {
                    duration
                } else {
                    playback.duration
                },
                ..playback
            },
        }
    }
}

/// Every state change the host can request.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    // --- Elements ---
    AddElement(PlacedElement),
    /// Replaces the element with the same id.
    UpdateElement(PlacedElement),
    /// Moves every selected, unlocked element by a canvas-space delta.
    MoveSelection(Vec2),
    SetCrop {
        id: ElementId,
        crop: Option<CropRect>,
    },
    SetLocked {
        id: ElementId,
        locked: bool,
    },
    DeleteSelection,
    DuplicateSelection,
    BeginCrop(ElementId),
    EndCrop,

    // --- Selection ---
    Select(ElementId),
    ToggleSelect(ElementId),
    SelectAll,
    ClearSelection,

    // --- Layers ---
    BringToFront(ElementId),
    SendToBack(ElementId),
    BringForward(ElementId),
    SendBackward(ElementId),

    // --- View ---
    SetViewport(Viewport),
    SetCanvasSize(Vec2),
    ZoomIn,
    ZoomOut,
    ResetZoom,
    /// Pans and zooms so every element is visible.
    FitToContent,

    // --- Video ---
    SetPlayback {
        id: ElementId,
        change: PlaybackChange,
    },

    // --- History ---
    Undo,
    Redo,

    // --- Generation ---
    SetSettings(GenerationSettings),
    ApplyStyle {
        style_id: String,
        prompt: String,
        lora_url: Option<String>,
    },
    /// Text-to-image from the current settings, or image-to-image when an
    /// image is selected.
    Generate,
    RemoveBackground(ElementId),
    IsolateObject {
        id: ElementId,
        prompt: String,
    },
    ImageToVideo {
        id: ElementId,
        prompt: String,
        /// Seconds
        duration: u32,
    },
    VideoToVideo {
        id: ElementId,
        prompt: String,
    },
    ExtendVideo {
        id: ElementId,
        prompt: String,
    },
    RemoveVideoBackground(ElementId),
    CancelGeneration(ElementId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_changes_are_clamped() {
        let p = VideoPlayback::with_duration(4.0);
        assert_eq!(PlaybackChange::Seek(9.0).apply(p).current_time, 4.0);
        assert_eq!(PlaybackChange::Seek(-1.0).apply(p).current_time, 0.0);
        assert_eq!(PlaybackChange::SetVolume(1.5).apply(p).volume, 1.0);

        let loaded = PlaybackChange::Loaded(f32::NAN).apply(p);
        assert!(loaded.is_loaded);
        assert_eq!(loaded.duration, 4.0);
    }
}
