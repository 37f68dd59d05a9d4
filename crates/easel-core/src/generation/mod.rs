//! # Generation Lifecycle
//!
//! Reconciles canvas elements with long-running remote jobs.
//!
//! - **Runner (`runner.rs`)**: one tokio task per job, forwarding sequenced updates over a channel.
//! - **Tracker (`tracker.rs`)**: per-element state machine deciding what each update means for the canvas.

pub mod runner;
pub mod tracker;

pub use runner::GenerationRunner;
pub use tracker::{ActiveGeneration, GenerationStatus, GenerationTracker, Transition};

use easel_canvas::model::ElementId;
use serde::{Deserialize, Serialize};

use crate::inference::JobUpdate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    TextToImage,
    ImageToImage,
    RemoveBackground,
    IsolateObject,
    ImageToVideo,
    VideoToVideo,
    ExtendVideo,
    RemoveVideoBackground,
}

impl GenerationKind {
    /// Whether the job produces a video.
    pub fn outputs_video(self) -> bool {
        matches!(
            self,
            Self::ImageToVideo | Self::VideoToVideo | Self::ExtendVideo | Self::RemoveVideoBackground
        )
    }

    /// Human-readable label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            Self::TextToImage => "Image generation",
            Self::ImageToImage => "Image transformation",
            Self::RemoveBackground => "Background removal",
            Self::IsolateObject => "Object isolation",
            Self::ImageToVideo => "Video generation",
            Self::VideoToVideo => "Video transformation",
            Self::ExtendVideo => "Video extension",
            Self::RemoveVideoBackground => "Video background removal",
        }
    }
}

/// An update from a running job, stamped with its position in that job's stream.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationEvent {
    pub key: ElementId,
    /// Job id handed out by [`GenerationTracker::begin`].
    pub job: u64,
    /// Starts at 1 and increases by one per update of the same job.
    pub sequence: u64,
    pub update: JobUpdate,
}
