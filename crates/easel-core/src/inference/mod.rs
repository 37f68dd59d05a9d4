//! # Inference
//!
//! Typed requests for the remote generation service and the client seam the
//! generation runner drives.

pub mod fal;

pub use fal::FalClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::InferenceError;
use crate::generation::GenerationKind;

/// How a request is executed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// One request, one response.
    Sync,
    /// Server-sent events with intermediate previews.
    Stream,
    /// Submit to the queue, then poll for status and fetch the result.
    Queued,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    Square,
    #[default]
    SquareHd,
    PortraitFourThree,
    PortraitSixteenNine,
    LandscapeFourThree,
    LandscapeSixteenNine,
}

/// A remote generation or editing job.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationRequest {
    /// Text-to-image; image-to-image when `source_image` is set.
    TextToImage {
        prompt: String,
        lora_url: Option<String>,
        image_size: ImageSize,
        source_image: Option<String>,
    },
    RemoveBackground {
        image_url: String,
    },
    IsolateObject {
        image_url: String,
        prompt: String,
    },
    ImageToVideo {
        image_url: String,
        prompt: String,
        /// Seconds
        duration: u32,
    },
    VideoToVideo {
        video_url: String,
        prompt: String,
    },
    ExtendVideo {
        video_url: String,
        prompt: String,
    },
    RemoveVideoBackground {
        video_url: String,
    },
}

impl GenerationRequest {
    pub fn kind(&self) -> GenerationKind {
        match self {
            Self::TextToImage {
                source_image: None, ..
            } => GenerationKind::TextToImage,
            Self::TextToImage { .. } => GenerationKind::ImageToImage,
            Self::RemoveBackground { .. } => GenerationKind::RemoveBackground,
            Self::IsolateObject { .. } => GenerationKind::IsolateObject,
            Self::ImageToVideo { .. } => GenerationKind::ImageToVideo,
            Self::VideoToVideo { .. } => GenerationKind::VideoToVideo,
            Self::ExtendVideo { .. } => GenerationKind::ExtendVideo,
            Self::RemoveVideoBackground { .. } => GenerationKind::RemoveVideoBackground,
        }
    }

    /// Model endpoint path on the service.
    pub fn model(&self) -> &'static str {
        match self {
            Self::TextToImage {
                source_image: Some(_),
                ..
            } => "fal-ai/flux/dev/image-to-image",
            Self::TextToImage {
                lora_url: Some(_), ..
            } => "fal-ai/flux-lora",
            Self::TextToImage { .. } => "fal-ai/flux/dev",
            Self::RemoveBackground { .. } => "fal-ai/bria/background/remove",
            Self::IsolateObject { .. } => "fal-ai/evf-sam",
            Self::ImageToVideo { .. } => "fal-ai/kling-video/v2.1/standard/image-to-video",
            Self::VideoToVideo { .. } => "fal-ai/hunyuan-video/video-to-video",
            Self::ExtendVideo { .. } => "fal-ai/ltx-video-13b-distilled/extend",
            Self::RemoveVideoBackground { .. } => "fal-ai/ben/v2/video",
        }
    }

    pub fn run_mode(&self) -> RunMode {
        match self {
            Self::TextToImage {
                source_image: None, ..
            } => RunMode::Stream,
            Self::TextToImage { .. } | Self::RemoveBackground { .. } | Self::IsolateObject { .. } => {
                RunMode::Sync
            }
            _ => RunMode::Queued,
        }
    }

    /// JSON input for the model.
    pub fn payload(&self) -> Value {
        match self {
            Self::TextToImage {
                prompt,
                lora_url,
                image_size,
                source_image,
            } => {
                let mut body = json!({
                    "prompt": prompt,
                    "image_size": image_size,
                    "num_images": 1,
                    "enable_safety_checker": true,
                });
                if let Some(url) = lora_url {
                    body["loras"] = json!([{ "path": url, "scale": 1.0 }]);
                }
                if let Some(image) = source_image {
                    body["image_url"] = json!(image);
                    body["strength"] = json!(0.85);
                }
                body
            }
            Self::RemoveBackground { image_url } => json!({ "image_url": image_url }),
            Self::IsolateObject { image_url, prompt } => json!({
                "image_url": image_url,
                "prompt": prompt,
                "mask_only": false,
            }),
            Self::ImageToVideo {
                image_url,
                prompt,
                duration,
            } => json!({
                "image_url": image_url,
                "prompt": prompt,
                "duration": duration.to_string(),
            }),
            Self::VideoToVideo { video_url, prompt } | Self::ExtendVideo { video_url, prompt } => {
                json!({ "video_url": video_url, "prompt": prompt })
            }
            Self::RemoveVideoBackground { video_url } => json!({ "video_url": video_url }),
        }
    }
}

/// Progress of a remote job, in the order the service reports it.
#[derive(Clone, Debug, PartialEq)]
pub enum JobUpdate {
    Progress {
        message: Option<String>,
        queue_position: Option<u32>,
    },
    /// Intermediate result that replaces the element's source.
    Partial { src: String },
    Completed {
        src: String,
        duration: Option<f32>,
    },
    Failed { error: String },
}

impl JobUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

pub type JobSink = mpsc::UnboundedSender<JobUpdate>;

/// Client for the remote generation service.
///
/// Implementations push updates into `sink` as the job advances and return
/// once it has reached a terminal state. An `Err` return is reported to the
/// tracker as a failure.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn submit(&self, request: GenerationRequest, sink: JobSink) -> Result<(), InferenceError>;
}

/// Extracts the output URL (and video duration) from a model response.
///
/// Understands `images[0].url`, `image.url` and `video.url`.
pub fn extract_output(value: &Value) -> Option<(String, Option<f32>)> {
    let url = value
        .pointer("/images/0/url")
        .or_else(|| value.pointer("/image/url"))
        .or_else(|| value.pointer("/video/url"))
        .and_then(Value::as_str)?;

    let duration = value
        .pointer("/video/duration")
        .or_else(|| value.get("duration"))
        .and_then(|d| d.as_f64().or_else(|| d.as_str().and_then(|s| s.parse().ok())))
        .map(|d| d as f32);

    Some((url.to_string(), duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_routing() {
        let t2i = GenerationRequest::TextToImage {
            prompt: "a fox".into(),
            lora_url: None,
            image_size: ImageSize::default(),
            source_image: None,
        };
        assert_eq!(t2i.kind(), GenerationKind::TextToImage);
        assert_eq!(t2i.run_mode(), RunMode::Stream);

        let i2i = GenerationRequest::TextToImage {
            prompt: "a fox".into(),
            lora_url: Some("https://loras.test/style.safetensors".into()),
            image_size: ImageSize::Square,
            source_image: Some("https://cdn.test/src.png".into()),
        };
        assert_eq!(i2i.kind(), GenerationKind::ImageToImage);
        assert_eq!(i2i.run_mode(), RunMode::Sync);
        let body = i2i.payload();
        assert_eq!(body["image_url"], "https://cdn.test/src.png");
        assert_eq!(body["loras"][0]["path"], "https://loras.test/style.safetensors");
        assert_eq!(body["image_size"], "square");

        let video = GenerationRequest::ImageToVideo {
            image_url: "https://cdn.test/src.png".into(),
            prompt: String::new(),
            duration: 5,
        };
        assert_eq!(video.run_mode(), RunMode::Queued);
        assert_eq!(video.payload()["duration"], "5");
    }

    #[test]
    fn output_extraction() {
        let images = json!({ "images": [{ "url": "https://a/1.png" }] });
        assert_eq!(extract_output(&images), Some(("https://a/1.png".into(), None)));

        let image = json!({ "image": { "url": "https://a/2.png" } });
        assert_eq!(extract_output(&image), Some(("https://a/2.png".into(), None)));

        let video = json!({ "video": { "url": "https://a/v.mp4" }, "duration": "5" });
        assert_eq!(extract_output(&video), Some(("https://a/v.mp4".into(), Some(5.0))));

        assert_eq!(extract_output(&json!({ "detail": "nope" })), None);
    }
}
