use easel_canvas::model::ElementId;
use thiserror::Error;

/// Failures of the local storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Failures talking to the remote inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no inference API key configured")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response did not contain a {0} url")]
    MissingOutput(&'static str),
    #[error("job failed: {0}")]
    JobFailed(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("a generation is already active for {0}")]
    AlreadyActive(ElementId),
    #[error("no generation is active for {0}")]
    NotActive(ElementId),
    #[error("unknown element {0}")]
    UnknownElement(ElementId),
    #[error("element {0} is not a {1}")]
    WrongMediaKind(ElementId, &'static str),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not read image dimensions: {0}")]
    Decode(#[from] image::ImageError),
    #[error("video probe failed: {0}")]
    Probe(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("media has no usable dimensions")]
    EmptyMedia,
}
