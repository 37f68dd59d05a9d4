use crate::model::ElementId;
use thiserror::Error;

/// Errors raised by scene graph operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CanvasError {
    #[error("crop rectangle ({x}, {y}, {width}, {height}) is outside the unit square")]
    InvalidCrop {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    #[error("element '{0}' is not on the canvas")]
    UnknownElement(ElementId),
    #[error("element id '{0}' is already in use")]
    DuplicateId(ElementId),
    #[error("element '{0}' is not a video")]
    NotAVideo(ElementId),
}
