use easel_canvas::model::ElementId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::generation::GenerationKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Success,
    Error,
    Info,
}

/// Observable events emitted by the studio.
///
/// Broadcast via [`StudioEventBus`]; hosts subscribe to show toasts, spinners
/// or save indicators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StudioEvent {
    /// A user-facing message.
    Notification {
        title: String,
        description: String,
        variant: NotificationVariant,
    },
    GenerationStarted {
        element_id: ElementId,
        kind: GenerationKind,
    },
    GenerationFinished {
        element_id: ElementId,
        kind: GenerationKind,
        success: bool,
    },
    /// Canvas state reached durable storage.
    Saved {
        /// Unix timestamp in milliseconds
        last_modified: i64,
        elements: usize,
    },
}

impl StudioEvent {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Notification {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Notification {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Error,
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Notification {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Info,
        }
    }
}

/// Broadcast sender for studio events.
#[derive(Clone, Debug)]
pub struct StudioEventBus(pub broadcast::Sender<StudioEvent>);

impl StudioEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self(tx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.0.subscribe()
    }

    /// Sends an event. Having no subscribers is not an error.
    pub fn emit(&self, event: StudioEvent) {
        let _ = self.0.send(event);
    }
}

impl Default for StudioEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
