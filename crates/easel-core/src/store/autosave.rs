use easel_canvas::model::SceneGraph;
use easel_canvas::persistence::{self, CanvasStorageState, is_data_url};
use easel_canvas::view::Viewport;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::error;

use super::{CanvasStore, persist_snapshot};
use crate::events::{StudioEvent, StudioEventBus};

/// Inline media referenced by a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingMedia {
    pub id: String,
    pub src: String,
    pub duration: Option<f32>,
}

/// Everything one save writes: the document plus the `data:` payloads it references.
#[derive(Clone, Debug, PartialEq)]
pub struct AutosaveSnapshot {
    pub state: CanvasStorageState,
    pub media: Vec<PendingMedia>,
}

impl AutosaveSnapshot {
    pub fn capture(scene: &SceneGraph, viewport: Viewport, last_modified: i64) -> Self {
        let media = scene
            .iter()
            .filter(|e| is_data_url(&e.src))
            .map(|e| PendingMedia {
                id: e.id.to_string(),
                src: e.src.clone(),
                duration: e.playback().map(|p| p.duration),
            })
            .collect();

        Self {
            state: persistence::to_storage(scene, viewport, last_modified),
            media,
        }
    }
}

enum Command {
    Schedule(Box<AutosaveSnapshot>),
    Flush(oneshot::Sender<()>),
}

/// Debounced write-behind for canvas snapshots.
///
/// A single background task holds at most one pending snapshot. Each
/// `schedule` replaces it and restarts the quiet period; only the latest
/// snapshot is written once the period elapses. Writes never overlap.
pub struct Autosaver {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl Autosaver {
    pub fn new(
        store: Arc<dyn CanvasStore>,
        debounce: Duration,
        events: Option<StudioEventBus>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        let handle = tokio::spawn(async move {
            let mut pending: Option<Box<AutosaveSnapshot>> = None;
            let sleep = time::sleep(debounce);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    command = rx.recv() => match command {
                        Some(Command::Schedule(snapshot)) => {
                            pending = Some(snapshot);
                            sleep.as_mut().reset(Instant::now() + debounce);
                        }
                        Some(Command::Flush(ack)) => {
                            if let Some(snapshot) = pending.take() {
                                write(store.as_ref(), &snapshot, events.as_ref()).await;
                            }
                            let _ = ack.send(());
                        }
                        None => {
                            if let Some(snapshot) = pending.take() {
                                write(store.as_ref(), &snapshot, events.as_ref()).await;
                            }
                            break;
                        }
                    },
                    _ = &mut sleep, if pending.is_some() => {
                        if let Some(snapshot) = pending.take() {
                            write(store.as_ref(), &snapshot, events.as_ref()).await;
                        }
                    }
                }
            }
            tracing::debug!("Autosaver stopped");
        });

        Self { tx, handle }
    }

    /// Queues a snapshot. Never blocks.
    pub fn schedule(&self, snapshot: AutosaveSnapshot) {
        if let Err(e) = self.tx.send(Command::Schedule(Box::new(snapshot))) {
            error!("Failed to send snapshot to autosaver: {}", e);
        }
    }

    /// Writes any pending snapshot now and waits for it.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_err() {
            return;
        }
        let _ = done.await;
    }

    /// Flushes and stops the background task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            error!("Autosaver task failed: {}", e);
        }
    }
}

async fn write(store: &dyn CanvasStore, snapshot: &AutosaveSnapshot, events: Option<&StudioEventBus>) {
    if persist_snapshot(store, snapshot).await {
        tracing::debug!(
            elements = snapshot.state.elements.len(),
            last_modified = snapshot.state.last_modified,
            "Canvas autosaved"
        );
        if let Some(bus) = events {
            bus.emit(StudioEvent::Saved {
                last_modified: snapshot.state.last_modified,
                elements: snapshot.state.elements.len(),
            });
        }
    }
}
