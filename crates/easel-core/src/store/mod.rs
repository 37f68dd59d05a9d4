//! # Local Persistence
//!
//! Canvas state is stored as one JSON document; media payloads live in a
//! separate keyed table so the document stays small.

pub mod autosave;
pub mod database;
pub mod media;
pub mod memory;

pub use autosave::{AutosaveSnapshot, Autosaver};
pub use database::SqliteCanvasStore;
pub use media::MediaBlob;
pub use memory::MemoryCanvasStore;

use async_trait::async_trait;
use easel_canvas::model::SceneGraph;
use easel_canvas::persistence::{self, CanvasStorageState, ResolvedMedia};
use easel_canvas::view::Viewport;
use std::collections::{HashMap, HashSet};

use crate::error::StorageError;

/// Durable storage for the canvas document and its media.
#[async_trait]
pub trait CanvasStore: Send + Sync {
    /// Replaces the stored canvas document.
    async fn save_state(&self, state: &CanvasStorageState) -> Result<(), StorageError>;

    /// Returns `None` when nothing has been saved yet.
    async fn load_state(&self) -> Result<Option<CanvasStorageState>, StorageError>;

    async fn save_media(&self, id: &str, blob: &MediaBlob) -> Result<(), StorageError>;

    async fn get_media(&self, id: &str) -> Result<Option<MediaBlob>, StorageError>;

    async fn delete_media(&self, id: &str) -> Result<(), StorageError>;

    async fn media_ids(&self) -> Result<Vec<String>, StorageError>;

    /// Deletes every media entry whose id is not in `keep`. Returns the number removed.
    async fn prune_media(&self, keep: &HashSet<String>) -> Result<usize, StorageError> {
        let mut removed = 0;
        for id in self.media_ids().await? {
            if !keep.contains(&id) {
                self.delete_media(&id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Loads the persisted canvas, falling back to an empty scene.
///
/// Storage failures are logged, never propagated: a broken store must not
/// keep the editor from opening.
pub async fn load_scene(store: &dyn CanvasStore) -> (SceneGraph, Viewport) {
    let state = match store.load_state().await {
        Ok(Some(state)) => state,
        Ok(None) => return (SceneGraph::new(), Viewport::default()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load canvas state");
            return (SceneGraph::new(), Viewport::default());
        }
    };

    let mut blobs: HashMap<String, MediaBlob> = HashMap::new();
    for element in &state.elements {
        let key = element.media_key();
        if blobs.contains_key(key) {
            continue;
        }
        match store.get_media(key).await {
            Ok(Some(blob)) => {
                blobs.insert(key.to_string(), blob);
            }
            Ok(None) => {}
            Err(e) => tracing::error!(element_id = %element.id, error = %e, "Failed to load media"),
        }
    }

    let (scene, viewport) = persistence::from_storage(&state, |stored| {
        blobs.get(stored.media_key()).map(|blob| ResolvedMedia {
            src: blob.to_data_url(),
            duration: blob.duration,
        })
    });
    tracing::info!(elements = scene.len(), "Canvas restored");
    (scene, viewport)
}

/// Writes a snapshot: document first, then new or changed media, then orphan cleanup.
///
/// Returns false if any step failed. Failures are logged.
pub async fn persist_snapshot(store: &dyn CanvasStore, snapshot: &AutosaveSnapshot) -> bool {
    if let Err(e) = store.save_state(&snapshot.state).await {
        tracing::error!(error = %e, "Failed to save canvas state");
        return false;
    }

    let mut ok = true;
    let mut keep = HashSet::new();
    for media in &snapshot.media {
        keep.insert(media.id.clone());
        let blob = match MediaBlob::from_data_url(&media.src) {
            Ok(blob) => blob.with_duration(media.duration),
            Err(e) => {
                tracing::warn!(element_id = %media.id, error = %e, "Skipping undecodable media");
                continue;
            }
        };

        match store.get_media(&media.id).await {
            Ok(Some(stored)) if stored.same_content(&blob) => continue,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(element_id = %media.id, error = %e, "Failed to check media");
                ok = false;
                continue;
            }
        }

        if let Err(e) = store.save_media(&media.id, &blob).await {
            tracing::error!(element_id = %media.id, error = %e, "Failed to save media");
            ok = false;
        }
    }

    match store.prune_media(&keep).await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "Pruned orphaned media"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to prune media");
            ok = false;
        }
    }
    ok
}
