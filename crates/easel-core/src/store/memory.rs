use async_trait::async_trait;
use easel_canvas::persistence::CanvasStorageState;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{CanvasStore, MediaBlob};
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Inner {
    /// Serialized document, so loads behave like a real store.
    state: Option<String>,
    media: HashMap<String, MediaBlob>,
}

/// In-process store for tests and ephemeral sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryCanvasStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryCanvasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the stored document with raw text.
    pub fn put_raw_state(&self, json: impl Into<String>) -> Result<(), StorageError> {
        self.inner.write().map_err(|_| StorageError::Poisoned)?.state = Some(json.into());
        Ok(())
    }

    pub fn media_count(&self) -> usize {
        self.inner.read().map(|g| g.media.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CanvasStore for MemoryCanvasStore {
    async fn save_state(&self, state: &CanvasStorageState) -> Result<(), StorageError> {
        // Serialize before taking the lock so a failure leaves the old document.
        let json = serde_json::to_string(state)?;
        self.inner.write().map_err(|_| StorageError::Poisoned)?.state = Some(json);
        Ok(())
    }

    async fn load_state(&self) -> Result<Option<CanvasStorageState>, StorageError> {
        let guard = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        let Some(json) = guard.state.as_deref() else {
            return Ok(None);
        };
        match serde_json::from_str(json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::error!(error = %e, "Stored canvas state is malformed; starting empty");
                Ok(None)
            }
        }
    }

    async fn save_media(&self, id: &str, blob: &MediaBlob) -> Result<(), StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .media
            .insert(id.to_string(), blob.clone());
        Ok(())
    }

    async fn get_media(&self, id: &str) -> Result<Option<MediaBlob>, StorageError> {
        let guard = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.media.get(id).cloned())
    }

    async fn delete_media(&self, id: &str) -> Result<(), StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .media
            .remove(id);
        Ok(())
    }

    async fn media_ids(&self) -> Result<Vec<String>, StorageError> {
        let guard = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.media.keys().cloned().collect())
    }
}
