use async_trait::async_trait;
use easel_canvas::model::{ElementId, PlacedElement, SceneGraph};
use easel_canvas::persistence::CanvasStorageState;
use easel_canvas::view::Viewport;
use easel_core::error::StorageError;
use easel_core::events::{StudioEvent, StudioEventBus};
use easel_core::store::{AutosaveSnapshot, Autosaver, CanvasStore, MediaBlob, MemoryCanvasStore};
use glam::Vec2;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Memory store that counts document writes.
#[derive(Default)]
struct CountingStore {
    inner: MemoryCanvasStore,
    state_writes: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl CanvasStore for CountingStore {
    async fn save_state(&self, state: &CanvasStorageState) -> Result<(), StorageError> {
        self.state_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StorageError::Poisoned);
        }
        self.inner.save_state(state).await
    }

    async fn load_state(&self) -> Result<Option<CanvasStorageState>, StorageError> {
        self.inner.load_state().await
    }

    async fn save_media(&self, id: &str, blob: &MediaBlob) -> Result<(), StorageError> {
        self.inner.save_media(id, blob).await
    }

    async fn get_media(&self, id: &str) -> Result<Option<MediaBlob>, StorageError> {
        self.inner.get_media(id).await
    }

    async fn delete_media(&self, id: &str) -> Result<(), StorageError> {
        self.inner.delete_media(id).await
    }

    async fn media_ids(&self) -> Result<Vec<String>, StorageError> {
        self.inner.media_ids().await
    }
}

fn snapshot_at(x: f32, stamp: i64) -> AutosaveSnapshot {
    let scene = SceneGraph::from_elements([PlacedElement::image(
        ElementId::from("image-1"),
        "https://cdn.test/a.png",
        Vec2::new(x, 0.0),
        Vec2::new(100.0, 100.0),
    )])
    .unwrap();
    AutosaveSnapshot::capture(&scene, Viewport::default(), stamp)
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_write() {
    let store = Arc::new(CountingStore::default());
    let autosaver = Autosaver::new(store.clone(), Duration::from_millis(1000), None);

    // 10 edits, 100ms apart: each restarts the quiet period.
    for i in 0..10 {
        autosaver.schedule(snapshot_at(i as f32 * 10.0, i));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(store.state_writes.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.state_writes.load(Ordering::SeqCst), 1);

    // Only the newest snapshot was written.
    let state = store.load_state().await.unwrap().unwrap();
    assert_eq!(state.last_modified, 9);
    assert_eq!(state.elements[0].transform.x, 90.0);
}

#[tokio::test(start_paused = true)]
async fn test_flush_writes_pending_immediately() {
    let store = Arc::new(CountingStore::default());
    let autosaver = Autosaver::new(store.clone(), Duration::from_secs(60), None);

    autosaver.schedule(snapshot_at(5.0, 1));
    autosaver.flush().await;
    assert_eq!(store.state_writes.load(Ordering::SeqCst), 1);

    // Nothing pending: a second flush does not write again.
    autosaver.flush().await;
    assert_eq!(store.state_writes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending() {
    let store = Arc::new(CountingStore::default());
    let bus = StudioEventBus::default();
    let mut events = bus.subscribe();
    let autosaver = Autosaver::new(store.clone(), Duration::from_secs(60), Some(bus));

    autosaver.schedule(snapshot_at(5.0, 42));
    autosaver.shutdown().await;

    assert_eq!(store.state_writes.load(Ordering::SeqCst), 1);
    assert_eq!(
        events.try_recv().unwrap(),
        StudioEvent::Saved {
            last_modified: 42,
            elements: 1
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_swallowed() {
    let store = Arc::new(CountingStore {
        fail: true,
        ..Default::default()
    });
    let autosaver = Autosaver::new(store.clone(), Duration::from_millis(10), None);

    autosaver.schedule(snapshot_at(1.0, 1));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.state_writes.load(Ordering::SeqCst), 1);

    // The task survives a failed write.
    autosaver.schedule(snapshot_at(2.0, 2));
    autosaver.flush().await;
    assert_eq!(store.state_writes.load(Ordering::SeqCst), 2);
}
