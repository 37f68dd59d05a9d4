use easel_canvas::model::ElementId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::GenerationEvent;
use crate::inference::{GenerationRequest, InferenceClient, JobUpdate};

/// Spawns and owns the tasks driving remote jobs.
///
/// Every job reports through one shared channel; the owner drains it with
/// [`GenerationRunner::drain`] (non-blocking) or [`GenerationRunner::recv`].
pub struct GenerationRunner {
    client: Arc<dyn InferenceClient>,
    tx: mpsc::UnboundedSender<GenerationEvent>,
    rx: mpsc::UnboundedReceiver<GenerationEvent>,
    tasks: HashMap<ElementId, JoinHandle<()>>,
}

impl GenerationRunner {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            tx,
            rx,
            tasks: HashMap::new(),
        }
    }

    /// Starts job `job` for `key`. A previous task under the same key is aborted.
    pub fn start(&mut self, key: ElementId, job: u64, request: GenerationRequest) {
        let client = self.client.clone();
        let events = self.tx.clone();
        let task_key = key.clone();

        let span = tracing::info_span!("generation_job", element_id = %task_key, job, model = request.model());
        let handle = tokio::spawn(run_job(client, task_key, job, request, events).instrument(span));

        if let Some(previous) = self.tasks.insert(key, handle) {
            previous.abort();
        }
    }

    /// Stops the local task. The remote job may keep running.
    pub fn abort(&mut self, key: &ElementId) -> bool {
        match self.tasks.remove(key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Forgets a finished job's handle.
    pub fn finish(&mut self, key: &ElementId) {
        self.tasks.remove(key);
    }

    pub fn is_running(&self, key: &ElementId) -> bool {
        self.tasks.get(key).is_some_and(|h| !h.is_finished())
    }

    /// Collects every event received so far without waiting.
    pub fn drain(&mut self) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Waits for the next event.
    pub async fn recv(&mut self) -> Option<GenerationEvent> {
        self.rx.recv().await
    }
}

impl Drop for GenerationRunner {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

async fn run_job(
    client: Arc<dyn InferenceClient>,
    key: ElementId,
    job: u64,
    request: GenerationRequest,
    events: mpsc::UnboundedSender<GenerationEvent>,
) {
    let (sink, mut updates) = mpsc::unbounded_channel::<JobUpdate>();

    let submit = client.submit(request, sink);
    let forward = async {
        let mut sequence = 0u64;
        let mut finished = false;
        while let Some(update) = updates.recv().await {
            if finished {
                continue;
            }
            sequence += 1;
            finished = update.is_terminal();
            tracing::trace!(element_id = %key, sequence, "Job update");
            let _ = events.send(GenerationEvent {
                key: key.clone(),
                job,
                sequence,
                update,
            });
        }
        (sequence, finished)
    };

    let (result, (sequence, finished)) = tokio::join!(submit, forward);
    if finished {
        return;
    }

    let error = match result {
        Ok(()) => "the service returned no result".to_string(),
        Err(e) => e.to_string(),
    };
    tracing::warn!(element_id = %key, %error, "Job ended without a result");
    let _ = events.send(GenerationEvent {
        key,
        job,
        sequence: sequence + 1,
        update: JobUpdate::Failed { error },
    });
}
