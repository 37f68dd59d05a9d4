use chrono::{DateTime, Utc};
use easel_canvas::model::ElementId;
use std::collections::HashMap;
use std::time::Duration;

use super::{GenerationEvent, GenerationKind};
use crate::error::GenerationError;
use crate::inference::JobUpdate;

#[derive(Clone, Debug, PartialEq)]
pub enum GenerationStatus {
    Requested,
    Streaming { updates: u32 },
}

/// Local bookkeeping for one in-flight job.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveGeneration {
    pub job: u64,
    pub kind: GenerationKind,
    pub status: GenerationStatus,
    pub latest_partial: Option<String>,
    pub last_sequence: u64,
    /// The element was created for this job and goes away if it fails.
    pub placeholder: bool,
    pub started_at: DateTime<Utc>,
    pub progress: Option<String>,
    pub queue_position: Option<u32>,
}

/// What the canvas should do in response to a job update.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Show an intermediate result in place.
    Preview { key: ElementId, src: String },
    Completed {
        key: ElementId,
        kind: GenerationKind,
        src: String,
        duration: Option<f32>,
    },
    Failed {
        key: ElementId,
        kind: GenerationKind,
        error: String,
        remove_element: bool,
    },
    /// Local tracking stopped by the user. No error is surfaced.
    Cancelled {
        key: ElementId,
        kind: GenerationKind,
        remove_element: bool,
    },
}

impl Transition {
    pub fn key(&self) -> &ElementId {
        match self {
            Self::Preview { key, .. }
            | Self::Completed { key, .. }
            | Self::Failed { key, .. }
            | Self::Cancelled { key, .. } => key,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Preview { .. })
    }
}

/// Per-element state machine for remote jobs.
///
/// `Requested -> Streaming* -> Completed | Failed | Cancelled`. At most one
/// job is active per element id. Updates from an earlier job on the same
/// element and updates older than the last one seen are discarded.
#[derive(Debug, Default)]
pub struct GenerationTracker {
    active: HashMap<ElementId, ActiveGeneration>,
    timeout: Option<Duration>,
    next_job: u64,
}

impl GenerationTracker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            active: HashMap::new(),
            timeout,
            next_job: 0,
        }
    }

    /// Registers a job for `key` and returns its id. Events must carry this
    /// id to be applied.
    pub fn begin(
        &mut self,
        key: ElementId,
        kind: GenerationKind,
        placeholder: bool,
        now: DateTime<Utc>,
    ) -> Result<u64, GenerationError> {
        if self.active.contains_key(&key) {
            return Err(GenerationError::AlreadyActive(key));
        }
        self.next_job += 1;
        let job = self.next_job;
        tracing::info!(element_id = %key, job, ?kind, placeholder, "Generation started");
        self.active.insert(
            key,
            ActiveGeneration {
                job,
                kind,
                status: GenerationStatus::Requested,
                latest_partial: None,
                last_sequence: 0,
                placeholder,
                started_at: now,
                progress: None,
                queue_position: None,
            },
        );
        Ok(job)
    }

    /// Folds one job update into the tracker.
    ///
    /// Returns `None` for bookkeeping-only updates, stale updates and updates
    /// for jobs that are no longer tracked.
    pub fn apply(&mut self, event: GenerationEvent) -> Option<Transition> {
        let GenerationEvent {
            key,
            job,
            sequence,
            update,
        } = event;

        let Some(entry) = self.active.get_mut(&key) else {
            tracing::debug!(element_id = %key, job, sequence, "Dropping update for inactive job");
            return None;
        };
        if job != entry.job {
            tracing::debug!(
                element_id = %key,
                job,
                active_job = entry.job,
                "Dropping update from a previous job"
            );
            return None;
        }
        if sequence <= entry.last_sequence {
            tracing::warn!(
                element_id = %key,
                sequence,
                last_sequence = entry.last_sequence,
                "Dropping out-of-order update"
            );
            return None;
        }
        entry.last_sequence = sequence;

        match update {
            JobUpdate::Progress {
                message,
                queue_position,
            } => {
                if message.is_some() {
                    entry.progress = message;
                }
                entry.queue_position = queue_position;
                None
            }
            JobUpdate::Partial { src } => {
                let updates = match entry.status {
                    GenerationStatus::Requested => 1,
                    GenerationStatus::Streaming { updates } => updates + 1,
                };
                entry.status = GenerationStatus::Streaming { updates };
                entry.latest_partial = Some(src.clone());
                Some(Transition::Preview { key, src })
            }
            JobUpdate::Completed { src, duration } => {
                let entry = self.active.remove(&key)?;
                tracing::info!(element_id = %key, kind = ?entry.kind, "Generation completed");
                Some(Transition::Completed {
                    key,
                    kind: entry.kind,
                    src,
                    duration,
                })
            }
            JobUpdate::Failed { error } => {
                let entry = self.active.remove(&key)?;
                tracing::warn!(element_id = %key, kind = ?entry.kind, %error, "Generation failed");
                Some(Transition::Failed {
                    key,
                    kind: entry.kind,
                    error,
                    remove_element: entry.placeholder,
                })
            }
        }
    }

    pub fn cancel(&mut self, key: &ElementId) -> Option<Transition> {
        let entry = self.active.remove(key)?;
        tracing::info!(element_id = %key, kind = ?entry.kind, "Generation cancelled");
        Some(Transition::Cancelled {
            key: key.clone(),
            kind: entry.kind,
            remove_element: entry.placeholder,
        })
    }

    /// Fails every job that has been running longer than the timeout.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Transition> {
        let Some(timeout) = self.timeout.and_then(|t| chrono::Duration::from_std(t).ok()) else {
            return Vec::new();
        };

        let mut expired: Vec<ElementId> = self
            .active
            .iter()
            .filter(|(_, entry)| now - entry.started_at >= timeout)
            .map(|(key, _)| key.clone())
            .collect();
        expired.sort();

        expired
            .into_iter()
            .filter_map(|key| {
                let entry = self.active.remove(&key)?;
                tracing::warn!(element_id = %key, kind = ?entry.kind, "Generation timed out");
                Some(Transition::Failed {
                    key,
                    kind: entry.kind,
                    error: "timed out".to_string(),
                    remove_element: entry.placeholder,
                })
            })
            .collect()
    }

    pub fn get(&self, key: &ElementId) -> Option<&ActiveGeneration> {
        self.active.get(key)
    }

    pub fn is_active(&self, key: &ElementId) -> bool {
        self.active.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ElementId> + '_ {
        self.active.keys()
    }
}
