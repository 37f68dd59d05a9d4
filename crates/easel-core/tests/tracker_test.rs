use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use easel_canvas::model::ElementId;
use easel_core::error::{GenerationError, InferenceError};
use easel_core::generation::{
    GenerationEvent, GenerationKind, GenerationRunner, GenerationStatus, GenerationTracker,
    Transition,
};
use easel_core::inference::{GenerationRequest, InferenceClient, JobSink, JobUpdate};
use std::sync::Arc;
use std::time::Duration;

fn event(key: &str, job: u64, sequence: u64, update: JobUpdate) -> GenerationEvent {
    GenerationEvent {
        key: ElementId::from(key),
        job,
        sequence,
        update,
    }
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_streaming_then_completion() {
    let mut tracker = GenerationTracker::new(None);
    let key = ElementId::from("generated-1");
    tracker
        .begin(key.clone(), GenerationKind::TextToImage, true, t0())
        .unwrap();

    let preview = tracker.apply(event(
        "generated-1",
        1,
        1,
        JobUpdate::Partial {
            src: "https://cdn.test/p1.png".into(),
        },
    ));
    assert_eq!(
        preview,
        Some(Transition::Preview {
            key: key.clone(),
            src: "https://cdn.test/p1.png".into()
        })
    );
    assert_eq!(
        tracker.get(&key).unwrap().status,
        GenerationStatus::Streaming { updates: 1 }
    );

    let done = tracker.apply(event(
        "generated-1",
        1,
        2,
        JobUpdate::Completed {
            src: "https://cdn.test/final.png".into(),
            duration: None,
        },
    ));
    assert!(matches!(done, Some(Transition::Completed { ref src, .. }) if src == "https://cdn.test/final.png"));
    assert!(!tracker.is_active(&key));
    assert!(tracker.is_empty());
}

#[test]
fn test_out_of_order_updates_are_dropped() {
    let mut tracker = GenerationTracker::new(None);
    tracker
        .begin(ElementId::from("g"), GenerationKind::TextToImage, true, t0())
        .unwrap();

    let later = tracker.apply(event("g", 1, 3, JobUpdate::Partial { src: "p3".into() }));
    assert!(later.is_some());

    // Older sequence numbers arriving late never roll the preview back.
    assert_eq!(tracker.apply(event("g", 1, 2, JobUpdate::Partial { src: "p2".into() })), None);
    assert_eq!(tracker.apply(event("g", 1, 3, JobUpdate::Partial { src: "p3".into() })), None);
    assert_eq!(
        tracker.get(&ElementId::from("g")).unwrap().latest_partial.as_deref(),
        Some("p3")
    );
}

#[test]
fn test_failure_removes_only_placeholders() {
    let mut tracker = GenerationTracker::new(None);
    tracker
        .begin(ElementId::from("placeholder"), GenerationKind::ImageToVideo, true, t0())
        .unwrap();
    tracker
        .begin(ElementId::from("in-place"), GenerationKind::RemoveBackground, false, t0())
        .unwrap();

    let failed = tracker.apply(event(
        "placeholder",
        1,
        1,
        JobUpdate::Failed {
            error: "boom".into(),
        },
    ));
    assert!(matches!(
        failed,
        Some(Transition::Failed {
            remove_element: true,
            ..
        })
    ));

    let failed = tracker.apply(event(
        "in-place",
        2,
        1,
        JobUpdate::Failed {
            error: "boom".into(),
        },
    ));
    assert!(matches!(
        failed,
        Some(Transition::Failed {
            remove_element: false,
            ..
        })
    ));
    assert!(tracker.is_empty());
}

#[test]
fn test_one_job_per_key() {
    let mut tracker = GenerationTracker::new(None);
    let key = ElementId::from("busy");
    tracker
        .begin(key.clone(), GenerationKind::RemoveBackground, false, t0())
        .unwrap();
    assert_eq!(
        tracker.begin(key.clone(), GenerationKind::IsolateObject, false, t0()),
        Err(GenerationError::AlreadyActive(key))
    );
}

#[test]
fn test_cancel_and_late_events() {
    let mut tracker = GenerationTracker::new(None);
    let key = ElementId::from("g");
    tracker
        .begin(key.clone(), GenerationKind::TextToImage, true, t0())
        .unwrap();

    assert_eq!(
        tracker.cancel(&key),
        Some(Transition::Cancelled {
            key: key.clone(),
            kind: GenerationKind::TextToImage,
            remove_element: true
        })
    );
    assert_eq!(tracker.cancel(&key), None);

    // A result that arrives after cancellation is ignored.
    let late = tracker.apply(event(
        "g",
        1,
        1,
        JobUpdate::Completed {
            src: "x".into(),
            duration: None,
        },
    ));
    assert_eq!(late, None);
}

#[test]
fn test_updates_from_a_previous_job_are_dropped() {
    let mut tracker = GenerationTracker::new(None);
    let key = ElementId::from("a");
    let first = tracker
        .begin(key.clone(), GenerationKind::RemoveBackground, false, t0())
        .unwrap();
    tracker.cancel(&key);
    let second = tracker
        .begin(key.clone(), GenerationKind::IsolateObject, false, t0())
        .unwrap();
    assert_ne!(first, second);

    // The cancelled job's result was already queued when the new job began.
    let stale = tracker.apply(event(
        "a",
        first,
        1,
        JobUpdate::Completed {
            src: "https://cdn.test/cancelled.png".into(),
            duration: None,
        },
    ));
    assert_eq!(stale, None);
    assert!(tracker.is_active(&key));
    assert_eq!(tracker.get(&key).unwrap().last_sequence, 0);

    let done = tracker.apply(event(
        "a",
        second,
        1,
        JobUpdate::Completed {
            src: "https://cdn.test/isolated.png".into(),
            duration: None,
        },
    ));
    assert!(matches!(
        done,
        Some(Transition::Completed { kind: GenerationKind::IsolateObject, ref src, .. })
            if src == "https://cdn.test/isolated.png"
    ));
}

#[test]
fn test_progress_is_bookkeeping_only() {
    let mut tracker = GenerationTracker::new(None);
    let key = ElementId::from("video");
    tracker
        .begin(key.clone(), GenerationKind::ImageToVideo, true, t0())
        .unwrap();

    let progress = tracker.apply(event(
        "video",
        1,
        1,
        JobUpdate::Progress {
            message: Some("rendering".into()),
            queue_position: Some(3),
        },
    ));
    assert_eq!(progress, None);
    let entry = tracker.get(&key).unwrap();
    assert_eq!(entry.progress.as_deref(), Some("rendering"));
    assert_eq!(entry.queue_position, Some(3));
    assert_eq!(entry.status, GenerationStatus::Requested);
}

#[test]
fn test_timeout_expires_old_jobs() {
    let mut tracker = GenerationTracker::new(Some(Duration::from_secs(600)));
    tracker
        .begin(ElementId::from("old"), GenerationKind::ImageToVideo, true, t0())
        .unwrap();
    tracker
        .begin(
            ElementId::from("new"),
            GenerationKind::TextToImage,
            true,
            t0() + ChronoDuration::minutes(8),
        )
        .unwrap();

    assert!(tracker.expire(t0() + ChronoDuration::minutes(9)).is_empty());

    let expired = tracker.expire(t0() + ChronoDuration::minutes(10));
    assert_eq!(expired.len(), 1);
    assert!(matches!(
        &expired[0],
        Transition::Failed { key, error, remove_element: true, .. }
            if key.as_str() == "old" && error == "timed out"
    ));
    assert!(tracker.is_active(&ElementId::from("new")));

    // Disabled timeout never expires anything.
    let mut unlimited = GenerationTracker::new(None);
    unlimited
        .begin(ElementId::from("x"), GenerationKind::TextToImage, true, t0())
        .unwrap();
    assert!(unlimited.expire(t0() + ChronoDuration::days(30)).is_empty());
}

/// Client that replays a scripted list of updates.
struct ScriptedClient {
    updates: Vec<JobUpdate>,
    result: fn() -> Result<(), InferenceError>,
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn submit(&self, _request: GenerationRequest, sink: JobSink) -> Result<(), InferenceError> {
        for update in &self.updates {
            let _ = sink.send(update.clone());
        }
        (self.result)()
    }
}

fn request() -> GenerationRequest {
    GenerationRequest::RemoveBackground {
        image_url: "https://cdn.test/a.png".into(),
    }
}

async fn collect(runner: &mut GenerationRunner, until_terminal: usize) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    let mut terminal = 0;
    while terminal < until_terminal {
        let event = tokio::time::timeout(Duration::from_secs(5), runner.recv())
            .await
            .expect("runner produced an event")
            .expect("channel open");
        if event.update.is_terminal() {
            terminal += 1;
        }
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_runner_stamps_sequences() {
    let client = ScriptedClient {
        updates: vec![
            JobUpdate::Partial { src: "p1".into() },
            JobUpdate::Partial { src: "p2".into() },
            JobUpdate::Completed {
                src: "final".into(),
                duration: None,
            },
        ],
        result: || Ok(()),
    };
    let mut runner = GenerationRunner::new(Arc::new(client));
    runner.start(ElementId::from("job"), 1, request());

    let events = collect(&mut runner, 1).await;
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert!(events.iter().all(|e| e.key.as_str() == "job" && e.job == 1));
}

#[tokio::test]
async fn test_runner_reports_client_errors() {
    let client = ScriptedClient {
        updates: vec![JobUpdate::Partial { src: "p1".into() }],
        result: || Err(InferenceError::MissingApiKey),
    };
    let mut runner = GenerationRunner::new(Arc::new(client));
    runner.start(ElementId::from("job"), 1, request());

    let events = collect(&mut runner, 1).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].sequence, 2);
    assert!(matches!(
        &events[1].update,
        JobUpdate::Failed { error } if error.contains("API key")
    ));
}

#[tokio::test]
async fn test_runner_fails_jobs_without_result() {
    let client = ScriptedClient {
        updates: vec![],
        result: || Ok(()),
    };
    let mut runner = GenerationRunner::new(Arc::new(client));
    runner.start(ElementId::from("job"), 1, request());

    let events = collect(&mut runner, 1).await;
    assert!(matches!(events[0].update, JobUpdate::Failed { .. }));
    assert!(runner.abort(&ElementId::from("job")));
    assert!(!runner.abort(&ElementId::from("job")));
}
