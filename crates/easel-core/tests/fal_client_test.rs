use easel_core::StudioConfig;
use easel_core::error::InferenceError;
use easel_core::inference::{FalClient, GenerationRequest, ImageSize, InferenceClient, JobUpdate};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> FalClient {
    let config = StudioConfig {
        api_base_url: server.uri(),
        queue_base_url: server.uri(),
        poll_interval: Duration::from_millis(10),
        ..StudioConfig::default()
    }
    .with_api_key("test-key");
    FalClient::new(&config).unwrap()
}

async fn run(client: &FalClient, request: GenerationRequest) -> (Result<(), InferenceError>, Vec<JobUpdate>) {
    let (sink, mut rx) = mpsc::unbounded_channel();
    let result = client.submit(request, sink).await;
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    (result, updates)
}

#[tokio::test]
async fn test_sync_run_sends_key_and_extracts_image() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fal-ai/bria/background/remove"))
        .and(header("Authorization", "Key test-key"))
        .and(body_partial_json(json!({ "image_url": "https://cdn.test/in.png" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": { "url": "https://cdn.test/out.png", "width": 512, "height": 512 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let (result, updates) = run(
        &client,
        GenerationRequest::RemoveBackground {
            image_url: "https://cdn.test/in.png".into(),
        },
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(
        updates,
        vec![JobUpdate::Completed {
            src: "https://cdn.test/out.png".into(),
            duration: None
        }]
    );
}

#[tokio::test]
async fn test_stream_run_emits_partials_then_completion() {
    let mock_server = MockServer::start().await;

    let body = concat!(
        "data: {\"images\": [{\"url\": \"https://cdn.test/step1.png\"}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"images\": [{\"url\": \"https://cdn.test/step2.png\"}]}\r\n\r\n",
        "data: {\"images\": [{\"url\": \"https://cdn.test/final.png\"}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/fal-ai/flux/dev/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let (result, updates) = run(
        &client,
        GenerationRequest::TextToImage {
            prompt: "a lighthouse".into(),
            lora_url: None,
            image_size: ImageSize::SquareHd,
            source_image: None,
        },
    )
    .await;

    assert!(result.is_ok());
    let partials: Vec<&str> = updates
        .iter()
        .filter_map(|u| match u {
            JobUpdate::Partial { src } => Some(src.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        partials,
        vec![
            "https://cdn.test/step1.png",
            "https://cdn.test/step2.png",
            "https://cdn.test/final.png"
        ]
    );
    assert_eq!(
        updates.last(),
        Some(&JobUpdate::Completed {
            src: "https://cdn.test/final.png".into(),
            duration: None
        })
    );
}

#[tokio::test]
async fn test_queued_run_polls_until_complete() {
    let mock_server = MockServer::start().await;
    let model = "fal-ai/kling-video/v2.1/standard/image-to-video";

    Mock::given(method("POST"))
        .and(path(format!("/{model}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "request_id": "req-1" })))
        .mount(&mock_server)
        .await;

    // First poll: queued. Later polls: completed.
    Mock::given(method("GET"))
        .and(path(format!("/{model}/requests/req-1/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "IN_QUEUE",
            "queue_position": 2
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{model}/requests/req-1/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "COMPLETED" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{model}/requests/req-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video": { "url": "https://cdn.test/clip.mp4" },
            "duration": 5.0
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let (result, updates) = run(
        &client,
        GenerationRequest::ImageToVideo {
            image_url: "https://cdn.test/in.png".into(),
            prompt: "slow pan".into(),
            duration: 5,
        },
    )
    .await;

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(
        updates,
        vec![
            JobUpdate::Progress {
                message: None,
                queue_position: Some(2)
            },
            JobUpdate::Completed {
                src: "https://cdn.test/clip.mp4".into(),
                duration: Some(5.0)
            },
        ]
    );
}

#[tokio::test]
async fn test_http_error_is_reported() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fal-ai/evf-sam"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad prompt"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let (result, updates) = run(
        &client,
        GenerationRequest::IsolateObject {
            image_url: "https://cdn.test/in.png".into(),
            prompt: "the cat".into(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(InferenceError::Status { status: 422, ref body }) if body == "bad prompt"
    ));
    assert!(updates.is_empty());
}

#[tokio::test]
async fn test_missing_api_key_fails_before_any_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = StudioConfig {
        api_base_url: mock_server.uri(),
        api_key: None,
        ..StudioConfig::default()
    };
    let client = FalClient::new(&config).unwrap();
    let (result, _) = run(
        &client,
        GenerationRequest::RemoveBackground {
            image_url: "https://cdn.test/in.png".into(),
        },
    )
    .await;

    assert!(matches!(result, Err(InferenceError::MissingApiKey)));
}
