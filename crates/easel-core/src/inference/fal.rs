//! HTTP client for the fal.ai inference service.
//!
//! Three execution styles are used depending on the model:
//! - **sync**: `POST {base}/{model}` and read the result body.
//! - **stream**: `POST {base}/{model}/stream`, consuming server-sent events.
//! - **queued**: `POST {queue}/{model}`, poll the status URL, then fetch the result.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{GenerationRequest, InferenceClient, JobSink, JobUpdate, RunMode, extract_output};
use crate::config::StudioConfig;
use crate::error::InferenceError;

#[derive(Clone, Debug)]
pub struct FalClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    queue_url: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct QueueSubmission {
    request_id: String,
    #[serde(default)]
    status_url: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueLog {
    message: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
    #[serde(default)]
    queue_position: Option<u32>,
    #[serde(default)]
    logs: Option<Vec<QueueLog>>,
    #[serde(default)]
    error: Option<String>,
}

impl FalClient {
    pub fn new(config: &StudioConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            queue_url: config.queue_base_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval,
        })
    }

    fn auth_header(&self) -> Result<String, InferenceError> {
        self.api_key
            .as_deref()
            .map(|key| format!("Key {key}"))
            .ok_or(InferenceError::MissingApiKey)
    }

    async fn run_sync(
        &self,
        auth: &str,
        request: &GenerationRequest,
        sink: &JobSink,
    ) -> Result<(), InferenceError> {
        let url = format!("{}/{}", self.base_url, request.model());
        tracing::debug!(%url, "Running model");

        let response = self
            .http
            .post(&url)
            .header("Authorization", auth)
            .json(&request.payload())
            .send()
            .await?;
        let body: Value = ensure_success(response).await?.json().await?;

        let (src, duration) = extract_output(&body).ok_or(InferenceError::MissingOutput("media"))?;
        let _ = sink.send(JobUpdate::Completed { src, duration });
        Ok(())
    }

    async fn run_stream(
        &self,
        auth: &str,
        request: &GenerationRequest,
        sink: &JobSink,
    ) -> Result<(), InferenceError> {
        let url = format!("{}/{}/stream", self.base_url, request.model());
        tracing::debug!(%url, "Streaming model");

        let response = self
            .http
            .post(&url)
            .header("Authorization", auth)
            .header("Accept", "text/event-stream")
            .json(&request.payload())
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let events = sse_data(response);
        futures::pin_mut!(events);

        let mut last = None;
        while let Some(data) = events.next().await {
            let data = data?;
            let Ok(value) = serde_json::from_str::<Value>(&data) else {
                tracing::debug!(data = %data, "Ignoring non-JSON stream event");
                continue;
            };
            if let Some(error) = error_message(&value) {
                return Err(InferenceError::JobFailed(error));
            }
            if let Some((src, duration)) = extract_output(&value) {
                let _ = sink.send(JobUpdate::Partial { src: src.clone() });
                last = Some((src, duration));
            }
        }

        let (src, duration) = last.ok_or(InferenceError::MissingOutput("image"))?;
        let _ = sink.send(JobUpdate::Completed { src, duration });
        Ok(())
    }

    async fn run_queued(
        &self,
        auth: &str,
        request: &GenerationRequest,
        sink: &JobSink,
    ) -> Result<(), InferenceError> {
        let model = request.model();
        let submit_url = format!("{}/{}", self.queue_url, model);

        let response = self
            .http
            .post(&submit_url)
            .header("Authorization", auth)
            .json(&request.payload())
            .send()
            .await?;
        let submission: QueueSubmission = ensure_success(response).await?.json().await?;
        tracing::info!(request_id = %submission.request_id, model, "Job queued");

        let requests_url = format!("{}/{}/requests/{}", self.queue_url, model, submission.request_id);
        let status_url = submission
            .status_url
            .unwrap_or_else(|| format!("{requests_url}/status"));
        let response_url = submission.response_url.unwrap_or(requests_url);

        loop {
            let response = self
                .http
                .get(&status_url)
                .header("Authorization", auth)
                .query(&[("logs", "1")])
                .send()
                .await?;
            let status: QueueStatus = ensure_success(response).await?.json().await?;

            match status.status.as_str() {
                "IN_QUEUE" | "IN_PROGRESS" => {
                    let message = status
                        .logs
                        .and_then(|logs| logs.into_iter().last())
                        .map(|log| log.message);
                    let _ = sink.send(JobUpdate::Progress {
                        message,
                        queue_position: status.queue_position,
                    });
                }
                "COMPLETED" => {
                    if let Some(error) = status.error {
                        return Err(InferenceError::JobFailed(error));
                    }
                    break;
                }
                other => {
                    return Err(InferenceError::Malformed(format!("unknown queue status '{other}'")));
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let response = self
            .http
            .get(&response_url)
            .header("Authorization", auth)
            .send()
            .await?;
        let body: Value = ensure_success(response).await?.json().await?;
        if let Some(error) = error_message(&body) {
            return Err(InferenceError::JobFailed(error));
        }

        let (src, duration) = extract_output(&body).ok_or(InferenceError::MissingOutput("video"))?;
        let _ = sink.send(JobUpdate::Completed { src, duration });
        Ok(())
    }
}

#[async_trait]
impl InferenceClient for FalClient {
    #[tracing::instrument(skip_all, fields(model = request.model()))]
    async fn submit(&self, request: GenerationRequest, sink: JobSink) -> Result<(), InferenceError> {
        let auth = self.auth_header()?;
        match request.run_mode() {
            RunMode::Sync => self.run_sync(&auth, &request, &sink).await,
            RunMode::Stream => self.run_stream(&auth, &request, &sink).await,
            RunMode::Queued => self.run_queued(&auth, &request, &sink).await,
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InferenceError::Status {
        status: status.as_u16(),
        body,
    })
}

fn error_message(value: &Value) -> Option<String> {
    let error = value.get("error").or_else(|| value.get("detail"))?;
    match error {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Turns an event-stream response into the `data` payload of each event.
fn sse_data(response: reqwest::Response) -> impl Stream<Item = Result<String, InferenceError>> {
    async_stream::try_stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut data = String::new();

        while let Some(chunk) = bytes.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches(['\n', '\r']);

                if line.is_empty() {
                    if !data.is_empty() {
                        yield std::mem::take(&mut data);
                    }
                } else if let Some(rest) = line.strip_prefix("data:") {
                    if !data.is_empty() {
                        data.push('\n');
                    }
                    data.push_str(rest.trim_start());
                }
            }
        }

        if !data.is_empty() {
            yield data;
        }
    }
}
