//! # Studio Configuration
//!
//! Runtime settings for storage, the inference service and background tasks.
//! Values come from the process environment (optionally seeded from a `.env`
//! file) and fall back to defaults.

use anyhow::{Context, Result};
use easel_canvas::CanvasConfig;
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:easel.db";
pub const DEFAULT_API_BASE_URL: &str = "https://fal.run";
pub const DEFAULT_QUEUE_BASE_URL: &str = "https://queue.fal.run";

#[derive(Clone, Debug)]
pub struct StudioConfig {
    pub database_url: String,
    /// Inference API key. Generation requests fail fast when absent.
    pub api_key: Option<String>,
    /// Base URL for synchronous and streaming runs.
    pub api_base_url: String,
    /// Base URL for queued runs.
    pub queue_base_url: String,
    /// Quiet period before an edit is written to storage.
    pub autosave_debounce: Duration,
    /// Jobs running longer than this are failed locally. `None` disables the limit.
    pub generation_timeout: Option<Duration>,
    /// Status polling interval for queued (video) jobs.
    pub poll_interval: Duration,
    pub canvas: CanvasConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            queue_base_url: DEFAULT_QUEUE_BASE_URL.to_string(),
            autosave_debounce: Duration::from_millis(1000),
            generation_timeout: Some(Duration::from_secs(600)),
            poll_interval: Duration::from_secs(1),
            canvas: CanvasConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Loads `.env` (if present) and reads `EASEL_*` / `FAL_KEY` variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("EASEL_DATABASE_URL") {
            config.database_url = url;
        }
        config.api_key = lookup("FAL_KEY").filter(|k| !k.trim().is_empty());

        if let Some(raw) = lookup("EASEL_API_BASE_URL") {
            Url::parse(&raw).with_context(|| format!("Invalid EASEL_API_BASE_URL '{raw}'"))?;
            config.api_base_url = raw;
        }
        if let Some(raw) = lookup("EASEL_QUEUE_BASE_URL") {
            Url::parse(&raw).with_context(|| format!("Invalid EASEL_QUEUE_BASE_URL '{raw}'"))?;
            config.queue_base_url = raw;
        }
        if let Some(raw) = lookup("EASEL_AUTOSAVE_MS") {
            let ms: u64 = raw
                .parse()
                .with_context(|| format!("Invalid EASEL_AUTOSAVE_MS '{raw}'"))?;
            config.autosave_debounce = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("EASEL_GENERATION_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("Invalid EASEL_GENERATION_TIMEOUT_SECS '{raw}'"))?;
            // 0 disables the timeout
            config.generation_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        tracing::debug!(
            database_url = %config.database_url,
            api_base_url = %config.api_base_url,
            has_api_key = config.api_key.is_some(),
            "Studio config loaded"
        );
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}
