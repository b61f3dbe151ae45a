//! Vision-model coordinate inference client.
//!
//! Primary transport is a local HTTP inference service; a command-line
//! invocation of the same capability is the fallback when the service
//! is unreachable. The service can be auto-started once per process
//! lifetime if a launch command is configured.

use crate::error::{UiError, UiResult};
use crate::types::Point;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct VlmConfig {
    pub endpoint: String,
    pub model: Option<String>,
    pub revision: Option<String>,
    /// CLI fallback binary; receives the image path and prompt and
    /// prints `{"ok":true,"x":..,"y":..}` on stdout.
    pub cli_fallback: Option<String>,
    /// Command to start the local service when unreachable. Used at
    /// most once per process.
    pub autostart_command: Option<Vec<String>>,
    pub request_timeout: Duration,
}

impl Default for VlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8763/infer".to_string(),
            model: None,
            revision: None,
            cli_fallback: None,
            autostart_command: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct InferRequest<'a> {
    image: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<&'a str>,
}

#[derive(Deserialize)]
struct InferResponse {
    ok: bool,
    x: Option<i32>,
    y: Option<i32>,
    error: Option<String>,
}

static AUTOSTART_ATTEMPTED: AtomicBool = AtomicBool::new(false);

pub struct VlmClient {
    config: VlmConfig,
    http: reqwest::Client,
}

impl VlmClient {
    pub fn new(config: VlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    /// Resolve a natural-language target description to coordinates on
    /// the screenshot. HTTP first, CLI fallback second.
    pub async fn locate(&self, screenshot: &Path, prompt: &str) -> UiResult<Point> {
        match self.locate_http(screenshot, prompt).await {
            Ok(point) => Ok(point),
            Err(UiError::InferenceTransport(reason)) => {
                warn!("VLM HTTP transport failed ({}), trying CLI fallback", reason);
                self.maybe_autostart().await;
                self.locate_cli(screenshot, prompt).await
            }
            Err(other) => Err(other),
        }
    }

    async fn locate_http(&self, screenshot: &Path, prompt: &str) -> UiResult<Point> {
        let bytes = tokio::fs::read(screenshot).await?;
        let image = base64::engine::general_purpose::STANDARD.encode(bytes);

        let request = InferRequest {
            image: &image,
            prompt,
            model: self.config.model.as_deref(),
            revision: self.config.revision.as_deref(),
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| UiError::InferenceTransport(e.to_string()))?;

        let parsed: InferResponse = response
            .json()
            .await
            .map_err(|e| UiError::InferenceTransport(e.to_string()))?;

        Self::to_point(parsed, prompt)
    }

    async fn locate_cli(&self, screenshot: &Path, prompt: &str) -> UiResult<Point> {
        let binary = self.config.cli_fallback.as_deref().ok_or_else(|| {
            UiError::InferenceTransport("no CLI fallback configured".to_string())
        })?;

        let output = Command::new(binary)
            .arg(screenshot)
            .arg(prompt)
            .output()
            .await
            .map_err(|e| UiError::InferenceTransport(e.to_string()))?;
        if !output.status.success() {
            return Err(UiError::InferenceTransport(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let parsed: InferResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| UiError::InferenceTransport(e.to_string()))?;
        Self::to_point(parsed, prompt)
    }

    fn to_point(response: InferResponse, prompt: &str) -> UiResult<Point> {
        if !response.ok {
            return Err(UiError::VlmNoMatch(
                response.error.unwrap_or_else(|| prompt.to_string()),
            ));
        }
        match (response.x, response.y) {
            (Some(x), Some(y)) => Ok(Point { x, y }),
            _ => Err(UiError::VlmNoMatch(prompt.to_string())),
        }
    }

    /// Start the local service if configured, at most once per process
    /// lifetime regardless of how many clients exist.
    async fn maybe_autostart(&self) {
        let Some(command) = &self.config.autostart_command else {
            return;
        };
        if command.is_empty() || AUTOSTART_ATTEMPTED.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Auto-starting local inference service: {:?}", command);
        match Command::new(&command[0]).args(&command[1..]).spawn() {
            Ok(_child) => {
                // Give the service a beat to bind its port.
                sleep(Duration::from_millis(500)).await;
            }
            Err(e) => warn!("Failed to auto-start inference service: {}", e),
        }
    }
}
