//! HTTP adapters for remote steps, progress endpoints and the artifact store.
//!
//! Response interpretation lives in plain functions
//! ([`classify_step_response`], [`decode_progress`], [`decode_artifacts`]) so
//! it can be tested without a server.

use crate::remote::base::{ArtifactStore, ProgressSource, StepExecutor, StepRequest, StepResponse};
use crate::remote::error::StepError;
use async_trait::async_trait;
use log::debug;
use mp_protocol::{ArtifactSet, ProgressSnapshot};
use serde_json::Value;
use std::time::Duration;

/// Longest body excerpt quoted in a transport error.
const MAX_ERROR_EXCERPT: usize = 200;

/// A `reqwest` client bound to a base URL.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client without a global timeout.
    ///
    /// Remote step calls may legitimately run for minutes; only progress
    /// queries set a per-request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, StepError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }
}

/// Join a base URL and an endpoint path. Absolute endpoints are kept as is.
pub fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Extract a human-readable error from a decoded body.
fn error_detail(payload: &Value) -> Option<String> {
    match payload.get("error") {
        Some(Value::String(message)) => return Some(message.clone()),
        Some(Value::Object(inner)) => {
            if let Some(message) = inner.get("message").and_then(Value::as_str) {
                return Some(message.to_string());
            }
        }
        _ => {}
    }
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".to_string();
    }
    trimmed.chars().take(MAX_ERROR_EXCERPT).collect()
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Interpret the status and body returned by a remote step.
///
/// A 2xx body fails when it carries an `error` string, or `success: false` /
/// `ok: false` (with `message` as the reason). A bare `message` is the
/// step's summary.
pub fn classify_step_response(status: u16, body: &str) -> Result<StepResponse, StepError> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if !is_success(status) {
        let detail = parsed
            .as_ref()
            .and_then(error_detail)
            .unwrap_or_else(|| excerpt(body));
        return Err(StepError::transport(Some(status), detail));
    }

    if body.trim().is_empty() {
        return Ok(StepResponse::complete(Value::Null));
    }

    let payload = parsed.ok_or_else(|| StepError::Decode(format!("not JSON: {}", excerpt(body))))?;

    if let Some(message) = payload.get("error").and_then(Value::as_str) {
        return Err(StepError::Remote(message.to_string()));
    }

    let reported_failure = ["success", "ok"]
        .iter()
        .any(|flag| payload.get(*flag).and_then(Value::as_bool) == Some(false));
    if reported_failure {
        let message = error_detail(&payload)
            .unwrap_or_else(|| "remote step reported failure".to_string());
        return Err(StepError::Remote(message));
    }

    Ok(StepResponse::from_payload(payload))
}

/// Decode a progress endpoint response.
pub fn decode_progress(status: u16, body: &str) -> Result<ProgressSnapshot, StepError> {
    if !is_success(status) {
        return Err(StepError::transport(Some(status), excerpt(body)));
    }
    serde_json::from_str(body).map_err(|e| StepError::Decode(e.to_string()))
}

/// Decode an artifact listing.
///
/// Accepts a bare array or an object with a `files` array; entries are
/// names or objects carrying a `name` field.
pub fn decode_artifacts(status: u16, body: &str) -> Result<ArtifactSet, StepError> {
    if !is_success(status) {
        return Err(StepError::transport(Some(status), excerpt(body)));
    }

    let payload: Value = serde_json::from_str(body).map_err(|e| StepError::Decode(e.to_string()))?;
    let entries = match &payload {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("files") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(StepError::Decode("missing `files` array".to_string())),
        },
        _ => return Err(StepError::Decode("expected an array of files".to_string())),
    };

    Ok(entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect())
}

/// Remote step invoked with `POST {base}{endpoint}`.
pub struct HttpStepExecutor {
    http: HttpClient,
    endpoint: String,
}

impl HttpStepExecutor {
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl StepExecutor for HttpStepExecutor {
    async fn invoke(&self, request: &StepRequest) -> Result<StepResponse, StepError> {
        let url = self.http.url(&self.endpoint);
        debug!("POST {url} (force={})", request.force);

        let response = self
            .http
            .client
            .post(&url)
            .json(&request.to_body())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        classify_step_response(status, &body)
    }
}

/// Progress endpoint queried with `GET {base}{endpoint}?projectId=...`.
pub struct HttpProgressSource {
    http: HttpClient,
    endpoint: String,
    timeout: Duration,
}

impl HttpProgressSource {
    pub fn new(http: HttpClient, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ProgressSource for HttpProgressSource {
    async fn fetch(&self, project_id: &str) -> Result<ProgressSnapshot, StepError> {
        let url = self.http.url(&self.endpoint);

        let response = self
            .http
            .client
            .get(&url)
            .query(&[("projectId", project_id)])
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        decode_progress(status, &body)
    }
}

/// Artifact listing fetched from a per-project endpoint.
///
/// The endpoint template may contain `{project_id}`.
pub struct HttpArtifactStore {
    http: HttpClient,
    endpoint_template: String,
}

impl HttpArtifactStore {
    pub fn new(http: HttpClient, endpoint_template: impl Into<String>) -> Self {
        Self {
            http,
            endpoint_template: endpoint_template.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn list_artifacts(&self, project_id: &str) -> Result<ArtifactSet, StepError> {
        let endpoint = self.endpoint_template.replace("{project_id}", project_id);
        let url = self.http.url(&endpoint);
        debug!("GET {url}");

        let response = self
            .http
            .client
            .get(&url)
            .query(&[("projectId", project_id)])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        decode_artifacts(status, &body)
    }
}
