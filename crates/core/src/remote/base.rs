//! Collaborator traits and request/response types.

use crate::remote::error::StepError;
use async_trait::async_trait;
use mp_protocol::{ArtifactSet, ProgressSnapshot};
use serde_json::{Map, Value};

/// Input of one remote step invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRequest {
    pub project_id: String,

    /// Restart from scratch and discard resumable state.
    pub force: bool,

    /// Step-specific arguments merged into the request body.
    pub args: Map<String, Value>,
}

impl StepRequest {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            force: false,
            args: Map::new(),
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    /// JSON body sent to the remote step.
    ///
    /// `projectId` and `force` always win over same-named args.
    pub fn to_body(&self) -> Value {
        let mut body = self.args.clone();
        body.insert("projectId".to_string(), Value::from(self.project_id.clone()));
        body.insert("force".to_string(), Value::from(self.force));
        Value::Object(body)
    }
}

/// Successful answer of a remote step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResponse {
    /// The remote hit its time budget and expects to be called again.
    pub incomplete: bool,

    pub payload: Value,
}

impl StepResponse {
    pub fn complete(payload: Value) -> Self {
        Self {
            incomplete: false,
            payload,
        }
    }

    pub fn incomplete(payload: Value) -> Self {
        Self {
            incomplete: true,
            payload,
        }
    }

    /// Build a response from a decoded body, reading its `incomplete` flag.
    pub fn from_payload(payload: Value) -> Self {
        let incomplete = payload
            .get("incomplete")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            incomplete,
            payload,
        }
    }

    /// Short human summary of the result.
    pub fn summary(&self) -> String {
        ["message", "summary", "status"]
            .iter()
            .find_map(|field| self.payload.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| "completed".to_string())
    }
}

/// The remote procedure behind one step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn invoke(&self, request: &StepRequest) -> Result<StepResponse, StepError>;
}

/// A progress-query endpoint for a pollable step.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn fetch(&self, project_id: &str) -> Result<ProgressSnapshot, StepError>;
}

/// The store holding artifacts produced for each project.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn list_artifacts(&self, project_id: &str) -> Result<ArtifactSet, StepError>;
}
