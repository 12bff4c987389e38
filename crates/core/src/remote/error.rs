//! Error taxonomy for step execution.

use mp_protocol::StepKey;
use thiserror::Error;

/// Errors that can end a step execution.
///
/// Transient progress-query failures also use this type, but the poller
/// swallows them instead of surfacing them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// No project is selected; nothing was sent to the network.
    #[error("No project id selected")]
    MissingProjectId,

    /// Network failure or a non-2xx response.
    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The remote step answered with a well-formed error payload.
    #[error("{0}")]
    Remote(String),

    /// Another runner already owns this step.
    #[error("Step {0} is already running")]
    AlreadyRunning(StepKey),

    /// The remote step kept reporting "incomplete".
    #[error("Step {step} reported incomplete {limit} times; giving up")]
    ContinuationLimit { step: StepKey, limit: u32 },
}

impl StepError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = match status {
            Some(code) => format!("HTTP {code}: {message}"),
            None => message,
        };
        StepError::Transport { status, message }
    }
}

impl From<reqwest::Error> for StepError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return StepError::Decode(err.to_string());
        }
        StepError::transport(err.status().map(|s| s.as_u16()), err.to_string())
    }
}
