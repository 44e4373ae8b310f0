// Error types and error handling module
// This file defines custom error types and error conversion logic
// for the route resolver, the execution engine and their transports
//
// Numan Thabit 2025 Nov

use serde::Serialize;
use thiserror::Error;

/// Transport-level failures shared by every reqwest client in the crate.
#[derive(Debug, Clone, Error)]
pub enum AggrError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("request timed out")]
    Timeout,
}

impl AggrError {
    pub fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AggrError::Timeout
        } else if err.is_decode() {
            AggrError::Decode(format!("{context}: {err}"))
        } else {
            AggrError::Transport(format!("{context}: {err}"))
        }
    }
}

/// What the user can do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The request itself is wrong; retrying unchanged will not help.
    FixInput,
    /// Transient; a manual retry may succeed.
    RetryLater,
    /// Opaque failure that needs a human to look at the detail.
    ContactSupport,
    /// The user backed out. Not an error toast.
    Cancelled,
}

/// Failures of route resolution. Always returned, never panicked past the resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no route available")]
    NoRouteAvailable,
    #[error("routing service timed out")]
    UpstreamTimeout,
    #[error("routing service rate limited the request")]
    RateLimited,
    #[error("routing service error (status {status:?}): {detail}")]
    UpstreamError { status: Option<u16>, detail: String },
    #[error("all upstream sources exhausted")]
    UpstreamUnavailable,
}

impl ResolutionError {
    pub fn upstream(status: Option<u16>, detail: impl Into<String>) -> Self {
        ResolutionError::UpstreamError {
            status,
            detail: detail.into(),
        }
    }

    /// HTTP status used by the route-fetch endpoint.
    pub fn status_code(&self) -> u16 {
        match self {
            ResolutionError::InvalidInput(_) => 400,
            ResolutionError::NoRouteAvailable => 404,
            ResolutionError::UpstreamTimeout => 408,
            ResolutionError::RateLimited => 429,
            ResolutionError::UpstreamError { .. } => 500,
            ResolutionError::UpstreamUnavailable => 503,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ResolutionError::InvalidInput(_) | ResolutionError::NoRouteAvailable => {
                ErrorClass::FixInput
            }
            ResolutionError::UpstreamTimeout
            | ResolutionError::RateLimited
            | ResolutionError::UpstreamUnavailable => ErrorClass::RetryLater,
            ResolutionError::UpstreamError { .. } => ErrorClass::ContactSupport,
        }
    }

    /// Whether the failure should count against the upstream circuit breaker.
    pub fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            ResolutionError::UpstreamTimeout | ResolutionError::UpstreamError { .. }
        )
    }
}

/// Failures of swap execution. Surfaced inside `SwapExecutionResult`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("invalid quote: {0}")]
    InvalidQuote(String),
    #[error("transaction {step} failed: {reason}")]
    StepFailed { step: usize, reason: String },
    #[error("transaction {step} ({tx_hash}) was not confirmed in time")]
    ConfirmationTimeout { step: usize, tx_hash: String },
    #[error("intent rejected by solver relay: {0}")]
    IntentRejected(String),
    #[error("cancelled by user")]
    UserCancelled,
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ExecutionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ExecutionError::InvalidQuote(_) => ErrorClass::FixInput,
            ExecutionError::ConfirmationTimeout { .. } | ExecutionError::Transport(_) => {
                ErrorClass::RetryLater
            }
            ExecutionError::StepFailed { .. }
            | ExecutionError::IntentRejected(_)
            | ExecutionError::Signing(_) => ErrorClass::ContactSupport,
            ExecutionError::UserCancelled => ErrorClass::Cancelled,
        }
    }
}

impl From<AggrError> for ExecutionError {
    fn from(err: AggrError) -> Self {
        ExecutionError::Transport(err.to_string())
    }
}
