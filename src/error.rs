//! Error taxonomy for the job protocol.
//!
//! Library code returns typed errors from this module; the binary wraps
//! them in [`anyhow::Result`] at the outermost boundary.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failures while decoding a job document.
///
/// Payloads that are not a recognized structured document never produce an
/// error — they fall back to bare-URL interpretation. These variants cover
/// documents that *are* recognized but cannot be accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// `onWarning.action` named something other than `ignore` or `abort`.
    #[error("unrecognized onWarning action {0:?}")]
    InvalidPolicy(String),

    /// A structured document carried a `url` that does not parse as a URI.
    #[error("invalid job url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A recognized envelope that cannot be deserialized into a job spec.
    #[error("malformed job document: {0}")]
    Malformed(String),
}

/// Connection-level failures on a [`Channel`](crate::channel::Channel).
#[derive(Debug, Error)]
pub enum TransportError {
    /// A send or receive exceeded its per-call deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The strict request/reply discipline was broken by the caller.
    #[error("request/reply discipline violated: {0}")]
    ProtocolViolation(&'static str),

    /// Underlying socket failure.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the connection between exchanges.
    #[error("connection closed by peer")]
    Closed,

    /// The peer sent bytes that do not decode as a framed message.
    #[error("malformed frame: {0}")]
    Frame(String),

    /// The endpoint string is not of the form `tcp://host:port`.
    #[error("invalid endpoint {0:?}, expected tcp://host:port")]
    Endpoint(String),
}

impl TransportError {
    pub(crate) fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// True for deadline expiries, false for every other failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Which half of an exchange a submission was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Send,
    Receive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Send => write!(f, "sending the request"),
            Stage::Receive => write!(f, "awaiting the reply"),
        }
    }
}

/// A failed submission, wrapping the transport failure that caused it.
///
/// The session never retries on its own; every failure surfaces here and
/// the caller decides whether to repeat the submission.
#[derive(Debug, Error)]
#[error("job submission failed while {stage}: {source}")]
pub struct SessionError {
    pub stage: Stage,
    #[source]
    pub source: TransportError,
}

impl SessionError {
    pub(crate) fn new(stage: Stage, source: TransportError) -> Self {
        Self { stage, source }
    }

    /// True when the wrapped failure is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        self.source.is_timeout()
    }
}

/// A failure reported by the worker through the reply payload.
///
/// These are interpretations of wire statuses, not transport failures:
/// the exchange itself succeeded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The warning policy triggered an abort mid-render.
    #[error("render aborted by warning policy: {0}")]
    RenderAborted(String),

    /// The worker rejected the request before rendering.
    #[error("worker rejected request: {0}")]
    Rejected(String),

    /// The rendering engine failed.
    #[error("rendering engine failure: {0}")]
    Engine(String),

    /// The worker is shutting down or cannot take jobs.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// A status token outside the recognized set.
    #[error("unrecognized reply status {status:?}: {diagnostic}")]
    Unexpected { status: String, diagnostic: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_timeout() {
        let err = TransportError::timeout("receive", Duration::from_millis(10));
        assert!(err.is_timeout());
        assert!(!TransportError::Closed.is_timeout());
    }

    #[test]
    fn session_error_names_the_stage() {
        let err = SessionError::new(
            Stage::Receive,
            TransportError::timeout("receive", Duration::from_millis(10)),
        );
        let msg = err.to_string();
        assert!(msg.contains("awaiting the reply"), "got: {msg}");
        assert!(err.is_timeout());
    }

    #[test]
    fn invalid_policy_displays_the_action() {
        let err = JobError::InvalidPolicy("frobnicate".to_string());
        assert!(err.to_string().contains("frobnicate"));
    }
}
