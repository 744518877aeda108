//! Error types for reconciliation.
//!
//! Errors are categorized so callers can tell drift (recovered locally)
//! from configuration mistakes, remote failures that may succeed on a
//! later attempt, and asynchronous actions that are still in flight.

use crate::gateway::GatewayError;
use std::fmt;
use std::time::Duration;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Remote object is absent.
    NotFound,
    /// A conflicting remote object already exists.
    Conflict,
    /// Identity string or segment is invalid (always local).
    Identity,
    /// Network or remote-side error that may succeed later.
    Transient,
    /// Remote rejected the request for good.
    Fatal,
    /// An asynchronous remote action failed.
    Action,
    /// Waiting for an asynchronous action exceeded its deadline.
    Timeout,
    /// Local misuse: illegal transition, immutable field, bad payload.
    Usage,
}

impl ErrorCategory {
    /// Whether this error category is transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Remote object not found",
            Self::Conflict => "Remote object already exists",
            Self::Identity => "Invalid resource identity",
            Self::Transient => "Temporary remote failure",
            Self::Fatal => "Remote request rejected",
            Self::Action => "Remote action failed",
            Self::Timeout => "Remote action still running",
            Self::Usage => "Invalid operation",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the identifier, or remove the resource from state",
            Self::Conflict => "Import the existing object instead of creating a new one",
            Self::Identity => "Check the identifier format for this resource kind",
            Self::Transient => "Check connectivity and rate limits, then try again",
            Self::Fatal => "Check the configuration values and API permissions",
            Self::Action => "Inspect the remote task for details",
            Self::Timeout => "The action may still complete; refresh later to see the outcome",
            Self::Usage => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a resource instance.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote object does not exist.
    #[error("{kind} '{identity}' not found")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Identity that was looked up.
        identity: String,
    },

    /// A pre-create check found an object occupying the same identity.
    #[error("{kind} already exists remotely as '{existing}'")]
    AlreadyExists {
        /// Resource kind.
        kind: String,
        /// Identifier of the existing remote object.
        existing: String,
    },

    /// Composite identity has the wrong number of segments.
    #[error("malformed identity '{identity}': expected {expected} segments, found {found}")]
    MalformedIdentity {
        /// The offending identity string.
        identity: String,
        /// Arity declared by the resource kind.
        expected: usize,
        /// Segments present after splitting.
        found: usize,
    },

    /// A composite key segment is empty or contains the delimiter.
    #[error("invalid identity segment {index} ('{segment}'): {reason}")]
    InvalidSegment {
        /// Zero-based segment position.
        index: usize,
        /// Segment value.
        segment: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Network or remote-side failure other than not found.
    #[error("transient remote error{}: {message}", status_suffix(.status))]
    Transient {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Remote rejected the request permanently.
    #[error("remote error{}: {message}", status_suffix(.status))]
    Fatal {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// A polled action reached a terminal failure status.
    #[error("action {task_id} failed: {message}")]
    ActionFailed {
        /// Remote task identifier.
        task_id: String,
        /// Last status message reported by the remote side.
        message: String,
    },

    /// The poll deadline elapsed before the action finished.
    #[error("action {task_id} did not finish within {}s (it may still complete)", .waited.as_secs())]
    TimedOut {
        /// Remote task identifier.
        task_id: String,
        /// How long the poller waited.
        waited: Duration,
    },

    /// Lifecycle transition not allowed by the state machine.
    #[error("cannot move {kind} from {from} to {to}")]
    InvalidTransition {
        /// Resource kind.
        kind: String,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// Update tried to change a field that can only be set on create.
    #[error("{kind} field '{field}' cannot be changed in place")]
    ImmutableField {
        /// Resource kind.
        kind: String,
        /// Create-only field name.
        field: String,
    },

    /// The trailing read after create did not find the new object.
    #[error("{kind} '{identity}' was created but could not be read back")]
    MissingAfterCreate {
        /// Resource kind.
        kind: String,
        /// Identity of the created object.
        identity: String,
    },

    /// The remote object was created but a later step failed.
    ///
    /// The identity is reported so the caller can keep tracking the
    /// object; the source says what went wrong.
    #[error("{kind} '{identity}' was created but did not finish: {source}")]
    Incomplete {
        /// Resource kind.
        kind: String,
        /// Identity of the created object.
        identity: String,
        /// Failure after creation.
        #[source]
        source: Box<Error>,
    },

    /// Operation not offered by this resource kind.
    #[error("{kind} does not support {operation}")]
    Unsupported {
        /// Resource kind.
        kind: String,
        /// Operation name.
        operation: &'static str,
    },

    /// Unknown resource kind name.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// Payload could not be encoded or decoded.
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    /// Classify a gateway failure, attaching the kind and identity for not-found.
    pub fn from_gateway(err: GatewayError, kind: &str, identity: &str) -> Self {
        match err {
            GatewayError::NotFound => Self::NotFound {
                kind: kind.to_string(),
                identity: identity.to_string(),
            },
            GatewayError::Transient { message, status } => Self::Transient { message, status },
            GatewayError::Fatal { message, status } => Self::Fatal { message, status },
        }
    }

    /// Create a decode error for a response that lacks an expected field.
    pub fn missing_field(kind: &str, field: &str) -> Self {
        Self::Fatal {
            message: format!("{kind} response has no '{field}'"),
            status: None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::AlreadyExists { .. } => ErrorCategory::Conflict,
            Error::MalformedIdentity { .. } | Error::InvalidSegment { .. } => {
                ErrorCategory::Identity
            }
            Error::Transient { .. } => ErrorCategory::Transient,
            Error::Fatal { .. } | Error::MissingAfterCreate { .. } => ErrorCategory::Fatal,
            Error::ActionFailed { .. } => ErrorCategory::Action,
            Error::Incomplete { source, .. } => source.category(),
            Error::TimedOut { .. } => ErrorCategory::Timeout,
            Error::InvalidTransition { .. }
            | Error::ImmutableField { .. }
            | Error::Unsupported { .. }
            | Error::UnknownKind(_)
            | Error::Payload(_) => ErrorCategory::Usage,
        }
    }

    /// Whether this error is transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Identity of an object that exists remotely despite the error.
    pub fn created_identity(&self) -> Option<&str> {
        match self {
            Error::Incomplete { identity, .. } => Some(identity),
            _ => None,
        }
    }

    /// Whether this error means the remote object is gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Fatal.is_retryable());
        assert!(!ErrorCategory::Timeout.is_retryable());
        assert!(!ErrorCategory::Action.is_retryable());
    }

    #[test]
    fn test_error_category_advice() {
        assert!(!ErrorCategory::Conflict.advice().is_empty());
        assert!(!ErrorCategory::Timeout.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Identity).contains("identity"));
    }

    #[test]
    fn test_from_gateway_not_found() {
        let err = Error::from_gateway(GatewayError::NotFound, "group", "00g1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "group '00g1' not found");
    }

    #[test]
    fn test_from_gateway_transient() {
        let err = Error::from_gateway(
            GatewayError::Transient {
                message: "rate limited".to_string(),
                status: Some(429),
            },
            "group",
            "00g1",
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("HTTP 429"));
    }

    #[test]
    fn test_timed_out_is_distinct_from_failed() {
        let timed_out = Error::TimedOut {
            task_id: "t1".to_string(),
            waited: Duration::from_secs(3),
        };
        let failed = Error::ActionFailed {
            task_id: "t1".to_string(),
            message: "device offline".to_string(),
        };
        assert_eq!(timed_out.category(), ErrorCategory::Timeout);
        assert_eq!(failed.category(), ErrorCategory::Action);
        assert!(timed_out.to_string().contains("may still complete"));
    }

    #[test]
    fn test_incomplete_delegates_category() {
        let err = Error::Incomplete {
            kind: "device_action".to_string(),
            identity: "dev1:lock".to_string(),
            source: Box::new(Error::TimedOut {
                task_id: "t1".to_string(),
                waited: Duration::from_secs(300),
            }),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(err.created_identity(), Some("dev1:lock"));
    }

    #[test]
    fn test_identity_errors_category() {
        let err = Error::MalformedIdentity {
            identity: "a:b:c".to_string(),
            expected: 2,
            found: 3,
        };
        assert_eq!(err.category(), ErrorCategory::Identity);
    }
}
