//! Error and retry-policy types for the eventing bridge.
//!
//! [`EventingError`] covers everything the adapter itself can fail with:
//! configuration problems (fatal at startup or endpoint resolution), lookup
//! misses, malformed inbound events, and failures of the delegated transport.
//!
//! [`RetryPolicy`] is advisory. The adapter never retries on its own; the
//! enclosing pipeline reads the policy and decides.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ServiceType;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: refused connections, timeouts, 5xx responses from the
///   remote service.
/// - `NonRetryable` errors: configuration problems, unknown services, malformed
///   events, 4xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by the delegated physical transport.
///
/// These are propagated through the adapter unchanged.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// The remote endpoint refused or dropped the connection.
    #[error("Connection to {uri} failed: {message}")]
    Connect {
        /// Physical URI that was being contacted.
        uri: String,
        /// Underlying transport message.
        message: String,
    },

    /// The request did not complete within the transport's timeout.
    #[error("Request to {uri} timed out")]
    Timeout {
        /// Physical URI that was being contacted.
        uri: String,
    },

    /// The remote endpoint answered with a non-success status.
    #[error("Request to {uri} failed with HTTP {status}: {body}")]
    Status {
        /// Physical URI that was being contacted.
        uri: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// A listener could not bind its socket.
    #[error("Failed to bind listener on {addr}: {message}")]
    Bind {
        /// Bind address requested.
        addr: String,
        /// Underlying I/O message.
        message: String,
    },

    /// A header could not be represented on the wire.
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader {
        /// Header name as it appeared on the message.
        name: String,
        /// Why it was rejected.
        message: String,
    },

    /// The endpoint was used before `start` or after `stop`.
    #[error("Endpoint {uri} is not started")]
    NotStarted {
        /// Physical URI of the endpoint.
        uri: String,
    },

    /// Any other I/O failure.
    #[error("Transport I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns the retry policy for this transport failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::Io(_) => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Status { status, .. } if *status >= 500 => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter errors
// ---------------------------------------------------------------------------

/// Errors produced by the eventing adapter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EventingError {
    /// The environment descriptor or endpoint configuration is invalid.
    ///
    /// Produced at load time or endpoint construction; never retried.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A service declares or requests a protocol the resolver cannot map to a scheme.
    #[error("Unsupported protocol: {protocol}")]
    UnsupportedProtocol {
        /// The protocol string as configured.
        protocol: String,
    },

    /// The configured CloudEvents spec version has no registered processors.
    #[error("Unsupported CloudEvents spec version: {version}")]
    UnsupportedVersion {
        /// The version string as configured.
        version: String,
    },

    /// A mandatory lookup found no matching service.
    #[error("Unable to find the service \"{name}\" with type \"{service_type}\"")]
    NotFound {
        /// Target name as requested (including any context path).
        name: String,
        /// Service type that was searched.
        service_type: ServiceType,
    },

    /// An inbound structured-mode body could not be parsed.
    ///
    /// Only the offending message fails; the listener keeps serving.
    #[error("Malformed event: {reason}")]
    MalformedEvent {
        /// Parser diagnostic.
        reason: String,
    },

    /// The delegated physical transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl EventingError {
    /// Creates a configuration error with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a malformed-event error with the given reason.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that abort route construction.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::UnsupportedProtocol { .. }
                | Self::UnsupportedVersion { .. }
        )
    }

    /// Returns the retry policy for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport(e) => e.retry_policy(),
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Result type for eventing operations.
pub type EventingResult<T> = Result<T, EventingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_service_and_type() {
        let err = EventingError::NotFound {
            name: "unknown".to_string(),
            service_type: ServiceType::Channel,
        };
        assert_eq!(
            err.to_string(),
            "Unable to find the service \"unknown\" with type \"channel\""
        );
    }

    #[test]
    fn test_retry_policy_by_category() {
        assert_eq!(
            EventingError::configuration("bad").retry_policy(),
            RetryPolicy::NonRetryable
        );
        assert_eq!(
            EventingError::malformed("bad json").retry_policy(),
            RetryPolicy::NonRetryable
        );

        let refused = EventingError::from(TransportError::Connect {
            uri: "http://localhost:1".to_string(),
            message: "refused".to_string(),
        });
        assert_eq!(refused.retry_policy(), RetryPolicy::Retryable { after: None });

        let client_error = TransportError::Status {
            uri: "http://localhost:1".to_string(),
            status: 404,
            body: String::new(),
        };
        assert_eq!(client_error.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn test_configuration_category() {
        assert!(EventingError::UnsupportedVersion {
            version: "9.9".to_string()
        }
        .is_configuration());
        assert!(EventingError::UnsupportedProtocol {
            protocol: "amqp".to_string()
        }
        .is_configuration());
        assert!(!EventingError::malformed("x").is_configuration());
    }
}
