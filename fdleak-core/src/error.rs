// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for fdleak.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.
//! Every failure below the invocation handler keeps its kind and is wrapped
//! into an [`InvocationError`] at the handler boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::FunctionId;

/// Top-level error type for fdleak.
#[derive(Debug, Error)]
pub enum FdLeakError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Handler Lifecycle Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    #[error("Function not found: {0}")]
    FunctionNotFound(FunctionId),

    #[error("Function already exists: {0}")]
    FunctionAlreadyExists(FunctionId),

    // =========================================================================
    // Accounting Errors
    // =========================================================================
    /// The OS introspection facility could not be queried. Always surfaced:
    /// a report that cannot be produced cannot be trusted.
    #[error("Resource statistics unavailable from {facility}: {reason}")]
    StatsUnavailable {
        facility: &'static str,
        reason: String,
    },

    /// The platform refused a new descriptor (EMFILE / ENFILE).
    #[error("Resource exhausted while {context}: {source}")]
    ResourceExhausted {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A single descriptor could not be resolved. Recovered locally by the
    /// descriptor enumerator, never returned to callers.
    #[error("Unreadable descriptor: {reason}")]
    UnreadableDescriptor { reason: String },

    // =========================================================================
    // Outbound Request Errors - Never Retried
    // =========================================================================
    #[error("Transport failure: {0}")]
    Transport(#[source] TransportError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("System call failed: {syscall} - {message}")]
    Syscall {
        syscall: &'static str,
        message: String,
    },
}

impl FdLeakError {
    /// Whether this error is the platform refusing another descriptor.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// Whether this error means resource usage could not be observed.
    pub fn is_stats_unavailable(&self) -> bool {
        matches!(self, Self::StatsUnavailable { .. })
    }
}

/// Hard validation errors cause immediate process termination.
/// Used when configuration is invalid and the system cannot safely start.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid target URL: {url} - {reason}")]
    InvalidTargetUrl { url: String, reason: String },

    #[error("Open files limit out of bounds: {requested} (min: {min}, hard limit: {hard})")]
    OpenFilesLimitOutOfBounds { requested: u64, min: u64, hard: u64 },

    #[error("Duplicate function ID: {id}")]
    DuplicateFunctionId { id: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },
}

/// State transition errors for the invocation state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition from {from} to {to} for function {function_id}")]
    InvalidTransition {
        function_id: FunctionId,
        from: &'static str,
        to: &'static str,
    },
}

/// Outbound request failures reported by an HTTP client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Reading response body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Connection to {url} failed: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Walk the source chain looking for EMFILE / ENFILE.
    pub fn is_resource_exhaustion(&self) -> bool {
        self.exhaustion_code().is_some()
    }

    fn exhaustion_code(&self) -> Option<i32> {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                if is_exhaustion_io(io) {
                    return io.raw_os_error();
                }
            }
            current = err.source();
        }
        None
    }
}

/// Map a transport failure to the taxonomy: exhaustion keeps its own kind,
/// everything else stays a transport failure.
impl From<TransportError> for FdLeakError {
    fn from(err: TransportError) -> Self {
        match err.exhaustion_code() {
            Some(code) => FdLeakError::ResourceExhausted {
                context: err.to_string(),
                source: std::io::Error::from_raw_os_error(code),
            },
            None => FdLeakError::Transport(err),
        }
    }
}

/// Whether an OS error is the per-process or system-wide descriptor limit.
pub fn is_exhaustion_io(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EMFILE || code == libc::ENFILE)
}

/// Failure of one invocation, as surfaced to the hosting platform.
///
/// `message` carries the function name, invocation identifier, count and
/// cause; the underlying error stays reachable through `source()`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvocationError {
    message: String,
    #[source]
    cause: FdLeakError,
}

impl InvocationError {
    pub fn new(message: String, cause: FdLeakError) -> Self {
        Self { message, cause }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> &FdLeakError {
        &self.cause
    }
}

/// Result type alias using FdLeakError.
pub type FdLeakResult<T> = Result<T, FdLeakError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_validation_error_display() {
        let err = HardValidationError::MissingRequiredField {
            field: "targets",
            context: "function 'broken-handler'".to_string(),
        };
        assert!(err.to_string().contains("targets"));
        assert!(err.to_string().contains("broken-handler"));
    }

    #[test]
    fn test_error_chain() {
        let validation_err = HardValidationError::InvalidTargetUrl {
            url: "ftp://example.com".to_string(),
            reason: "unsupported scheme".to_string(),
        };
        let err: FdLeakError = validation_err.into();
        assert!(matches!(err, FdLeakError::HardValidation(_)));
    }

    #[test]
    fn test_emfile_transport_error_becomes_exhaustion() {
        let err = TransportError::Io {
            url: "https://www.google.com/".to_string(),
            source: std::io::Error::from_raw_os_error(libc::EMFILE),
        };
        assert!(err.is_resource_exhaustion());

        let err: FdLeakError = err.into();
        assert!(err.is_resource_exhausted());
        assert!(err.to_string().contains("www.google.com"));
    }

    #[test]
    fn test_other_transport_error_stays_transport() {
        let err = TransportError::Io {
            url: "https://www.google.com/".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(!err.is_resource_exhaustion());

        let err: FdLeakError = err.into();
        assert!(matches!(err, FdLeakError::Transport(_)));
    }

    #[test]
    fn test_enfile_is_exhaustion() {
        assert!(is_exhaustion_io(&std::io::Error::from_raw_os_error(
            libc::ENFILE
        )));
        assert!(!is_exhaustion_io(&std::io::Error::from_raw_os_error(
            libc::EACCES
        )));
    }

    #[test]
    fn test_invocation_error_keeps_cause() {
        let err = InvocationError::new(
            "Failed to execute f: [id] invocation: [1] cause: [x]".to_string(),
            FdLeakError::StatsUnavailable {
                facility: "procfs",
                reason: "denied".to_string(),
            },
        );
        assert!(err.cause().is_stats_unavailable());
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), err.message());
    }
}
