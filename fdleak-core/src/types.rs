// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HardValidationError;

/// Validated function identifier.
/// Must be non-empty, alphanumeric with hyphens/underscores, max 64 chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionId(String);

impl FunctionId {
    /// Create a new FunctionId with validation.
    pub fn new(id: impl Into<String>) -> Result<Self, HardValidationError> {
        let id = id.into();

        if id.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "function_id",
                value: id,
                reason: "Function ID cannot be empty".to_string(),
            });
        }

        if id.len() > 64 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "function_id",
                value: id.clone(),
                reason: format!("Function ID too long: {} chars (max 64)", id.len()),
            });
        }

        // Validate characters: alphanumeric, hyphens, underscores
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "function_id",
                value: id,
                reason: "Function ID must contain only alphanumeric characters, hyphens, and underscores".to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FunctionId {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FunctionId> for String {
    fn from(id: FunctionId) -> Self {
        id.0
    }
}

/// Validated outbound request target.
/// Must be an absolute `http` or `https` URL with a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetUrl(Url);

impl TargetUrl {
    /// Parse and validate a target URL.
    pub fn new(url: impl AsRef<str>) -> Result<Self, HardValidationError> {
        let raw = url.as_ref();
        let parsed = Url::parse(raw).map_err(|e| HardValidationError::InvalidTargetUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HardValidationError::InvalidTargetUrl {
                url: raw.to_string(),
                reason: format!("Unsupported scheme '{}' (expected http or https)", parsed.scheme()),
            });
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(HardValidationError::InvalidTargetUrl {
                url: raw.to_string(),
                reason: "URL has no host".to_string(),
            });
        }

        Ok(Self(parsed))
    }

    /// The URL as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Host component, always present after validation.
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Get the parsed URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TargetUrl {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetUrl> for String {
    fn from(url: TargetUrl) -> Self {
        url.0.into()
    }
}

/// Stable identifier of one handler instance, assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated process ID.
/// Must be positive (non-zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create a new ProcessId with validation.
    pub fn new(pid: i32) -> Result<Self, HardValidationError> {
        if pid <= 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "process_id",
                value: pid.to_string(),
                reason: "Process ID must be positive".to_string(),
            });
        }
        Ok(Self(pid))
    }

    /// The calling process.
    pub fn current() -> Self {
        Self(nix::unistd::getpid().as_raw())
    }

    /// Get the inner PID value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ProcessId> for i32 {
    fn from(pid: ProcessId) -> Self {
        pid.0
    }
}
