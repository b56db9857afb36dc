// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Validates function configurations at boot-up time.
//! Any invalid field results in a HardValidationError that prevents startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::accounting::limits::MIN_OPEN_FILES_LIMIT;
use crate::error::{FdLeakError, FdLeakResult, HardValidationError};
use crate::policy::PolicyKind;
use crate::types::{FunctionId, TargetUrl};

/// Longest request timeout accepted: 15 minutes, the longest a single
/// invocation may run on the hosting platform.
const MAX_REQUEST_TIMEOUT_MS: u64 = 900_000;

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawFunctionConfig {
    id: String,
    policy: PolicyKind,
    #[serde(default)]
    targets: Vec<String>,
}

/// Raw runtime configuration.
#[derive(Debug, Deserialize)]
struct RawRuntimeConfig {
    #[serde(default)]
    open_files_limit: Option<u64>,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30000 // 30 seconds
}

impl Default for RawRuntimeConfig {
    fn default() -> Self {
        Self {
            open_files_limit: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    runtime: RawRuntimeConfig,
    functions: Vec<RawFunctionConfig>,
}

/// Validated function configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub id: FunctionId,
    pub policy: PolicyKind,
    pub targets: Vec<TargetUrl>,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Soft RLIMIT_NOFILE to apply before the first invocation.
    pub open_files_limit: Option<u64>,
    pub request_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            open_files_limit: None,
            request_timeout: Duration::from_millis(default_request_timeout_ms()),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub functions: Vec<FunctionConfig>,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    /// Returns HardValidationError for any invalid fields.
    pub fn load_file(path: impl AsRef<Path>) -> FdLeakResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(FdLeakError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FdLeakError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> FdLeakResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| FdLeakError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> FdLeakResult<Config> {
        let runtime = Self::validate_runtime(raw.runtime)?;

        let mut functions = Vec::with_capacity(raw.functions.len());
        let mut seen_ids = std::collections::HashSet::new();

        for (index, raw_func) in raw.functions.into_iter().enumerate() {
            let func = Self::validate_function(raw_func, index)?;

            // Check for duplicate IDs
            if !seen_ids.insert(func.id.as_str().to_string()) {
                return Err(HardValidationError::DuplicateFunctionId {
                    id: func.id.to_string(),
                }
                .into());
            }

            functions.push(func);
        }

        if functions.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one function must be defined".to_string(),
            }
            .into());
        }

        Ok(Config { runtime, functions })
    }

    /// Validate runtime configuration.
    fn validate_runtime(raw: RawRuntimeConfig) -> FdLeakResult<RuntimeConfig> {
        if let Some(limit) = raw.open_files_limit {
            if limit < MIN_OPEN_FILES_LIMIT {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "open_files_limit",
                    value: limit.to_string(),
                    reason: format!("Must be at least {}", MIN_OPEN_FILES_LIMIT),
                }
                .into());
            }
        }

        if raw.request_timeout_ms == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "request_timeout_ms",
                value: "0".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            }
            .into());
        }

        if raw.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "request_timeout_ms",
                value: raw.request_timeout_ms.to_string(),
                reason: format!(
                    "Timeout must not exceed 15 minutes ({}ms)",
                    MAX_REQUEST_TIMEOUT_MS
                ),
            }
            .into());
        }

        Ok(RuntimeConfig {
            open_files_limit: raw.open_files_limit,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
        })
    }

    /// Validate a single function configuration.
    fn validate_function(raw: RawFunctionConfig, index: usize) -> FdLeakResult<FunctionConfig> {
        let context = format!("function at index {}", index);

        // Validate function ID
        let id = FunctionId::new(&raw.id).map_err(|mut e| {
            if let HardValidationError::InvalidFieldValue { ref mut field, .. } = e {
                *field = "id";
            }
            e
        })?;

        if raw.targets.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "targets",
                context,
            }
            .into());
        }

        let targets = raw
            .targets
            .iter()
            .map(TargetUrl::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FunctionConfig {
            id,
            policy: raw.policy,
            targets,
        })
    }
}
