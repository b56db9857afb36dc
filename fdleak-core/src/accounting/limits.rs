// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Open-files limit (RLIMIT_NOFILE).
//!
//! Reads the limit for the report and lowers it on request, so that a local
//! run can reproduce the ulimit a hosting platform enforces.

use nix::sys::resource::{getrlimit, setrlimit, Resource};
use serde::Serialize;

use crate::error::{FdLeakError, FdLeakResult, HardValidationError};

/// Lowest soft limit we agree to apply. Below this the runtime itself
/// cannot start.
pub const MIN_OPEN_FILES_LIMIT: u64 = 16;

/// Soft and hard RLIMIT_NOFILE. `u64::MAX` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenFilesLimit {
    pub soft: u64,
    pub hard: u64,
}

impl OpenFilesLimit {
    /// Read the limit of the calling process.
    pub fn current() -> FdLeakResult<Self> {
        let (soft, hard) =
            getrlimit(Resource::RLIMIT_NOFILE).map_err(|e| FdLeakError::Syscall {
                syscall: "getrlimit",
                message: e.to_string(),
            })?;

        Ok(Self { soft, hard })
    }

    /// Set the soft limit, keeping the hard limit. Returns the limit that
    /// was in force before.
    pub fn apply(soft: u64) -> FdLeakResult<Self> {
        let previous = Self::current()?;

        if soft < MIN_OPEN_FILES_LIMIT || soft > previous.hard {
            return Err(HardValidationError::OpenFilesLimitOutOfBounds {
                requested: soft,
                min: MIN_OPEN_FILES_LIMIT,
                hard: previous.hard,
            }
            .into());
        }

        setrlimit(Resource::RLIMIT_NOFILE, soft, previous.hard).map_err(|e| {
            FdLeakError::Syscall {
                syscall: "setrlimit",
                message: e.to_string(),
            }
        })?;

        tracing::info!(
            previous = previous.soft,
            soft,
            hard = previous.hard,
            "Applied open files limit"
        );

        Ok(previous)
    }

    /// Put this limit back in force.
    pub fn restore(&self) -> FdLeakResult<()> {
        setrlimit(Resource::RLIMIT_NOFILE, self.soft, self.hard).map_err(|e| {
            FdLeakError::Syscall {
                syscall: "setrlimit",
                message: e.to_string(),
            }
        })
    }
}
