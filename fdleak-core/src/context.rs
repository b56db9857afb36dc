// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process-lifetime invocation counters.
//!
//! One [`InvocationContext`] lives as long as the process instance that the
//! hosting platform keeps reusing. Its identifier is fixed at creation and its
//! counter only ever grows, so a leak shows up as descriptor counts climbing
//! alongside the invocation number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::InvocationId;

/// Identifier and invocation counter shared by every invocation served by
/// one handler instance.
#[derive(Debug)]
pub struct InvocationContext {
    id: InvocationId,
    count: AtomicU64,
}

impl InvocationContext {
    /// Create a context with a fresh identifier and a zero count.
    pub fn new() -> Self {
        Self {
            id: InvocationId::generate(),
            count: AtomicU64::new(0),
        }
    }

    /// Create a context wrapped in an Arc for sharing with a handler.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn id(&self) -> InvocationId {
        self.id
    }

    /// Number of invocations started so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Record the start of an invocation, returning its number (1-based).
    pub fn begin(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}
