// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Descriptor enumeration.
//!
//! Counts open descriptors per resolved target path. Several descriptors can
//! resolve to the same path; they are counted, never collapsed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::accounting::introspect::Introspector;
use crate::error::FdLeakResult;

/// One open descriptor, identified only by what it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorRecord {
    canonical_path: String,
}

impl DescriptorRecord {
    pub fn new(canonical_path: impl Into<String>) -> Self {
        Self {
            canonical_path: canonical_path.into(),
        }
    }

    pub fn canonical_path(&self) -> &str {
        &self.canonical_path
    }
}

/// Descriptor counts keyed by canonical path, in lexicographic path order.
///
/// Every present count is at least 1 and the counts sum to the number of
/// descriptors observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DescriptorSnapshot {
    counts: BTreeMap<String, u64>,
}

impl DescriptorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more descriptor resolving to `record`'s path.
    pub fn add(&mut self, record: DescriptorRecord) {
        *self.counts.entry(record.canonical_path).or_insert(0) += 1;
    }

    /// Descriptors open on `path`, zero when absent.
    pub fn count(&self, path: &str) -> u64 {
        self.counts.get(path).copied().unwrap_or(0)
    }

    /// Total number of descriptors observed.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct paths.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Paths and counts in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(path, count)| (path.as_str(), *count))
    }
}

impl FromIterator<DescriptorRecord> for DescriptorSnapshot {
    fn from_iter<I: IntoIterator<Item = DescriptorRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            snapshot.add(record);
        }
        snapshot
    }
}

/// Enumerates the descriptors of the introspected process.
///
/// An entry that vanishes or cannot be resolved between listing and
/// resolution is skipped: short-lived handles disappearing mid-listing is
/// expected and says nothing about a leak.
#[derive(Clone)]
pub struct DescriptorEnumerator {
    introspector: Arc<dyn Introspector>,
}

impl DescriptorEnumerator {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self { introspector }
    }

    /// Take a fresh descriptor snapshot.
    pub fn enumerate(&self) -> FdLeakResult<DescriptorSnapshot> {
        Ok(self.aggregate(self.introspector.descriptors()?))
    }

    /// Count already-listed entries, skipping the ones that failed to resolve.
    pub fn aggregate(&self, entries: Vec<FdLeakResult<DescriptorRecord>>) -> DescriptorSnapshot {
        let mut snapshot = DescriptorSnapshot::new();
        let mut skipped = 0usize;

        for entry in entries {
            match entry {
                Ok(record) => snapshot.add(record),
                Err(e) => {
                    skipped += 1;
                    tracing::trace!(error = %e, "Skipping descriptor");
                }
            }
        }

        tracing::debug!(
            pid = %self.introspector.pid(),
            total = snapshot.total(),
            distinct = snapshot.distinct(),
            skipped,
            "Enumerated descriptors"
        );

        snapshot
    }
}

impl std::fmt::Debug for DescriptorEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorEnumerator")
            .field("pid", &self.introspector.pid())
            .finish()
    }
}
