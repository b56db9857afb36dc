// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resource report and its text rendering.
//!
//! The rendered text depends only on the report's value: both tables are
//! `BTreeMap`s, so equal reports always render byte-identical text and two
//! invocations' reports can be diffed line by line.
//!
//! Layout:
//!
//! ```text
//! \tInbound: [0]\tOutbound: [2]\tEstablished: [2]\tTime wait: [0]\tClose Wait: [0]\tClose: [0]\tOpen Files: [9]\tMax Open Files: [1024]
//! \tConnected sockets:
//! \t\t142.250.70.227:443\ttcp\tESTABLISHED\t2
//! \tOpen file count: 5
//! \t\t/dev/null 3
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::accounting::connections::{ConnectionEnumerator, ConnectionSnapshot};
use crate::accounting::descriptors::{DescriptorEnumerator, DescriptorSnapshot};
use crate::accounting::introspect::{Introspector, ProcfsIntrospector};
use crate::error::FdLeakResult;

/// Point-in-time resource usage of one process. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    descriptors: DescriptorSnapshot,
    connections: ConnectionSnapshot,
    open_files_max: u64,
}

impl ResourceReport {
    pub fn new(
        descriptors: DescriptorSnapshot,
        connections: ConnectionSnapshot,
        open_files_max: u64,
    ) -> Self {
        Self {
            descriptors,
            connections,
            open_files_max,
        }
    }

    pub fn descriptors(&self) -> &DescriptorSnapshot {
        &self.descriptors
    }

    pub fn connections(&self) -> &ConnectionSnapshot {
        &self.connections
    }

    pub fn open_files_max(&self) -> u64 {
        self.open_files_max
    }
}

impl fmt::Display for ResourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.connections.totals();

        writeln!(
            f,
            "\tInbound: [{}]\tOutbound: [{}]\tEstablished: [{}]\tTime wait: [{}]\tClose Wait: [{}]\tClose: [{}]\tOpen Files: [{}]\tMax Open Files: [{}]",
            totals.inbound,
            totals.outbound,
            totals.established,
            totals.time_wait,
            totals.close_wait,
            totals.closed,
            self.descriptors.total(),
            self.open_files_max,
        )?;

        writeln!(f, "\tConnected sockets:")?;
        for (key, count) in self.connections.iter() {
            writeln!(
                f,
                "\t\t{}\t{}\t{}\t{}",
                key.remote, key.protocol, key.state, count
            )?;
        }

        writeln!(f, "\tOpen file count: {}", self.descriptors.distinct())?;
        for (path, count) in self.descriptors.iter() {
            writeln!(f, "\t\t{} {}", path, count)?;
        }

        Ok(())
    }
}

/// Render a report as text.
pub fn render(report: &ResourceReport) -> String {
    report.to_string()
}

/// Takes [`ResourceReport`]s through one introspection source.
#[derive(Clone)]
pub struct ResourceAccountant {
    introspector: Arc<dyn Introspector>,
    descriptors: DescriptorEnumerator,
    connections: ConnectionEnumerator,
}

impl ResourceAccountant {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self {
            descriptors: DescriptorEnumerator::new(Arc::clone(&introspector)),
            connections: ConnectionEnumerator::new(Arc::clone(&introspector)),
            introspector,
        }
    }

    /// Accountant for the calling process, backed by `/proc`.
    pub fn procfs() -> Self {
        Self::new(Arc::new(ProcfsIntrospector::new()))
    }

    /// Enumerate descriptors and connections from one listing of the
    /// descriptor table and read the open-files limit.
    pub fn snapshot(&self) -> FdLeakResult<ResourceReport> {
        let tables = self.introspector.tables()?;
        let connections = self.connections.aggregate(&tables.connections);
        let descriptors = self.descriptors.aggregate(tables.descriptors);
        let open_files_max = self.introspector.open_files_max()?;

        Ok(ResourceReport::new(descriptors, connections, open_files_max))
    }
}

impl fmt::Debug for ResourceAccountant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceAccountant")
            .field("pid", &self.introspector.pid())
            .finish()
    }
}
