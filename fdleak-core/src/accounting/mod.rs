// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resource accounting.
//!
//! Enumerates the descriptors and TCP connections held by the current process
//! and renders them as a deterministic [`ResourceReport`]. Taken once per
//! invocation so that reports from consecutive invocations can be diffed.

pub mod connections;
pub mod descriptors;
pub mod introspect;
pub mod limits;
pub mod report;

pub use connections::{
    ConnectionEnumerator, ConnectionKey, ConnectionRecord, ConnectionSnapshot, ConnectionState,
    ConnectionTotals, Protocol, Role,
};
pub use descriptors::{DescriptorEnumerator, DescriptorRecord, DescriptorSnapshot};
pub use introspect::{Introspector, ProcessTables, ProcfsIntrospector};
pub use limits::OpenFilesLimit;
pub use report::{render, ResourceAccountant, ResourceReport};
