// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Connection enumeration.
//!
//! Classifies the TCP connections owned by the current process by remote
//! endpoint, protocol and state, and totals them by direction and state.
//! Aggregation is additive, so the result does not depend on the order the
//! OS lists connections in.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::accounting::introspect::Introspector;
use crate::error::FdLeakResult;

/// Transport protocol of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    Tcp,
}

impl Protocol {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the connection the process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    /// Listening socket, or a connection accepted on a listening port.
    Server,
    /// Connection the process initiated.
    Client,
}

/// Kernel TCP state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
}

impl ConnectionState {
    /// Kernel name of the state, as netstat prints it.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Established => "ESTABLISHED",
            Self::SynSent => "SYN_SENT",
            Self::SynRecv => "SYN_RECV",
            Self::FinWait1 => "FIN_WAIT1",
            Self::FinWait2 => "FIN_WAIT2",
            Self::TimeWait => "TIME_WAIT",
            Self::Close => "CLOSE",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::Listen => "LISTEN",
            Self::Closing => "CLOSING",
            Self::NewSynRecv => "NEW_SYN_RECV",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One connection owned by the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    local_address: SocketAddr,
    remote_address: SocketAddr,
    protocol: Protocol,
    role: Role,
    state: ConnectionState,
}

impl ConnectionRecord {
    pub fn new(
        local_address: SocketAddr,
        remote_address: SocketAddr,
        protocol: Protocol,
        role: Role,
        state: ConnectionState,
    ) -> Self {
        Self {
            local_address,
            remote_address,
            protocol,
            role,
            state,
        }
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

/// Grouping key of the connection table. Field order is the sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConnectionKey {
    pub remote: String,
    pub protocol: String,
    pub state: String,
}

impl From<&ConnectionRecord> for ConnectionKey {
    fn from(record: &ConnectionRecord) -> Self {
        Self {
            remote: record.remote_address.to_string(),
            protocol: record.protocol.name().to_string(),
            state: record.state.name().to_string(),
        }
    }
}

/// Scalar aggregates over every owned connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionTotals {
    pub inbound: u64,
    pub outbound: u64,
    pub established: u64,
    pub time_wait: u64,
    pub close_wait: u64,
    pub closed: u64,
}

/// Connection counts keyed by (remote, protocol, state) plus totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    #[serde(rename = "sockets", serialize_with = "serialize_counts")]
    counts: BTreeMap<ConnectionKey, u64>,
    totals: ConnectionTotals,
}

impl ConnectionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one connection into the table and the totals.
    pub fn add(&mut self, record: &ConnectionRecord) {
        *self.counts.entry(ConnectionKey::from(record)).or_insert(0) += 1;

        if record.state != ConnectionState::Listen {
            match record.role {
                Role::Server => self.totals.inbound += 1,
                Role::Client => self.totals.outbound += 1,
            }
        }

        match record.state {
            ConnectionState::Established => self.totals.established += 1,
            ConnectionState::TimeWait => self.totals.time_wait += 1,
            ConnectionState::CloseWait => self.totals.close_wait += 1,
            ConnectionState::Close => self.totals.closed += 1,
            _ => {}
        }
    }

    pub fn totals(&self) -> ConnectionTotals {
        self.totals
    }

    /// Connections to `remote` (as `ip:port`), summed over every state.
    pub fn count_for_remote(&self, remote: &str) -> u64 {
        self.counts
            .iter()
            .filter(|(key, _)| key.remote == remote)
            .map(|(_, count)| *count)
            .sum()
    }

    /// Total number of connections.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Keys and counts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionKey, u64)> {
        self.counts.iter().map(|(key, count)| (key, *count))
    }
}

impl<'a> FromIterator<&'a ConnectionRecord> for ConnectionSnapshot {
    fn from_iter<I: IntoIterator<Item = &'a ConnectionRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            snapshot.add(record);
        }
        snapshot
    }
}

#[derive(Serialize)]
struct ConnectionCount<'a> {
    #[serde(flatten)]
    key: &'a ConnectionKey,
    count: u64,
}

fn serialize_counts<S: Serializer>(
    counts: &BTreeMap<ConnectionKey, u64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        counts
            .iter()
            .map(|(key, count)| ConnectionCount { key, count: *count }),
    )
}

/// Enumerates the connections of the introspected process.
///
/// Unlike descriptor enumeration this fails closed: if the OS cannot be
/// queried the error is returned, because not being able to observe socket
/// usage is itself worth reporting.
#[derive(Clone)]
pub struct ConnectionEnumerator {
    introspector: Arc<dyn Introspector>,
}

impl ConnectionEnumerator {
    pub fn new(introspector: Arc<dyn Introspector>) -> Self {
        Self { introspector }
    }

    /// Take a fresh connection snapshot.
    pub fn enumerate(&self) -> FdLeakResult<ConnectionSnapshot> {
        Ok(self.aggregate(&self.introspector.connections()?))
    }

    /// Group already-listed connection records.
    pub fn aggregate(&self, records: &[ConnectionRecord]) -> ConnectionSnapshot {
        let snapshot: ConnectionSnapshot = records.iter().collect();

        tracing::debug!(
            pid = %self.introspector.pid(),
            connections = snapshot.total(),
            inbound = snapshot.totals().inbound,
            outbound = snapshot.totals().outbound,
            "Enumerated connections"
        );

        snapshot
    }
}

impl fmt::Debug for ConnectionEnumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEnumerator")
            .field("pid", &self.introspector.pid())
            .finish()
    }
}
