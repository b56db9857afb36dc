// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! OS introspection seam.
//!
//! [`Introspector`] is everything the enumerators need from the operating
//! system. [`ProcfsIntrospector`] answers from `/proc` for the calling
//! process; tests substitute their own implementations.

use std::collections::HashSet;
use std::io;

use procfs::net::{TcpNetEntry, TcpState};
use procfs::process::{FDTarget, Process};
use procfs::ProcError;

use crate::accounting::connections::{ConnectionRecord, ConnectionState, Protocol, Role};
use crate::accounting::descriptors::DescriptorRecord;
use crate::accounting::limits::OpenFilesLimit;
use crate::error::{is_exhaustion_io, FdLeakError, FdLeakResult};
use crate::types::ProcessId;

const FD_DIR: &str = "/proc/self/fd";

/// Descriptors and connections derived from one listing of the descriptor
/// table.
#[derive(Debug, Default)]
pub struct ProcessTables {
    pub descriptors: Vec<FdLeakResult<DescriptorRecord>>,
    pub connections: Vec<ConnectionRecord>,
}

/// Source of per-process descriptor and connection data.
pub trait Introspector: Send + Sync {
    /// Process whose resources are being accounted.
    fn pid(&self) -> ProcessId;

    /// Every open descriptor. The outer error means the table could not be
    /// listed; an inner error is one entry that could not be resolved.
    fn descriptors(&self) -> FdLeakResult<Vec<FdLeakResult<DescriptorRecord>>>;

    /// Every TCP connection owned by the process.
    fn connections(&self) -> FdLeakResult<Vec<ConnectionRecord>>;

    /// Soft limit on open descriptors.
    fn open_files_max(&self) -> FdLeakResult<u64>;

    /// Both tables at once. Implementations that can should list the
    /// descriptor table once so the two halves agree.
    fn tables(&self) -> FdLeakResult<ProcessTables> {
        let connections = self.connections()?;
        let descriptors = self.descriptors()?;
        Ok(ProcessTables {
            descriptors,
            connections,
        })
    }
}

type FdListing = Vec<Result<FDTarget, ProcError>>;

/// Introspection backed by `/proc` for the calling process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsIntrospector;

impl ProcfsIntrospector {
    pub fn new() -> Self {
        Self
    }

    fn process() -> FdLeakResult<Process> {
        Process::myself().map_err(|e| proc_error("/proc/self", e))
    }

    /// List `/proc/self/fd` by name and resolve each entry on its own.
    ///
    /// Running out of descriptors while resolving fails the whole listing:
    /// a short table would under-report exactly when usage is highest.
    /// Other per-entry failures are returned for the caller to judge.
    fn list(process: &Process) -> FdLeakResult<FdListing> {
        let dir = std::fs::read_dir(FD_DIR).map_err(|e| io_error(FD_DIR, e))?;

        let mut listing = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| io_error(FD_DIR, e))?;
            let Some(fd) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<i32>().ok())
            else {
                continue;
            };

            match process.fd_from_fd(fd) {
                Ok(info) => listing.push(Ok(info.target)),
                Err(e) if is_exhaustion(&e) => return Err(proc_error(FD_DIR, e)),
                Err(e) => listing.push(Err(e)),
            }
        }

        Ok(listing)
    }

    fn descriptor_records(listing: FdListing) -> Vec<FdLeakResult<DescriptorRecord>> {
        listing
            .into_iter()
            .map(|entry| {
                entry
                    .map(|target| DescriptorRecord::new(describe_target(&target)))
                    .map_err(|e| FdLeakError::UnreadableDescriptor {
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    /// Inodes of every socket in the listing. An entry that vanished is not
    /// a socket we hold; any other unresolved entry might be, so it fails.
    fn socket_inodes(listing: &FdListing) -> FdLeakResult<HashSet<u64>> {
        let mut inodes = HashSet::new();
        for entry in listing {
            match entry {
                Ok(FDTarget::Socket(inode)) => {
                    inodes.insert(*inode);
                }
                Ok(_) | Err(ProcError::NotFound(_)) => {}
                Err(e) => {
                    return Err(FdLeakError::StatsUnavailable {
                        facility: FD_DIR,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(inodes)
    }

    fn tcp_entries() -> FdLeakResult<Vec<TcpNetEntry>> {
        let mut entries = procfs::net::tcp().map_err(|e| proc_error("/proc/net/tcp", e))?;

        // Kernels built without IPv6 have no tcp6 table.
        match procfs::net::tcp6() {
            Ok(v6) => entries.extend(v6),
            Err(ProcError::NotFound(_)) => {}
            Err(e) => return Err(proc_error("/proc/net/tcp6", e)),
        }

        Ok(entries)
    }

    fn owned_connections(inodes: &HashSet<u64>) -> FdLeakResult<Vec<ConnectionRecord>> {
        // Entries in TIME_WAIT have no owning socket (inode 0) and drop out here.
        let owned: Vec<TcpNetEntry> = Self::tcp_entries()?
            .into_iter()
            .filter(|entry| inodes.contains(&entry.inode))
            .collect();

        let listen_ports: HashSet<u16> = owned
            .iter()
            .filter(|entry| matches!(entry.state, TcpState::Listen))
            .map(|entry| entry.local_address.port())
            .collect();

        Ok(owned
            .iter()
            .map(|entry| {
                let role = if listen_ports.contains(&entry.local_address.port()) {
                    Role::Server
                } else {
                    Role::Client
                };
                ConnectionRecord::new(
                    entry.local_address,
                    entry.remote_address,
                    Protocol::Tcp,
                    role,
                    tcp_state(&entry.state),
                )
            })
            .collect())
    }
}

impl Introspector for ProcfsIntrospector {
    fn pid(&self) -> ProcessId {
        ProcessId::current()
    }

    fn descriptors(&self) -> FdLeakResult<Vec<FdLeakResult<DescriptorRecord>>> {
        let process = Self::process()?;
        Ok(Self::descriptor_records(Self::list(&process)?))
    }

    fn connections(&self) -> FdLeakResult<Vec<ConnectionRecord>> {
        let process = Self::process()?;
        let listing = Self::list(&process)?;
        Self::owned_connections(&Self::socket_inodes(&listing)?)
    }

    fn open_files_max(&self) -> FdLeakResult<u64> {
        OpenFilesLimit::current().map(|limit| limit.soft)
    }

    fn tables(&self) -> FdLeakResult<ProcessTables> {
        let process = Self::process()?;
        let listing = Self::list(&process)?;
        let connections = Self::owned_connections(&Self::socket_inodes(&listing)?)?;

        Ok(ProcessTables {
            descriptors: Self::descriptor_records(listing),
            connections,
        })
    }
}

/// Render a descriptor target the way `readlink /proc/<pid>/fd/<n>` shows it.
fn describe_target(target: &FDTarget) -> String {
    match target {
        FDTarget::Path(path) => path.display().to_string(),
        FDTarget::Socket(inode) => format!("socket:[{}]", inode),
        FDTarget::Net(inode) => format!("net:[{}]", inode),
        FDTarget::Pipe(inode) => format!("pipe:[{}]", inode),
        FDTarget::AnonInode(name) => format!("anon_inode:{}", name),
        FDTarget::MemFD(name) => format!("/memfd:{}", name),
        FDTarget::Other(kind, inode) => format!("{}:[{}]", kind, inode),
    }
}

fn tcp_state(state: &TcpState) -> ConnectionState {
    match state {
        TcpState::Established => ConnectionState::Established,
        TcpState::SynSent => ConnectionState::SynSent,
        TcpState::SynRecv => ConnectionState::SynRecv,
        TcpState::FinWait1 => ConnectionState::FinWait1,
        TcpState::FinWait2 => ConnectionState::FinWait2,
        TcpState::TimeWait => ConnectionState::TimeWait,
        TcpState::Close => ConnectionState::Close,
        TcpState::CloseWait => ConnectionState::CloseWait,
        TcpState::LastAck => ConnectionState::LastAck,
        TcpState::Listen => ConnectionState::Listen,
        TcpState::Closing => ConnectionState::Closing,
        TcpState::NewSynRecv => ConnectionState::NewSynRecv,
    }
}

fn is_exhaustion(err: &ProcError) -> bool {
    matches!(err, ProcError::Io(source, _) if is_exhaustion_io(source))
}

/// Classify an I/O failure: EMFILE/ENFILE is exhaustion, anything else
/// means the facility is unavailable.
fn io_error(facility: &'static str, source: io::Error) -> FdLeakError {
    if is_exhaustion_io(&source) {
        FdLeakError::ResourceExhausted {
            context: format!("reading {}", facility),
            source,
        }
    } else {
        FdLeakError::StatsUnavailable {
            facility,
            reason: source.to_string(),
        }
    }
}

/// Same classification for procfs failures.
fn proc_error(facility: &'static str, err: ProcError) -> FdLeakError {
    match err {
        ProcError::Io(source, _) => io_error(facility, source),
        other => FdLeakError::StatsUnavailable {
            facility,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_target() {
        assert_eq!(
            describe_target(&FDTarget::Path("/tmp/broken.txt".into())),
            "/tmp/broken.txt"
        );
        assert_eq!(describe_target(&FDTarget::Socket(1234)), "socket:[1234]");
        assert_eq!(describe_target(&FDTarget::Pipe(7)), "pipe:[7]");
        assert_eq!(
            describe_target(&FDTarget::AnonInode("[eventpoll]".to_string())),
            "anon_inode:[eventpoll]"
        );
    }

    #[test]
    fn test_proc_error_classification() {
        let err = proc_error(
            "/proc/self/fd",
            ProcError::Io(std::io::Error::from_raw_os_error(libc::EMFILE), None),
        );
        assert!(err.is_resource_exhausted());

        let err = proc_error("/proc/net/tcp", ProcError::PermissionDenied(None));
        assert!(err.is_stats_unavailable());
    }

    #[test]
    fn test_procfs_sees_own_descriptors() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = std::fs::canonicalize(file.path()).unwrap();

        let records = ProcfsIntrospector::new().descriptors().unwrap();
        let found = records
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .any(|r| r.canonical_path() == path.display().to_string());
        assert!(found, "temp file descriptor not listed");
    }

    #[test]
    fn test_procfs_sees_own_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let connections = ProcfsIntrospector::new().connections().unwrap();
        let listening = connections.iter().any(|c| {
            c.local_address().port() == port
                && c.state() == ConnectionState::Listen
                && c.role() == Role::Server
        });
        assert!(listening, "listener on port {} not listed", port);
    }

    #[test]
    fn test_vanished_entries_are_not_sockets() {
        let listing: FdListing = vec![
            Ok(FDTarget::Socket(11)),
            Err(ProcError::NotFound(None)),
            Ok(FDTarget::Path("/tmp/a".into())),
            Ok(FDTarget::Socket(12)),
        ];

        let inodes = ProcfsIntrospector::socket_inodes(&listing).unwrap();
        assert_eq!(inodes, HashSet::from([11, 12]));
    }

    #[test]
    fn test_unresolved_entry_fails_connections() {
        let listing: FdListing = vec![
            Ok(FDTarget::Socket(11)),
            Err(ProcError::PermissionDenied(None)),
        ];

        let err = ProcfsIntrospector::socket_inodes(&listing).unwrap_err();
        assert!(err.is_stats_unavailable());
    }

    #[test]
    fn test_unresolved_entry_is_an_unreadable_descriptor() {
        let listing: FdListing = vec![
            Ok(FDTarget::Pipe(3)),
            Err(ProcError::NotFound(None)),
        ];

        let records = ProcfsIntrospector::descriptor_records(listing);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().canonical_path(), "pipe:[3]");
        assert!(matches!(
            records[1],
            Err(FdLeakError::UnreadableDescriptor { .. })
        ));
    }

    #[test]
    fn test_io_error_classification() {
        let err = io_error(FD_DIR, io::Error::from_raw_os_error(libc::ENFILE));
        assert!(err.is_resource_exhausted());

        let err = io_error(FD_DIR, io::Error::from_raw_os_error(libc::EACCES));
        assert!(err.is_stats_unavailable());
    }

    #[test]
    fn test_tables_agree_on_a_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let tables = ProcfsIntrospector::new().tables().unwrap();

        assert!(tables
            .connections
            .iter()
            .any(|c| c.local_address().port() == port && c.state() == ConnectionState::Listen));
        let sockets = tables
            .descriptors
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .filter(|r| r.canonical_path().starts_with("socket:["))
            .count();
        assert!(sockets >= tables.connections.len());
    }

    #[test]
    fn test_procfs_open_files_max() {
        assert!(ProcfsIntrospector::new().open_files_max().unwrap() > 0);
    }
}
