// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared fixtures for integration tests.
//!
//! [`FileClientFactory`] stands in for an HTTP stack without touching the
//! network: a "connection" to a host is an open file at `<root>/<host>`.
//! Clients pool connections per host the way a real connection pool does,
//! so descriptor counts behave like pooled sockets:
//!
//! - reading a body returns the connection to its client's pool;
//! - releasing a response closes the connection;
//! - dropping a client closes everything in its pool.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fdleak_core::accounting::{ConnectionRecord, DescriptorRecord, Introspector};
use fdleak_core::error::TransportError;
use fdleak_core::transport::{ClientFactory, HttpClient, HttpResponse};
use fdleak_core::{FdLeakError, FdLeakResult, ProcessId, TargetUrl};

type Pool = Arc<Mutex<HashMap<String, Vec<File>>>>;

pub struct FileClientFactory {
    root: PathBuf,
}

impl FileClientFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical path a connection to `url` shows up as in a snapshot.
    pub fn connection_path(&self, url: &TargetUrl) -> String {
        let root = std::fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        root.join(url.host()).display().to_string()
    }
}

impl ClientFactory for FileClientFactory {
    fn create(&self) -> Result<Arc<dyn HttpClient>, TransportError> {
        Ok(Arc::new(FileClient {
            root: self.root.clone(),
            pool: Arc::default(),
        }))
    }
}

struct FileClient {
    root: PathBuf,
    pool: Pool,
}

impl FileClient {
    fn connect(root: &Path, url: &TargetUrl) -> Result<File, TransportError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(root.join(url.host()))
            .map_err(|source| TransportError::Io {
                url: url.to_string(),
                source,
            })
    }
}

#[async_trait]
impl HttpClient for FileClient {
    async fn get(&self, url: &TargetUrl) -> Result<Box<dyn HttpResponse>, TransportError> {
        let pooled = self
            .pool
            .lock()
            .unwrap()
            .get_mut(url.host())
            .and_then(Vec::pop);

        let conn = match pooled {
            Some(conn) => conn,
            None => Self::connect(&self.root, url)?,
        };

        Ok(Box::new(FileResponse {
            host: url.host().to_string(),
            conn,
            pool: Arc::clone(&self.pool),
        }))
    }
}

struct FileResponse {
    host: String,
    conn: File,
    pool: Pool,
}

#[async_trait]
impl HttpResponse for FileResponse {
    fn status_line(&self) -> String {
        "HTTP/1.1 200 OK".to_string()
    }

    async fn text(self: Box<Self>) -> Result<String, TransportError> {
        let FileResponse { host, conn, pool } = *self;
        pool.lock().unwrap().entry(host).or_default().push(conn);
        Ok("<html></html>".to_string())
    }
}

/// Introspector whose connection table cannot be read.
pub struct UnavailableIntrospector;

impl Introspector for UnavailableIntrospector {
    fn pid(&self) -> ProcessId {
        ProcessId::current()
    }

    fn descriptors(&self) -> FdLeakResult<Vec<FdLeakResult<DescriptorRecord>>> {
        Ok(vec![
            Ok(DescriptorRecord::new("/dev/null")),
            Err(FdLeakError::UnreadableDescriptor {
                reason: "entry vanished".to_string(),
            }),
        ])
    }

    fn connections(&self) -> FdLeakResult<Vec<ConnectionRecord>> {
        Err(FdLeakError::StatsUnavailable {
            facility: "/proc/net/tcp",
            reason: "permission denied".to_string(),
        })
    }

    fn open_files_max(&self) -> FdLeakResult<u64> {
        Ok(1024)
    }
}

pub fn google_targets() -> Vec<TargetUrl> {
    vec![
        TargetUrl::new("https://www.google.com.au/").unwrap(),
        TargetUrl::new("https://www.google.com/").unwrap(),
    ]
}
