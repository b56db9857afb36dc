// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Outbound HTTP(S) client seam.
//!
//! Policies talk to the network only through [`ClientFactory`],
//! [`HttpClient`] and [`HttpResponse`]. The production implementation wraps
//! `reqwest`; tests plug in clients whose connections are plain files.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::TargetUrl;

/// An HTTP client that may pool connections.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET. The connection stays checked out until the returned
    /// response is read or released.
    async fn get(&self, url: &TargetUrl) -> Result<Box<dyn HttpResponse>, TransportError>;
}

/// A response whose connection is still held.
#[async_trait]
pub trait HttpResponse: Send {
    /// e.g. `HTTP/1.1 200 OK`
    fn status_line(&self) -> String;

    /// Read the whole body. A fully read body hands the connection back to
    /// the client's pool.
    async fn text(self: Box<Self>) -> Result<String, TransportError>;

    /// Give up the response and whatever it holds.
    fn release(self: Box<Self>) {}
}

/// Creates clients. The leaking policy calls this on every request.
pub trait ClientFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn HttpClient>, TransportError>;
}

/// Response held in a scope: released when the guard goes out of scope,
/// whichever way that happens.
pub struct ResponseGuard {
    response: Option<Box<dyn HttpResponse>>,
}

impl ResponseGuard {
    pub fn new(response: Box<dyn HttpResponse>) -> Self {
        Self {
            response: Some(response),
        }
    }

    pub fn status_line(&self) -> String {
        self.response
            .as_ref()
            .map(|response| response.status_line())
            .unwrap_or_default()
    }

    /// Release now rather than at end of scope.
    pub fn close(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(response) = self.response.take() {
            response.release();
        }
    }
}

impl Drop for ResponseGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for ResponseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseGuard")
            .field("held", &self.response.is_some())
            .finish()
    }
}

/// Builds `reqwest` clients.
///
/// Idle pooled connections never expire, so a client that is kept alive
/// keeps its sockets open for as long as it lives.
#[derive(Debug, Clone)]
pub struct ReqwestClientFactory {
    timeout: Duration,
}

impl ReqwestClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for ReqwestClientFactory {
    fn create(&self) -> Result<Arc<dyn HttpClient>, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_idle_timeout(None::<Duration>)
            .build()
            .map_err(|source| TransportError::ClientBuild { source })?;

        Ok(Arc::new(ReqwestClient { client }))
    }
}

#[derive(Debug)]
struct ReqwestClient {
    client: reqwest::Client,
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &TargetUrl) -> Result<Box<dyn HttpResponse>, TransportError> {
        let response = self
            .client
            .get(url.as_url().clone())
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        Ok(Box::new(ReqwestResponse {
            url: url.to_string(),
            response,
        }))
    }
}

struct ReqwestResponse {
    url: String,
    response: reqwest::Response,
}

#[async_trait]
impl HttpResponse for ReqwestResponse {
    fn status_line(&self) -> String {
        format!("{:?} {}", self.response.version(), self.response.status())
    }

    async fn text(self: Box<Self>) -> Result<String, TransportError> {
        let url = self.url;
        self.response
            .text()
            .await
            .map_err(|source| TransportError::Body { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResponse(Arc<AtomicUsize>);

    #[async_trait]
    impl HttpResponse for CountingResponse {
        fn status_line(&self) -> String {
            "HTTP/1.1 200 OK".to_string()
        }

        async fn text(self: Box<Self>) -> Result<String, TransportError> {
            Ok(String::new())
        }

        fn release(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let guard = ResponseGuard::new(Box::new(CountingResponse(Arc::clone(&released))));
            assert_eq!(guard.status_line(), "HTTP/1.1 200 OK");
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_releases_once_when_closed() {
        let released = Arc::new(AtomicUsize::new(0));
        let guard = ResponseGuard::new(Box::new(CountingResponse(Arc::clone(&released))));
        guard.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn fails(released: Arc<AtomicUsize>) -> Result<(), &'static str> {
            let _guard = ResponseGuard::new(Box::new(CountingResponse(released)));
            let parsed: Result<u32, &'static str> = Err("boom");
            parsed?;
            Ok(())
        }

        let released = Arc::new(AtomicUsize::new(0));
        assert!(fails(Arc::clone(&released)).is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reqwest_factory_builds_independent_clients() {
        let factory = ReqwestClientFactory::new(Duration::from_secs(5));
        let first = factory.create().unwrap();
        let second = factory.create().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
