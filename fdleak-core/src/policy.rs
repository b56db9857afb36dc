// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resource-acquisition policies.
//!
//! Both policies perform a GET against every target and return. They differ
//! only in how they treat clients and responses:
//!
//! - [`LeakingPolicy`] builds a new client per request and never lets go of
//!   it, so every request pins another pooled socket for the life of the
//!   process.
//! - [`ScopedPolicy`] shares one client and releases every response before
//!   returning, so socket usage stays flat.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::FdLeakResult;
use crate::transport::{ClientFactory, HttpClient, ResponseGuard};
use crate::types::TargetUrl;

/// Which policy a function runs, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Leaking,
    Scoped,
}

impl PolicyKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Leaking => "leaking",
            Self::Scoped => "scoped",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The policy a handler was composed with.
#[derive(Debug)]
pub enum AcquisitionPolicy {
    Leaking(LeakingPolicy),
    Scoped(ScopedPolicy),
}

impl AcquisitionPolicy {
    /// Build the policy named by `kind`. The scoped policy creates its shared
    /// client here.
    pub fn from_kind(kind: PolicyKind, factory: Arc<dyn ClientFactory>) -> FdLeakResult<Self> {
        match kind {
            PolicyKind::Leaking => Ok(Self::Leaking(LeakingPolicy::new(factory))),
            PolicyKind::Scoped => Ok(Self::Scoped(ScopedPolicy::new(factory.as_ref())?)),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Leaking(_) => PolicyKind::Leaking,
            Self::Scoped(_) => PolicyKind::Scoped,
        }
    }

    /// Request every target in order. The first failure aborts the rest.
    pub async fn execute(&self, targets: &[TargetUrl]) -> FdLeakResult<()> {
        for url in targets {
            match self {
                Self::Leaking(policy) => policy.request(url).await?,
                Self::Scoped(policy) => policy.request(url).await?,
            }
        }
        Ok(())
    }
}

/// New client per request, never released.
pub struct LeakingPolicy {
    factory: Arc<dyn ClientFactory>,
    retained: Mutex<Vec<Arc<dyn HttpClient>>>,
}

impl LeakingPolicy {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            retained: Mutex::new(Vec::new()),
        }
    }

    /// Number of clients created so far, all still alive.
    pub async fn retained_clients(&self) -> usize {
        self.retained.lock().await.len()
    }

    async fn request(&self, url: &TargetUrl) -> FdLeakResult<()> {
        let client = self.factory.create()?;
        let retained = {
            let mut retained = self.retained.lock().await;
            retained.push(Arc::clone(&client));
            retained.len()
        };

        let response = client.get(url).await?;
        let body = response.text().await?;

        tracing::debug!(
            url = %url,
            bytes = body.len(),
            retained_clients = retained,
            "Read response body"
        );

        Ok(())
    }
}

impl fmt::Debug for LeakingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeakingPolicy").finish_non_exhaustive()
    }
}

/// One shared client; every response released before returning.
pub struct ScopedPolicy {
    client: Arc<dyn HttpClient>,
}

impl ScopedPolicy {
    pub fn new(factory: &dyn ClientFactory) -> FdLeakResult<Self> {
        Ok(Self {
            client: factory.create()?,
        })
    }

    async fn request(&self, url: &TargetUrl) -> FdLeakResult<()> {
        let response = ResponseGuard::new(self.client.get(url).await?);

        tracing::info!(
            url = %url,
            status = %response.status_line(),
            "Received response"
        );

        response.close();
        Ok(())
    }
}

impl fmt::Debug for ScopedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedPolicy").finish_non_exhaustive()
    }
}
