// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Invocation handler.
//!
//! Composes an [`InvocationContext`], an [`AcquisitionPolicy`] and a
//! [`ResourceAccountant`] into the unit the hosting platform invokes. Each
//! invocation runs the policy against the function's targets, snapshots the
//! process, and returns the report prefixed with a one-line header:
//!
//! ```text
//! broken-handler: [<id>]\tInvocation: [<n>]\tCost: [<ms>] millis
//! <report>
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::accounting::{Introspector, ResourceAccountant, ResourceReport};
use crate::config::FunctionConfig;
use crate::context::InvocationContext;
use crate::error::{FdLeakError, FdLeakResult, InvocationError};
use crate::policy::AcquisitionPolicy;
use crate::state::{InvocationState, InvocationStateMachine};
use crate::transport::ClientFactory;
use crate::types::{FunctionId, TargetUrl};

/// Per-request metadata supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationMeta {
    request_id: String,
}

impl InvocationMeta {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    /// Metadata with a freshly generated request id.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Successful invocation result.
#[derive(Debug, Clone)]
pub struct InvocationResponse {
    message: String,
    report: ResourceReport,
    invocation: u64,
    elapsed: Duration,
}

impl InvocationResponse {
    /// Header line followed by the rendered report.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn report(&self) -> &ResourceReport {
        &self.report
    }

    /// 1-based invocation number.
    pub fn invocation(&self) -> u64 {
        self.invocation
    }

    /// Time spent in the policy, excluding the snapshot.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl fmt::Display for InvocationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Entry point for one function.
///
/// Invocations on the same handler are serialized: the state machine lock
/// is held for the whole cycle.
pub struct InvocationHandler {
    function_id: FunctionId,
    context: Arc<InvocationContext>,
    policy: AcquisitionPolicy,
    targets: Vec<TargetUrl>,
    accountant: ResourceAccountant,
    state: Mutex<InvocationStateMachine>,
}

impl InvocationHandler {
    pub fn new(
        function_id: FunctionId,
        context: Arc<InvocationContext>,
        policy: AcquisitionPolicy,
        targets: Vec<TargetUrl>,
        accountant: ResourceAccountant,
    ) -> Self {
        Self {
            state: Mutex::new(InvocationStateMachine::new(function_id.clone())),
            function_id,
            context,
            policy,
            targets,
            accountant,
        }
    }

    /// Build a handler for a configured function with a fresh context.
    pub fn from_config(
        config: &FunctionConfig,
        introspector: Arc<dyn Introspector>,
        factory: Arc<dyn ClientFactory>,
    ) -> FdLeakResult<Self> {
        let policy = AcquisitionPolicy::from_kind(config.policy, factory)?;

        Ok(Self::new(
            config.id.clone(),
            InvocationContext::new_shared(),
            policy,
            config.targets.clone(),
            ResourceAccountant::new(introspector),
        ))
    }

    pub fn function_id(&self) -> &FunctionId {
        &self.function_id
    }

    pub fn context(&self) -> &Arc<InvocationContext> {
        &self.context
    }

    pub fn policy(&self) -> &AcquisitionPolicy {
        &self.policy
    }

    pub fn targets(&self) -> &[TargetUrl] {
        &self.targets
    }

    /// Current lifecycle state. Waits for a running invocation to finish.
    pub async fn state(&self) -> InvocationState {
        self.state.lock().await.state()
    }

    /// Run one invocation.
    ///
    /// Any failure, from the policy or from the snapshot, is returned as an
    /// [`InvocationError`] carrying the function, identifier, count and cause.
    /// Nothing is retried.
    pub async fn handle(
        &self,
        payload: &str,
        meta: &InvocationMeta,
    ) -> Result<InvocationResponse, InvocationError> {
        let mut state = self.state.lock().await;

        tracing::info!(
            function_id = %self.function_id,
            invocation_id = %self.context.id(),
            invocation = self.context.count(),
            request_id = meta.request_id(),
            payload_bytes = payload.len(),
            "Starting invocation"
        );

        let invocation = self.context.begin();

        if let Err(e) = Self::enter_running(&mut state) {
            return Err(self.failure(invocation, e));
        }

        let result = self.run(invocation).await;

        let terminal = match result {
            Ok(_) => InvocationState::Completed,
            Err(_) => InvocationState::Failed,
        };
        if let Err(e) = state.transition_to(terminal).and_then(|()| state.reset()) {
            tracing::warn!(error = %e, "Invocation state not reset");
        }

        match result {
            Ok(response) => {
                tracing::info!(
                    function_id = %self.function_id,
                    invocation_id = %self.context.id(),
                    invocation,
                    elapsed_ms = response.elapsed.as_millis() as u64,
                    "{}",
                    response.message
                );
                Ok(response)
            }
            Err(cause) => Err(self.failure(invocation, cause)),
        }
    }

    /// Move to Running. A cycle abandoned mid-flight (its future dropped)
    /// leaves the machine in Running; it is closed out as Failed first.
    fn enter_running(state: &mut InvocationStateMachine) -> FdLeakResult<()> {
        if state.state() == InvocationState::Running {
            tracing::warn!(
                function_id = %state.function_id(),
                running_ms = state.time_in_current_state().as_millis() as u64,
                "Previous invocation was abandoned"
            );
            state.transition_to(InvocationState::Failed)?;
        }
        state.reset()?;
        state.transition_to(InvocationState::Running)?;
        Ok(())
    }

    async fn run(&self, invocation: u64) -> FdLeakResult<InvocationResponse> {
        let started = Instant::now();
        self.policy.execute(&self.targets).await?;
        let elapsed = started.elapsed();

        tracing::info!(
            function_id = %self.function_id,
            invocation,
            elapsed_ms = elapsed.as_millis() as u64,
            "Policy finished"
        );

        let report = self.accountant.snapshot()?;
        let message = format!(
            "{}: [{}]\tInvocation: [{}]\tCost: [{}] millis\n{}",
            self.function_id,
            self.context.id(),
            invocation,
            elapsed.as_millis(),
            report
        );

        Ok(InvocationResponse {
            message,
            report,
            invocation,
            elapsed,
        })
    }

    /// Wrap and log a failure. Every failed invocation goes through here.
    fn failure(&self, invocation: u64, cause: FdLeakError) -> InvocationError {
        let message = format!(
            "Failed to execute {}: [{}] invocation: [{}] cause: [{}]",
            self.function_id,
            self.context.id(),
            invocation,
            cause
        );
        tracing::error!(
            function_id = %self.function_id,
            invocation_id = %self.context.id(),
            invocation,
            "{}",
            message
        );
        InvocationError::new(message, cause)
    }
}

impl fmt::Debug for InvocationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationHandler")
            .field("function_id", &self.function_id)
            .field("invocation_id", &self.context.id())
            .field("policy", &self.policy.kind())
            .field("targets", &self.targets.len())
            .finish()
    }
}
