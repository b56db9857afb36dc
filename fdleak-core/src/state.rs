// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Invocation state machine with typed state transitions.
//!
//! Implements one invocation cycle: Idle → Running → (Completed | Failed) → Idle.
//! Invalid transitions result in StateTransitionError.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;
use crate::types::FunctionId;

/// Invocation lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationState {
    /// Waiting for the next invocation.
    Idle,

    /// Executing the acquisition policy and taking the snapshot.
    Running,

    /// Last invocation returned a response.
    Completed,

    /// Last invocation surfaced a failure.
    Failed,
}

impl InvocationState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: InvocationState) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Completed, Self::Idle)
                | (Self::Failed, Self::Idle)
        )
    }
}

impl std::fmt::Display for InvocationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for a handler's invocation cycle.
/// Enforces valid state transitions and tracks timing.
#[derive(Debug)]
pub struct InvocationStateMachine {
    function_id: FunctionId,
    current_state: InvocationState,
    last_transition: Instant,
    transition_count: u64,
}

impl InvocationStateMachine {
    /// Create a new state machine in the Idle state.
    pub fn new(function_id: FunctionId) -> Self {
        Self {
            function_id,
            current_state: InvocationState::Idle,
            last_transition: Instant::now(),
            transition_count: 0,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> InvocationState {
        self.current_state
    }

    /// Get the function ID.
    pub fn function_id(&self) -> &FunctionId {
        &self.function_id
    }

    /// Get time since last transition.
    pub fn time_in_current_state(&self) -> std::time::Duration {
        self.last_transition.elapsed()
    }

    /// Get total number of transitions.
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt to transition to a new state.
    /// Returns Ok(()) if successful, or StateTransitionError if invalid.
    pub fn transition_to(&mut self, target: InvocationState) -> Result<(), StateTransitionError> {
        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                function_id: self.function_id.clone(),
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            function_id = %self.function_id,
            from = self.current_state.name(),
            to = target.name(),
            "State transition"
        );

        self.current_state = target;
        self.last_transition = Instant::now();
        self.transition_count += 1;

        Ok(())
    }

    /// Finish the current cycle and go back to Idle.
    pub fn reset(&mut self) -> Result<(), StateTransitionError> {
        match self.current_state {
            InvocationState::Idle => Ok(()),
            _ => self.transition_to(InvocationState::Idle),
        }
    }
}
