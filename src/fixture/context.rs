// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-fixture bookkeeping: lifecycle state and the teardown stack.

use crate::error::{HarnessError, Result};
use crate::types::ResourceHandle;
use crate::wait::WaitCondition;
use futures::future::BoxFuture;
use std::fmt;

/// Lifecycle of a fixture; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Idle,
    Provisioning,
    Ready,
    TearingDown,
    Done,
}

impl FixtureState {
    fn can_become(self, next: FixtureState) -> bool {
        use FixtureState::*;
        matches!(
            (self, next),
            (Idle, Provisioning)
                | (Provisioning, Ready)
                | (Provisioning, TearingDown)
                | (Ready, TearingDown)
                | (TearingDown, Done)
        )
    }
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub type DeferredAction = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// One entry on the teardown stack
pub enum TeardownStep {
    Delete(ResourceHandle),
    Deferred {
        description: String,
        action: DeferredAction,
    },
}

impl TeardownStep {
    pub fn describe(&self) -> String {
        match self {
            TeardownStep::Delete(handle) => format!("delete {}", handle),
            TeardownStep::Deferred { description, .. } => description.clone(),
        }
    }
}

impl fmt::Debug for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// State owned by a single fixture
#[derive(Debug)]
pub struct FixtureContext {
    id: String,
    state: FixtureState,
    steps: Vec<TeardownStep>,
    pending: Vec<WaitCondition>,
}

impl FixtureContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: FixtureState::Idle,
            steps: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    pub fn transition(&mut self, next: FixtureState) -> Result<()> {
        if !self.state.can_become(next) {
            return Err(HarnessError::Validation(format!(
                "fixture {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Resources and actions may only be registered before teardown starts
    pub fn ensure_accepting(&self) -> Result<()> {
        match self.state {
            FixtureState::Provisioning | FixtureState::Ready => Ok(()),
            state => Err(HarnessError::Validation(format!(
                "fixture {} is {}, no resources can be registered",
                self.id, state
            ))),
        }
    }

    /// Push a handle onto the teardown stack, or refresh it if the same
    /// resource is already tracked
    pub fn track(&mut self, handle: ResourceHandle) {
        let existing = self.steps.iter().position(|step| {
            matches!(step, TeardownStep::Delete(tracked) if tracked.same_resource(&handle))
        });
        match existing {
            Some(index) => self.steps[index] = TeardownStep::Delete(handle),
            None => self.steps.push(TeardownStep::Delete(handle)),
        }
    }

    /// Remove a handle from the teardown stack, returns whether it was tracked
    pub fn untrack(&mut self, handle: &ResourceHandle) -> bool {
        let before = self.steps.len();
        self.steps.retain(|step| {
            !matches!(step, TeardownStep::Delete(tracked) if tracked.same_resource(handle))
        });
        self.steps.len() != before
    }

    pub fn defer(&mut self, description: String, action: DeferredAction) {
        self.steps.push(TeardownStep::Deferred {
            description,
            action,
        });
    }

    pub fn add_condition(&mut self, condition: WaitCondition) {
        self.pending.push(condition);
    }

    pub fn take_conditions(&mut self) -> Vec<WaitCondition> {
        std::mem::take(&mut self.pending)
    }

    /// Tracked handles in creation order
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                TeardownStep::Delete(handle) => Some(handle.clone()),
                TeardownStep::Deferred { .. } => None,
            })
            .collect()
    }

    /// Drain the teardown stack in registration order
    pub fn take_steps(&mut self) -> Vec<TeardownStep> {
        std::mem::take(&mut self.steps)
    }
}
