// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fixture lifecycle: provisioning, tracking and guaranteed teardown.

pub mod context;
pub mod manager;
pub mod teardown;

pub use context::{FixtureContext, FixtureState, TeardownStep};
pub use manager::{FixtureManager, FixtureSettings, Provisioner, ScopeError};
pub use teardown::{TeardownFailure, TeardownReport};
