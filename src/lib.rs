// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod fixture;
pub mod kubernetes;
pub mod manifests;
pub mod probe;
pub mod types;
pub mod wait;

#[cfg(test)]
pub mod test_utils;

pub use error::{HarnessError, Result};
pub use fixture::{FixtureManager, FixtureSettings, Provisioner, ScopeError};
pub use kubernetes::ResourceClient;
pub use wait::{ConvergenceWaiter, PollPolicy, WaitCondition};
