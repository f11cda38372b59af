// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Waiting for asynchronously converging cluster state.

pub mod conditions;
pub mod waiter;

pub use waiter::{ConvergenceWaiter, Observation, Outcome, PollPolicy, WaitCondition};
