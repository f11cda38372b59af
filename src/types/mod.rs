// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource kinds, requests, handles and the CRD types under test.

pub mod kind;
pub mod policy;
pub mod request;

pub use kind::{CustomKind, ResourceKind};
pub use policy::{APLogConf, APLogConfSpec, Policy, PolicySpec, PolicyStatus};
pub use request::{
    DeleteOutcome, DryRun, PropagationPolicy, QueryOptions, ResourceHandle, ResourceRequest, Verb,
};
