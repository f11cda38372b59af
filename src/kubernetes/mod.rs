// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for client creation, resource writes, namespace naming
//! and reading files from pods.

pub mod client;
pub mod namespaces;
pub mod pods;
pub mod resources;

pub use client::create_client;
pub use namespaces::{namespace_request, unique_name};
pub use pods::read_pod_file;
pub use resources::ResourceClient;
