// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Field manager recorded on writes unless configured otherwise
pub const FIELD_MANAGER: &str = "kube-fixture";

/// Prefix for generated fixture namespaces
pub const NAMESPACE_PREFIX: &str = "test-namespace";

/// Content types advertised to the API server, most preferred first
pub mod content {
    pub const JSON: &str = "application/json";

    /// Default `Accept` header value
    pub const ACCEPT: &str =
        "application/json, application/yaml, application/vnd.kubernetes.protobuf";
}

/// Convergence polling defaults
pub mod poll {
    /// Interval between two polls in milliseconds
    pub const INTERVAL_MS: u64 = 1000;
    /// Number of polls before giving up
    pub const MAX_ATTEMPTS: u32 = 45;
    /// Relative jitter applied to every interval
    pub const JITTER: f64 = 0.2;
}

/// Labels put on every namespace a fixture creates
pub mod labels {
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const FIXTURE_ID: &str = "kube-fixture/id";
}
