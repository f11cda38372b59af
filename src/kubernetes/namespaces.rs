// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace naming and namespace request bodies

use crate::constants::{labels, FIELD_MANAGER};
use crate::types::{ResourceKind, ResourceRequest};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

/// Maximum length of a DNS-1123 label
const MAX_NAME_LEN: usize = 63;
const SUFFIX_LEN: usize = 8;

/// Generate a collision-free DNS-1123 name from a prefix
pub fn unique_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();

    let prefix = sanitize(prefix);
    let budget = MAX_NAME_LEN - SUFFIX_LEN - 1;
    let prefix = prefix[..prefix.len().min(budget)].trim_end_matches('-');

    if prefix.is_empty() {
        // a label must start with a letter
        format!("ns-{}", suffix)
    } else {
        format!("{}-{}", prefix, suffix)
    }
}

/// Lowercase the prefix and replace everything outside `[a-z0-9-]`
fn sanitize(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// Request creating a namespace labelled with the owning fixture
pub fn namespace_request(name: &str, fixture_id: &str) -> ResourceRequest {
    ResourceRequest::new(ResourceKind::Namespace)
        .name(name)
        .body(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {
                "name": name,
                "labels": {
                    (labels::MANAGED_BY): FIELD_MANAGER,
                    (labels::FIXTURE_ID): fixture_id,
                }
            }
        }))
}
