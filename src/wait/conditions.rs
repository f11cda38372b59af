// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Stock conditions over cluster state.
//!
//! Every condition performs a fresh read on each poll; nothing is cached
//! between attempts.

use super::waiter::{Observation, WaitCondition};
use crate::kubernetes::{read_pod_file, ResourceClient};
use crate::probe::HttpProbe;
use crate::types::{Policy, ResourceKind};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ListParams, LogParams};
use kube::runtime::wait::Condition;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;

/// Every pod in the namespace reports `Ready=True`, and there is at least one
pub fn pods_ready(client: Client, namespace: &str) -> WaitCondition {
    let pods: Api<Pod> = Api::namespaced(client, namespace);
    WaitCondition::new(format!("all pods in {} ready", namespace), move || {
        let pods = pods.clone();
        async move {
            let list = pods.list(&ListParams::default()).await?;
            if list.items.is_empty() {
                return Ok(Observation::pending("no pods yet"));
            }

            let not_ready: Vec<String> = list
                .items
                .iter()
                .filter(|pod| !is_pod_ready(pod))
                .map(|pod| pod.metadata.name.clone().unwrap_or_default())
                .collect();

            if not_ready.is_empty() {
                Ok(Observation::satisfied(format!("{} pods ready", list.items.len())))
            } else {
                Ok(Observation::pending(format!(
                    "{}/{} pods not ready: {}",
                    not_ready.len(),
                    list.items.len(),
                    not_ready.join(", ")
                )))
            }
        }
    })
}

fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// The named resource exists
pub fn resource_present(
    resources: ResourceClient,
    kind: ResourceKind,
    namespace: Option<&str>,
    name: &str,
) -> WaitCondition {
    presence(resources, kind, namespace, name, true)
}

/// The named resource no longer exists
pub fn resource_absent(
    resources: ResourceClient,
    kind: ResourceKind,
    namespace: Option<&str>,
    name: &str,
) -> WaitCondition {
    presence(resources, kind, namespace, name, false)
}

fn presence(
    resources: ResourceClient,
    kind: ResourceKind,
    namespace: Option<&str>,
    name: &str,
    want_present: bool,
) -> WaitCondition {
    let namespace = namespace.map(str::to_string);
    let name = name.to_string();
    let target = match &namespace {
        Some(ns) if kind.is_namespaced() => format!("{} {}/{}", kind, ns, name),
        _ => format!("{} {}", kind, name),
    };
    let description = if want_present {
        format!("{} present", target)
    } else {
        format!("{} absent", target)
    };

    WaitCondition::new(description, move || {
        let resources = resources.clone();
        let kind = kind.clone();
        let namespace = namespace.clone();
        let name = name.clone();
        async move {
            let found = resources.get(&kind, namespace.as_deref(), &name).await?;
            let state = match &found {
                Some(object) if object.metadata.deletion_timestamp.is_some() => "terminating",
                Some(_) => "present",
                None => "absent",
            };
            Ok(Observation {
                satisfied: found.is_some() == want_present,
                state: state.to_string(),
            })
        }
    })
}

/// A typed namespaced object satisfies a `kube` runtime condition.
///
/// A missing object is handed to the condition as `None`, so conditions such
/// as `is_deleted` work unchanged.
pub fn object_matches<K, C>(
    client: Client,
    namespace: &str,
    name: &str,
    condition: C,
) -> WaitCondition
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
    C: Condition<K> + Send + Sync + 'static,
{
    let api: Api<K> = Api::namespaced(client, namespace);
    let condition = Arc::new(condition);
    let name = name.to_string();
    let kind = K::kind(&Default::default()).to_string();

    WaitCondition::new(
        format!("{} {}/{} matches condition", kind, namespace, name),
        move || {
            let api = api.clone();
            let condition = condition.clone();
            let name = name.clone();
            async move {
                let object = api.get_opt(&name).await?;
                let state = match &object {
                    Some(obj) => format!(
                        "resourceVersion {}",
                        obj.meta().resource_version.as_deref().unwrap_or("-")
                    ),
                    None => "absent".to_string(),
                };
                Ok(Observation {
                    satisfied: condition.matches_object(object.as_ref()),
                    state,
                })
            }
        },
    )
}

/// The ingress controller accepted the policy (`status.state == "Valid"`)
pub fn policy_valid(client: Client, namespace: &str, name: &str) -> WaitCondition {
    let policies: Api<Policy> = Api::namespaced(client, namespace);
    let name = name.to_string();

    WaitCondition::new(format!("Policy {}/{} valid", namespace, name), move || {
        let policies = policies.clone();
        let name = name.clone();
        async move {
            match policies.get_opt(&name).await? {
                Some(policy) => Ok(Observation {
                    satisfied: policy.is_valid(),
                    state: policy.describe_status(),
                }),
                None => Ok(Observation::pending("policy not found")),
            }
        }
    })
}

/// The container log of a pod contains `needle`.
///
/// Used to check that a log sidecar received entries.
pub fn pod_log_contains(
    client: Client,
    namespace: &str,
    pod: &str,
    container: Option<&str>,
    needle: &str,
) -> WaitCondition {
    let pods: Api<Pod> = Api::namespaced(client, namespace);
    let pod = pod.to_string();
    let container = container.map(str::to_string);
    let needle = needle.to_string();

    WaitCondition::new(
        format!("log of pod {}/{} contains {:?}", namespace, pod, needle),
        move || {
            let pods = pods.clone();
            let pod = pod.clone();
            let needle = needle.clone();
            let params = LogParams {
                container: container.clone(),
                ..Default::default()
            };
            async move {
                let log = pods.logs(&pod, &params).await?;
                Ok(marker_in(&log, &needle, "log"))
            }
        },
    )
}

/// A file inside a container contains `needle`, read over pod exec.
///
/// Sidecars that log to a file (a syslog receiver writing
/// `/var/log/messages`) never show those entries on stdout, so
/// [`pod_log_contains`] cannot see them.
pub fn pod_file_contains(
    client: Client,
    namespace: &str,
    pod: &str,
    container: Option<&str>,
    path: &str,
    needle: &str,
) -> WaitCondition {
    let namespace = namespace.to_string();
    let pod = pod.to_string();
    let container = container.map(str::to_string);
    let path = path.to_string();
    let needle = needle.to_string();

    WaitCondition::new(
        format!("{} in pod {}/{} contains {:?}", path, namespace, pod, needle),
        move || {
            let client = client.clone();
            let namespace = namespace.clone();
            let pod = pod.clone();
            let container = container.clone();
            let path = path.clone();
            let needle = needle.clone();
            async move {
                let contents =
                    read_pod_file(client, &namespace, &pod, container.as_deref(), &path).await?;
                Ok(marker_in(&contents, &needle, &path))
            }
        },
    )
}

fn marker_in(contents: &str, needle: &str, source: &str) -> Observation {
    if contents.contains(needle) {
        Observation::satisfied(format!("marker found in {}", source))
    } else {
        Observation::pending(format!(
            "marker not in {} lines of {}",
            contents.lines().count(),
            source
        ))
    }
}

/// The endpoint answers with `expected_status` and, if given, a body
/// containing `marker`
pub fn http_responds(
    probe: HttpProbe,
    expected_status: u16,
    marker: Option<&str>,
) -> WaitCondition {
    let marker = marker.map(str::to_string);
    let description = match &probe.host {
        Some(host) => format!("{} (Host {}) answers {}", probe.url, host, expected_status),
        None => format!("{} answers {}", probe.url, expected_status),
    };

    WaitCondition::new(description, move || {
        let probe = probe.clone();
        let marker = marker.clone();
        async move {
            let response = probe.send().await?;
            if response.status != expected_status {
                return Ok(Observation::pending(format!("status {}", response.status)));
            }
            match &marker {
                Some(marker) if !response.body.contains(marker.as_str()) => {
                    Ok(Observation::pending(format!(
                        "status {} without {:?} in body",
                        response.status, marker
                    )))
                }
                _ => Ok(Observation::satisfied(format!("status {}", response.status))),
            }
        }
    })
}
