// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Best-effort teardown of everything a fixture registered.

use super::context::TeardownStep;
use crate::kubernetes::ResourceClient;
use crate::types::{DeleteOutcome, QueryOptions, ResourceHandle};
use crate::wait::conditions::resource_absent;
use crate::wait::ConvergenceWaiter;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

/// A teardown step that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub step: String,
    pub error: String,
}

/// What teardown removed and what it left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub deleted: Vec<ResourceHandle>,
    pub already_absent: Vec<ResourceHandle>,
    pub deferred: usize,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Appended to the original error when teardown left something behind
    pub(crate) fn trailer(&self) -> String {
        if self.is_clean() {
            String::new()
        } else {
            format!("\n{}", self)
        }
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(
                f,
                "teardown complete: {} deleted, {} already absent, {} deferred actions run",
                self.deleted.len(),
                self.already_absent.len(),
                self.deferred
            );
        }

        write!(
            f,
            "teardown incomplete, {} step(s) failed:",
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.step, failure.error)?;
        }
        Ok(())
    }
}

/// Run the steps last-registered first, continuing past every failure
pub(crate) async fn run_teardown(
    resources: &ResourceClient,
    waiter: &ConvergenceWaiter,
    steps: Vec<TeardownStep>,
    delete_options: &QueryOptions,
    await_deletion: bool,
) -> TeardownReport {
    let mut report = TeardownReport::default();

    for step in steps.into_iter().rev() {
        let description = step.describe();
        match step {
            TeardownStep::Delete(handle) => {
                match resources.delete_handle(&handle, delete_options).await {
                    Ok(DeleteOutcome::Deleted) => {
                        if await_deletion {
                            let gone = resource_absent(
                                resources.clone(),
                                handle.kind.clone(),
                                handle.namespace.as_deref(),
                                &handle.name,
                            );
                            if let Err(e) = waiter.wait_for(&gone).await {
                                warn!("{} was not removed: {}", handle, e);
                                report.failures.push(TeardownFailure {
                                    step: description,
                                    error: e.to_string(),
                                });
                                continue;
                            }
                        }
                        report.deleted.push(handle);
                    }
                    Ok(DeleteOutcome::AlreadyAbsent) => report.already_absent.push(handle),
                    Err(e) => {
                        warn!("Teardown failed to delete {}: {}", handle, e);
                        report.failures.push(TeardownFailure {
                            step: description,
                            error: e.to_string(),
                        });
                    }
                }
            }
            TeardownStep::Deferred { action, .. } => {
                debug!("Running deferred cleanup: {}", description);
                let error = match AssertUnwindSafe(async move { action().await })
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => {
                        report.deferred += 1;
                        continue;
                    }
                    Ok(Err(e)) => format!("{:#}", e),
                    Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
                };
                warn!("Deferred cleanup '{}' failed: {}", description, error);
                report.failures.push(TeardownFailure {
                    step: description,
                    error,
                });
            }
        }
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{deleted_json, not_found_json, status_json, MockService};
    use crate::types::ResourceKind;
    use crate::wait::PollPolicy;
    use std::time::Duration;

    fn handle(kind: ResourceKind, name: &str) -> ResourceHandle {
        ResourceHandle {
            namespace: kind.is_namespaced().then(|| "ns-1".to_string()),
            kind,
            name: name.to_string(),
            resource_version: None,
            uid: None,
        }
    }

    async fn teardown(
        resources: &ResourceClient,
        steps: Vec<TeardownStep>,
        await_deletion: bool,
    ) -> TeardownReport {
        let waiter = ConvergenceWaiter::new(PollPolicy::attempts(3, Duration::from_millis(1)));
        run_teardown(resources, &waiter, steps, &QueryOptions::default(), await_deletion).await
    }

    #[tokio::test]
    async fn test_deletes_in_reverse_and_continues_past_failures() {
        let mock = MockService::new()
            .on_delete(
                "/api/v1/namespaces/ns-1/configmaps/first",
                200,
                &deleted_json("first"),
            )
            .on_delete(
                "/api/v1/namespaces/ns-1/secrets/second",
                500,
                &status_json(500, "InternalError", "etcd unavailable"),
            )
            .on_delete(
                "/api/v1/namespaces/ns-1/services/third",
                404,
                &not_found_json("services", "third"),
            );
        let resources = ResourceClient::new(mock.clone().into_client());
        let steps = vec![
            TeardownStep::Delete(handle(ResourceKind::ConfigMap, "first")),
            TeardownStep::Delete(handle(ResourceKind::Secret, "second")),
            TeardownStep::Delete(handle(ResourceKind::Service, "third")),
        ];

        let report = teardown(&resources, steps, false).await;

        let paths: Vec<String> = mock.requests_for("DELETE").into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "/api/v1/namespaces/ns-1/services/third",
                "/api/v1/namespaces/ns-1/secrets/second",
                "/api/v1/namespaces/ns-1/configmaps/first",
            ]
        );
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.already_absent.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, "delete Secret ns-1/second");

        let diagnostic = report.to_string();
        assert!(diagnostic.starts_with("teardown incomplete, 1 step(s) failed:"));
        assert!(diagnostic.contains("etcd unavailable"));
    }

    #[tokio::test]
    async fn test_deferred_action_failure_is_reported() {
        let resources = ResourceClient::new(MockService::new().into_client());
        let steps = vec![
            TeardownStep::Deferred {
                description: "stop traffic generator".to_string(),
                action: Box::new(|| async { Ok::<(), anyhow::Error>(()) }.boxed()),
            },
            TeardownStep::Deferred {
                description: "collect sidecar logs".to_string(),
                action: Box::new(|| {
                    async { Err::<(), _>(anyhow::anyhow!("sidecar gone")) }.boxed()
                }),
            },
        ];

        let report = teardown(&resources, steps, false).await;

        assert_eq!(report.deferred, 1);
        assert_eq!(
            report.failures,
            vec![TeardownFailure {
                step: "collect sidecar logs".to_string(),
                error: "sidecar gone".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_panicking_deferred_action_does_not_stop_teardown() {
        let path = "/api/v1/namespaces/ns-1";
        let mock = MockService::new().on_delete(path, 200, &deleted_json("ns-1"));
        let resources = ResourceClient::new(mock.clone().into_client());
        let steps = vec![
            TeardownStep::Delete(handle(ResourceKind::Namespace, "ns-1")),
            TeardownStep::Deferred {
                description: "check sidecar log".to_string(),
                action: Box::new(|| {
                    async {
                        assert_eq!(1, 2, "sidecar log is empty");
                        Ok::<(), anyhow::Error>(())
                    }
                    .boxed()
                }),
            },
        ];

        let report = teardown(&resources, steps, false).await;

        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, "check sidecar log");
        assert!(report.failures[0].error.starts_with("panicked: "));
        assert!(report.failures[0].error.contains("sidecar log is empty"));
        assert_eq!(mock.requests_for("DELETE").len(), 1);
    }

    #[test]
    fn test_panic_message_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("static message");
        let formatted: Box<dyn Any + Send> = Box::new(String::from("formatted message"));
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(literal.as_ref()), "static message");
        assert_eq!(panic_message(formatted.as_ref()), "formatted message");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_await_deletion_polls_until_gone() {
        let path = "/api/v1/namespaces/ns-1/configmaps/first";
        let mock = MockService::new()
            .on_delete(path, 200, &deleted_json("first"))
            .on_get(path, 200, &crate::test_utils::object_json("v1", "ConfigMap", "ns-1", "first"))
            .on_get(path, 404, &not_found_json("configmaps", "first"));
        let resources = ResourceClient::new(mock.clone().into_client());
        let steps = vec![TeardownStep::Delete(handle(ResourceKind::ConfigMap, "first"))];

        let report = teardown(&resources, steps, true).await;

        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(mock.requests_for("GET").len(), 2);
    }

    #[tokio::test]
    async fn test_await_deletion_reports_lingering_resource() {
        let path = "/api/v1/namespaces/ns-1/configmaps/first";
        let mock = MockService::new()
            .on_delete(path, 200, &deleted_json("first"))
            .on_get(path, 200, &crate::test_utils::object_json("v1", "ConfigMap", "ns-1", "first"));
        let resources = ResourceClient::new(mock.into_client());
        let steps = vec![TeardownStep::Delete(handle(ResourceKind::ConfigMap, "first"))];

        let report = teardown(&resources, steps, true).await;

        assert!(report.deleted.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("timed out"));
    }

    #[test]
    fn test_clean_report_has_no_trailer() {
        let report = TeardownReport {
            deleted: vec![handle(ResourceKind::Namespace, "ns-1")],
            ..Default::default()
        };
        assert_eq!(report.trailer(), "");
        assert_eq!(
            report.to_string(),
            "teardown complete: 1 deleted, 0 already absent, 0 deferred actions run"
        );
    }
}
