// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kube_fixture::config::HarnessConfig;
use kube_fixture::kubernetes::{create_client, ResourceClient};
use kube_fixture::manifests::first_ingress_host;
use kube_fixture::probe::HttpProbe;
use kube_fixture::types::ResourceKind;
use kube_fixture::wait::conditions::{http_responds, pods_ready, policy_valid};
use kube_fixture::wait::{ConvergenceWaiter, PollPolicy};
use kube_fixture::{FixtureManager, FixtureSettings};

/// What the smoke run deploys and checks
struct Scenario {
    manifests: Vec<String>,
    wait_for_pods: bool,
    probe: Option<HttpProbe>,
    marker: Option<String>,
}

impl Scenario {
    async fn from_env() -> Result<Self> {
        let paths = env::var("KUBE_FIXTURE_MANIFESTS")
            .context("KUBE_FIXTURE_MANIFESTS must list the manifest files to apply")?;

        let mut manifests = Vec::new();
        for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let yaml = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read manifest {}", path))?;
            manifests.push(yaml);
        }

        let probe = match env::var("KUBE_FIXTURE_PROBE_URL").ok() {
            Some(url) => {
                let host = match env::var("KUBE_FIXTURE_PROBE_HOST").ok() {
                    Some(host) => Some(host),
                    None => first_host(&manifests)?,
                };
                let mut probe = HttpProbe::new(url);
                if env::var("KUBE_FIXTURE_PROBE_INSECURE").is_ok_and(|v| v == "true") {
                    probe = probe.insecure();
                }
                Some(match host {
                    Some(host) => probe.with_host(host),
                    None => probe,
                })
            }
            None => None,
        };

        Ok(Self {
            manifests,
            wait_for_pods: env::var("KUBE_FIXTURE_WAIT_PODS").is_ok_and(|v| v == "true"),
            probe,
            marker: env::var("KUBE_FIXTURE_PROBE_MARKER").ok(),
        })
    }
}

fn first_host(manifests: &[String]) -> Result<Option<String>> {
    for yaml in manifests {
        if let Some(host) = first_ingress_host(yaml)? {
            return Ok(Some(host));
        }
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting kube-fixture smoke run");

    let config = HarnessConfig::from_env()?;
    let scenario = Scenario::from_env().await?;
    info!(
        "Configuration loaded: manifests={}, namespace_prefix={}",
        scenario.manifests.len(),
        config.namespace_prefix
    );

    let client = create_client(&config).await?;
    let manager = FixtureManager::new(
        ResourceClient::from_config(client.clone(), &config),
        ConvergenceWaiter::new(PollPolicy::from_config(&config)),
        FixtureSettings::from_config(&config),
    );

    let Scenario {
        manifests,
        wait_for_pods,
        probe,
        marker,
    } = scenario;

    let resources = manager
        .scope(
            |p| async move {
                let namespace = p.namespace().await?;
                for yaml in &manifests {
                    for handle in p.create_from_yaml(yaml).await? {
                        if handle.kind == ResourceKind::Policy {
                            p.wait_until(policy_valid(client.clone(), &namespace, &handle.name))?;
                        }
                    }
                }
                if wait_for_pods {
                    p.wait_until(pods_ready(client, &namespace))?;
                }
                Ok(())
            },
            |p| async move {
                if let Some(probe) = probe {
                    let outcome = p
                        .wait_for(&http_responds(probe, 200, marker.as_deref()))
                        .await?;
                    info!(
                        "Endpoint answered after {} attempts ({:?})",
                        outcome.attempts, outcome.elapsed
                    );
                }
                Ok(p.handles().len())
            },
        )
        .await?;

    info!("Smoke run passed with {} resources", resources);
    Ok(())
}
