// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation from harness configuration

use crate::config::{AuthMethod, HarnessConfig};
use crate::error::{HarnessError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use serde_json::json;
use tracing::{debug, info, instrument};

const CONTEXT_NAME: &str = "kube-fixture";

/// Create a Kubernetes client for the configured API server
#[instrument(skip(config), fields(server = config.api_server.as_deref().unwrap_or("inferred")))]
pub async fn create_client(config: &HarnessConfig) -> Result<Client> {
    let client_config = match &config.api_server {
        None => {
            debug!("No API server configured, inferring from environment");
            KConfig::infer()
                .await
                .map_err(|e| HarnessError::Config(format!("Failed to infer config: {}", e)))?
        }
        Some(server) => {
            let kubeconfig = build_kubeconfig(server, config)?;
            KConfig::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| HarnessError::Config(format!("Failed to create config: {}", e)))?
        }
    };

    info!("Connecting to API server {}", client_config.cluster_url);

    Client::try_from(client_config)
        .map_err(|e| HarnessError::Config(format!("Failed to create client: {}", e)))
}

/// Build a single-context kubeconfig carrying the configured credentials
fn build_kubeconfig(server: &str, config: &HarnessConfig) -> Result<Kubeconfig> {
    let mut cluster = json!({
        "server": server,
        "insecure-skip-tls-verify": config.insecure_skip_tls_verify,
    });
    if let Some(ca) = &config.ca_cert {
        cluster["certificate-authority"] = json!(ca.display().to_string());
    }

    let user = match &config.auth {
        AuthMethod::BearerToken(token) => json!({ "token": token }),
        AuthMethod::ClientCertificate { cert, key } => json!({
            "client-certificate": cert.display().to_string(),
            "client-key": key.display().to_string(),
        }),
        AuthMethod::Inferred => {
            return Err(HarnessError::Config(
                "an explicit API server needs a bearer token or client certificate".to_string(),
            ))
        }
    };

    let raw = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": CONTEXT_NAME, "cluster": cluster }],
        "users": [{ "name": CONTEXT_NAME, "user": user }],
        "contexts": [{
            "name": CONTEXT_NAME,
            "context": { "cluster": CONTEXT_NAME, "user": CONTEXT_NAME }
        }],
        "current-context": CONTEXT_NAME,
    });

    serde_json::from_value(raw)
        .map_err(|e| HarnessError::Config(format!("Failed to build kubeconfig: {}", e)))
}
