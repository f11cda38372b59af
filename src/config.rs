// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{content, poll, FIELD_MANAGER, NAMESPACE_PREFIX};
use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How the client authenticates against the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Use the ambient kubeconfig or in-cluster service account
    Inferred,
    BearerToken(String),
    ClientCertificate { cert: PathBuf, key: PathBuf },
}

/// Harness configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// API server URL; `None` infers the cluster from the environment
    pub api_server: Option<String>,
    pub auth: AuthMethod,
    pub ca_cert: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    pub accept: String,
    pub field_manager: String,
    pub namespace_prefix: String,
    pub poll_interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    /// Block teardown until every deleted resource is gone
    pub await_deletion: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            auth: AuthMethod::Inferred,
            ca_cert: None,
            insecure_skip_tls_verify: false,
            accept: content::ACCEPT.to_string(),
            field_manager: FIELD_MANAGER.to_string(),
            namespace_prefix: NAMESPACE_PREFIX.to_string(),
            poll_interval: Duration::from_millis(poll::INTERVAL_MS),
            max_attempts: Some(poll::MAX_ATTEMPTS),
            timeout: None,
            await_deletion: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = HarnessConfig::default();

        let token = lookup("KUBE_FIXTURE_TOKEN");
        let cert = lookup("KUBE_FIXTURE_CLIENT_CERT");
        let key = lookup("KUBE_FIXTURE_CLIENT_KEY");
        let auth = match (token, cert, key) {
            (Some(_), Some(_), _) => {
                bail!("KUBE_FIXTURE_TOKEN and KUBE_FIXTURE_CLIENT_CERT are mutually exclusive")
            }
            (Some(token), None, _) => AuthMethod::BearerToken(token),
            (None, Some(cert), Some(key)) => AuthMethod::ClientCertificate {
                cert: cert.into(),
                key: key.into(),
            },
            (None, Some(_), None) => {
                bail!("KUBE_FIXTURE_CLIENT_CERT requires KUBE_FIXTURE_CLIENT_KEY")
            }
            (None, None, Some(_)) => {
                bail!("KUBE_FIXTURE_CLIENT_KEY requires KUBE_FIXTURE_CLIENT_CERT")
            }
            (None, None, None) => AuthMethod::Inferred,
        };

        let api_server = lookup("KUBE_FIXTURE_API_SERVER");
        match (&api_server, &auth) {
            (None, AuthMethod::BearerToken(_) | AuthMethod::ClientCertificate { .. }) => {
                bail!("explicit credentials require KUBE_FIXTURE_API_SERVER to be set")
            }
            (Some(_), AuthMethod::Inferred) => bail!(
                "KUBE_FIXTURE_API_SERVER requires KUBE_FIXTURE_TOKEN or KUBE_FIXTURE_CLIENT_CERT"
            ),
            _ => {}
        }

        let poll_interval = match lookup("KUBE_FIXTURE_POLL_INTERVAL_MS") {
            Some(v) => Duration::from_millis(
                v.parse()
                    .context("KUBE_FIXTURE_POLL_INTERVAL_MS must be a number of milliseconds")?,
            ),
            None => defaults.poll_interval,
        };

        let max_attempts = match lookup("KUBE_FIXTURE_MAX_ATTEMPTS") {
            Some(v) => {
                let n: u32 = v
                    .parse()
                    .context("KUBE_FIXTURE_MAX_ATTEMPTS must be a positive number")?;
                // 0 disables the attempt bound
                (n > 0).then_some(n)
            }
            None => defaults.max_attempts,
        };

        let timeout = lookup("KUBE_FIXTURE_TIMEOUT_SECS")
            .map(|v| v.parse().map(Duration::from_secs))
            .transpose()
            .context("KUBE_FIXTURE_TIMEOUT_SECS must be a number of seconds")?;

        if max_attempts.is_none() && timeout.is_none() {
            bail!(
                "polling needs a bound: set KUBE_FIXTURE_MAX_ATTEMPTS or KUBE_FIXTURE_TIMEOUT_SECS"
            );
        }

        Ok(HarnessConfig {
            api_server,
            auth,
            ca_cert: lookup("KUBE_FIXTURE_CA_CERT").map(PathBuf::from),
            insecure_skip_tls_verify: parse_flag(lookup("KUBE_FIXTURE_INSECURE")),
            accept: lookup("KUBE_FIXTURE_ACCEPT").unwrap_or(defaults.accept),
            field_manager: lookup("KUBE_FIXTURE_FIELD_MANAGER").unwrap_or(defaults.field_manager),
            namespace_prefix: lookup("KUBE_FIXTURE_NAMESPACE_PREFIX")
                .unwrap_or(defaults.namespace_prefix),
            poll_interval,
            max_attempts,
            timeout,
            await_deletion: parse_flag(lookup("KUBE_FIXTURE_AWAIT_DELETION")),
        })
    }
}

fn parse_flag(value: Option<String>) -> bool {
    value.and_then(|v| v.parse().ok()).unwrap_or(false)
}
