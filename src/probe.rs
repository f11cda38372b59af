// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP(S) probe against an endpoint exposed by the system under test.
//!
//! Every request opens a fresh HTTP/1 connection so a probe always reflects
//! the current routing. The `Host` header can be overridden to reach a virtual
//! server through an ingress address, and certificate checks can be switched
//! off for ingresses serving self-signed certificates.

use crate::error::{HarnessError, Result};
use reqwest::header;
use reqwest::redirect::Policy;
use reqwest::Url;
use std::error::Error as _;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("kube-fixture/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A GET request to an HTTP or HTTPS endpoint
#[derive(Debug, Clone)]
pub struct HttpProbe {
    pub url: String,
    /// Sent as the `Host` header instead of the URL authority
    pub host: Option<String>,
    pub timeout: Duration,
    /// Accept any server certificate
    pub insecure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            host: None,
            timeout: DEFAULT_TIMEOUT,
            insecure: false,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip certificate verification for `https` URLs
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    /// Send the request and read the full response.
    ///
    /// A malformed URL or a scheme other than `http`/`https` is a `Validation`
    /// error. Failures to connect or read, including the timeout, are
    /// `Network` errors. Redirects are reported as-is, never followed.
    pub async fn send(&self) -> Result<ProbeResponse> {
        let url = parse_url(&self.url)?;

        let client = reqwest::Client::builder()
            .http1_only()
            .pool_max_idle_per_host(0)
            .redirect(Policy::none())
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(self.insecure)
            .build()
            .map_err(|e| HarnessError::Validation(format!("failed to build HTTP client: {}", e)))?;

        let mut request = client.get(url);
        if let Some(host) = &self.host {
            request = request.header(header::HOST, host);
        }

        let response = request.send().await.map_err(|e| self.network_error(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.network_error(&e))?;

        debug!(url = %self.url, status, "Probe answered");
        Ok(ProbeResponse { status, body })
    }

    fn network_error(&self, err: &reqwest::Error) -> HarnessError {
        if err.is_timeout() {
            return HarnessError::Network(format!(
                "request to {} timed out after {:?}",
                self.url, self.timeout
            ));
        }

        // reqwest keeps the cause (refused, certificate, ...) in the source chain
        let mut message = format!("request to {} failed", self.url);
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        HarnessError::Network(message)
    }
}

fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| HarnessError::Validation(format!("invalid probe URL '{}': {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HarnessError::Validation(format!(
                "unsupported scheme '{}' in probe URL '{}', expected http or https",
                other, url
            )))
        }
    }
    if parsed.host_str().is_none() {
        return Err(HarnessError::Validation(format!(
            "missing host in probe URL '{}'",
            url
        )));
    }
    Ok(parsed)
}
