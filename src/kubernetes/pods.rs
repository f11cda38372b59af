// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reading files inside running containers

use crate::error::{HarnessError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::AttachParams;
use kube::{Api, Client};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Read a file inside a container by running `cat` over pod exec.
///
/// A missing file or a failing `cat` is an `Api` error carrying the exec
/// status message.
#[instrument(skip(client))]
pub async fn read_pod_file(
    client: Client,
    namespace: &str,
    pod: &str,
    container: Option<&str>,
    path: &str,
) -> Result<String> {
    let pods: Api<Pod> = Api::namespaced(client, namespace);
    let mut params = AttachParams::default().stdout(true).stderr(false);
    if let Some(container) = container {
        params = params.container(container);
    }

    let mut attached = pods.exec(pod, vec!["cat", path], &params).await?;
    let status = attached.take_status();

    let mut stdout = attached
        .stdout()
        .ok_or_else(|| HarnessError::Network("exec returned no stdout stream".to_string()))?;
    let mut contents = String::new();
    stdout
        .read_to_string(&mut contents)
        .await
        .map_err(|e| HarnessError::Network(format!("failed to read exec output: {}", e)))?;

    if let Some(status) = status {
        if let Some(status) = status.await {
            if status.status.as_deref() == Some("Failure") {
                return Err(HarnessError::Api {
                    status_code: status.code.and_then(|c| u16::try_from(c).ok()).unwrap_or(500),
                    reason: status.reason.unwrap_or_else(|| "ExecFailed".to_string()),
                    message: format!(
                        "cat {} in {}/{}: {}",
                        path,
                        namespace,
                        pod,
                        status.message.unwrap_or_default()
                    ),
                });
            }
        }
    }

    debug!(bytes = contents.len(), "Read file from pod");
    Ok(contents)
}
