// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Got an unexpected argument '{key}' to {operation}")]
    UnexpectedArgument { key: String, operation: String },

    #[error("API server rejected the request ({status_code} {reason}): {message}")]
    Api {
        status_code: u16,
        reason: String,
        message: String,
    },

    #[error("Conflict replacing {resource}: {message}")]
    Conflict { resource: String, message: String },

    #[error("Transport failure: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Timeout(#[from] WaitTimeout),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),
}

impl HarnessError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HarnessError::Api { status_code, .. } => Some(*status_code),
            HarnessError::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Errors raised before any request was sent. They point at the caller and
    /// are never retried.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            HarnessError::Validation(_) | HarnessError::UnexpectedArgument { .. }
        )
    }
}

impl From<kube::Error> for HarnessError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => HarnessError::Api {
                status_code: resp.code,
                reason: resp.reason,
                message: resp.message,
            },
            kube::Error::SerdeError(e) => HarnessError::Decode(e.to_string()),
            other => HarnessError::Network(other.to_string()),
        }
    }
}

/// Convergence was not reached within the configured bound.
#[derive(Error, Debug, Clone)]
#[error("timed out waiting for {description} after {attempts} attempts ({elapsed:?}), last observed: {last_observed}")]
pub struct WaitTimeout {
    pub description: String,
    pub attempts: u32,
    pub failed_reads: u32,
    pub elapsed: Duration,
    pub last_observed: String,
}

pub type Result<T> = std::result::Result<T, HarnessError>;
