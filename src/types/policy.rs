// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Security policy consumed by the ingress controller under test
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "k8s.nginx.org", version = "v1", kind = "Policy", plural = "policies")]
#[kube(namespaced)]
#[kube(status = "PolicyStatus")]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_control: Option<AccessControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waf: Option<Waf>,
}

impl Policy {
    /// Controller-reported state, "Valid", "Invalid" or "Warning"
    pub fn state(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.state.as_deref())
    }

    pub fn is_valid(&self) -> bool {
        self.state() == Some("Valid")
    }

    /// Short description of the observed status for wait diagnostics
    pub fn describe_status(&self) -> String {
        match &self.status {
            Some(status) => format!(
                "state={}, reason={}, message={}",
                status.state.as_deref().unwrap_or("-"),
                status.reason.as_deref().unwrap_or("-"),
                status.message.as_deref().unwrap_or("-")
            ),
            None => "no status reported".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessControl {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub rate: String,
    pub key: String,
    pub zone_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Waf {
    pub enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_log: Option<SecurityLog>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLog {
    pub enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_log_conf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dest: Option<String>,
}

/// Security log configuration referenced from WAF policies
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(
    group = "appprotect.f5.com",
    version = "v1beta1",
    kind = "APLogConf",
    plural = "aplogconfs"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct APLogConfSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<LogFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<LogContent>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct LogFilter {
    pub request_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct LogContent {
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_request_size: Option<String>,
}
