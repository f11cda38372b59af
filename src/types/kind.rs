// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{HarnessError, Result};
use crate::types::policy::{APLogConf, Policy};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::core::{ApiResource, GroupVersionKind};
use std::fmt;

/// Resource type outside the built-in set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomKind {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

/// Kinds of cluster resources the harness knows how to address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Namespace,
    Secret,
    ConfigMap,
    Service,
    Pod,
    Deployment,
    Ingress,
    Policy,
    LogConfig,
    Custom(CustomKind),
}

impl ResourceKind {
    pub fn api_resource(&self) -> ApiResource {
        match self {
            ResourceKind::Namespace => ApiResource::erase::<Namespace>(&()),
            ResourceKind::Secret => ApiResource::erase::<Secret>(&()),
            ResourceKind::ConfigMap => ApiResource::erase::<ConfigMap>(&()),
            ResourceKind::Service => ApiResource::erase::<Service>(&()),
            ResourceKind::Pod => ApiResource::erase::<Pod>(&()),
            ResourceKind::Deployment => ApiResource::erase::<Deployment>(&()),
            ResourceKind::Ingress => ApiResource::erase::<Ingress>(&()),
            ResourceKind::Policy => ApiResource::erase::<Policy>(&()),
            ResourceKind::LogConfig => ApiResource::erase::<APLogConf>(&()),
            ResourceKind::Custom(custom) => ApiResource::from_gvk_with_plural(
                &GroupVersionKind::gvk(&custom.group, &custom.version, &custom.kind),
                &custom.plural,
            ),
        }
    }

    pub fn is_namespaced(&self) -> bool {
        match self {
            ResourceKind::Namespace => false,
            ResourceKind::Custom(custom) => custom.namespaced,
            _ => true,
        }
    }

    /// Resolve a manifest's `apiVersion` and `kind` to a known resource kind
    pub fn from_type_meta(api_version: &str, kind: &str) -> Result<Self> {
        let known = [
            ResourceKind::Namespace,
            ResourceKind::Secret,
            ResourceKind::ConfigMap,
            ResourceKind::Service,
            ResourceKind::Pod,
            ResourceKind::Deployment,
            ResourceKind::Ingress,
            ResourceKind::Policy,
            ResourceKind::LogConfig,
        ];

        known
            .into_iter()
            .find(|k| {
                let ar = k.api_resource();
                ar.api_version == api_version && ar.kind == kind
            })
            .ok_or_else(|| {
                HarnessError::Manifest(format!(
                    "unsupported resource {}/{}, register it as a custom kind",
                    api_version, kind
                ))
            })
    }

    fn api_prefix(&self) -> String {
        let ar = self.api_resource();
        if ar.group.is_empty() {
            format!("/api/{}", ar.version)
        } else {
            format!("/apis/{}/{}", ar.group, ar.version)
        }
    }

    /// Path of the resource collection, e.g.
    /// `/apis/networking.k8s.io/v1/namespaces/{namespace}/ingresses`
    pub fn collection_path(&self, namespace: Option<&str>) -> Result<String> {
        let prefix = self.api_prefix();
        let plural = self.api_resource().plural;

        if !self.is_namespaced() {
            return Ok(format!("{}/{}", prefix, plural));
        }

        match namespace {
            Some(ns) if !ns.is_empty() => Ok(format!("{}/namespaces/{}/{}", prefix, ns, plural)),
            _ => Err(HarnessError::Validation(format!(
                "missing the required parameter `namespace` for {}",
                self
            ))),
        }
    }

    /// Path of a single named resource
    pub fn item_path(&self, namespace: Option<&str>, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(HarnessError::Validation(format!(
                "missing the required parameter `name` for {}",
                self
            )));
        }
        Ok(format!("{}/{}", self.collection_path(namespace)?, name))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Custom(custom) => write!(f, "{}", custom.kind),
            other => write!(f, "{}", other.api_resource().kind),
        }
    }
}
