// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{HarnessError, Result};
use crate::types::kind::ResourceKind;
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Write verbs issued by the resource client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Replace,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::Create => "create",
            Verb::Replace => "replace",
            Verb::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DryRun {
    All,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagationPolicy {
    Orphan,
    Background,
    Foreground,
}

impl PropagationPolicy {
    fn as_str(&self) -> &'static str {
        match self {
            PropagationPolicy::Orphan => "Orphan",
            PropagationPolicy::Background => "Background",
            PropagationPolicy::Foreground => "Foreground",
        }
    }
}

/// Query parameters accepted on write operations.
///
/// The last three fields only apply to delete. Unknown keys are rejected when
/// options are deserialized from untyped input.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<DryRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_policy: Option<PropagationPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphan_dependents: Option<bool>,
}

impl QueryOptions {
    /// Parse options from an untyped mapping such as a YAML test parameter.
    pub fn from_value(value: serde_json::Value, verb: Verb) -> Result<Self> {
        let options: QueryOptions = serde_json::from_value(value).map_err(|e| {
            let message = e.to_string();
            match unknown_field(&message) {
                Some(key) => HarnessError::UnexpectedArgument {
                    key,
                    operation: verb.to_string(),
                },
                None => HarnessError::Validation(format!("invalid options: {}", message)),
            }
        })?;
        options.check(verb)?;
        Ok(options)
    }

    /// Reject options the verb does not accept
    pub fn check(&self, verb: Verb) -> Result<()> {
        if verb == Verb::Delete {
            return Ok(());
        }

        let delete_only = [
            ("gracePeriodSeconds", self.grace_period_seconds.is_some()),
            ("propagationPolicy", self.propagation_policy.is_some()),
            ("orphanDependents", self.orphan_dependents.is_some()),
        ];
        match delete_only.iter().find(|(_, set)| *set) {
            Some((key, _)) => Err(HarnessError::UnexpectedArgument {
                key: key.to_string(),
                operation: verb.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Render the options as a URL query string, empty when nothing is set.
    /// `default_field_manager` applies when no field manager was given.
    pub fn to_query(&self, verb: Verb, default_field_manager: Option<&str>) -> String {
        let mut qs = url::form_urlencoded::Serializer::new(String::new());

        if self.dry_run.is_some() {
            qs.append_pair("dryRun", "All");
        }
        if verb != Verb::Delete {
            if let Some(fm) = self.field_manager.as_deref().or(default_field_manager) {
                qs.append_pair("fieldManager", fm);
            }
        }
        if let Some(pretty) = self.pretty {
            qs.append_pair("pretty", if pretty { "true" } else { "false" });
        }
        if verb == Verb::Delete {
            if let Some(grace) = self.grace_period_seconds {
                qs.append_pair("gracePeriodSeconds", &grace.to_string());
            }
            if let Some(policy) = self.propagation_policy {
                qs.append_pair("propagationPolicy", policy.as_str());
            }
            if let Some(orphan) = self.orphan_dependents {
                qs.append_pair("orphanDependents", if orphan { "true" } else { "false" });
            }
        }

        qs.finish()
    }
}

/// serde reports unknown keys as "unknown field `key`, expected ..."
fn unknown_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// A single create, replace or delete against the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub body: Option<serde_json::Value>,
    pub options: QueryOptions,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            namespace: None,
            name: None,
            body: None,
            options: QueryOptions::default(),
        }
    }

    /// Build a request from a typed object; name and namespace come from its metadata.
    pub fn from_object<K>(kind: ResourceKind, object: &K) -> Result<Self>
    where
        K: kube::Resource + Serialize,
    {
        let body = serde_json::to_value(object)
            .map_err(|e| HarnessError::Validation(format!("unserializable body: {}", e)))?;
        let meta = object.meta();
        Ok(Self {
            kind,
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            body: Some(body),
            options: QueryOptions::default(),
        })
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Name from the request, falling back to `metadata.name` in the body
    pub fn resolved_name(&self) -> Option<String> {
        self.name.clone().filter(|n| !n.is_empty()).or_else(|| {
            self.body
                .as_ref()
                .and_then(|b| b.pointer("/metadata/name"))
                .and_then(|n| n.as_str())
                .map(str::to_string)
        })
    }

    /// Namespace used in the request path, `None` for cluster-scoped kinds
    pub fn path_namespace(&self) -> Option<&str> {
        if self.kind.is_namespaced() {
            self.namespace.as_deref()
        } else {
            None
        }
    }
}

/// Identifies a resource created through the harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
    pub resource_version: Option<String>,
    pub uid: Option<String>,
}

impl ResourceHandle {
    pub fn from_object(kind: ResourceKind, object: &DynamicObject) -> Result<Self> {
        let name = object.metadata.name.clone().ok_or_else(|| {
            HarnessError::Decode(format!("{} returned by the server has no name", kind))
        })?;
        let namespace = if kind.is_namespaced() {
            object.metadata.namespace.clone()
        } else {
            None
        };
        Ok(Self {
            kind,
            namespace,
            name,
            resource_version: object.metadata.resource_version.clone(),
            uid: object.metadata.uid.clone(),
        })
    }

    /// Same kind, namespace and name, ignoring versions
    pub fn same_resource(&self, other: &ResourceHandle) -> bool {
        self.kind == other.kind && self.namespace == other.namespace && self.name == other.name
    }

    /// Request addressing this resource, used for delete
    pub fn to_request(&self) -> ResourceRequest {
        ResourceRequest {
            kind: self.kind.clone(),
            namespace: self.namespace.clone(),
            name: Some(self.name.clone()),
            body: None,
            options: QueryOptions::default(),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Result of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The server answered 404; the resource was already gone
    AlreadyAbsent,
}
