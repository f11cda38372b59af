// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Multi-document YAML manifests turned into resource requests.

use crate::error::{HarnessError, Result};
use crate::types::{ResourceKind, ResourceRequest};
use serde::Deserialize;
use serde_json::Value;

/// Parse every non-empty document in a YAML stream into a create request.
///
/// Namespaced documents are placed in `namespace` when one is given,
/// otherwise they keep the namespace from their own metadata.
pub fn parse_documents(yaml: &str, namespace: Option<&str>) -> Result<Vec<ResourceRequest>> {
    documents(yaml)?
        .into_iter()
        .enumerate()
        .map(|(index, doc)| to_request(index, doc, namespace))
        .collect()
}

/// Host of the first ingress rule found in the stream
pub fn first_ingress_host(yaml: &str) -> Result<Option<String>> {
    Ok(documents(yaml)?.iter().find_map(|doc| {
        doc.pointer("/spec/rules")
            .and_then(Value::as_array)
            .and_then(|rules| rules.iter().find_map(|r| r.get("host")))
            .and_then(Value::as_str)
            .map(str::to_string)
    }))
}

fn documents(yaml: &str) -> Result<Vec<Value>> {
    let mut docs = Vec::new();
    for (index, doc) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = serde_yaml::Value::deserialize(doc)
            .map_err(|e| HarnessError::Manifest(format!("document {}: {}", index, e)))?;
        // `---` separators around nothing yield null documents
        if value.is_null() {
            continue;
        }
        let value = serde_json::to_value(value)
            .map_err(|e| HarnessError::Manifest(format!("document {}: {}", index, e)))?;
        docs.push(value);
    }
    Ok(docs)
}

fn to_request(index: usize, mut doc: Value, namespace: Option<&str>) -> Result<ResourceRequest> {
    let field = |doc: &Value, pointer: &str| {
        doc.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                HarnessError::Manifest(format!(
                    "document {} has no {}",
                    index,
                    pointer.trim_start_matches('/')
                ))
            })
    };

    let api_version = field(&doc, "/apiVersion")?;
    let kind_name = field(&doc, "/kind")?;
    let name = field(&doc, "/metadata/name")?;
    let kind = ResourceKind::from_type_meta(&api_version, &kind_name)?;

    let mut request = ResourceRequest::new(kind.clone()).name(name);
    if kind.is_namespaced() {
        let target = namespace
            .map(str::to_string)
            .or_else(|| {
                doc.pointer("/metadata/namespace")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        if let Some(ns) = target {
            doc["metadata"]["namespace"] = Value::String(ns.clone());
            request = request.namespace(ns);
        }
    }

    Ok(request.body(doc))
}
