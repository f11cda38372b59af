// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create, replace and delete arbitrary namespaced resources.
//!
//! Every operation validates its input before touching the network: missing
//! names, namespaces or bodies and options the verb does not accept fail with
//! a caller error and no request is sent.

use crate::config::HarnessConfig;
use crate::constants::content;
use crate::error::{HarnessError, Result};
use crate::types::{
    DeleteOutcome, QueryOptions, ResourceHandle, ResourceKind, ResourceRequest, Verb,
};
use http::{header, Method, Request};
use kube::core::{DynamicObject, ObjectList};
use kube::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

/// Typed write access to cluster resources
#[derive(Clone)]
pub struct ResourceClient {
    client: Client,
    accept: String,
    field_manager: Option<String>,
}

impl ResourceClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            accept: content::ACCEPT.to_string(),
            field_manager: None,
        }
    }

    pub fn from_config(client: Client, config: &HarnessConfig) -> Self {
        Self::new(client)
            .with_accept(&config.accept)
            .with_field_manager(&config.field_manager)
    }

    /// Override the `Accept` header sent with every request
    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = accept.to_string();
        self
    }

    /// Field manager recorded on writes that do not name one
    pub fn with_field_manager(mut self, field_manager: &str) -> Self {
        self.field_manager = Some(field_manager.to_string());
        self
    }

    pub fn kube_client(&self) -> &Client {
        &self.client
    }

    /// Create a resource in its collection
    #[instrument(skip(self, req), fields(kind = %req.kind, namespace = ?req.namespace))]
    pub async fn create(&self, req: &ResourceRequest) -> Result<ResourceHandle> {
        req.options.check(Verb::Create)?;
        let body = require_body(req, Verb::Create)?;
        let path = req.kind.collection_path(req.path_namespace())?;

        let object: DynamicObject = self
            .send(Method::POST, &path, &req.options, Verb::Create, Some(body))
            .await?;
        let handle = ResourceHandle::from_object(req.kind.clone(), &object)?;

        info!("Created {}", handle);
        Ok(handle)
    }

    /// Replace the full state of a named resource
    #[instrument(
        skip(self, req),
        fields(kind = %req.kind, namespace = ?req.namespace, name = ?req.name)
    )]
    pub async fn replace(&self, req: &ResourceRequest) -> Result<ResourceHandle> {
        req.options.check(Verb::Replace)?;
        let name = require_name(req, Verb::Replace)?;
        let body = require_body(req, Verb::Replace)?;
        let path = req.kind.item_path(req.path_namespace(), name)?;

        let object: DynamicObject = match self
            .send(Method::PUT, &path, &req.options, Verb::Replace, Some(body))
            .await
        {
            Ok(object) => object,
            Err(e) if e.status_code() == Some(409) => {
                return Err(HarnessError::Conflict {
                    resource: describe(req, name),
                    message: e.to_string(),
                })
            }
            Err(e) => return Err(e),
        };
        let handle = ResourceHandle::from_object(req.kind.clone(), &object)?;

        info!("Replaced {}", handle);
        Ok(handle)
    }

    /// Delete a named resource. A resource that is already gone is not an error.
    #[instrument(
        skip(self, req),
        fields(kind = %req.kind, namespace = ?req.namespace, name = ?req.name)
    )]
    pub async fn delete(&self, req: &ResourceRequest) -> Result<DeleteOutcome> {
        req.options.check(Verb::Delete)?;
        let name = require_name(req, Verb::Delete)?;
        let path = req.kind.item_path(req.path_namespace(), name)?;

        match self
            .send::<serde_json::Value>(Method::DELETE, &path, &req.options, Verb::Delete, None)
            .await
        {
            Ok(_) => {
                info!("Deleted {}", describe(req, name));
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                debug!("{} already absent", describe(req, name));
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", describe(req, name), e);
                Err(e)
            }
        }
    }

    pub async fn delete_handle(
        &self,
        handle: &ResourceHandle,
        options: &QueryOptions,
    ) -> Result<DeleteOutcome> {
        self.delete(&handle.to_request().options(options.clone())).await
    }

    /// Fresh read of a single resource, `None` when it does not exist
    pub async fn get(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        let namespace = if kind.is_namespaced() { namespace } else { None };
        let path = kind.item_path(namespace, name)?;
        let request = self.build(Method::GET, &path, String::new(), None)?;

        match self.client.request::<DynamicObject>(request).await {
            Ok(object) => Ok(Some(object)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fresh read of a resource collection
    pub async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let namespace = if kind.is_namespaced() { namespace } else { None };
        let path = kind.collection_path(namespace)?;
        let request = self.build(Method::GET, &path, String::new(), None)?;

        let list: ObjectList<DynamicObject> = self.client.request(request).await?;
        Ok(list.items)
    }

    /// Create every request in order, stopping at the first failure
    pub async fn apply_all(&self, requests: &[ResourceRequest]) -> Result<Vec<ResourceHandle>> {
        let mut handles = Vec::with_capacity(requests.len());
        for req in requests {
            handles.push(self.create(req).await?);
        }
        Ok(handles)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: &QueryOptions,
        verb: Verb,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let query = options.to_query(verb, self.field_manager.as_deref());
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HarnessError::Validation(format!("unserializable body: {}", e)))?;
        let request = self.build(method, path, query, body)?;

        Ok(self.client.request(request).await?)
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        query: String,
        body: Option<Vec<u8>>,
    ) -> Result<Request<Vec<u8>>> {
        let uri = if query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query)
        };

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, &self.accept);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, content::JSON);
        }

        builder
            .body(body.unwrap_or_default())
            .map_err(|e| HarnessError::Validation(format!("invalid request: {}", e)))
    }
}

fn require_name(req: &ResourceRequest, verb: Verb) -> Result<&str> {
    match req.name.as_deref() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(HarnessError::Validation(format!(
            "missing the required parameter `name` when calling {} on {}",
            verb, req.kind
        ))),
    }
}

fn require_body(req: &ResourceRequest, verb: Verb) -> Result<&serde_json::Value> {
    match &req.body {
        Some(body) if body.is_object() => Ok(body),
        Some(_) => Err(HarnessError::Validation(format!(
            "body for {} on {} must be an object",
            verb, req.kind
        ))),
        None => Err(HarnessError::Validation(format!(
            "missing the required parameter `body` when calling {} on {}",
            verb, req.kind
        ))),
    }
}

fn describe(req: &ResourceRequest, name: &str) -> String {
    match req.path_namespace() {
        Some(ns) => format!("{} {}/{}", req.kind, ns, name),
        None => format!("{} {}", req.kind, name),
    }
}
