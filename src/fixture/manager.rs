// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Scoped fixtures that always clean up after themselves.
//!
//! [`FixtureManager::scope`] provisions resources, waits for them to converge,
//! runs the test body and then tears everything down in reverse creation
//! order. Teardown runs when the body succeeds, when it fails, when
//! provisioning fails halfway, and when the body panics. A panic is re-raised
//! once teardown has finished.

use super::context::{FixtureContext, FixtureState};
use super::teardown::{run_teardown, TeardownReport};
use crate::config::HarnessConfig;
use crate::constants::NAMESPACE_PREFIX;
use crate::error::{HarnessError, Result};
use crate::kubernetes::{namespace_request, unique_name, ResourceClient};
use crate::manifests::parse_documents;
use crate::types::{DeleteOutcome, QueryOptions, ResourceHandle, ResourceRequest};
use crate::wait::{ConvergenceWaiter, Outcome, WaitCondition};
use futures::FutureExt;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

/// Fixture behaviour shared by every scope of a manager
#[derive(Debug, Clone)]
pub struct FixtureSettings {
    pub namespace_prefix: String,
    /// Wait for each deleted resource to disappear before the next step
    pub await_deletion: bool,
    /// Options sent with every teardown delete
    pub delete_options: QueryOptions,
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            namespace_prefix: NAMESPACE_PREFIX.to_string(),
            await_deletion: false,
            delete_options: QueryOptions::default(),
        }
    }
}

impl FixtureSettings {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            namespace_prefix: config.namespace_prefix.clone(),
            await_deletion: config.await_deletion,
            delete_options: QueryOptions::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("provisioning failed: {error}{}", .teardown.trailer())]
    Provisioning {
        #[source]
        error: HarnessError,
        teardown: TeardownReport,
    },

    #[error("test body failed: {error:#}{}", .teardown.trailer())]
    Body {
        error: anyhow::Error,
        teardown: TeardownReport,
    },

    #[error("{0}")]
    Teardown(TeardownReport),
}

impl ScopeError {
    pub fn teardown(&self) -> &TeardownReport {
        match self {
            ScopeError::Provisioning { teardown, .. } => teardown,
            ScopeError::Body { teardown, .. } => teardown,
            ScopeError::Teardown(report) => report,
        }
    }
}

/// Runs fixtures against one cluster. Cheap to clone; scopes are independent.
#[derive(Clone)]
pub struct FixtureManager {
    resources: ResourceClient,
    waiter: ConvergenceWaiter,
    settings: Arc<FixtureSettings>,
}

impl FixtureManager {
    pub fn new(
        resources: ResourceClient,
        waiter: ConvergenceWaiter,
        settings: FixtureSettings,
    ) -> Self {
        Self {
            resources,
            waiter,
            settings: Arc::new(settings),
        }
    }

    /// Provision, wait, run `body`, then tear down unconditionally
    pub async fn scope<P, PFut, B, BFut, T>(
        &self,
        provision: P,
        body: B,
    ) -> std::result::Result<T, ScopeError>
    where
        P: FnOnce(Provisioner) -> PFut,
        PFut: Future<Output = Result<()>>,
        B: FnOnce(Provisioner) -> BFut,
        BFut: Future<Output = anyhow::Result<T>>,
    {
        let provisioner = self.provisioner();
        let fixture = provisioner.id();

        provisioner
            .transition(FixtureState::Provisioning)
            .map_err(|error| ScopeError::Provisioning {
                error,
                teardown: TeardownReport::default(),
            })?;
        info!(%fixture, "Provisioning fixture");

        let provisioned = AssertUnwindSafe(async {
            provision(provisioner.clone()).await?;
            provisioner.await_registered().await
        })
        .catch_unwind()
        .await;

        match provisioned {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(%fixture, "Provisioning failed: {}", error);
                let teardown = self.teardown(&provisioner).await;
                return Err(ScopeError::Provisioning { error, teardown });
            }
            Err(panic) => {
                let teardown = self.teardown(&provisioner).await;
                if !teardown.is_clean() {
                    error!(%fixture, "{}", teardown);
                }
                resume_unwind(panic);
            }
        }

        if let Err(error) = provisioner.transition(FixtureState::Ready) {
            let teardown = self.teardown(&provisioner).await;
            return Err(ScopeError::Provisioning { error, teardown });
        }
        info!(%fixture, resources = provisioner.handles().len(), "Fixture ready");

        let result = AssertUnwindSafe(body(provisioner.clone()))
            .catch_unwind()
            .await;
        let teardown = self.teardown(&provisioner).await;

        match result {
            Ok(Ok(value)) if teardown.is_clean() => Ok(value),
            Ok(Ok(_)) => Err(ScopeError::Teardown(teardown)),
            Ok(Err(error)) => Err(ScopeError::Body { error, teardown }),
            Err(panic) => {
                if !teardown.is_clean() {
                    error!(%fixture, "{}", teardown);
                }
                resume_unwind(panic)
            }
        }
    }

    fn provisioner(&self) -> Provisioner {
        Provisioner {
            resources: self.resources.clone(),
            waiter: self.waiter.clone(),
            settings: self.settings.clone(),
            context: Arc::new(Mutex::new(FixtureContext::new(unique_name("fixture")))),
            namespace: Arc::new(OnceCell::new()),
        }
    }

    #[instrument(skip_all, fields(fixture = %provisioner.id()))]
    async fn teardown(&self, provisioner: &Provisioner) -> TeardownReport {
        let steps = {
            let mut ctx = provisioner.lock();
            if let Err(e) = ctx.transition(FixtureState::TearingDown) {
                warn!("{}", e);
            }
            ctx.take_steps()
        };

        let report = run_teardown(
            &self.resources,
            &self.waiter,
            steps,
            &self.settings.delete_options,
            self.settings.await_deletion,
        )
        .await;

        if let Err(e) = provisioner.transition(FixtureState::Done) {
            warn!("{}", e);
        }
        if report.is_clean() {
            info!("{}", report);
        } else {
            warn!("{}", report);
        }
        report
    }
}

/// Handle given to provisioning and body closures.
///
/// Every resource created through it is tracked for teardown. Clones share
/// the same fixture.
#[derive(Clone)]
pub struct Provisioner {
    resources: ResourceClient,
    waiter: ConvergenceWaiter,
    settings: Arc<FixtureSettings>,
    context: Arc<Mutex<FixtureContext>>,
    namespace: Arc<OnceCell<String>>,
}

impl Provisioner {
    fn lock(&self) -> MutexGuard<'_, FixtureContext> {
        // a panic elsewhere must not prevent teardown
        self.context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, next: FixtureState) -> Result<()> {
        self.lock().transition(next)
    }

    pub fn id(&self) -> String {
        self.lock().id().to_string()
    }

    pub fn state(&self) -> FixtureState {
        self.lock().state()
    }

    /// Tracked handles in creation order
    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.lock().handles()
    }

    /// Client for reads and untracked writes
    pub fn resources(&self) -> &ResourceClient {
        &self.resources
    }

    /// The fixture's own namespace, created on first use
    pub async fn namespace(&self) -> Result<String> {
        self.namespace
            .get_or_try_init(|| async {
                let name = unique_name(&self.settings.namespace_prefix);
                let handle = self.create(namespace_request(&name, &self.id())).await?;
                Ok::<_, HarnessError>(handle.name)
            })
            .await
            .cloned()
    }

    /// Create a resource and track it for teardown. Dry runs persist nothing
    /// and are not tracked.
    pub async fn create(&self, req: ResourceRequest) -> Result<ResourceHandle> {
        self.lock().ensure_accepting()?;
        let handle = self.resources.create(&req).await?;
        self.track_persisted(&req, &handle);
        Ok(handle)
    }

    /// Replace a resource; an already tracked resource keeps its teardown
    /// position with the refreshed handle
    pub async fn replace(&self, req: ResourceRequest) -> Result<ResourceHandle> {
        self.lock().ensure_accepting()?;
        let handle = self.resources.replace(&req).await?;
        self.track_persisted(&req, &handle);
        Ok(handle)
    }

    fn track_persisted(&self, req: &ResourceRequest, handle: &ResourceHandle) {
        if req.options.dry_run.is_some() {
            debug!("Dry run of {} is not tracked", handle);
            return;
        }
        self.lock().track(handle.clone());
    }

    /// Create every document of a YAML manifest inside the fixture namespace
    pub async fn create_from_yaml(&self, yaml: &str) -> Result<Vec<ResourceHandle>> {
        let namespace = self.namespace().await?;
        let requests = parse_documents(yaml, Some(&namespace))?;

        let mut handles = Vec::with_capacity(requests.len());
        for req in requests {
            handles.push(self.create(req).await?);
        }
        Ok(handles)
    }

    /// Run `action` during teardown, at its position in the teardown stack
    pub fn defer<F, Fut>(&self, description: impl Into<String>, action: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut ctx = self.lock();
        ctx.ensure_accepting()?;
        ctx.defer(description.into(), Box::new(move || action().boxed()));
        Ok(())
    }

    /// Register a condition the scope awaits once provisioning returns
    pub fn wait_until(&self, condition: WaitCondition) -> Result<()> {
        let mut ctx = self.lock();
        if ctx.state() != FixtureState::Provisioning {
            return Err(HarnessError::Validation(format!(
                "conditions can only be registered while provisioning, fixture {} is {}",
                ctx.id(),
                ctx.state()
            )));
        }
        ctx.add_condition(condition);
        Ok(())
    }

    /// Wait for a condition now
    pub async fn wait_for(&self, condition: &WaitCondition) -> Result<Outcome> {
        self.waiter.wait_for(condition).await
    }

    /// Delete a tracked resource now and drop it from teardown
    pub async fn release(&self, handle: &ResourceHandle) -> Result<DeleteOutcome> {
        self.lock().ensure_accepting()?;
        let outcome = self
            .resources
            .delete_handle(handle, &self.settings.delete_options)
            .await?;
        self.lock().untrack(handle);
        Ok(outcome)
    }

    async fn await_registered(&self) -> Result<()> {
        let conditions = self.lock().take_conditions();
        for condition in &conditions {
            self.waiter.wait_for(condition).await?;
        }
        Ok(())
    }
}
