//! CIResource state machine
//!
//! [`CIResourceFsm::process`] advances one CIResource by at most one step of
//! its lifecycle. The input object is never mutated; the next object is
//! returned in a [`Transition`] together with two dirty flags so the driver
//! persists only the facets that changed:
//!
//! ```text
//! None ──finalizer──► None ──► Provisioning ──acquire──► ProvisioningWait
//!                                   ▲                        │ ready
//!                                   └──── failed/release ────┤
//!                                                            ▼
//!                            Maintenance ◄──► Available ◄──► InUse
//!
//! any state ──deletionTimestamp──► Delete ──release, drop finalizer──► gone
//! ```

mod table;

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::crd::{CIPool, CIResource, CIResourceState};
use crate::provider::{DefaultProviderFactory, ProviderFactory};
use crate::{Error, DEFAULT_RETRY_DELAY};

use table::{Requeue, Tick};

/// Process-wide state machine settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsmConfig {
    /// Delay applied to every polling and backoff case
    pub retry_delay: Duration,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Outcome of one successful [`CIResourceFsm::process`] call
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Next version of the resource
    pub resource: CIResource,
    /// Metadata (finalizers) changed and must be persisted
    pub resource_dirty: bool,
    /// Status changed and must be persisted
    pub status_dirty: bool,
    /// Re-check after this delay; zero means wait for an external change
    pub retry_after: Duration,
}

impl Transition {
    /// Observed state after this step
    pub fn state(&self) -> CIResourceState {
        self.resource.current_state()
    }

    /// Returns true if nothing needs to be written back
    pub fn is_clean(&self) -> bool {
        !self.resource_dirty && !self.status_dirty
    }
}

/// Failed step, the caller keeps the original object
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ProcessError {
    /// What went wrong
    #[source]
    pub error: Error,
    /// Backoff before the next attempt
    pub retry_after: Duration,
}

/// Drives CIResources through their lifecycle
#[derive(Clone)]
pub struct CIResourceFsm {
    config: FsmConfig,
    providers: Arc<dyn ProviderFactory>,
}

impl CIResourceFsm {
    /// Create a state machine backed by the in-tree providers
    pub fn new(config: FsmConfig) -> Self {
        Self::with_factory(config, Arc::new(DefaultProviderFactory))
    }

    /// Create a state machine with a custom provider factory
    pub fn with_factory(config: FsmConfig, providers: Arc<dyn ProviderFactory>) -> Self {
        Self { config, providers }
    }

    /// Delay used for polling and backoff
    pub fn retry_delay(&self) -> Duration {
        self.config.retry_delay
    }

    /// Advance `cir` by at most one step
    ///
    /// `pool` selects and configures the provider, `secret` is handed to it
    /// unexamined. Provider calls happen only in states that need them.
    #[instrument(
        skip(self, cir, pool, secret),
        fields(resource = %cir.name_any(), state = %cir.current_state())
    )]
    pub async fn process(
        &self,
        cir: &CIResource,
        pool: &CIPool,
        secret: &Secret,
    ) -> Result<Transition, ProcessError> {
        let original_status = cir.current_status();
        let mut next = cir.clone();
        let mut status = original_status.clone();

        let requeue = {
            let mut tick = Tick {
                name: cir.name_any(),
                spec_state: cir.spec.state,
                deleting: cir.is_deleting(),
                resource: &mut next,
                status: &mut status,
                pool,
                secret,
                providers: self.providers.as_ref(),
            };
            table::step(&mut tick).await
        }
        .map_err(|error| ProcessError {
            error,
            retry_after: self.config.retry_delay,
        })?;

        let resource_dirty = next.finalizers() != cir.finalizers();
        let status_dirty = status != original_status;
        if status_dirty {
            next.status = Some(status);
        }

        let retry_after = match requeue {
            Requeue::Poll => self.config.retry_delay,
            Requeue::Idle => Duration::ZERO,
        };

        debug!(
            next_state = %next.current_state(),
            resource_dirty,
            status_dirty,
            retry_after = ?retry_after,
            "processed"
        );

        Ok(Transition {
            resource: next,
            resource_dirty,
            status_dirty,
            retry_after,
        })
    }
}

impl Default for CIResourceFsm {
    fn default() -> Self {
        Self::new(FsmConfig::default())
    }
}
