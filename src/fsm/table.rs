//! Transition table for the CIResource state machine
//!
//! One handler per observed state. Handlers mutate only the working copy held
//! by [`Tick`] and reach infrastructure only through the [`Provider`] trait.

use k8s_openapi::api::core::v1::Secret;
use tracing::{debug, info, warn};

use crate::crd::{CIPool, CIResource, CIResourceState, CIResourceStatus};
use crate::provider::{Provider, ProviderFactory, ProviderStatus};
use crate::{Error, Result};

/// How soon the resource should be looked at again
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Requeue {
    /// Transient state, re-check after the default delay
    Poll,
    /// Stable state, wait for an external spec or deletion change
    Idle,
}

/// Working state for a single invocation of the state machine
pub(super) struct Tick<'a> {
    pub name: String,
    pub spec_state: CIResourceState,
    pub deleting: bool,
    /// Working copy whose finalizers may be edited
    pub resource: &'a mut CIResource,
    /// Working copy of the status facet
    pub status: &'a mut CIResourceStatus,
    pub pool: &'a CIPool,
    pub secret: &'a Secret,
    pub providers: &'a dyn ProviderFactory,
}

impl Tick<'_> {
    fn provider(&self) -> Result<Box<dyn Provider>> {
        self.providers.create(self.pool, self.secret)
    }

    fn move_to(&mut self, to: CIResourceState) {
        info!(from = %self.status.state, to = %to, "state transition");
        self.status.state = to;
    }

    fn clear_allocation(&mut self) {
        self.status.resource_id.clear();
        self.status.address.clear();
    }
}

/// Advance the resource by at most one step
///
/// A pending deletion pre-empts every spec-driven transition.
pub(super) async fn step(tick: &mut Tick<'_>) -> Result<Requeue> {
    let state = tick.status.state;
    if tick.deleting && state != CIResourceState::Delete {
        tick.move_to(CIResourceState::Delete);
        return Ok(Requeue::Poll);
    }

    match state {
        CIResourceState::None => Ok(handle_none(tick)),
        CIResourceState::Provisioning => handle_provisioning(tick).await,
        CIResourceState::ProvisioningWait => handle_provisioning_wait(tick).await,
        CIResourceState::Available => Ok(handle_available(tick)),
        CIResourceState::InUse => Ok(handle_in_use(tick)),
        CIResourceState::Maintenance => Ok(handle_maintenance(tick)),
        CIResourceState::Delete => handle_delete(tick).await,
    }
}

/// Take ownership first, start provisioning on the following tick
fn handle_none(tick: &mut Tick<'_>) -> Requeue {
    if tick.resource.add_finalizer() {
        info!("finalizer added");
    } else {
        tick.move_to(CIResourceState::Provisioning);
    }
    Requeue::Poll
}

async fn handle_provisioning(tick: &mut Tick<'_>) -> Result<Requeue> {
    // A bound id means acquire already ran and only the state write was lost.
    if !tick.status.resource_id.is_empty() {
        debug!(resource_id = %tick.status.resource_id, "acquisition already recorded");
        tick.move_to(CIResourceState::ProvisioningWait);
        return Ok(Requeue::Poll);
    }

    let provider = tick.provider()?;
    let acquired = provider.acquire(&tick.name).await?;
    info!(
        provider = %provider.provider_type(),
        resource_id = %acquired.id,
        "acquisition started"
    );

    tick.status.resource_id = acquired.id;
    tick.status.address.clear();
    tick.move_to(CIResourceState::ProvisioningWait);
    Ok(Requeue::Poll)
}

async fn handle_provisioning_wait(tick: &mut Tick<'_>) -> Result<Requeue> {
    if tick.status.resource_id.is_empty() {
        return Err(Error::invariant(
            &tick.name,
            CIResourceState::ProvisioningWait.to_string(),
            "resourceId is empty, nothing to poll",
        ));
    }

    let provider = tick.provider()?;
    match provider.status(&tick.status.resource_id).await? {
        ProviderStatus::Ready { address } => {
            tick.status.address = address;
            tick.move_to(CIResourceState::Available);
            Ok(Requeue::Idle)
        }
        ProviderStatus::Pending => {
            debug!(resource_id = %tick.status.resource_id, "still provisioning");
            Ok(Requeue::Poll)
        }
        ProviderStatus::Failed { reason } => {
            warn!(
                resource_id = %tick.status.resource_id,
                reason = %reason,
                "acquisition failed, releasing and retrying"
            );
            provider.release(&tick.status.resource_id).await?;
            tick.clear_allocation();
            tick.move_to(CIResourceState::Provisioning);
            Ok(Requeue::Poll)
        }
    }
}

fn handle_available(tick: &mut Tick<'_>) -> Requeue {
    match tick.spec_state {
        CIResourceState::Maintenance => tick.move_to(CIResourceState::Maintenance),
        CIResourceState::InUse => tick.move_to(CIResourceState::InUse),
        _ => return Requeue::Idle,
    }
    Requeue::Poll
}

fn handle_in_use(tick: &mut Tick<'_>) -> Requeue {
    if tick.spec_state != CIResourceState::Available {
        return Requeue::Idle;
    }
    tick.move_to(CIResourceState::Available);
    Requeue::Poll
}

fn handle_maintenance(tick: &mut Tick<'_>) -> Requeue {
    if tick.spec_state != CIResourceState::Available {
        return Requeue::Idle;
    }
    tick.move_to(CIResourceState::Available);
    Requeue::Poll
}

/// Release the allocation, then let the object go
///
/// The finalizer stays until release succeeds.
async fn handle_delete(tick: &mut Tick<'_>) -> Result<Requeue> {
    let mut changed = false;

    if !tick.status.resource_id.is_empty() {
        let provider = tick.provider()?;
        provider.release(&tick.status.resource_id).await?;
        info!(resource_id = %tick.status.resource_id, "resource released");
        tick.clear_allocation();
        changed = true;
    }

    if tick.resource.remove_finalizer() {
        info!("finalizer removed");
        changed = true;
    }

    Ok(if changed { Requeue::Poll } else { Requeue::Idle })
}
