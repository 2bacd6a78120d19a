//! Kubernetes Event recording for the CIResource controller.
//!
//! Provides a trait-based abstraction over `kube::runtime::events::Recorder`
//! so state changes show up in `kubectl describe cir` and
//! `kubectl get events`.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate errors. A failed event must never break reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::crd::CIResourceState;

/// Trait for publishing Kubernetes Events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (e.g. "ResourceAvailable")
    /// * `action` - What action was taken (e.g. "Provision")
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as `controller_name`
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Publisher that drops every event, for local runs without RBAC on events
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// Acquisition requested from the provider
    pub const PROVISIONING_STARTED: &str = "ProvisioningStarted";
    /// Provider accepted the acquisition and returned a handle
    pub const PROVISIONING_WAIT: &str = "ProvisioningWait";
    /// Resource is ready to be leased
    pub const RESOURCE_AVAILABLE: &str = "ResourceAvailable";
    /// Resource leased to a consumer
    pub const RESOURCE_IN_USE: &str = "ResourceInUse";
    /// Resource withdrawn for maintenance
    pub const MAINTENANCE_STARTED: &str = "MaintenanceStarted";
    /// Deletion observed, release pending
    pub const DELETION_STARTED: &str = "DeletionStarted";
    /// Provider allocation released, finalizer removed
    pub const RESOURCE_RELEASED: &str = "ResourceReleased";
    /// Provider call failed
    pub const PROVIDER_ERROR: &str = "ProviderError";
    /// Pool or resource configuration is invalid
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
    /// Any other reconciliation failure
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
}

/// Well-known event action strings.
pub mod actions {
    /// Standard reconciliation loop
    pub const RECONCILE: &str = "Reconcile";
    /// Acquiring or polling provider resources
    pub const PROVISION: &str = "Provision";
    /// Moving between Available, InUse and Maintenance
    pub const LEASE: &str = "Lease";
    /// Releasing provider resources
    pub const RELEASE: &str = "Release";
}

/// Reason and action describing entry into `state`
pub fn state_change_reason(state: CIResourceState) -> Option<(&'static str, &'static str)> {
    match state {
        CIResourceState::None => None,
        CIResourceState::Provisioning => Some((reasons::PROVISIONING_STARTED, actions::PROVISION)),
        CIResourceState::ProvisioningWait => Some((reasons::PROVISIONING_WAIT, actions::PROVISION)),
        CIResourceState::Available => Some((reasons::RESOURCE_AVAILABLE, actions::LEASE)),
        CIResourceState::InUse => Some((reasons::RESOURCE_IN_USE, actions::LEASE)),
        CIResourceState::Maintenance => Some((reasons::MAINTENANCE_STARTED, actions::LEASE)),
        CIResourceState::Delete => Some((reasons::DELETION_STARTED, actions::RELEASE)),
    }
}
