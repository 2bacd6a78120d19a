//! CIResource Custom Resource Definition
//!
//! A CIResource is one pooled execution resource (machine, VM, bare-metal
//! lease). Its desired state is set by the pool manager or a consumer; its
//! observed state is owned by the resource state machine.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{CIResourceState, PoolRef, CIRESOURCE_FINALIZER};

/// Specification for a CIResource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "ofcir.openshift.io",
    version = "v1",
    kind = "CIResource",
    plural = "ciresources",
    shortname = "cir",
    status = "CIResourceStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Pool","type":"string","jsonPath":".spec.poolRef.name"}"#,
    printcolumn = r#"{"name":"Desired","type":"string","jsonPath":".spec.state"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Address","type":"string","jsonPath":".status.address"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CIResourceSpec {
    /// Desired state, never written by the state machine
    #[serde(default)]
    pub state: CIResourceState,

    /// Pool this resource belongs to
    #[serde(default)]
    pub pool_ref: PoolRef,
}

/// Observed state of a CIResource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CIResourceStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: CIResourceState,

    /// Provider handle, bound once acquisition has begun
    #[serde(default)]
    pub resource_id: String,

    /// Address reported by the provider once the resource is ready
    #[serde(default)]
    pub address: String,
}

impl CIResourceStatus {
    /// Create a new status in the given state
    pub fn with_state(state: CIResourceState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }
}

impl CIResource {
    /// Observed status, treating a missing status block as the initial state
    pub fn current_status(&self) -> CIResourceStatus {
        self.status.clone().unwrap_or_default()
    }

    /// Observed state, `None` when no status has been written yet
    pub fn current_state(&self) -> CIResourceState {
        self.status
            .as_ref()
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Returns true if deletion has been requested
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Returns true if the management finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|s| s == CIRESOURCE_FINALIZER))
    }

    /// Add the management finalizer if missing
    ///
    /// Returns true if the finalizer list changed.
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(CIRESOURCE_FINALIZER.to_string());
        true
    }

    /// Remove the management finalizer, leaving any other finalizers in place
    ///
    /// Returns true if the finalizer list changed.
    pub fn remove_finalizer(&mut self) -> bool {
        if !self.has_finalizer() {
            return false;
        }
        if let Some(finalizers) = self.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != CIRESOURCE_FINALIZER);
        }
        true
    }

    /// Finalizers as a slice, empty when unset
    pub fn finalizers(&self) -> &[String] {
        self.metadata.finalizers.as_deref().unwrap_or_default()
    }
}
