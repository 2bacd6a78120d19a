//! Supporting types shared by the CIResource and CIPool CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer placed on every CIResource under state machine management.
///
/// Blocks physical removal of the object until the provider-side allocation
/// has been released.
pub const CIRESOURCE_FINALIZER: &str = "ofcir.openshift.io/ciresource";

/// Lifecycle state of a CI resource
///
/// Used both as the desired state (`spec.state`, written by the pool manager
/// or a consumer) and the observed state (`status.state`, written only by the
/// state machine). States are ordered by the transition graph, not numerically.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum CIResourceState {
    /// Freshly created, not yet managed
    #[default]
    #[serde(rename = "")]
    None,
    /// Acquisition requested
    Provisioning,
    /// Acquisition in flight, waiting for the provider to confirm
    ProvisioningWait,
    /// Ready to be leased
    Available,
    /// Leased to a consumer
    InUse,
    /// Temporarily withdrawn from the pool
    Maintenance,
    /// Release in progress
    Delete,
}

impl CIResourceState {
    /// Returns true if a provider-side allocation may exist in this state
    ///
    /// `status.resourceId` is non-empty exactly in these states.
    pub fn holds_allocation(&self) -> bool {
        matches!(
            self,
            Self::ProvisioningWait | Self::Available | Self::InUse | Self::Maintenance
        )
    }
}

impl std::fmt::Display for CIResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Provisioning => write!(f, "Provisioning"),
            Self::ProvisioningWait => write!(f, "ProvisioningWait"),
            Self::Available => write!(f, "Available"),
            Self::InUse => write!(f, "InUse"),
            Self::Maintenance => write!(f, "Maintenance"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// Supported provisioning backends
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Deterministic backend that is ready immediately
    #[default]
    Dummy,
    /// Simulated backend with configurable provisioning latency
    Fake,
    /// Bare-metal hosts managed by Ironic
    Ironic,
    /// Equinix Metal servers
    Equinix,
    /// IBM Cloud virtual servers
    #[serde(rename = "ibmcloud")]
    IbmCloud,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "dummy"),
            Self::Fake => write!(f, "fake"),
            Self::Ironic => write!(f, "ironic"),
            Self::Equinix => write!(f, "equinix"),
            Self::IbmCloud => write!(f, "ibmcloud"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dummy" => Ok(Self::Dummy),
            "fake" => Ok(Self::Fake),
            "ironic" => Ok(Self::Ironic),
            "equinix" => Ok(Self::Equinix),
            "ibmcloud" => Ok(Self::IbmCloud),
            _ => Err(crate::Error::validation(format!(
                "invalid provider type: {s}, expected one of: dummy, fake, ironic, equinix, ibmcloud"
            ))),
        }
    }
}

/// Reference to the CIPool that owns a CIResource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PoolRef {
    /// Name of the CIPool in the same namespace
    pub name: String,
}
