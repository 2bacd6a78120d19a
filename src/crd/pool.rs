//! CIPool Custom Resource Definition
//!
//! A CIPool groups CIResources backed by the same provisioning backend. For
//! the resource state machine it is read-only configuration: which provider
//! to use and the provider-specific settings to hand it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ProviderType;

/// Specification for a CIPool
///
/// Example:
/// ```yaml
/// apiVersion: ofcir.openshift.io/v1
/// kind: CIPool
/// metadata:
///   name: fake-pool
/// spec:
///   provider: fake
///   providerInfo: '{"provisionDelaySecs": 90, "address": "192.0.2.10"}'
///   credentialsSecretRef: fake-pool-secret
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "ofcir.openshift.io",
    version = "v1",
    kind = "CIPool",
    plural = "cipools",
    shortname = "cip",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CIPoolSpec {
    /// Provisioning backend for every resource in this pool
    pub provider: ProviderType,

    /// Provider-specific configuration, passed through to the backend
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider_info: String,

    /// Name of the Secret holding provider credentials, in the pool's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<String>,
}

impl CIPoolSpec {
    /// Validate the pool specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(ref name) = self.credentials_secret_ref {
            if name.trim().is_empty() {
                return Err(crate::Error::validation(
                    "credentialsSecretRef must not be empty when set",
                ));
            }
        }
        Ok(())
    }
}
