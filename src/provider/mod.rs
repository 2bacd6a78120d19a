//! Provisioning backend abstraction layer
//!
//! This module provides a trait-based abstraction over the infrastructure that
//! actually hands out CI resources. Each backend implements the [`Provider`]
//! trait; the resource state machine only ever talks to that trait.
//!
//! # Supported Providers
//!
//! - [`DummyProvider`] - deterministic backend, ready immediately
//! - [`FakeProvider`] - simulated backend with configurable provisioning latency
//!
//! # Example
//!
//! ```text
//! let provider = create_provider(&pool, &secret)?;
//! let acquired = provider.acquire("cir-0").await?;
//! match provider.status(&acquired.id).await? {
//!     ProviderStatus::Ready { address } => ...,
//!     ProviderStatus::Pending => ...,
//!     ProviderStatus::Failed { reason } => ...,
//! }
//! ```

mod dummy;
mod fake;

pub use dummy::DummyProvider;
pub use fake::{FakeProvider, FakeProviderConfig};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;

#[cfg(test)]
use mockall::automock;

use crate::crd::{CIPool, ProviderType};
use crate::{Error, Result};

/// Handle returned by a provider when acquisition begins
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderResource {
    /// Opaque identifier, stored in `status.resourceId`
    pub id: String,
}

impl ProviderResource {
    /// Create a new handle
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Result of polling an in-flight acquisition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Resource is provisioned and reachable
    Ready {
        /// Address consumers should use to reach the resource
        address: String,
    },
    /// Acquisition still in progress
    Pending,
    /// Acquisition failed and will not complete
    Failed {
        /// Provider supplied explanation
        reason: String,
    },
}

/// Trait for provisioning backends
///
/// Implementations are bound to one pool's configuration and credentials at
/// construction time (see [`create_provider`]).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Begin acquiring a resource for the named CIResource
    ///
    /// The state machine calls this at most once per logical acquisition.
    async fn acquire(&self, resource_name: &str) -> Result<ProviderResource>;

    /// Poll an in-flight acquisition
    ///
    /// Must not have side effects beyond observation.
    async fn status(&self, resource_id: &str) -> Result<ProviderStatus>;

    /// Release a resource
    ///
    /// Idempotent: releasing an unknown or already released handle succeeds.
    async fn release(&self, resource_id: &str) -> Result<()>;

    /// Backend type, for logging and error context
    fn provider_type(&self) -> ProviderType;
}

/// Builds a [`Provider`] for a pool
///
/// The state machine goes through this trait so tests can substitute a mock
/// backend without a real pool configuration.
#[cfg_attr(test, automock)]
pub trait ProviderFactory: Send + Sync {
    /// Create the backend selected by `pool`, configured with `secret`
    fn create(&self, pool: &CIPool, secret: &Secret) -> Result<Box<dyn Provider>>;
}

/// Factory that dispatches on `pool.spec.provider`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, pool: &CIPool, secret: &Secret) -> Result<Box<dyn Provider>> {
        create_provider(pool, secret)
    }
}

/// Create a provider for the given pool
///
/// # Arguments
///
/// * `pool` - Pool whose `spec.provider` selects the backend and whose
///   `spec.providerInfo` configures it
/// * `secret` - Credentials, passed through unexamined
pub fn create_provider(pool: &CIPool, secret: &Secret) -> Result<Box<dyn Provider>> {
    use kube::ResourceExt;

    let provider_type = pool.spec.provider;
    match provider_type {
        ProviderType::Dummy => Ok(Box::new(DummyProvider::new())),
        ProviderType::Fake => Ok(Box::new(FakeProvider::from_pool(pool, secret)?)),
        ProviderType::Ironic | ProviderType::Equinix | ProviderType::IbmCloud => {
            Err(Error::provider_permanent(
                pool.name_any(),
                provider_type.to_string(),
                format!("{provider_type} provider not yet implemented"),
            ))
        }
    }
}
