//! Deterministic no-op provider
//!
//! Exists to exercise the resource state machine without real
//! infrastructure: acquisition always succeeds, every handle is immediately
//! ready and release never fails.

use async_trait::async_trait;
use tracing::debug;

use super::{Provider, ProviderResource, ProviderStatus};
use crate::crd::ProviderType;
use crate::Result;

/// Prefix of every handle produced by the dummy provider
pub const DUMMY_RESOURCE_PREFIX: &str = "dummy-";

/// Address reported for every ready dummy resource
const DUMMY_ADDRESS: &str = "127.0.0.1";

/// Deterministic provider for tests and local development
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyProvider;

impl DummyProvider {
    /// Create a new DummyProvider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for DummyProvider {
    async fn acquire(&self, resource_name: &str) -> Result<ProviderResource> {
        let id = format!("{DUMMY_RESOURCE_PREFIX}{resource_name}");
        debug!(resource = %resource_name, resource_id = %id, "dummy acquire");
        Ok(ProviderResource::new(id))
    }

    async fn status(&self, _resource_id: &str) -> Result<ProviderStatus> {
        Ok(ProviderStatus::Ready {
            address: DUMMY_ADDRESS.to_string(),
        })
    }

    async fn release(&self, resource_id: &str) -> Result<()> {
        debug!(resource_id = %resource_id, "dummy release");
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Dummy
    }
}
