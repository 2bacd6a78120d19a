//! Simulated provider with provisioning latency
//!
//! The fake backend keeps no state of its own. The acquisition time is
//! encoded into the handle (`fake-<name>-<unix seconds>`), and a poll reports
//! `Ready` once the configured delay has elapsed since then. This lets a
//! cluster without real infrastructure walk resources through the
//! `ProvisioningWait` polling path.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use serde::Deserialize;
use tracing::debug;

use super::{Provider, ProviderResource, ProviderStatus};
use crate::crd::{CIPool, ProviderType};
use crate::{Error, Result};

const FAKE_RESOURCE_PREFIX: &str = "fake-";

fn default_provision_delay_secs() -> u64 {
    30
}

fn default_address() -> String {
    "192.0.2.1".to_string()
}

/// Fake backend settings, read from the pool's `providerInfo` JSON
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FakeProviderConfig {
    /// Seconds between acquisition and readiness
    #[serde(default = "default_provision_delay_secs")]
    pub provision_delay_secs: u64,

    /// Address reported once ready
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for FakeProviderConfig {
    fn default() -> Self {
        Self {
            provision_delay_secs: default_provision_delay_secs(),
            address: default_address(),
        }
    }
}

impl FakeProviderConfig {
    /// Parse provider info; an empty blob yields the defaults
    pub fn parse(provider_info: &str) -> Result<Self> {
        if provider_info.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(provider_info)
            .map_err(|e| Error::serialization(format!("invalid fake provider info: {e}")))
    }
}

/// Simulated provider
#[derive(Clone, Debug)]
pub struct FakeProvider {
    config: FakeProviderConfig,
    fixed_now: Option<i64>,
}

impl FakeProvider {
    /// Create a fake provider with explicit settings
    pub fn new(config: FakeProviderConfig) -> Self {
        Self {
            config,
            fixed_now: None,
        }
    }

    /// Create a fake provider from a pool's `providerInfo`
    ///
    /// The secret is accepted for parity with real backends and ignored.
    pub fn from_pool(pool: &CIPool, _secret: &Secret) -> Result<Self> {
        let config = FakeProviderConfig::parse(&pool.spec.provider_info).map_err(|e| {
            Error::provider_permanent(pool.name_any(), ProviderType::Fake.to_string(), e.to_string())
        })?;
        Ok(Self::new(config))
    }

    /// Pin the clock, for tests
    #[cfg(test)]
    fn at(mut self, unix_secs: i64) -> Self {
        self.fixed_now = Some(unix_secs);
        self
    }

    fn now(&self) -> i64 {
        self.fixed_now
            .unwrap_or_else(|| chrono::Utc::now().timestamp())
    }

    /// Extract the acquisition time from a handle
    fn acquired_at(resource_id: &str) -> Option<i64> {
        resource_id
            .strip_prefix(FAKE_RESOURCE_PREFIX)?
            .rsplit_once('-')?
            .1
            .parse()
            .ok()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn acquire(&self, resource_name: &str) -> Result<ProviderResource> {
        let id = format!("{FAKE_RESOURCE_PREFIX}{resource_name}-{}", self.now());
        debug!(resource = %resource_name, resource_id = %id, "fake acquire");
        Ok(ProviderResource::new(id))
    }

    async fn status(&self, resource_id: &str) -> Result<ProviderStatus> {
        let Some(acquired_at) = Self::acquired_at(resource_id) else {
            return Ok(ProviderStatus::Failed {
                reason: format!("unrecognised fake resource id {resource_id}"),
            });
        };

        let elapsed = self.now().saturating_sub(acquired_at);
        let delay = i64::try_from(self.config.provision_delay_secs).unwrap_or(i64::MAX);
        if elapsed >= delay {
            Ok(ProviderStatus::Ready {
                address: self.config.address.clone(),
            })
        } else {
            debug!(resource_id = %resource_id, elapsed, delay, "fake resource still provisioning");
            Ok(ProviderStatus::Pending)
        }
    }

    async fn release(&self, resource_id: &str) -> Result<()> {
        debug!(resource_id = %resource_id, "fake release");
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Fake
    }
}
