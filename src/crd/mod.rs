//! Custom Resource Definitions for ofcir
//!
//! This module contains the CRDs consumed by the resource state machine.

mod pool;
mod resource;
mod types;

pub use pool::{CIPool, CIPoolSpec};
pub use resource::{CIResource, CIResourceSpec, CIResourceStatus};
pub use types::{CIResourceState, PoolRef, ProviderType, CIRESOURCE_FINALIZER};
