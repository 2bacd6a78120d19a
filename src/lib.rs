//! ofcir - Kubernetes operator for pooled CI resources
//!
//! A CIResource is one machine, VM or bare-metal lease drawn from a CIPool.
//! The operator acquires it from the pool's provisioning backend, tracks it
//! while consumers lease it, and releases it when the object is deleted.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (CIResource, CIPool)
//! - [`fsm`] - Resource lifecycle state machine
//! - [`provider`] - Provisioning backend abstractions (dummy, fake)
//! - [`controller`] - Kubernetes controller reconciliation logic
//! - [`events`] - Kubernetes Event publishing
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod events;
pub mod fsm;
pub mod provider;

use std::time::Duration;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default delay before a resource in a transient state is re-checked
///
/// Also the backoff applied after a failed step.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
