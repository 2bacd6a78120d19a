//! Controller implementations for ofcir CRDs
//!
//! Controllers follow the Kubernetes controller pattern with observe-diff-act
//! loops. The decisions live in [`crate::fsm`]; this module only reads inputs
//! from the API server and writes results back.

mod resource;

pub use resource::{error_policy, reconcile, Context, KubeClient, KubeClientImpl, FIELD_MANAGER};
