//! Error types for the ofcir operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the name of the CIResource (or pool) involved so the
//! driver's logs and events point at the right object.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for ofcir operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid or missing configuration on a CIResource or CIPool
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the object with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// Provisioning backend error
    #[error("provider error [{provider}] for {resource}: {message}")]
    Provider {
        /// Name of the CIResource being acquired or released
        resource: String,
        /// Provider backend (dummy, fake, ironic, ...)
        provider: String,
        /// Description of what failed
        message: String,
        /// Whether this error is retryable
        retryable: bool,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// The resource is in a shape the state machine can never produce
    #[error("invariant violated for {resource} in state {state}: {message}")]
    Invariant {
        /// Name of the CIResource
        resource: String,
        /// Observed status state
        state: String,
        /// Which invariant does not hold
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "controller", "events")
        context: String,
    },
}

impl Error {
    /// Create a validation error without resource context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error for a named object
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a retryable provider error with full context
    pub fn provider_for(
        resource: impl Into<String>,
        provider: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provider {
            resource: resource.into(),
            provider: provider.into(),
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create a non-retryable provider error (e.g., unsupported backend)
    pub fn provider_permanent(
        resource: impl Into<String>,
        provider: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provider {
            resource: resource.into(),
            provider: provider.into(),
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(
        resource: impl Into<String>,
        state: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Invariant {
            resource: resource.into(),
            state: state.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether retrying the same operation may succeed
    ///
    /// Validation and invariant errors need a spec or code change; the driver
    /// still requeues them, but they are logged at a higher severity.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube { .. } | Self::Internal { .. } => true,
            Self::Provider { retryable, .. } => *retryable,
            Self::Validation { .. } | Self::Serialization { .. } | Self::Invariant { .. } => false,
        }
    }
}
