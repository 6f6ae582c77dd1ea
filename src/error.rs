use std::time::Duration;

use thiserror::Error;

use crate::alicloud::AlicloudError;
use crate::reconcile::{LifecycleEvent, LifecycleState};

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Transport or credential failure. Never retried.
    #[error("connectivity error during {operation} of {id}: {source}")]
    Connectivity {
        operation: String,
        id: String,
        source: AlicloudError,
    },

    #[error("{operation} of {id} failed: {source}")]
    Vendor {
        operation: String,
        id: String,
        source: AlicloudError,
    },

    /// Declared attributes rejected before any vendor call.
    #[error("invalid attribute `{attribute}`: {message}")]
    Validation { attribute: String, message: String },

    #[error("timed out after {timeout:?} waiting for {operation} of {id} (last observed: {last_status})")]
    Timeout {
        operation: String,
        id: String,
        timeout: Duration,
        last_status: String,
    },

    #[error("{resource_type} {id} still exists")]
    StillPresent { resource_type: String, id: String },

    #[error("invalid lifecycle transition from {from:?} on {event:?} for {id}")]
    Lifecycle {
        id: String,
        from: LifecycleState,
        event: LifecycleEvent,
    },

    #[error("state error: {0}")]
    State(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Wraps a vendor error with the entity and operation it belongs to.
    pub fn vendor(operation: &str, id: &str, source: AlicloudError) -> Self {
        if source.is_connectivity() {
            Self::Connectivity {
                operation: operation.to_string(),
                id: id.to_string(),
                source,
            }
        } else {
            Self::Vendor {
                operation: operation.to_string(),
                id: id.to_string(),
                source,
            }
        }
    }

    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn vendor_source(&self) -> Option<&AlicloudError> {
        match self {
            Self::Vendor { source, .. } | Self::Connectivity { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.vendor_source().is_some_and(AlicloudError::is_not_found)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
