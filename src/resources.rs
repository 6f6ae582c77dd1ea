pub mod disk;
pub mod disk_attachment;
pub mod mns_topics;
pub mod oss_bucket;

use thiserror::Error;

pub use disk::DiskResource;
pub use disk_attachment::DiskAttachmentResource;
pub use mns_topics::MnsTopicsDataSource;
pub use oss_bucket::OssBucketResource;

use crate::alicloud::AlicloudError;
use crate::error::{ReconcileError, Result};
use crate::reconcile::Reconciler;

#[derive(Debug, Error)]
#[error("unknown resource type: {0}")]
pub struct UnknownResourceType(pub String);

pub const RESOURCE_TYPES: &[&str] = &[
    disk::RESOURCE_TYPE,
    disk_attachment::RESOURCE_TYPE,
    oss_bucket::RESOURCE_TYPE,
];

pub fn get_reconciler(resource_type: &str) -> Result<Box<dyn Reconciler>, UnknownResourceType> {
    match resource_type {
        disk::RESOURCE_TYPE => Ok(Box::new(DiskResource)),
        disk_attachment::RESOURCE_TYPE => Ok(Box::new(DiskAttachmentResource)),
        oss_bucket::RESOURCE_TYPE => Ok(Box::new(OssBucketResource)),
        other => Err(UnknownResourceType(other.to_string())),
    }
}

/// Turns a vendor not-found into `None`, keeping every other error.
pub(crate) fn found<T>(
    result: Result<T, AlicloudError>,
    operation: &str,
    id: &str,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(ReconcileError::vendor(operation, id, err)),
    }
}

/// Rejects values outside a fixed set.
pub(crate) fn one_of(attribute: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ReconcileError::validation(
            attribute,
            format!("{:?} must be one of {}", value, allowed.join(", ")),
        ))
    }
}
