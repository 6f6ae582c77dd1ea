//! Best-effort removal of buckets left behind by test runs.

use std::time::Duration;

use crate::alicloud::types::{BucketProperties, OSS_PAGE_SIZE, ObjectProperties};
use crate::alicloud::{AlicloudError, OssClient};
use crate::error::{ReconcileError, Result};
use crate::reconcile::{ProviderContext, collect_all};

/// Name prefixes of buckets created by acceptance tests.
pub const TEST_PREFIXES: &[&str] = &[
    "tf-testacc",
    "tf-test-",
    "test-bucket-",
    "tf-oss-test-",
    "tf-object-test-",
    "test-acc-alicloud-",
];

pub const DEFAULT_SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub skipped: Vec<String>,
    /// Bucket name and the error that stopped its deletion.
    pub failed: Vec<(String, String)>,
}

pub fn is_sweepable(name: &str) -> bool {
    let name = name.to_lowercase();
    TEST_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

async fn list_buckets(oss: &OssClient) -> Result<Vec<BucketProperties>, AlicloudError> {
    collect_all(|marker: Option<String>| async move {
        oss.list_buckets("", marker.as_deref(), OSS_PAGE_SIZE).await
    })
    .await
}

async fn list_objects(oss: &OssClient, bucket: &str) -> Result<Vec<ObjectProperties>, AlicloudError> {
    collect_all(|marker: Option<String>| async move {
        oss.list_objects(bucket, marker.as_deref(), OSS_PAGE_SIZE).await
    })
    .await
}

async fn empty_and_delete(oss: &OssClient, bucket: &str) -> Result<usize, AlicloudError> {
    let objects = list_objects(oss, bucket).await?;
    for object in &objects {
        oss.delete_object(bucket, &object.key).await?;
    }
    oss.delete_bucket(bucket).await?;
    Ok(objects.len())
}

/// Deletes every bucket whose name carries a test prefix, objects first.
///
/// Only the listing itself is fatal. A bucket that cannot be deleted is
/// recorded in the report and the sweep moves on. When anything was deleted
/// the sweep waits `settle` before returning.
pub async fn sweep_oss_buckets(ctx: &ProviderContext, settle: Duration) -> Result<SweepReport> {
    let buckets = ctx
        .client
        .with_oss(|oss| async move { list_buckets(&oss).await })
        .await
        .map_err(|e| ReconcileError::vendor("list buckets", "*", e))?;

    let mut report = SweepReport::default();
    for bucket in buckets {
        let name = bucket.name;
        if !is_sweepable(&name) {
            tracing::debug!(bucket = %name, "skipping bucket");
            report.skipped.push(name);
            continue;
        }

        tracing::info!(bucket = %name, "deleting bucket");
        let target = name.as_str();
        match ctx
            .client
            .with_oss(|oss| async move { empty_and_delete(&oss, target).await })
            .await
        {
            Ok(objects) => {
                tracing::debug!(bucket = %name, objects, "bucket deleted");
                report.deleted.push(name);
            }
            Err(e) => {
                tracing::warn!(bucket = %name, error = %e, "failed to delete bucket");
                report.failed.push((name, e.to_string()));
            }
        }
    }

    if !report.deleted.is_empty() {
        tokio::time::sleep(settle).await;
    }
    Ok(report)
}
