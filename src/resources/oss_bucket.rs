//! `alicloud_oss_bucket`: an OSS bucket and its sub-configurations.

pub mod mapper;

use async_trait::async_trait;

use crate::alicloud::AlicloudError;
use crate::alicloud::types::{PutBucketRequest, RefererConfiguration};
use crate::error::{ReconcileError, Result};
use crate::reconcile::{ProviderContext, Reconciler};
use crate::resource::{AttributeDiff, AttributeSet};

use super::{found, one_of};
use mapper::BucketSnapshot;

pub const RESOURCE_TYPE: &str = "alicloud_oss_bucket";

pub const ACLS: &[&str] = &["private", "public-read", "public-read-write"];
pub const DEFAULT_ACL: &str = "private";
pub const STORAGE_CLASSES: &[&str] = &["Standard", "IA", "Archive"];
pub const CORS_METHODS: &[&str] = &["GET", "PUT", "DELETE", "POST", "HEAD"];

/// Codes OSS returns when a bucket simply has no such sub-configuration.
const SUB_CONFIG_MISSING: &[&str] = &[
    "NoSuchCORSConfiguration",
    "NoSuchWebsiteConfiguration",
    "NoSuchLifecycle",
    "NoSuchBucketLogging",
    "NoSuchReferer",
];

pub struct OssBucketResource;

pub fn validate_bucket_name(name: &str) -> Result<()> {
    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    let valid_edges = !name.starts_with('-') && !name.ends_with('-');

    if !(3..=63).contains(&name.len()) || !valid_chars || !valid_edges {
        return Err(ReconcileError::validation(
            "bucket",
            format!(
                "{:?} must be 3-63 lowercase letters, digits or hyphens, not starting or ending with a hyphen",
                name
            ),
        ));
    }
    Ok(())
}

fn is_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let number = |range: std::ops::Range<usize>| {
        value
            .get(range)
            .filter(|part| part.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|part| part.parse::<u32>().ok())
    };
    matches!(
        (number(0..4), number(5..7), number(8..10)),
        (Some(_), Some(1..=12), Some(1..=31))
    )
}

fn validate_cors(rules: &[AttributeSet]) -> Result<()> {
    for rule in rules {
        if rule.get_strs("allowed_origins")?.is_empty() {
            return Err(ReconcileError::validation(
                "cors_rule.allowed_origins",
                "at least one origin is required",
            ));
        }
        let methods = rule.get_strs("allowed_methods")?;
        if methods.is_empty() {
            return Err(ReconcileError::validation(
                "cors_rule.allowed_methods",
                "at least one method is required",
            ));
        }
        for method in methods {
            one_of("cors_rule.allowed_methods", method, CORS_METHODS)?;
        }
        if rule.get_int("max_age_seconds")?.is_some_and(|age| age < 0) {
            return Err(ReconcileError::validation(
                "cors_rule.max_age_seconds",
                "must not be negative",
            ));
        }
    }
    mapper::cors_to_config(rules).map(|_| ())
}

fn validate_lifecycle(rules: &[AttributeSet]) -> Result<()> {
    for rule in rules {
        rule.require_bool("enabled")?;
        let Some(expiration) = rule.get_single_block("expiration")? else {
            return Err(ReconcileError::validation(
                "lifecycle_rule.expiration",
                "an expiration block is required",
            ));
        };
        match (expiration.get_int("days")?, expiration.get_str("date")?) {
            (Some(days), None) if days > 0 => {}
            (Some(days), None) => {
                return Err(ReconcileError::validation(
                    "lifecycle_rule.expiration.days",
                    format!("must be positive, got {}", days),
                ));
            }
            (None, Some(date)) if is_date(date) => {}
            (None, Some(date)) => {
                return Err(ReconcileError::validation(
                    "lifecycle_rule.expiration.date",
                    format!("{:?} is not a YYYY-MM-DD date", date),
                ));
            }
            _ => {
                return Err(ReconcileError::validation(
                    "lifecycle_rule.expiration",
                    "exactly one of days or date must be set",
                ));
            }
        }
    }
    mapper::lifecycle_to_config(rules).map(|_| ())
}

fn sub_config<T>(result: Result<T, AlicloudError>, bucket: &str) -> Result<Option<T>> {
    match result {
        Ok(config) => Ok(Some(config)),
        Err(err) if err.is_code(SUB_CONFIG_MISSING) => Ok(None),
        Err(err) => Err(ReconcileError::vendor("read", bucket, err)),
    }
}

/// Re-submits each changed sub-configuration as a whole, or deletes it when
/// the declaration dropped it.
async fn apply_changes(
    ctx: &ProviderContext,
    bucket: &str,
    diff: &AttributeDiff,
    desired: &AttributeSet,
) -> Result<()> {
    let client = &ctx.client;
    let vendor =
        |operation: &'static str| move |e: AlicloudError| ReconcileError::vendor(operation, bucket, e);

    if diff.changed("acl") {
        let acl = desired.get_str("acl")?.unwrap_or(DEFAULT_ACL);
        client
            .with_oss(|oss| async move { oss.put_bucket_acl(bucket, acl).await })
            .await
            .map_err(vendor("update acl"))?;
    }

    if diff.changed("cors_rule") {
        let rules = desired.get_blocks("cors_rule")?;
        if rules.is_empty() {
            client
                .with_oss(|oss| async move { oss.delete_bucket_cors(bucket).await })
                .await
                .map_err(vendor("delete cors"))?;
        } else {
            let config = mapper::cors_to_config(rules)?;
            client
                .with_oss(|oss| async move { oss.put_bucket_cors(bucket, &config).await })
                .await
                .map_err(vendor("put cors"))?;
        }
    }

    if diff.changed("website") {
        match desired.get_single_block("website")? {
            Some(block) => {
                let config = mapper::website_to_config(block)?;
                client
                    .with_oss(|oss| async move { oss.put_bucket_website(bucket, &config).await })
                    .await
                    .map_err(vendor("put website"))?;
            }
            None => client
                .with_oss(|oss| async move { oss.delete_bucket_website(bucket).await })
                .await
                .map_err(vendor("delete website"))?,
        }
    }

    if diff.changed("logging") {
        match desired.get_single_block("logging")? {
            Some(block) => {
                let config = mapper::logging_to_config(block)?;
                client
                    .with_oss(|oss| async move { oss.put_bucket_logging(bucket, &config).await })
                    .await
                    .map_err(vendor("put logging"))?;
            }
            None => client
                .with_oss(|oss| async move { oss.delete_bucket_logging(bucket).await })
                .await
                .map_err(vendor("delete logging"))?,
        }
    }

    if diff.changed("referer_config") {
        let config = match desired.get_single_block("referer_config")? {
            Some(block) => mapper::referer_to_config(block)?,
            None => RefererConfiguration::default(),
        };
        client
            .with_oss(|oss| async move { oss.put_bucket_referer(bucket, &config).await })
            .await
            .map_err(vendor("put referer"))?;
    }

    if diff.changed("lifecycle_rule") {
        let rules = desired.get_blocks("lifecycle_rule")?;
        if rules.is_empty() {
            client
                .with_oss(|oss| async move { oss.delete_bucket_lifecycle(bucket).await })
                .await
                .map_err(vendor("delete lifecycle"))?;
        } else {
            let config = mapper::lifecycle_to_config(rules)?;
            client
                .with_oss(|oss| async move { oss.put_bucket_lifecycle(bucket, &config).await })
                .await
                .map_err(vendor("put lifecycle"))?;
        }
    }

    Ok(())
}

#[async_trait]
impl Reconciler for OssBucketResource {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn force_new(&self) -> &'static [&'static str] {
        &["bucket", "storage_class"]
    }

    fn validate(&self, desired: &AttributeSet) -> Result<()> {
        validate_bucket_name(desired.require_str("bucket")?)?;
        if let Some(acl) = desired.get_str("acl")? {
            one_of("acl", acl, ACLS)?;
        }
        if let Some(class) = desired.get_str("storage_class")? {
            one_of("storage_class", class, STORAGE_CLASSES)?;
        }
        validate_cors(desired.get_blocks("cors_rule")?)?;
        if let Some(block) = desired.get_single_block("website")? {
            mapper::website_to_config(block)?;
        }
        if let Some(block) = desired.get_single_block("logging")? {
            mapper::logging_to_config(block)?;
        }
        if let Some(block) = desired.get_single_block("referer_config")? {
            mapper::referer_to_config(block)?;
        }
        validate_lifecycle(desired.get_blocks("lifecycle_rule")?)
    }

    fn identify(&self, desired: &AttributeSet) -> Result<Option<String>> {
        Ok(Some(desired.require_str("bucket")?.to_string()))
    }

    fn normalize(&self, desired: &AttributeSet, prior: &AttributeSet) -> Result<AttributeSet> {
        mapper::with_vendor_defaults(desired, prior)
    }

    async fn create(&self, ctx: &ProviderContext, desired: &AttributeSet) -> Result<String> {
        let bucket = desired.require_str("bucket")?;
        let acl = desired.get_str("acl")?.unwrap_or(DEFAULT_ACL);
        let request = PutBucketRequest {
            acl: Some(acl.to_string()),
            storage_class: desired.get_str("storage_class")?.map(str::to_string),
        };

        ctx.client
            .with_oss(|oss| async move { oss.put_bucket(bucket, &request).await })
            .await
            .map_err(|e| ReconcileError::vendor("create", bucket, e))?;
        tracing::info!(bucket, acl, "bucket created");

        let baseline = AttributeSet::new().with_str("acl", acl);
        apply_changes(ctx, bucket, &AttributeDiff::compute(&baseline, desired), desired).await?;
        Ok(bucket.to_string())
    }

    async fn read(&self, ctx: &ProviderContext, id: &str) -> Result<Option<AttributeSet>> {
        let client = &ctx.client;
        let Some(info) = found(
            client
                .with_oss(|oss| async move { oss.get_bucket_info(id).await })
                .await,
            "read",
            id,
        )?
        else {
            return Ok(None);
        };

        let snapshot = BucketSnapshot {
            info,
            cors: sub_config(
                client
                    .with_oss(|oss| async move { oss.get_bucket_cors(id).await })
                    .await,
                id,
            )?,
            website: sub_config(
                client
                    .with_oss(|oss| async move { oss.get_bucket_website(id).await })
                    .await,
                id,
            )?,
            logging: sub_config(
                client
                    .with_oss(|oss| async move { oss.get_bucket_logging(id).await })
                    .await,
                id,
            )?,
            referer: sub_config(
                client
                    .with_oss(|oss| async move { oss.get_bucket_referer(id).await })
                    .await,
                id,
            )?,
            lifecycle: sub_config(
                client
                    .with_oss(|oss| async move { oss.get_bucket_lifecycle(id).await })
                    .await,
                id,
            )?,
        };

        Ok(Some(mapper::from_snapshot(&snapshot)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: &AttributeDiff,
        desired: &AttributeSet,
    ) -> Result<()> {
        apply_changes(ctx, id, diff, desired).await
    }

    /// Fails with the vendor's `BucketNotEmpty` error while objects remain.
    async fn delete(&self, ctx: &ProviderContext, id: &str) -> Result<()> {
        ctx.client
            .with_oss(|oss| async move { oss.delete_bucket(id).await })
            .await
            .map_err(|e| ReconcileError::vendor("delete", id, e))
    }
}
