//! `alicloud_disk`: an ECS block-storage disk.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::alicloud::DiskStatus;
use crate::alicloud::types::{CreateDiskRequest, Disk, ModifyDiskAttributeRequest, Tag};
use crate::error::{ReconcileError, Result};
use crate::reconcile::{Attempt, ProviderContext, Reconciler, poll_until};
use crate::resource::{AttrValue, AttributeDiff, AttributeSet, Change};

use super::{found, one_of};

pub const RESOURCE_TYPE: &str = "alicloud_disk";

pub const CATEGORIES: &[&str] = &["cloud", "cloud_efficiency", "cloud_ssd", "cloud_essd"];
pub const DEFAULT_CATEGORY: &str = "cloud_efficiency";
const MAX_SIZE_GB: i64 = 32768;

pub struct DiskResource;

/// Builds the create request. Attributes left out stay `None` so the vendor
/// applies its own defaults.
pub fn to_request(desired: &AttributeSet) -> Result<CreateDiskRequest> {
    Ok(CreateDiskRequest {
        zone_id: desired.require_str("availability_zone")?.to_string(),
        disk_name: desired.get_str("name")?.map(str::to_string),
        description: desired.get_str("description")?.map(str::to_string),
        disk_category: desired.get_str("category")?.map(str::to_string),
        size: desired.get_int("size")?,
        snapshot_id: desired.get_str("snapshot_id")?.map(str::to_string),
        tags: to_tags(desired.get_map("tags")?),
    })
}

pub fn from_response(disk: &Disk) -> AttributeSet {
    let mut attributes = AttributeSet::new()
        .with_str("availability_zone", &disk.zone_id)
        .with_str("category", &disk.category)
        .with_int("size", disk.size)
        .with_str("status", disk.status.as_str());

    for (name, value) in [
        ("name", &disk.disk_name),
        ("description", &disk.description),
        ("snapshot_id", &disk.snapshot_id),
        ("instance_id", &disk.instance_id),
    ] {
        if !value.is_empty() {
            attributes.insert(name, AttrValue::Str(value.clone()));
        }
    }

    if !disk.tags.is_empty() {
        attributes.insert(
            "tags",
            AttrValue::StrMap(
                disk.tags
                    .iter()
                    .map(|tag| (tag.key.clone(), tag.value.clone()))
                    .collect(),
            ),
        );
    }
    attributes
}

fn to_tags(tags: Option<&BTreeMap<String, String>>) -> Vec<Tag> {
    tags.map(|tags| {
        tags.iter()
            .map(|(key, value)| Tag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    })
    .unwrap_or_default()
}

fn size_change(diff: &AttributeDiff) -> Result<Option<i64>> {
    match diff.get("size") {
        Some(Change::Modified {
            from: AttrValue::Int(from),
            to: AttrValue::Int(to),
        }) if to < from => Err(ReconcileError::validation(
            "size",
            format!("disks can only grow, cannot shrink from {} to {} GB", from, to),
        )),
        Some(Change::Modified {
            to: AttrValue::Int(to),
            ..
        })
        | Some(Change::Added(AttrValue::Int(to))) => Ok(Some(*to)),
        _ => Ok(None),
    }
}

fn modify_request(diff: &AttributeDiff, desired: &AttributeSet) -> Result<ModifyDiskAttributeRequest> {
    let mut request = ModifyDiskAttributeRequest::default();
    if diff.changed("name") {
        request.disk_name = desired.get_str("name")?.map(str::to_string);
    }
    if diff.changed("description") {
        request.description = desired.get_str("description")?.map(str::to_string);
    }
    if diff.changed("tags") {
        request.tags = Some(to_tags(desired.get_map("tags")?));
    }
    Ok(request)
}

#[async_trait]
impl Reconciler for DiskResource {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn force_new(&self) -> &'static [&'static str] {
        &["availability_zone", "category", "snapshot_id"]
    }

    fn validate(&self, desired: &AttributeSet) -> Result<()> {
        desired.require_str("availability_zone")?;
        if let Some(category) = desired.get_str("category")? {
            one_of("category", category, CATEGORIES)?;
        }
        match desired.get_int("size")? {
            Some(size) if !(1..=MAX_SIZE_GB).contains(&size) => {
                return Err(ReconcileError::validation(
                    "size",
                    format!("must be between 1 and {} GB, got {}", MAX_SIZE_GB, size),
                ));
            }
            None if desired.get_str("snapshot_id")?.is_none() => {
                return Err(ReconcileError::validation(
                    "size",
                    "required unless snapshot_id is set",
                ));
            }
            _ => {}
        }
        desired.get_str("name")?;
        desired.get_str("description")?;
        desired.get_map("tags")?;
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, desired: &AttributeSet) -> Result<String> {
        let request = to_request(desired)?;
        let name = request
            .disk_name
            .clone()
            .unwrap_or_else(|| "<new disk>".to_string());
        ctx.client
            .with_ecs(|ecs| async move { ecs.create_disk(&request).await })
            .await
            .map_err(|e| ReconcileError::vendor("create", &name, e))
    }

    async fn read(&self, ctx: &ProviderContext, id: &str) -> Result<Option<AttributeSet>> {
        let disk = found(
            ctx.client
                .with_ecs(|ecs| async move { ecs.describe_disk(id).await })
                .await,
            "read",
            id,
        )?;
        Ok(disk.as_ref().map(from_response))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: &AttributeDiff,
        desired: &AttributeSet,
    ) -> Result<()> {
        let new_size = size_change(diff)?;
        let modify = modify_request(diff, desired)?;

        if let Some(new_size) = new_size {
            tracing::info!(disk_id = id, new_size, "resizing disk");
            ctx.client
                .with_ecs(|ecs| async move { ecs.resize_disk(id, new_size).await })
                .await
                .map_err(|e| ReconcileError::vendor("resize", id, e))?;
        }

        if !modify.is_empty() {
            ctx.client
                .with_ecs(|ecs| async move { ecs.modify_disk_attribute(id, &modify).await })
                .await
                .map_err(|e| ReconcileError::vendor("update", id, e))?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> Result<()> {
        let policy = self.poll_policy(ctx);
        poll_until(&policy, "delete", id, || async move {
            match ctx
                .client
                .with_ecs(|ecs| async move { ecs.delete_disk(id).await })
                .await
            {
                Ok(()) => Ok(Attempt::Ready(())),
                Err(err) if err.is_not_found() => Ok(Attempt::Ready(())),
                Err(err) => Err(ReconcileError::vendor("delete", id, err)),
            }
        })
        .await
    }

    fn awaiting(&self, observed: &AttributeSet) -> Option<String> {
        match observed.get_str("status") {
            Ok(Some(status))
                if status == DiskStatus::Available.as_str()
                    || status == DiskStatus::InUse.as_str() =>
            {
                None
            }
            Ok(Some(status)) => Some(status.to_string()),
            _ => Some("status unknown".to_string()),
        }
    }
}
