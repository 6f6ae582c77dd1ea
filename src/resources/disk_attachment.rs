//! `alicloud_disk_attachment`: binds a disk to an ECS instance.
//!
//! The identifier is `<disk_id>:<instance_id>`, so it can be rebuilt from the
//! declaration alone.

use async_trait::async_trait;

use crate::alicloud::DiskStatus;
use crate::alicloud::types::Disk;
use crate::error::{ReconcileError, Result};
use crate::reconcile::{Attempt, ProviderContext, Reconciler, poll_until};
use crate::resource::{AttributeDiff, AttributeSet, composite_id, split_composite_id};

use super::found;

pub const RESOURCE_TYPE: &str = "alicloud_disk_attachment";

pub struct DiskAttachmentResource;

fn parse_id(id: &str) -> Result<(&str, &str)> {
    let parts = split_composite_id(id, 2)?;
    Ok((parts[0], parts[1]))
}

pub fn from_response(disk: &Disk, instance_id: &str) -> AttributeSet {
    let mut attributes = AttributeSet::new()
        .with_str("disk_id", &disk.disk_id)
        .with_str("instance_id", instance_id)
        .with_str("status", disk.status.as_str());
    if !disk.device.is_empty() {
        attributes = attributes.with_str("device", &disk.device);
    }
    attributes
}

/// A disk bound to some other instance no longer belongs to this attachment.
fn still_attached(disk: &Disk, instance_id: &str) -> bool {
    disk.status != DiskStatus::Available && disk.instance_id == instance_id
}

#[async_trait]
impl Reconciler for DiskAttachmentResource {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn force_new(&self) -> &'static [&'static str] {
        &["disk_id", "instance_id"]
    }

    fn validate(&self, desired: &AttributeSet) -> Result<()> {
        desired.require_str("disk_id")?;
        desired.require_str("instance_id")?;
        Ok(())
    }

    fn identify(&self, desired: &AttributeSet) -> Result<Option<String>> {
        Ok(Some(composite_id(&[
            desired.require_str("disk_id")?,
            desired.require_str("instance_id")?,
        ])))
    }

    async fn create(&self, ctx: &ProviderContext, desired: &AttributeSet) -> Result<String> {
        let disk_id = desired.require_str("disk_id")?;
        let instance_id = desired.require_str("instance_id")?;
        let id = composite_id(&[disk_id, instance_id]);

        // A freshly created disk or instance rejects the attach until it settles.
        let policy = self.poll_policy(ctx);
        let attachment = id.as_str();
        poll_until(&policy, "attach", attachment, || async move {
            ctx.client
                .with_ecs(|ecs| async move { ecs.attach_disk(disk_id, instance_id).await })
                .await
                .map(Attempt::Ready)
                .map_err(|e| ReconcileError::vendor("attach", attachment, e))
        })
        .await?;

        tracing::info!(disk_id, instance_id, "attach requested");
        Ok(id)
    }

    /// Reads the disk through the instance. A disk that is `Available` is no
    /// longer attached there, so the attachment counts as absent.
    async fn read(&self, ctx: &ProviderContext, id: &str) -> Result<Option<AttributeSet>> {
        let (disk_id, instance_id) = parse_id(id)?;
        let disk = found(
            ctx.client
                .with_ecs(|ecs| async move { ecs.describe_disk_by_id(instance_id, disk_id).await })
                .await,
            "read",
            id,
        )?;

        Ok(disk
            .filter(|disk| disk.status != DiskStatus::Available)
            .map(|disk| from_response(&disk, instance_id)))
    }

    async fn update(
        &self,
        _ctx: &ProviderContext,
        id: &str,
        diff: &AttributeDiff,
        _desired: &AttributeSet,
    ) -> Result<()> {
        let changed: Vec<&str> = diff.changed_names().collect();
        Err(ReconcileError::validation(
            changed.first().copied().unwrap_or("id"),
            format!("attachment {} cannot be modified in place", id),
        ))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> Result<()> {
        let (disk_id, instance_id) = parse_id(id)?;
        let policy = self.poll_policy(ctx);

        poll_until(&policy, "detach", id, || async move {
            match ctx
                .client
                .with_ecs(|ecs| async move { ecs.detach_disk(disk_id, instance_id).await })
                .await
            {
                Ok(()) => Ok(Attempt::Ready(())),
                Err(err) if err.is_not_found() => Ok(Attempt::Ready(())),
                Err(err) => Err(ReconcileError::vendor("detach", id, err)),
            }
        })
        .await?;

        poll_until(&policy, "detach", id, || async move {
            let disk = ctx
                .client
                .with_ecs(|ecs| async move { ecs.describe_disk(disk_id).await })
                .await;
            found(disk, "detach", id).map(|disk| match disk {
                Some(disk) if still_attached(&disk, instance_id) => {
                    Attempt::Pending(disk.status.to_string())
                }
                _ => Attempt::Ready(()),
            })
        })
        .await
    }

    fn awaiting(&self, observed: &AttributeSet) -> Option<String> {
        match observed.get_str("status") {
            Ok(Some(status)) if status == DiskStatus::InUse.as_str() => None,
            Ok(Some(status)) => Some(status.to_string()),
            _ => Some("status unknown".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(status: DiskStatus) -> Disk {
        Disk {
            disk_id: "d-2ze1".to_string(),
            zone_id: "cn-beijing-a".to_string(),
            disk_name: String::new(),
            description: String::new(),
            category: "cloud_efficiency".to_string(),
            size: 50,
            status,
            instance_id: "i-2ze9".to_string(),
            device: "/dev/xvdb".to_string(),
            snapshot_id: String::new(),
            tags: vec![],
        }
    }

    #[test]
    fn test_identifier_is_derived_from_declaration() {
        let desired = AttributeSet::new()
            .with_str("disk_id", "d-2ze1")
            .with_str("instance_id", "i-2ze9");
        assert_eq!(
            DiskAttachmentResource.identify(&desired).unwrap().as_deref(),
            Some("d-2ze1:i-2ze9")
        );
        assert_eq!(parse_id("d-2ze1:i-2ze9").unwrap(), ("d-2ze1", "i-2ze9"));
    }

    #[test]
    fn test_malformed_identifier() {
        assert!(parse_id("d-2ze1").is_err());
        assert!(parse_id("d-2ze1:").is_err());
        assert!(parse_id("a:b:c").is_err());
    }

    #[test]
    fn test_mapping_round_trips_declared_fields() {
        let desired = AttributeSet::new()
            .with_str("disk_id", "d-2ze1")
            .with_str("instance_id", "i-2ze9");
        let observed = from_response(&disk(DiskStatus::InUse), "i-2ze9");
        assert_eq!(observed.restrict_to(desired.keys()), desired);
        assert_eq!(observed.get_str("status").unwrap(), Some("In_use"));
        assert_eq!(observed.get_str("device").unwrap(), Some("/dev/xvdb"));
    }

    #[test]
    fn test_waits_for_in_use() {
        let attaching = from_response(&disk(DiskStatus::Attaching), "i-2ze9");
        assert_eq!(
            DiskAttachmentResource.awaiting(&attaching),
            Some("Attaching".to_string())
        );
        let attached = from_response(&disk(DiskStatus::InUse), "i-2ze9");
        assert_eq!(DiskAttachmentResource.awaiting(&attached), None);
    }

    #[test]
    fn test_disk_on_another_instance_is_detached() {
        assert!(still_attached(&disk(DiskStatus::InUse), "i-2ze9"));
        assert!(still_attached(&disk(DiskStatus::Detaching), "i-2ze9"));
        assert!(!still_attached(&disk(DiskStatus::InUse), "i-other"));
        assert!(!still_attached(&disk(DiskStatus::Available), "i-2ze9"));
    }

    #[test]
    fn test_validate_requires_both_sides() {
        let desired = AttributeSet::new().with_str("disk_id", "d-2ze1");
        assert!(matches!(
            DiskAttachmentResource.validate(&desired),
            Err(ReconcileError::Validation { .. })
        ));
    }
}
