use serde::{Deserialize, Serialize};

pub const MNS_PAGE_SIZE: u32 = 1000;
pub const OSS_PAGE_SIZE: u32 = 100;

/// One page of a marker-paginated listing.
///
/// An empty or missing `next_marker` ends the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_marker: Option<String>) -> Self {
        Self {
            items,
            next_marker: next_marker.filter(|m| !m.is_empty()),
        }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_marker: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

// ---- ECS ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskStatus {
    #[serde(rename = "In_use")]
    InUse,
    Available,
    Attaching,
    Detaching,
    Creating,
    ReIniting,
    #[serde(other)]
    Unknown,
}

impl DiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InUse => "In_use",
            Self::Available => "Available",
            Self::Attaching => "Attaching",
            Self::Detaching => "Detaching",
            Self::Creating => "Creating",
            Self::ReIniting => "ReIniting",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for DiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Disk {
    pub disk_id: String,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub disk_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Size in GB, as reported by the vendor.
    #[serde(default)]
    pub size: i64,
    pub status: DiskStatus,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub snapshot_id: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDiskRequest {
    pub zone_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDiskResponse {
    pub disk_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeDisksResponse {
    #[serde(default)]
    pub disks: Vec<Disk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyDiskAttributeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl ModifyDiskAttributeRequest {
    pub fn is_empty(&self) -> bool {
        self.disk_name.is_none() && self.description.is_none() && self.tags.is_none()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResizeDiskRequest {
    pub new_size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskInstanceRequest {
    pub instance_id: String,
}

// ---- OSS ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Owner {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketInfo {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub extranet_endpoint: String,
    #[serde(default)]
    pub intranet_endpoint: String,
    #[serde(rename = "ACL", default)]
    pub acl: String,
    #[serde(default)]
    pub storage_class: String,
    #[serde(default)]
    pub owner: Owner,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutBucketRequest {
    #[serde(rename = "ACL", skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclRequest {
    #[serde(rename = "ACL")]
    pub acl: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorsRule {
    #[serde(rename = "AllowedOrigin", default)]
    pub allowed_origins: Vec<String>,
    #[serde(rename = "AllowedMethod", default)]
    pub allowed_methods: Vec<String>,
    #[serde(rename = "AllowedHeader", default)]
    pub allowed_headers: Vec<String>,
    #[serde(rename = "ExposeHeader", default)]
    pub expose_headers: Vec<String>,
    #[serde(rename = "MaxAgeSeconds", skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorsConfiguration {
    #[serde(rename = "CORSRule", default)]
    pub rules: Vec<CorsRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteConfiguration {
    pub index_document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_document: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingConfiguration {
    pub target_bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefererConfiguration {
    pub allow_empty_referer: bool,
    #[serde(default)]
    pub referer_list: Vec<String>,
}

impl Default for RefererConfiguration {
    /// The configuration OSS reports for a bucket nobody configured.
    fn default() -> Self {
        Self {
            allow_empty_referer: true,
            referer_list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleExpiration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleRule {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub prefix: String,
    /// "Enabled" or "Disabled"
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<LifecycleExpiration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleConfiguration {
    #[serde(rename = "Rule", default)]
    pub rules: Vec<LifecycleRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketProperties {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default)]
    pub storage_class: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketsResult {
    #[serde(default)]
    pub buckets: Vec<BucketProperties>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub next_marker: String,
}

impl From<ListBucketsResult> for Page<BucketProperties> {
    fn from(result: ListBucketsResult) -> Self {
        if result.is_truncated {
            Page::new(result.buckets, Some(result.next_marker))
        } else {
            Page::last(result.buckets)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectProperties {
    pub key: String,
    #[serde(default)]
    pub size: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListObjectsResult {
    #[serde(rename = "Contents", default)]
    pub objects: Vec<ObjectProperties>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub next_marker: String,
}

impl From<ListObjectsResult> for Page<ObjectProperties> {
    fn from(result: ListObjectsResult) -> Self {
        if result.is_truncated {
            Page::new(result.objects, Some(result.next_marker))
        } else {
            Page::last(result.objects)
        }
    }
}

// ---- MNS ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicAttribute {
    pub topic_name: String,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub last_modify_time: i64,
    #[serde(default)]
    pub max_message_size: i64,
    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub logging_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicDetails {
    #[serde(default)]
    pub attrs: Vec<TopicAttribute>,
    #[serde(default)]
    pub next_marker: String,
}

impl From<TopicDetails> for Page<TopicAttribute> {
    fn from(details: TopicDetails) -> Self {
        Page::new(details.attrs, Some(details.next_marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_deserialization_ignores_unknown_fields() {
        let json = r#"{
            "DiskId": "d-abc123",
            "ZoneId": "cn-beijing-b",
            "DiskName": "data",
            "Category": "cloud_ssd",
            "Size": 50,
            "Status": "In_use",
            "InstanceId": "i-xyz789",
            "Device": "/dev/xvdb",
            "Encrypted": false,
            "Tags": [{"Key": "Name", "Value": "TerraformTest-disk"}]
        }"#;

        let disk: Disk = serde_json::from_str(json).unwrap();
        assert_eq!(disk.disk_id, "d-abc123");
        assert_eq!(disk.size, 50);
        assert_eq!(disk.status, DiskStatus::InUse);
        assert_eq!(disk.instance_id, "i-xyz789");
        assert_eq!(disk.tags[0].value, "TerraformTest-disk");
        assert_eq!(disk.snapshot_id, "");
    }

    #[test]
    fn test_unknown_disk_status_falls_back() {
        let json = r#"{"DiskId": "d-1", "Status": "Migrating"}"#;
        let disk: Disk = serde_json::from_str(json).unwrap();
        assert_eq!(disk.status, DiskStatus::Unknown);
        assert_eq!(disk.status.to_string(), "Unknown");
    }

    #[test]
    fn test_create_disk_request_omits_unset_fields() {
        let request = CreateDiskRequest {
            zone_id: "cn-beijing-b".to_string(),
            size: Some(50),
            ..Default::default()
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"ZoneId": "cn-beijing-b", "Size": 50}));
    }

    #[test]
    fn test_bucket_info_acl_rename() {
        let json = r#"{
            "Name": "tf-testacc-bucket",
            "Location": "oss-cn-beijing",
            "ACL": "public-read",
            "Owner": {"ID": "1234", "DisplayName": "owner"}
        }"#;

        let info: BucketInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.acl, "public-read");
        assert_eq!(info.owner.id, "1234");
        assert_eq!(info.storage_class, "");
    }

    #[test]
    fn test_cors_configuration_wire_names() {
        let config = CorsConfiguration {
            rules: vec![CorsRule {
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec!["GET".to_string()],
                allowed_headers: vec!["authorization".to_string()],
                expose_headers: vec![],
                max_age_seconds: None,
            }],
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["CORSRule"][0]["AllowedOrigin"][0], "*");
        assert_eq!(json["CORSRule"][0]["AllowedHeader"][0], "authorization");
        assert!(json["CORSRule"][0].get("MaxAgeSeconds").is_none());
    }

    #[test]
    fn test_page_filters_empty_marker() {
        let page = Page::new(vec![1, 2], Some(String::new()));
        assert_eq!(page.next_marker, None);

        let page = Page::new(vec![3], Some("m2".to_string()));
        assert_eq!(page.next_marker.as_deref(), Some("m2"));
    }

    #[test]
    fn test_list_buckets_not_truncated_is_last_page() {
        let result: ListBucketsResult = serde_json::from_str(
            r#"{"Buckets": [{"Name": "a"}], "IsTruncated": false, "NextMarker": "stale"}"#,
        )
        .unwrap();
        let page: Page<BucketProperties> = result.into();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_topic_details_to_page() {
        let details: TopicDetails = serde_json::from_str(
            r#"{"Attrs": [{"TopicName": "test-a", "MaxMessageSize": 65536, "LoggingEnabled": true}], "NextMarker": "next"}"#,
        )
        .unwrap();
        let page: Page<TopicAttribute> = details.into();
        assert_eq!(page.items[0].topic_name, "test-a");
        assert_eq!(page.items[0].max_message_size, 65536);
        assert!(page.items[0].logging_enabled);
        assert_eq!(page.next_marker.as_deref(), Some("next"));
    }
}
