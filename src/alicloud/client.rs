use std::future::Future;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::AlicloudError;
use super::types::{
    AclRequest, BucketInfo, BucketProperties, CorsConfiguration, CreateDiskRequest,
    CreateDiskResponse, DescribeDisksResponse, Disk, DiskInstanceRequest, ErrorBody,
    LifecycleConfiguration, ListBucketsResult, ListObjectsResult, LoggingConfiguration,
    ModifyDiskAttributeRequest, ObjectProperties, Page, PutBucketRequest, RefererConfiguration,
    ResizeDiskRequest, TopicAttribute, TopicDetails, WebsiteConfiguration,
};

pub const DEFAULT_REGION: &str = "cn-beijing";

const ACCESS_KEY_HEADER: &str = "x-acs-access-key-id";
const SECURITY_TOKEN_HEADER: &str = "x-acs-security-token";
const REGION_HEADER: &str = "x-acs-region-id";

/// Codes the gateway uses when the caller's identity is rejected.
const AUTH_CODES: &[&str] = &[
    "InvalidAccessKeyId",
    "InvalidAccessKeyId.NotFound",
    "InvalidAccessKeyId.Inactive",
    "SignatureDoesNotMatch",
    "InvalidSecurityToken.Expired",
];

pub fn default_endpoint(region: &str) -> String {
    format!("https://{}.api.aliyuncs.com", region)
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub security_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            security_token: None,
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    fn is_complete(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Shared, read-only handle to the Alibaba Cloud API gateway.
///
/// Cloning is cheap: the underlying connection pool is reference counted.
/// Every vendor call goes through one of the `with_*` scopes, which validate
/// the session and hand an owned service handle to exactly one operation.
#[derive(Clone)]
pub struct AliyunClient {
    http: reqwest::Client,
    credentials: Credentials,
    region: String,
    base_url: String,
}

impl AliyunClient {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Result<Self, AlicloudError> {
        let region = region.into();
        let base_url = default_endpoint(&region);
        Self::with_base_url(credentials, region, base_url)
    }

    /// NOTE: Primarily used for testing with mock servers.
    pub fn with_base_url(
        credentials: Credentials,
        region: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, AlicloudError> {
        Self::create_client(credentials, region.into(), base_url.into())
    }

    fn create_client(
        credentials: Credentials,
        region: String,
        base_url: String,
    ) -> Result<Self, AlicloudError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(ACCESS_KEY_HEADER),
            header_value(&credentials.access_key, false)?,
        );
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", credentials.secret_key), true)?,
        );
        if let Some(token) = &credentials.security_token {
            headers.insert(
                HeaderName::from_static(SECURITY_TOKEN_HEADER),
                header_value(token, true)?,
            );
        }
        headers.insert(
            HeaderName::from_static(REGION_HEADER),
            header_value(&region, false)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(AlicloudError::Network)?;

        Ok(Self {
            http,
            credentials,
            region,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn api_base(&self) -> &str {
        &self.base_url
    }

    fn acquire(&self, service: &str) -> Result<ServiceHandle, AlicloudError> {
        if !self.credentials.is_complete() {
            return Err(AlicloudError::Auth {
                message: "No access key provided. Set ALICLOUD_ACCESS_KEY and ALICLOUD_SECRET_KEY or use --access-key/--secret-key".to_string(),
            });
        }

        Ok(ServiceHandle {
            http: self.http.clone(),
            base_url: format!("{}/{}", self.base_url, service),
        })
    }

    pub async fn with_ecs<T, F, Fut>(&self, operation: F) -> Result<T, AlicloudError>
    where
        F: FnOnce(EcsClient) -> Fut,
        Fut: Future<Output = Result<T, AlicloudError>>,
    {
        let handle = self.acquire("ecs")?;
        operation(EcsClient(handle)).await
    }

    pub async fn with_oss<T, F, Fut>(&self, operation: F) -> Result<T, AlicloudError>
    where
        F: FnOnce(OssClient) -> Fut,
        Fut: Future<Output = Result<T, AlicloudError>>,
    {
        let handle = self.acquire("oss")?;
        operation(OssClient(handle)).await
    }

    pub async fn with_mns<T, F, Fut>(&self, operation: F) -> Result<T, AlicloudError>
    where
        F: FnOnce(MnsClient) -> Fut,
        Fut: Future<Output = Result<T, AlicloudError>>,
    {
        let handle = self.acquire("mns")?;
        operation(MnsClient(handle)).await
    }
}

impl std::fmt::Debug for AliyunClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunClient")
            .field("credentials", &self.credentials)
            .field("region", &self.region)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn header_value(value: &str, sensitive: bool) -> Result<HeaderValue, AlicloudError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| AlicloudError::Auth {
        message: "Invalid credential format".to_string(),
    })?;
    header.set_sensitive(sensitive);
    Ok(header)
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[derive(Clone)]
struct ServiceHandle {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceHandle {
    async fn send(
        &self,
        method: Method,
        operation: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, AlicloudError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(operation, %method, %url, "calling vendor API");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ErrorBody>(&text).unwrap_or(ErrorBody {
            code: String::new(),
            message: text,
            request_id: None,
        });

        if status == StatusCode::UNAUTHORIZED || AUTH_CODES.contains(&error.code.as_str()) {
            return Err(AlicloudError::Auth {
                message: if error.code.is_empty() {
                    error.message
                } else {
                    format!("{}: {}", error.code, error.message)
                },
            });
        }

        Err(AlicloudError::Api {
            status: status.as_u16(),
            code: error.code,
            message: error.message,
            request_id: error.request_id,
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        operation: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, AlicloudError> {
        let response = self.send(method, operation, path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AlicloudError::Decode {
                operation: operation.to_string(),
                message: e.to_string(),
            })
    }

    async fn empty(
        &self,
        method: Method,
        operation: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), AlicloudError> {
        self.send(method, operation, path, body).await.map(|_| ())
    }
}

fn to_body<B: Serialize>(operation: &str, body: &B) -> Result<serde_json::Value, AlicloudError> {
    serde_json::to_value(body).map_err(|e| AlicloudError::Decode {
        operation: operation.to_string(),
        message: format!("Failed to encode request: {}", e),
    })
}

/// Elastic Compute Service operations (disks).
#[derive(Clone)]
pub struct EcsClient(ServiceHandle);

impl EcsClient {
    pub async fn create_disk(&self, request: &CreateDiskRequest) -> Result<String, AlicloudError> {
        let body = to_body("CreateDisk", request)?;
        let response: CreateDiskResponse = self
            .0
            .json(Method::POST, "CreateDisk", "/disks", Some(body))
            .await?;
        Ok(response.disk_id)
    }

    pub async fn describe_disk(&self, disk_id: &str) -> Result<Disk, AlicloudError> {
        let path = format!("/disks/{}", encode(disk_id));
        self.0.json(Method::GET, "DescribeDisk", &path, None).await
    }

    pub async fn describe_disks(
        &self,
        instance_id: &str,
        disk_ids: &[&str],
    ) -> Result<Vec<Disk>, AlicloudError> {
        let path = format!(
            "/disks?InstanceId={}&DiskIds={}",
            encode(instance_id),
            encode(&disk_ids.join(","))
        );
        let response: DescribeDisksResponse =
            self.0.json(Method::GET, "DescribeDisks", &path, None).await?;
        Ok(response.disks)
    }

    /// Looks up a disk through the instance it is attached to.
    ///
    /// Fails with a not-found error when the disk is not attached there.
    pub async fn describe_disk_by_id(
        &self,
        instance_id: &str,
        disk_id: &str,
    ) -> Result<Disk, AlicloudError> {
        self.describe_disks(instance_id, &[disk_id])
            .await?
            .into_iter()
            .find(|disk| disk.disk_id == disk_id)
            .ok_or_else(|| {
                AlicloudError::not_found(
                    "InvalidDiskId.NotFound",
                    format!("disk {} not found on instance {}", disk_id, instance_id),
                )
            })
    }

    pub async fn modify_disk_attribute(
        &self,
        disk_id: &str,
        request: &ModifyDiskAttributeRequest,
    ) -> Result<(), AlicloudError> {
        let path = format!("/disks/{}", encode(disk_id));
        let body = to_body("ModifyDiskAttribute", request)?;
        self.0
            .empty(Method::PATCH, "ModifyDiskAttribute", &path, Some(body))
            .await
    }

    pub async fn resize_disk(&self, disk_id: &str, new_size: i64) -> Result<(), AlicloudError> {
        let path = format!("/disks/{}/resize", encode(disk_id));
        let body = to_body("ResizeDisk", &ResizeDiskRequest { new_size })?;
        self.0
            .empty(Method::POST, "ResizeDisk", &path, Some(body))
            .await
    }

    pub async fn attach_disk(&self, disk_id: &str, instance_id: &str) -> Result<(), AlicloudError> {
        self.disk_instance_action("AttachDisk", "attach", disk_id, instance_id)
            .await
    }

    pub async fn detach_disk(&self, disk_id: &str, instance_id: &str) -> Result<(), AlicloudError> {
        self.disk_instance_action("DetachDisk", "detach", disk_id, instance_id)
            .await
    }

    async fn disk_instance_action(
        &self,
        operation: &str,
        action: &str,
        disk_id: &str,
        instance_id: &str,
    ) -> Result<(), AlicloudError> {
        let path = format!("/disks/{}/{}", encode(disk_id), action);
        let body = to_body(
            operation,
            &DiskInstanceRequest {
                instance_id: instance_id.to_string(),
            },
        )?;
        self.0.empty(Method::POST, operation, &path, Some(body)).await
    }

    pub async fn delete_disk(&self, disk_id: &str) -> Result<(), AlicloudError> {
        let path = format!("/disks/{}", encode(disk_id));
        self.0.empty(Method::DELETE, "DeleteDisk", &path, None).await
    }
}

/// Object Storage Service operations (buckets and their sub-configurations).
#[derive(Clone)]
pub struct OssClient(ServiceHandle);

impl OssClient {
    fn bucket_path(bucket: &str, sub: Option<&str>) -> String {
        match sub {
            Some(sub) => format!("/buckets/{}/{}", encode(bucket), sub),
            None => format!("/buckets/{}", encode(bucket)),
        }
    }

    pub async fn put_bucket(
        &self,
        bucket: &str,
        request: &PutBucketRequest,
    ) -> Result<(), AlicloudError> {
        let body = to_body("PutBucket", request)?;
        self.0
            .empty(
                Method::PUT,
                "PutBucket",
                &Self::bucket_path(bucket, None),
                Some(body),
            )
            .await
    }

    pub async fn get_bucket_info(&self, bucket: &str) -> Result<BucketInfo, AlicloudError> {
        self.0
            .json(
                Method::GET,
                "GetBucketInfo",
                &Self::bucket_path(bucket, Some("info")),
                None,
            )
            .await
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), AlicloudError> {
        self.0
            .empty(
                Method::DELETE,
                "DeleteBucket",
                &Self::bucket_path(bucket, None),
                None,
            )
            .await
    }

    pub async fn list_buckets(
        &self,
        prefix: &str,
        marker: Option<&str>,
        max_keys: u32,
    ) -> Result<Page<BucketProperties>, AlicloudError> {
        let mut path = format!("/buckets?prefix={}&max-keys={}", encode(prefix), max_keys);
        if let Some(marker) = marker {
            path.push_str(&format!("&marker={}", encode(marker)));
        }
        let result: ListBucketsResult = self
            .0
            .json(Method::GET, "ListBuckets", &path, None)
            .await?;
        Ok(result.into())
    }

    pub async fn put_bucket_acl(&self, bucket: &str, acl: &str) -> Result<(), AlicloudError> {
        let body = to_body(
            "PutBucketACL",
            &AclRequest {
                acl: acl.to_string(),
            },
        )?;
        self.0
            .empty(
                Method::PUT,
                "PutBucketACL",
                &Self::bucket_path(bucket, Some("acl")),
                Some(body),
            )
            .await
    }

    async fn get_sub<T: DeserializeOwned>(
        &self,
        operation: &str,
        bucket: &str,
        sub: &str,
    ) -> Result<T, AlicloudError> {
        self.0
            .json(
                Method::GET,
                operation,
                &Self::bucket_path(bucket, Some(sub)),
                None,
            )
            .await
    }

    async fn put_sub<B: Serialize>(
        &self,
        operation: &str,
        bucket: &str,
        sub: &str,
        config: &B,
    ) -> Result<(), AlicloudError> {
        let body = to_body(operation, config)?;
        self.0
            .empty(
                Method::PUT,
                operation,
                &Self::bucket_path(bucket, Some(sub)),
                Some(body),
            )
            .await
    }

    async fn delete_sub(&self, operation: &str, bucket: &str, sub: &str) -> Result<(), AlicloudError> {
        self.0
            .empty(
                Method::DELETE,
                operation,
                &Self::bucket_path(bucket, Some(sub)),
                None,
            )
            .await
    }

    pub async fn get_bucket_cors(&self, bucket: &str) -> Result<CorsConfiguration, AlicloudError> {
        self.get_sub("GetBucketCors", bucket, "cors").await
    }

    pub async fn put_bucket_cors(
        &self,
        bucket: &str,
        config: &CorsConfiguration,
    ) -> Result<(), AlicloudError> {
        self.put_sub("PutBucketCors", bucket, "cors", config).await
    }

    pub async fn delete_bucket_cors(&self, bucket: &str) -> Result<(), AlicloudError> {
        self.delete_sub("DeleteBucketCors", bucket, "cors").await
    }

    pub async fn get_bucket_website(
        &self,
        bucket: &str,
    ) -> Result<WebsiteConfiguration, AlicloudError> {
        self.get_sub("GetBucketWebsite", bucket, "website").await
    }

    pub async fn put_bucket_website(
        &self,
        bucket: &str,
        config: &WebsiteConfiguration,
    ) -> Result<(), AlicloudError> {
        self.put_sub("PutBucketWebsite", bucket, "website", config)
            .await
    }

    pub async fn delete_bucket_website(&self, bucket: &str) -> Result<(), AlicloudError> {
        self.delete_sub("DeleteBucketWebsite", bucket, "website")
            .await
    }

    pub async fn get_bucket_logging(
        &self,
        bucket: &str,
    ) -> Result<LoggingConfiguration, AlicloudError> {
        self.get_sub("GetBucketLogging", bucket, "logging").await
    }

    pub async fn put_bucket_logging(
        &self,
        bucket: &str,
        config: &LoggingConfiguration,
    ) -> Result<(), AlicloudError> {
        self.put_sub("PutBucketLogging", bucket, "logging", config)
            .await
    }

    pub async fn delete_bucket_logging(&self, bucket: &str) -> Result<(), AlicloudError> {
        self.delete_sub("DeleteBucketLogging", bucket, "logging")
            .await
    }

    pub async fn get_bucket_referer(
        &self,
        bucket: &str,
    ) -> Result<RefererConfiguration, AlicloudError> {
        self.get_sub("GetBucketReferer", bucket, "referer").await
    }

    pub async fn put_bucket_referer(
        &self,
        bucket: &str,
        config: &RefererConfiguration,
    ) -> Result<(), AlicloudError> {
        self.put_sub("PutBucketReferer", bucket, "referer", config)
            .await
    }

    pub async fn get_bucket_lifecycle(
        &self,
        bucket: &str,
    ) -> Result<LifecycleConfiguration, AlicloudError> {
        self.get_sub("GetBucketLifecycle", bucket, "lifecycle").await
    }

    pub async fn put_bucket_lifecycle(
        &self,
        bucket: &str,
        config: &LifecycleConfiguration,
    ) -> Result<(), AlicloudError> {
        self.put_sub("PutBucketLifecycle", bucket, "lifecycle", config)
            .await
    }

    pub async fn delete_bucket_lifecycle(&self, bucket: &str) -> Result<(), AlicloudError> {
        self.delete_sub("DeleteBucketLifecycle", bucket, "lifecycle")
            .await
    }

    pub async fn list_objects(
        &self,
        bucket: &str,
        marker: Option<&str>,
        max_keys: u32,
    ) -> Result<Page<ObjectProperties>, AlicloudError> {
        let mut path = format!(
            "{}?max-keys={}",
            Self::bucket_path(bucket, Some("objects")),
            max_keys
        );
        if let Some(marker) = marker {
            path.push_str(&format!("&marker={}", encode(marker)));
        }
        let result: ListObjectsResult = self
            .0
            .json(Method::GET, "ListObjects", &path, None)
            .await?;
        Ok(result.into())
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AlicloudError> {
        let path = format!(
            "{}/{}",
            Self::bucket_path(bucket, Some("objects")),
            encode(key)
        );
        self.0
            .empty(Method::DELETE, "DeleteObject", &path, None)
            .await
    }
}

/// Message Service operations (topics).
#[derive(Clone)]
pub struct MnsClient(ServiceHandle);

impl MnsClient {
    pub async fn list_topic_detail(
        &self,
        marker: Option<&str>,
        size: u32,
        prefix: &str,
    ) -> Result<Page<TopicAttribute>, AlicloudError> {
        let mut path = format!("/topics?prefix={}&size={}", encode(prefix), size);
        if let Some(marker) = marker {
            path.push_str(&format!("&marker={}", encode(marker)));
        }
        let details: TopicDetails = self
            .0
            .json(Method::GET, "ListTopicDetail", &path, None)
            .await?;
        Ok(details.into())
    }
}
