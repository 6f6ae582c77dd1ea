#![allow(dead_code)]

//! In-memory stand-in for the Alibaba Cloud JSON gateway.
//!
//! Disks move through intermediate statuses one describe at a time, so the
//! reconcilers' polling is exercised without real sleeps.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use alirecon::alicloud::types::{
    BucketInfo, CreateDiskRequest, Disk, Owner, PutBucketRequest, TopicAttribute,
};
use alirecon::alicloud::{AliyunClient, Credentials, DiskStatus};
use alirecon::reconcile::{PollPolicy, ProviderContext};

pub const INSTANCE_ID: &str = "i-2zetest";

#[derive(Default)]
struct Bucket {
    info: BucketInfo,
    objects: Vec<String>,
    sub_configs: BTreeMap<String, Value>,
}

#[derive(Default)]
struct FakeState {
    next_disk: u32,
    disks: BTreeMap<String, Disk>,
    buckets: BTreeMap<String, Bucket>,
    topics: Vec<TopicAttribute>,
    /// Fake-side cap on topics per page, regardless of the requested size.
    topic_page_size: usize,
}

#[derive(Clone, Default)]
pub struct FakeAliyun {
    state: Arc<Mutex<FakeState>>,
}

pub struct FakeServer {
    pub server: MockServer,
    pub fake: FakeAliyun,
}

impl FakeServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let fake = FakeAliyun::default();
        Mock::given(any())
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        Self { server, fake }
    }

    pub fn client(&self) -> AliyunClient {
        AliyunClient::with_base_url(
            Credentials::new("LTAI_test_key", "test_secret"),
            "cn-beijing",
            self.server.uri(),
        )
        .unwrap()
    }

    pub fn context(&self) -> ProviderContext {
        ProviderContext::new(self.client()).with_poll(PollPolicy::fixed(
            Duration::from_millis(5),
            Duration::from_secs(2),
        ))
    }

    /// Paths of every request the gateway saw with the given method, in order.
    pub async fn requests(&self, method: &str) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.method.as_str() == method)
            .map(|request| match request.url.query() {
                Some(query) => format!("{}?{}", request.url.path(), query),
                None => request.url.path().to_string(),
            })
            .collect()
    }
}

fn error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "Code": code,
        "Message": message,
        "RequestId": "fake-request-id",
    }))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn no_content() -> ResponseTemplate {
    ResponseTemplate::new(204)
}

fn sub_config_missing(sub: &str) -> &'static str {
    match sub {
        "cors" => "NoSuchCORSConfiguration",
        "website" => "NoSuchWebsiteConfiguration",
        "logging" => "NoSuchBucketLogging",
        "referer" => "NoSuchReferer",
        _ => "NoSuchLifecycle",
    }
}

/// One page of `names` after `marker`, with OSS-style truncation fields.
fn page_after(names: Vec<String>, marker: Option<&str>, max_keys: usize) -> (Vec<String>, Value, Value) {
    let remaining: Vec<String> = names
        .into_iter()
        .filter(|name| marker.is_none_or(|marker| name.as_str() > marker))
        .collect();
    let truncated = remaining.len() > max_keys;
    let page: Vec<String> = remaining.into_iter().take(max_keys).collect();
    let next_marker = if truncated {
        page.last().cloned().unwrap_or_default()
    } else {
        String::new()
    };
    (page, json!(truncated), json!(next_marker))
}

impl FakeAliyun {
    pub fn add_object(&self, bucket: &str, key: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(bucket) = state.buckets.get_mut(bucket) {
            bucket.objects.push(key.to_string());
        }
    }

    pub fn add_bucket(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.buckets.insert(name.to_string(), Self::new_bucket(name, None, None));
    }

    pub fn bucket_names(&self) -> Vec<String> {
        self.state.lock().unwrap().buckets.keys().cloned().collect()
    }

    pub fn add_topics<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        let mut state = self.state.lock().unwrap();
        for name in names {
            state.topics.push(TopicAttribute {
                topic_name: name.to_string(),
                create_time: 1_530_000_000,
                last_modify_time: 1_530_000_000,
                max_message_size: 65536,
                message_count: 0,
                logging_enabled: false,
            });
        }
    }

    pub fn set_topic_page_size(&self, size: usize) {
        self.state.lock().unwrap().topic_page_size = size;
    }

    pub fn disk_status(&self, disk_id: &str) -> Option<DiskStatus> {
        self.state
            .lock()
            .unwrap()
            .disks
            .get(disk_id)
            .map(|disk| disk.status.clone())
    }

    fn new_bucket(name: &str, acl: Option<String>, storage_class: Option<String>) -> Bucket {
        Bucket {
            info: BucketInfo {
                name: name.to_string(),
                location: "oss-cn-beijing".to_string(),
                creation_date: "2026-10-18T00:00:00.000Z".to_string(),
                extranet_endpoint: "oss-cn-beijing.aliyuncs.com".to_string(),
                intranet_endpoint: "oss-cn-beijing-internal.aliyuncs.com".to_string(),
                acl: acl.unwrap_or_else(|| "private".to_string()),
                storage_class: storage_class.unwrap_or_else(|| "Standard".to_string()),
                owner: Owner {
                    id: "1234567890".to_string(),
                    display_name: "1234567890".to_string(),
                },
            },
            ..Default::default()
        }
    }

    /// Reports the disk, then moves it one step toward its resting status.
    fn describe(disk: &mut Disk) -> Value {
        let snapshot = serde_json::to_value(&*disk).unwrap();
        match disk.status {
            DiskStatus::Creating => disk.status = DiskStatus::Available,
            DiskStatus::Attaching => disk.status = DiskStatus::InUse,
            DiskStatus::Detaching => {
                disk.status = DiskStatus::Available;
                disk.instance_id.clear();
                disk.device.clear();
            }
            _ => {}
        }
        snapshot
    }

    fn ecs(&self, method: &str, segments: &[&str], query: &HashMap<String, String>, body: &[u8]) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        match (method, segments) {
            ("POST", []) => {
                let request: CreateDiskRequest = match serde_json::from_slice(body) {
                    Ok(request) => request,
                    Err(e) => return error(400, "InvalidParameter", &e.to_string()),
                };
                state.next_disk += 1;
                let disk_id = format!("d-2ze{:04}", state.next_disk);
                let disk = Disk {
                    disk_id: disk_id.clone(),
                    zone_id: request.zone_id,
                    disk_name: request.disk_name.unwrap_or_default(),
                    description: request.description.unwrap_or_default(),
                    category: request
                        .disk_category
                        .unwrap_or_else(|| "cloud_efficiency".to_string()),
                    size: request.size.unwrap_or(20),
                    status: DiskStatus::Creating,
                    instance_id: String::new(),
                    device: String::new(),
                    snapshot_id: request.snapshot_id.unwrap_or_default(),
                    tags: request.tags,
                };
                state.disks.insert(disk_id.clone(), disk);
                ok(json!({ "DiskId": disk_id }))
            }
            ("GET", []) => {
                let instance_id = query.get("InstanceId").cloned().unwrap_or_default();
                let wanted: Vec<&str> = query
                    .get("DiskIds")
                    .map(|ids| ids.split(',').collect())
                    .unwrap_or_default();
                let disks: Vec<Value> = state
                    .disks
                    .values_mut()
                    .filter(|disk| disk.instance_id == instance_id)
                    .filter(|disk| wanted.is_empty() || wanted.contains(&disk.disk_id.as_str()))
                    .map(Self::describe)
                    .collect();
                ok(json!({ "Disks": disks }))
            }
            (_, [disk_id, ..]) if !state.disks.contains_key(*disk_id) => {
                error(404, "InvalidDiskId.NotFound", "The specified disk does not exist.")
            }
            ("GET", [disk_id]) => match state.disks.get_mut(*disk_id) {
                Some(disk) => ok(Self::describe(disk)),
                None => error(404, "InvalidDiskId.NotFound", "The specified disk does not exist."),
            },
            ("PATCH", [disk_id]) => {
                let request: Value = serde_json::from_slice(body).unwrap_or_default();
                if let Some(disk) = state.disks.get_mut(*disk_id) {
                    if let Some(name) = request["DiskName"].as_str() {
                        disk.disk_name = name.to_string();
                    }
                    if let Some(description) = request["Description"].as_str() {
                        disk.description = description.to_string();
                    }
                    if let Ok(tags) = serde_json::from_value(request["Tags"].clone()) {
                        disk.tags = tags;
                    }
                }
                no_content()
            }
            ("POST", [disk_id, "resize"]) => {
                let request: Value = serde_json::from_slice(body).unwrap_or_default();
                if let Some(disk) = state.disks.get_mut(*disk_id) {
                    disk.size = request["NewSize"].as_i64().unwrap_or(disk.size);
                }
                no_content()
            }
            ("POST", [disk_id, action]) => {
                let request: Value = serde_json::from_slice(body).unwrap_or_default();
                let instance_id = request["InstanceId"].as_str().unwrap_or_default();
                let Some(disk) = state.disks.get_mut(*disk_id) else {
                    return error(404, "InvalidDiskId.NotFound", "The specified disk does not exist.");
                };
                match *action {
                    "attach" if disk.status == DiskStatus::Available => {
                        disk.status = DiskStatus::Attaching;
                        disk.instance_id = instance_id.to_string();
                        disk.device = "/dev/xvdb".to_string();
                        no_content()
                    }
                    "attach" => error(403, "IncorrectDiskStatus", "The disk is not available."),
                    "detach" if disk.instance_id != instance_id => error(
                        404,
                        "InvalidDiskId.NotFound",
                        "The disk is not attached to the instance.",
                    ),
                    "detach" => {
                        disk.status = DiskStatus::Detaching;
                        no_content()
                    }
                    _ => error(400, "InvalidAction", "unknown disk action"),
                }
            }
            ("DELETE", [disk_id]) => {
                let in_use = state
                    .disks
                    .get(*disk_id)
                    .is_some_and(|disk| disk.status != DiskStatus::Available);
                if in_use {
                    return error(403, "IncorrectDiskStatus", "The disk is in use.");
                }
                state.disks.remove(*disk_id);
                no_content()
            }
            _ => error(400, "InvalidAction", "unknown ECS operation"),
        }
    }

    fn oss(&self, method: &str, segments: &[&str], query: &HashMap<String, String>, body: &[u8]) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let max_keys = query
            .get("max-keys")
            .and_then(|value| value.parse().ok())
            .unwrap_or(100);
        let marker = query.get("marker").map(String::as_str);

        match (method, segments) {
            ("GET", []) => {
                let prefix = query.get("prefix").cloned().unwrap_or_default();
                let names: Vec<String> = state
                    .buckets
                    .keys()
                    .filter(|name| name.starts_with(&prefix))
                    .cloned()
                    .collect();
                let (page, truncated, next_marker) = page_after(names, marker, max_keys);
                let buckets: Vec<Value> = page
                    .iter()
                    .map(|name| json!({ "Name": name, "Location": "oss-cn-beijing" }))
                    .collect();
                ok(json!({ "Buckets": buckets, "IsTruncated": truncated, "NextMarker": next_marker }))
            }
            ("PUT", [name]) => {
                if state.buckets.contains_key(*name) {
                    return error(409, "BucketAlreadyExists", "The requested bucket name is not available.");
                }
                let request: PutBucketRequest = serde_json::from_slice(body).unwrap_or_default();
                state.buckets.insert(
                    name.to_string(),
                    Self::new_bucket(name, request.acl, request.storage_class),
                );
                no_content()
            }
            (_, [name, ..]) if !state.buckets.contains_key(*name) => {
                error(404, "NoSuchBucket", "The specified bucket does not exist.")
            }
            ("DELETE", [name]) => {
                if state.buckets.get(*name).is_some_and(|bucket| !bucket.objects.is_empty()) {
                    return error(409, "BucketNotEmpty", "The bucket you tried to delete is not empty.");
                }
                state.buckets.remove(*name);
                no_content()
            }
            (_, [name, rest @ ..]) => {
                let Some(bucket) = state.buckets.get_mut(*name) else {
                    return error(404, "NoSuchBucket", "The specified bucket does not exist.");
                };
                match (method, rest) {
                    ("GET", ["info"]) => ok(serde_json::to_value(&bucket.info).unwrap()),
                    ("PUT", ["acl"]) => {
                        let request: Value = serde_json::from_slice(body).unwrap_or_default();
                        bucket.info.acl = request["ACL"].as_str().unwrap_or("private").to_string();
                        no_content()
                    }
                    ("GET", ["objects"]) => {
                        let mut keys = bucket.objects.clone();
                        keys.sort();
                        let (page, truncated, next_marker) = page_after(keys, marker, max_keys);
                        let contents: Vec<Value> =
                            page.iter().map(|key| json!({ "Key": key, "Size": 1 })).collect();
                        ok(json!({ "Contents": contents, "IsTruncated": truncated, "NextMarker": next_marker }))
                    }
                    ("DELETE", ["objects", key]) => {
                        bucket.objects.retain(|object| object != key);
                        no_content()
                    }
                    ("GET", [sub]) => match bucket.sub_configs.get(*sub) {
                        Some(config) => ok(config.clone()),
                        None => error(404, sub_config_missing(sub), "The configuration does not exist."),
                    },
                    ("PUT", [sub]) => {
                        let config: Value = serde_json::from_slice(body).unwrap_or_default();
                        bucket.sub_configs.insert(sub.to_string(), config);
                        no_content()
                    }
                    ("DELETE", [sub]) => {
                        bucket.sub_configs.remove(*sub);
                        no_content()
                    }
                    _ => error(400, "InvalidAction", "unknown OSS operation"),
                }
            }
            _ => error(400, "InvalidAction", "unknown OSS operation"),
        }
    }

    fn mns(&self, method: &str, segments: &[&str], query: &HashMap<String, String>) -> ResponseTemplate {
        if method != "GET" || !segments.is_empty() {
            return error(400, "InvalidAction", "unknown MNS operation");
        }
        let state = self.state.lock().unwrap();
        let prefix = query.get("prefix").cloned().unwrap_or_default();
        let requested: usize = query
            .get("size")
            .and_then(|value| value.parse().ok())
            .unwrap_or(1000);
        let size = match state.topic_page_size {
            0 => requested,
            cap => cap.min(requested),
        };
        let offset: usize = query
            .get("marker")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);

        let matching: Vec<&TopicAttribute> = state
            .topics
            .iter()
            .filter(|topic| topic.topic_name.starts_with(&prefix))
            .collect();
        let page: Vec<&TopicAttribute> = matching.iter().skip(offset).take(size).copied().collect();
        let next = offset + page.len();
        let next_marker = if next < matching.len() {
            next.to_string()
        } else {
            String::new()
        };
        ok(json!({ "Attrs": page, "NextMarker": next_marker }))
    }
}

impl Respond for FakeAliyun {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let segments: Vec<&str> = request
            .url
            .path()
            .trim_start_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let method = request.method.as_str();

        match segments.as_slice() {
            ["ecs", "disks", rest @ ..] => self.ecs(method, rest, &query, &request.body),
            ["oss", "buckets", rest @ ..] => self.oss(method, rest, &query, &request.body),
            ["mns", "topics", rest @ ..] => self.mns(method, rest, &query),
            _ => error(404, "InvalidAction", "unknown service"),
        }
    }
}
