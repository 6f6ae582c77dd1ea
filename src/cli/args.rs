use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::alicloud::DEFAULT_REGION;
use crate::config::ProviderConfig;
use crate::resource::{AttrValue, AttributeSet};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(subcommand)]
    pub command: ResourceCommand,
}

#[derive(clap::Args, Debug)]
pub struct ProviderArgs {
    #[arg(long, global = true, env = "ALICLOUD_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    #[arg(long, global = true, env = "ALICLOUD_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, global = true, env = "ALICLOUD_SECURITY_TOKEN", hide_env_values = true)]
    pub security_token: Option<String>,

    #[arg(long, global = true, env = "ALICLOUD_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Gateway base URL, e.g. a local mock server.
    #[arg(long, global = true, env = "ALICLOUD_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, global = true)]
    pub poll_interval_secs: Option<u64>,

    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,
}

impl ProviderArgs {
    pub fn to_config(&self) -> ProviderConfig {
        ProviderConfig {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            security_token: self.security_token.clone(),
            region: Some(self.region.clone()),
            endpoint: self.endpoint.clone(),
            poll_interval: self.poll_interval_secs.map(Duration::from_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
            state_file: self.state_file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommand {
    Disk {
        #[command(subcommand)]
        command: DiskCommand,
    },
    DiskAttachment {
        #[command(subcommand)]
        command: DiskAttachmentCommand,
    },
    OssBucket {
        #[command(subcommand)]
        command: OssBucketCommand,
    },
    MnsTopics {
        #[command(subcommand)]
        command: MnsTopicsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum DiskCommand {
    Create(DiskCreateArgs),
    Show(IdArgs),
    Destroy(IdArgs),
}

#[derive(Subcommand, Debug)]
pub enum DiskAttachmentCommand {
    Attach(AttachArgs),
    /// Takes the `<disk-id>:<instance-id>` identifier.
    Show(IdArgs),
    Detach(IdArgs),
}

#[derive(Subcommand, Debug)]
pub enum OssBucketCommand {
    Apply(BucketApplyArgs),
    Show(BucketShowArgs),
    Destroy(BucketArgs),
    /// Delete buckets left behind by acceptance tests.
    Sweep(SweepArgs),
}

#[derive(Subcommand, Debug)]
pub enum MnsTopicsCommand {
    List(TopicsListArgs),
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct DiskCreateArgs {
    #[arg(long)]
    pub availability_zone: String,

    /// Size in GB.
    #[arg(long)]
    pub size: Option<i64>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub snapshot_id: Option<String>,

    /// Repeatable `KEY=VALUE` tag.
    #[arg(long = "tag", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

impl DiskCreateArgs {
    pub fn attributes(&self) -> AttributeSet {
        let mut attributes =
            AttributeSet::new().with_str("availability_zone", &self.availability_zone);
        attributes.insert_opt("size", self.size.map(AttrValue::Int));
        attributes.insert_opt("category", self.category.clone().map(AttrValue::Str));
        attributes.insert_opt("name", self.name.clone().map(AttrValue::Str));
        attributes.insert_opt("description", self.description.clone().map(AttrValue::Str));
        attributes.insert_opt("snapshot_id", self.snapshot_id.clone().map(AttrValue::Str));
        if !self.tags.is_empty() {
            attributes.insert("tags", AttrValue::StrMap(self.tags.iter().cloned().collect()));
        }
        attributes
    }
}

#[derive(clap::Args, Debug)]
pub struct AttachArgs {
    #[arg(long)]
    pub disk_id: String,

    #[arg(long)]
    pub instance_id: String,
}

impl AttachArgs {
    pub fn attributes(&self) -> AttributeSet {
        AttributeSet::new()
            .with_str("disk_id", &self.disk_id)
            .with_str("instance_id", &self.instance_id)
    }
}

#[derive(clap::Args, Debug)]
pub struct BucketArgs {
    pub bucket: String,
}

#[derive(clap::Args, Debug)]
pub struct BucketShowArgs {
    pub bucket: String,

    /// Render nested configuration as a tree instead of a table.
    #[arg(long)]
    pub tree: bool,
}

#[derive(clap::Args, Debug)]
pub struct BucketApplyArgs {
    pub bucket: String,

    #[arg(long)]
    pub acl: Option<String>,

    #[arg(long)]
    pub storage_class: Option<String>,

    /// JSON file with the full declaration, nested blocks included.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl BucketApplyArgs {
    /// Flags override whatever the declaration file says.
    pub fn attributes(&self, mut declared: AttributeSet) -> AttributeSet {
        declared.insert("bucket", AttrValue::Str(self.bucket.clone()));
        declared.insert_opt("acl", self.acl.clone().map(AttrValue::Str));
        declared.insert_opt("storage_class", self.storage_class.clone().map(AttrValue::Str));
        declared
    }
}

#[derive(clap::Args, Debug)]
pub struct SweepArgs {
    /// Seconds to wait after deletions so the vendor settles.
    #[arg(long, default_value_t = 5)]
    pub settle_secs: u64,
}

#[derive(clap::Args, Debug)]
pub struct TopicsListArgs {
    #[arg(long)]
    pub name_prefix: Option<String>,

    /// Also write the listing as JSON to this file.
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

impl TopicsListArgs {
    pub fn attributes(&self) -> AttributeSet {
        let mut attributes = AttributeSet::new();
        attributes.insert_opt("name_prefix", self.name_prefix.clone().map(AttrValue::Str));
        attributes.insert_opt(
            "output_file",
            self.output_file
                .as_ref()
                .map(|path| AttrValue::Str(path.display().to_string())),
        );
        attributes
    }
}
