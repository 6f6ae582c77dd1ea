//! alirecon - reconciles declared Alibaba Cloud resources against the vendor API.
//!
//! Covers ECS disks and disk attachments, OSS buckets with their nested
//! configuration, and the MNS topics listing.

pub mod alicloud;
pub mod cli;
pub mod config;
pub mod output;
pub mod reconcile;
pub mod resource;
pub mod resources;
pub mod sweep;
pub mod terraform;

mod error;

pub use alicloud::{AlicloudError, AliyunClient, Credentials};
pub use config::ProviderConfig;
pub use error::{ReconcileError, Result};
pub use reconcile::{Engine, ProviderContext};
pub use resource::{AttrValue, AttributeSet, ResourceDescriptor};
