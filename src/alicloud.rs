mod client;
mod error;
pub mod types;

pub use client::{
    AliyunClient, Credentials, DEFAULT_REGION, EcsClient, MnsClient, OssClient, default_endpoint,
};
pub use error::{AlicloudError, NOT_FOUND_CODES, RETRYABLE_CODES};
pub use types::{DiskStatus, Page};
