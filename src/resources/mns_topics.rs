//! `alicloud_mns_topics` data source: every topic whose name matches a prefix.

use std::path::Path;

use async_trait::async_trait;

use crate::alicloud::types::{MNS_PAGE_SIZE, TopicAttribute};
use crate::error::{ReconcileError, Result};
use crate::output::write_output_file;
use crate::reconcile::{DataSource, ProviderContext, collect_all};
use crate::resource::{AttrValue, AttributeSet};

pub const DATA_SOURCE_TYPE: &str = "alicloud_mns_topics";

pub struct MnsTopicsDataSource;

/// Identifier for a listing: a stable hash over the listed names.
pub fn listing_id(names: &[&str]) -> String {
    let hash = blake3::hash(names.join("-").as_bytes());
    hash.to_hex()[..16].to_string()
}

pub fn topic_attributes(topic: &TopicAttribute) -> AttributeSet {
    AttributeSet::new()
        .with_str("id", &topic.topic_name)
        .with_str("name", &topic.topic_name)
        .with_int("maximum_message_size", topic.max_message_size)
        .with_bool("logging_enabled", topic.logging_enabled)
}

pub async fn list_topics(ctx: &ProviderContext, prefix: &str) -> Result<Vec<TopicAttribute>> {
    let client = &ctx.client;
    collect_all(|marker: Option<String>| async move {
        client
            .with_mns(|mns| async move {
                mns.list_topic_detail(marker.as_deref(), MNS_PAGE_SIZE, prefix)
                    .await
            })
            .await
    })
    .await
    .map_err(|e| ReconcileError::vendor("list topics", prefix, e))
}

#[async_trait]
impl DataSource for MnsTopicsDataSource {
    fn data_source_type(&self) -> &'static str {
        DATA_SOURCE_TYPE
    }

    fn validate(&self, config: &AttributeSet) -> Result<()> {
        config.get_str("name_prefix")?;
        config.get_str("output_file")?;
        Ok(())
    }

    async fn read(&self, ctx: &ProviderContext, config: &AttributeSet) -> Result<AttributeSet> {
        let prefix = config.get_str("name_prefix")?.unwrap_or_default();
        let topics = list_topics(ctx, prefix).await?;
        tracing::info!(prefix, count = topics.len(), "listed MNS topics");

        let names: Vec<&str> = topics.iter().map(|t| t.topic_name.as_str()).collect();
        let blocks: Vec<AttributeSet> = topics.iter().map(topic_attributes).collect();

        let mut attributes = config.clone().with_str("id", listing_id(&names));
        attributes.insert("topics", AttrValue::Blocks(blocks.clone()));

        if let Some(path) = config.get_str("output_file")?.filter(|p| !p.is_empty()) {
            let listing = serde_json::Value::Array(blocks.iter().map(AttributeSet::to_json).collect());
            write_output_file(Path::new(path), &listing).await;
        }

        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_id_is_stable() {
        let a = listing_id(&["test-topic-1", "test-topic-2"]);
        assert_eq!(a, listing_id(&["test-topic-1", "test-topic-2"]));
        assert_ne!(a, listing_id(&["test-topic-1"]));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_topic_attributes() {
        let topic = TopicAttribute {
            topic_name: "test-topic".to_string(),
            create_time: 1_530_000_000,
            last_modify_time: 1_530_000_000,
            max_message_size: 65536,
            message_count: 0,
            logging_enabled: true,
        };
        let attributes = topic_attributes(&topic);
        assert_eq!(attributes.get_str("id").unwrap(), Some("test-topic"));
        assert_eq!(attributes.get_str("name").unwrap(), Some("test-topic"));
        assert_eq!(attributes.get_int("maximum_message_size").unwrap(), Some(65536));
        assert_eq!(attributes.get_bool("logging_enabled").unwrap(), Some(true));
    }
}
