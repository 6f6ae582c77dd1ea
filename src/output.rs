//! Rendering of reconciled state for the terminal and for output files.

use std::path::Path;

use tabled::{Table, Tabled};
use termtree::Tree;

use crate::resource::{AttrValue, AttributeSet};
use crate::sweep::SweepReport;

/// Writes `value` as pretty JSON. Failures are logged and otherwise ignored.
pub async fn write_output_file(path: &Path, value: &serde_json::Value) -> bool {
    let json = match serde_json::to_vec_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to encode output");
            return false;
        }
    };

    match tokio::fs::write(path, json).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "output written");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to write output file");
            false
        }
    }
}

fn scalar(value: &AttrValue) -> String {
    match value {
        AttrValue::Str(s) => s.clone(),
        AttrValue::Int(i) => i.to_string(),
        AttrValue::Bool(b) => b.to_string(),
        AttrValue::StrList(items) => items.join(", "),
        AttrValue::StrMap(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", "),
        AttrValue::Blocks(blocks) | AttrValue::BlockSet(blocks) => {
            format!("{} block(s)", blocks.len())
        }
    }
}

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "ATTRIBUTE")]
    name: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

pub fn attribute_table(attributes: &AttributeSet) -> String {
    let rows: Vec<AttributeRow> = attributes
        .iter()
        .map(|(name, value)| AttributeRow {
            name: name.clone(),
            value: scalar(value),
        })
        .collect();
    Table::new(rows).to_string()
}

/// Nested blocks as a tree, one branch per block.
pub fn attribute_tree(root: &str, attributes: &AttributeSet) -> Tree<String> {
    let mut tree = Tree::new(root.to_string());
    for (name, value) in attributes.iter() {
        match value {
            AttrValue::Blocks(blocks) | AttrValue::BlockSet(blocks) => {
                for (index, block) in blocks.iter().enumerate() {
                    tree.push(attribute_tree(&format!("{}[{}]", name, index), block));
                }
            }
            other => {
                tree.push(Tree::new(format!("{} = {}", name, scalar(other))));
            }
        }
    }
    tree
}

#[derive(Tabled)]
struct TopicRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "MAX MESSAGE SIZE")]
    maximum_message_size: i64,
    #[tabled(rename = "LOGGING")]
    logging_enabled: bool,
}

pub fn topics_table(topics: &[AttributeSet]) -> String {
    let rows: Vec<TopicRow> = topics
        .iter()
        .map(|topic| TopicRow {
            name: topic.get_str("name").ok().flatten().unwrap_or("-").to_string(),
            maximum_message_size: topic
                .get_int("maximum_message_size")
                .ok()
                .flatten()
                .unwrap_or_default(),
            logging_enabled: topic
                .get_bool("logging_enabled")
                .ok()
                .flatten()
                .unwrap_or_default(),
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct SweepRow {
    #[tabled(rename = "BUCKET")]
    bucket: String,
    #[tabled(rename = "OUTCOME")]
    outcome: String,
}

pub fn sweep_table(report: &SweepReport) -> String {
    let deleted = report.deleted.iter().map(|bucket| SweepRow {
        bucket: bucket.clone(),
        outcome: "deleted".to_string(),
    });
    let failed = report.failed.iter().map(|(bucket, error)| SweepRow {
        bucket: bucket.clone(),
        outcome: format!("failed: {}", error),
    });
    Table::new(deleted.chain(failed)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topics.json");
        let value = serde_json::json!([{"name": "test-topic"}]);

        assert!(write_output_file(&path, &value).await);
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, value);
    }

    #[tokio::test]
    async fn test_write_output_file_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("topics.json");
        assert!(!write_output_file(&path, &serde_json::json!([])).await);
    }

    #[test]
    fn test_attribute_tree_renders_blocks() {
        let attributes = AttributeSet::new().with_str("bucket", "tf-testacc").with(
            "cors_rule",
            AttrValue::Blocks(vec![
                AttributeSet::new().with_strs("allowed_methods", ["GET", "PUT"]),
            ]),
        );
        let rendered = attribute_tree("tf-testacc", &attributes).to_string();
        assert!(rendered.contains("bucket = tf-testacc"));
        assert!(rendered.contains("cors_rule[0]"));
        assert!(rendered.contains("allowed_methods = GET, PUT"));
    }

    #[test]
    fn test_topics_table() {
        let topics = vec![
            AttributeSet::new()
                .with_str("name", "test-topic-1")
                .with_int("maximum_message_size", 65536)
                .with_bool("logging_enabled", false),
        ];
        let table = topics_table(&topics);
        assert!(table.contains("NAME"));
        assert!(table.contains("test-topic-1"));
        assert!(table.contains("65536"));
    }

    #[test]
    fn test_attribute_table() {
        let table = attribute_table(&AttributeSet::new().with_str("status", "In_use"));
        assert!(table.contains("ATTRIBUTE"));
        assert!(table.contains("In_use"));
    }
}
