//! Conversions between bucket declarations and OSS configuration documents.
//!
//! Empty lists and unset optionals are left out of the attribute side so a
//! declaration that omits them reads back equal.

use crate::alicloud::types::{
    BucketInfo, CorsConfiguration, CorsRule, LifecycleConfiguration, LifecycleExpiration,
    LifecycleRule, LoggingConfiguration, RefererConfiguration, WebsiteConfiguration,
};
use crate::error::Result;
use crate::resource::{AttrValue, AttributeSet};

pub const STATUS_ENABLED: &str = "Enabled";
pub const STATUS_DISABLED: &str = "Disabled";

/// Everything a bucket read collects before it becomes attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketSnapshot {
    pub info: BucketInfo,
    pub cors: Option<CorsConfiguration>,
    pub website: Option<WebsiteConfiguration>,
    pub logging: Option<LoggingConfiguration>,
    pub referer: Option<RefererConfiguration>,
    pub lifecycle: Option<LifecycleConfiguration>,
}

fn strs(desired: &AttributeSet, name: &str) -> Result<Vec<String>> {
    Ok(desired.get_strs(name)?.to_vec())
}

fn insert_strs(attributes: &mut AttributeSet, name: &str, values: &[String]) {
    if !values.is_empty() {
        attributes.insert(name, AttrValue::StrList(values.to_vec()));
    }
}

fn insert_nonempty(attributes: &mut AttributeSet, name: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        attributes.insert(name, AttrValue::Str(value.to_string()));
    }
}

// ---- cors_rule ----

pub fn cors_to_config(blocks: &[AttributeSet]) -> Result<CorsConfiguration> {
    let rules = blocks
        .iter()
        .map(|block| {
            Ok(CorsRule {
                allowed_origins: strs(block, "allowed_origins")?,
                allowed_methods: strs(block, "allowed_methods")?,
                allowed_headers: strs(block, "allowed_headers")?,
                expose_headers: strs(block, "expose_headers")?,
                max_age_seconds: block.get_int("max_age_seconds")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsConfiguration { rules })
}

pub fn cors_from_config(config: &CorsConfiguration) -> Vec<AttributeSet> {
    config
        .rules
        .iter()
        .map(|rule| {
            let mut block = AttributeSet::new();
            insert_strs(&mut block, "allowed_origins", &rule.allowed_origins);
            insert_strs(&mut block, "allowed_methods", &rule.allowed_methods);
            insert_strs(&mut block, "allowed_headers", &rule.allowed_headers);
            insert_strs(&mut block, "expose_headers", &rule.expose_headers);
            if let Some(max_age) = rule.max_age_seconds {
                block.insert("max_age_seconds", AttrValue::Int(max_age));
            }
            block
        })
        .collect()
}

// ---- website ----

pub fn website_to_config(block: &AttributeSet) -> Result<WebsiteConfiguration> {
    Ok(WebsiteConfiguration {
        index_document: block.require_str("index_document")?.to_string(),
        error_document: block.get_str("error_document")?.map(str::to_string),
    })
}

pub fn website_from_config(config: &WebsiteConfiguration) -> AttributeSet {
    let mut block = AttributeSet::new().with_str("index_document", &config.index_document);
    insert_nonempty(&mut block, "error_document", config.error_document.as_deref());
    block
}

// ---- logging ----

/// `target_bucket` is required; a missing `target_prefix` is left to the vendor default.
pub fn logging_to_config(block: &AttributeSet) -> Result<LoggingConfiguration> {
    Ok(LoggingConfiguration {
        target_bucket: block.require_str("target_bucket")?.to_string(),
        target_prefix: block.get_str("target_prefix")?.map(str::to_string),
    })
}

pub fn logging_from_config(config: &LoggingConfiguration) -> Option<AttributeSet> {
    if config.target_bucket.is_empty() {
        return None;
    }
    let mut block = AttributeSet::new().with_str("target_bucket", &config.target_bucket);
    insert_nonempty(&mut block, "target_prefix", config.target_prefix.as_deref());
    Some(block)
}

// ---- referer_config ----

pub fn referer_to_config(block: &AttributeSet) -> Result<RefererConfiguration> {
    Ok(RefererConfiguration {
        allow_empty_referer: block.get_bool("allow_empty")?.unwrap_or(true),
        referer_list: strs(block, "referers")?,
    })
}

/// An unconfigured bucket reports the default policy, which maps to no block.
pub fn referer_from_config(config: &RefererConfiguration) -> Option<AttributeSet> {
    if *config == RefererConfiguration::default() {
        return None;
    }
    let mut block = AttributeSet::new().with_bool("allow_empty", config.allow_empty_referer);
    insert_strs(&mut block, "referers", &config.referer_list);
    Some(block)
}

// ---- lifecycle_rule ----

pub fn lifecycle_to_config(blocks: &[AttributeSet]) -> Result<LifecycleConfiguration> {
    let rules = blocks
        .iter()
        .map(|block| {
            let expiration = block
                .get_single_block("expiration")?
                .map(|exp| -> Result<LifecycleExpiration> {
                    Ok(LifecycleExpiration {
                        days: exp.get_int("days")?,
                        date: exp.get_str("date")?.map(str::to_string),
                    })
                })
                .transpose()?;

            let status = if block.require_bool("enabled")? {
                STATUS_ENABLED
            } else {
                STATUS_DISABLED
            };

            Ok(LifecycleRule {
                id: block.get_str("id")?.unwrap_or_default().to_string(),
                prefix: block.get_str("prefix")?.unwrap_or_default().to_string(),
                status: status.to_string(),
                expiration,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LifecycleConfiguration { rules })
}

pub fn lifecycle_from_config(config: &LifecycleConfiguration) -> Vec<AttributeSet> {
    config
        .rules
        .iter()
        .map(|rule| {
            let mut block = AttributeSet::new().with_bool("enabled", rule.status == STATUS_ENABLED);
            insert_nonempty(&mut block, "id", Some(rule.id.as_str()));
            insert_nonempty(&mut block, "prefix", Some(rule.prefix.as_str()));
            if let Some(expiration) = &rule.expiration {
                let mut exp = AttributeSet::new();
                if let Some(days) = expiration.days {
                    exp.insert("days", AttrValue::Int(days));
                }
                insert_nonempty(&mut exp, "date", expiration.date.as_deref());
                block.insert("expiration", AttrValue::BlockSet(vec![exp]));
            }
            block
        })
        .collect()
}

// ---- whole bucket ----

/// Rewrites sub-blocks into the form a read reports after they are applied.
///
/// An unset `allow_empty` becomes the vendor default and a referer block equal
/// to the default policy disappears. A lifecycle rule declared without an id
/// takes the id the vendor generated for the rule at the same position and prefix.
pub fn with_vendor_defaults(desired: &AttributeSet, prior: &AttributeSet) -> Result<AttributeSet> {
    let mut normalized = desired.clone();

    if let Some(block) = desired.get_single_block("referer_config")? {
        match referer_from_config(&referer_to_config(block)?) {
            Some(block) => normalized.insert("referer_config", AttrValue::Blocks(vec![block])),
            None => {
                normalized.remove("referer_config");
            }
        }
    }

    let declared = desired.get_blocks("lifecycle_rule")?;
    if declared.iter().any(|rule| !rule.contains("id")) {
        let observed = prior.get_blocks("lifecycle_rule")?;
        let rules = declared
            .iter()
            .enumerate()
            .map(|(i, rule)| match (observed.get(i), rule.contains("id")) {
                (Some(seen), false) if seen.get("prefix") == rule.get("prefix") => {
                    match seen.get("id") {
                        Some(id) => rule.clone().with("id", id.clone()),
                        None => rule.clone(),
                    }
                }
                _ => rule.clone(),
            })
            .collect();
        normalized.insert("lifecycle_rule", AttrValue::Blocks(rules));
    }

    Ok(normalized)
}

pub fn from_snapshot(snapshot: &BucketSnapshot) -> AttributeSet {
    let info = &snapshot.info;
    let mut attributes = AttributeSet::new()
        .with_str("bucket", &info.name)
        .with_str("acl", &info.acl);

    for (name, value) in [
        ("creation_date", &info.creation_date),
        ("extranet_endpoint", &info.extranet_endpoint),
        ("intranet_endpoint", &info.intranet_endpoint),
        ("location", &info.location),
        ("owner", &info.owner.id),
        ("storage_class", &info.storage_class),
    ] {
        insert_nonempty(&mut attributes, name, Some(value.as_str()));
    }

    let mut insert_blocks = |name: &str, blocks: Vec<AttributeSet>| {
        if !blocks.is_empty() {
            attributes.insert(name, AttrValue::Blocks(blocks));
        }
    };
    insert_blocks(
        "cors_rule",
        snapshot.cors.as_ref().map(cors_from_config).unwrap_or_default(),
    );
    insert_blocks(
        "website",
        snapshot.website.iter().map(website_from_config).collect(),
    );
    insert_blocks(
        "logging",
        snapshot.logging.iter().filter_map(logging_from_config).collect(),
    );
    insert_blocks(
        "referer_config",
        snapshot.referer.iter().filter_map(referer_from_config).collect(),
    );
    insert_blocks(
        "lifecycle_rule",
        snapshot
            .lifecycle
            .as_ref()
            .map(lifecycle_from_config)
            .unwrap_or_default(),
    );

    attributes
}
