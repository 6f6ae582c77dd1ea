use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

pub const COLON_SEPARATED: &str = ":";

/// A typed attribute value.
///
/// `Blocks` is an ordered list of nested blocks; `BlockSet` is an unordered
/// one and compares equal regardless of element order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    StrList(Vec<String>),
    StrMap(BTreeMap<String, String>),
    Blocks(Vec<AttributeSet>),
    BlockSet(Vec<AttributeSet>),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::StrList(_) => "list of strings",
            Self::StrMap(_) => "map of strings",
            Self::Blocks(_) => "block list",
            Self::BlockSet(_) => "block set",
        }
    }

    /// Collections whose absence from a declaration means "empty".
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::StrList(_) | Self::StrMap(_) | Self::Blocks(_) | Self::BlockSet(_)
        )
    }

    pub fn is_empty_collection(&self) -> bool {
        match self {
            Self::StrList(v) => v.is_empty(),
            Self::StrMap(m) => m.is_empty(),
            Self::Blocks(b) | Self::BlockSet(b) => b.is_empty(),
            _ => false,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::StrList(v) => serde_json::Value::from(v.clone()),
            Self::StrMap(m) => serde_json::Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
            Self::Blocks(blocks) | Self::BlockSet(blocks) => {
                serde_json::Value::Array(blocks.iter().map(AttributeSet::to_json).collect())
            }
        }
    }

    fn from_json(name: &str, value: &serde_json::Value) -> Result<Option<Self>> {
        use serde_json::Value;

        let converted = match value {
            Value::Null => return Ok(None),
            Value::String(s) => Self::Str(s.clone()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Int(n.as_i64().ok_or_else(|| {
                ReconcileError::validation(name, format!("{} is not an integer", n))
            })?),
            Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
                let blocks = items
                    .iter()
                    .map(AttributeSet::from_json)
                    .collect::<Result<Vec<_>>>()?;
                Self::Blocks(blocks)
            }
            Value::Array(items) => Self::StrList(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            ReconcileError::validation(name, "list elements must be strings")
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(map) => Self::StrMap(
                map.iter()
                    .map(|(k, v)| {
                        v.as_str()
                            .map(|s| (k.clone(), s.to_string()))
                            .ok_or_else(|| {
                                ReconcileError::validation(name, "map values must be strings")
                            })
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?,
            ),
        };
        Ok(Some(converted))
    }
}

fn same_elements(a: &[AttributeSet], b: &[AttributeSet]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|item| {
        match b
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && candidate == item)
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::StrList(a), Self::StrList(b)) => a == b,
            (Self::StrMap(a), Self::StrMap(b)) => a == b,
            (Self::Blocks(a), Self::Blocks(b)) => a == b,
            (Self::BlockSet(a), Self::BlockSet(b))
            | (Self::BlockSet(a), Self::Blocks(b))
            | (Self::Blocks(a), Self::BlockSet(b)) => same_elements(a, b),
            _ => false,
        }
    }
}

/// Declared or observed attributes of one entity, keyed by schema name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet {
    values: BTreeMap<String, AttrValue>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_str(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, AttrValue::Str(value.into()))
    }

    pub fn with_int(self, name: impl Into<String>, value: i64) -> Self {
        self.with(name, AttrValue::Int(value))
    }

    pub fn with_bool(self, name: impl Into<String>, value: bool) -> Self {
        self.with(name, AttrValue::Bool(value))
    }

    pub fn with_strs<I, S>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(
            name,
            AttrValue::StrList(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttrValue) {
        self.values.insert(name.into(), value);
    }

    /// Inserts only when `value` is present.
    pub fn insert_opt(&mut self, name: &str, value: Option<AttrValue>) {
        if let Some(value) = value {
            self.values.insert(name.to_string(), value);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn mismatch(name: &str, expected: &str, found: &AttrValue) -> ReconcileError {
        ReconcileError::validation(
            name,
            format!("expected {}, found {}", expected, found.type_name()),
        )
    }

    pub fn get_str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(AttrValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(Self::mismatch(name, "string", other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(AttrValue::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(Self::mismatch(name, "int", other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(AttrValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(Self::mismatch(name, "bool", other)),
        }
    }

    pub fn get_strs(&self, name: &str) -> Result<&[String]> {
        match self.get(name) {
            None => Ok(&[]),
            Some(AttrValue::StrList(v)) => Ok(v),
            Some(other) => Err(Self::mismatch(name, "list of strings", other)),
        }
    }

    pub fn get_map(&self, name: &str) -> Result<Option<&BTreeMap<String, String>>> {
        match self.get(name) {
            None => Ok(None),
            Some(AttrValue::StrMap(m)) => Ok(Some(m)),
            Some(other) => Err(Self::mismatch(name, "map of strings", other)),
        }
    }

    /// Nested blocks, whether declared as a list or a set.
    pub fn get_blocks(&self, name: &str) -> Result<&[AttributeSet]> {
        match self.get(name) {
            None => Ok(&[]),
            Some(AttrValue::Blocks(b)) | Some(AttrValue::BlockSet(b)) => Ok(b),
            Some(other) => Err(Self::mismatch(name, "nested blocks", other)),
        }
    }

    /// At most one nested block.
    pub fn get_single_block(&self, name: &str) -> Result<Option<&AttributeSet>> {
        let blocks = self.get_blocks(name)?;
        match blocks {
            [] => Ok(None),
            [block] => Ok(Some(block)),
            _ => Err(ReconcileError::validation(
                name,
                format!("at most one block allowed, found {}", blocks.len()),
            )),
        }
    }

    pub fn require_str(&self, name: &str) -> Result<&str> {
        match self.get_str(name)? {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(ReconcileError::validation(name, "required attribute is missing")),
        }
    }

    pub fn require_bool(&self, name: &str) -> Result<bool> {
        self.get_bool(name)?
            .ok_or_else(|| ReconcileError::validation(name, "required attribute is missing"))
    }

    /// Keeps only the named attributes.
    pub fn restrict_to<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> AttributeSet {
        let mut restricted = AttributeSet::new();
        for name in names {
            if let Some(value) = self.get(name) {
                restricted.insert(name, value.clone());
            }
        }
        restricted
    }

    /// Plain JSON rendering, used for output files and display.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Builds a declaration from plain JSON: arrays of objects become block
    /// lists, objects become string maps.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ReconcileError::validation("<root>", "expected a JSON object"))?;

        let mut attributes = AttributeSet::new();
        for (name, value) in object {
            attributes.insert_opt(name, AttrValue::from_json(name, value)?);
        }
        Ok(attributes)
    }
}

/// One attribute-level change between prior and desired state.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Added(AttrValue),
    Removed(AttrValue),
    Modified { from: AttrValue, to: AttrValue },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeDiff {
    pub changes: BTreeMap<String, Change>,
}

impl AttributeDiff {
    /// Scalars left out of `desired` keep whatever the vendor assigned and
    /// never produce a change. Collections left out mean "empty".
    pub fn compute(prior: &AttributeSet, desired: &AttributeSet) -> Self {
        let mut changes = BTreeMap::new();

        for (name, to) in desired.iter() {
            match prior.get(name) {
                None if to.is_empty_collection() => {}
                None => {
                    changes.insert(name.clone(), Change::Added(to.clone()));
                }
                Some(from) if from != to => {
                    changes.insert(
                        name.clone(),
                        Change::Modified {
                            from: from.clone(),
                            to: to.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }

        for (name, from) in prior.iter() {
            if !desired.contains(name) && from.is_collection() && !from.is_empty_collection() {
                changes.insert(name.clone(), Change::Removed(from.clone()));
            }
        }

        Self { changes }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changed(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Change> {
        self.changes.get(name)
    }

    pub fn changed_names(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn requires_replacement(&self, force_new: &[&str]) -> bool {
        force_new.iter().any(|name| self.changed(name))
    }
}

/// A managed entity: its identifier, type tag and current attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_type: String,
    pub id: String,
    pub attributes: AttributeSet,
}

impl ResourceDescriptor {
    pub fn new(resource_type: &str, id: impl Into<String>, attributes: AttributeSet) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: id.into(),
            attributes,
        }
    }
}

pub fn composite_id(parts: &[&str]) -> String {
    parts.join(COLON_SEPARATED)
}

pub fn split_composite_id(id: &str, expected: usize) -> Result<Vec<&str>> {
    let parts: Vec<&str> = id.split(COLON_SEPARATED).collect();
    if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
        return Err(ReconcileError::validation(
            "id",
            format!(
                "expected {} parts separated by '{}', got '{}'",
                expected, COLON_SEPARATED, id
            ),
        ));
    }
    Ok(parts)
}
