//! Persisted state of managed entities.
//!
//! Every successful refresh replaces a whole entry. The file is rewritten
//! through a temporary sibling and a rename, and the in-memory copy only
//! changes once that write succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};
use crate::resource::ResourceDescriptor;

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Incremented on every committed change.
    pub serial: u64,
    resources: BTreeMap<String, ResourceDescriptor>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

fn key(resource_type: &str, id: &str) -> String {
    format!("{}/{}", resource_type, id)
}

impl StateFile {
    pub fn in_memory() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            resources: BTreeMap::new(),
            path: None,
        }
    }

    /// Loads state from `path`, starting empty when the file does not exist yet.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let state: StateFile = serde_json::from_slice(&bytes)?;
                if state.version != STATE_VERSION {
                    return Err(ReconcileError::State(format!(
                        "unsupported state version {} in {}",
                        state.version,
                        path.display()
                    )));
                }
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no state file yet, starting empty");
                Self::in_memory()
            }
            Err(e) => return Err(e.into()),
        };
        state.path = Some(path);
        Ok(state)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<&ResourceDescriptor> {
        self.resources.get(&key(resource_type, id))
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Stores `descriptor`, replacing any previous entry for the same entity.
    pub async fn commit(&mut self, descriptor: &ResourceDescriptor) -> Result<()> {
        let mut next = self.resources.clone();
        next.insert(
            key(&descriptor.resource_type, &descriptor.id),
            descriptor.clone(),
        );
        self.replace(next).await
    }

    /// Drops the entry for an entity. Returns whether one existed.
    pub async fn remove(&mut self, resource_type: &str, id: &str) -> Result<bool> {
        let mut next = self.resources.clone();
        if next.remove(&key(resource_type, id)).is_none() {
            return Ok(false);
        }
        self.replace(next).await?;
        Ok(true)
    }

    async fn replace(&mut self, resources: BTreeMap<String, ResourceDescriptor>) -> Result<()> {
        let candidate = StateFile {
            version: self.version,
            serial: self.serial + 1,
            resources,
            path: self.path.clone(),
        };

        if let Some(path) = &self.path {
            candidate.save(path).await?;
        }

        *self = candidate;
        Ok(())
    }

    async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!(path = %path.display(), serial = self.serial, "state saved");
        Ok(())
    }
}
