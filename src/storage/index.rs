//! Metadata index persistence.
//!
//! The index is one pretty-printed JSON document, `{ "rules": [...] }`, rewritten
//! whole after every mutation. It is a cache of the dynamic directory that also
//! carries rule ids from one reconciliation pass to the next.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::Rule;
use crate::storage::fs::{atomic_write, read_if_exists};

/// File name of the index inside the metadata directory.
pub const INDEX_FILE: &str = "index.json";

/// Error type for index persistence.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read index {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write index {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode index: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// Loads and saves the metadata index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    /// Create a store for `{metadata_dir}/index.json`.
    pub fn new(metadata_dir: &Path) -> Self {
        Self {
            path: metadata_dir.join(INDEX_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index. A missing file is an empty index.
    ///
    /// An unreadable document is also treated as empty: the next reconciliation
    /// rebuilds it from disk, only rule ids are lost.
    pub async fn load(&self) -> Result<Vec<Rule>, IndexError> {
        let content = read_if_exists(&self.path)
            .await
            .map_err(|source| IndexError::Read {
                path: self.path.clone(),
                source,
            })?;

        let Some(content) = content else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<IndexDocument>(&content) {
            Ok(doc) => Ok(doc.rules),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Metadata index is corrupt, starting from an empty index"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Replace the persisted index with `rules`.
    pub async fn save(&self, rules: &[Rule]) -> Result<(), IndexError> {
        #[derive(Serialize)]
        struct IndexRef<'a> {
            rules: &'a [Rule],
        }

        let json = serde_json::to_string_pretty(&IndexRef { rules })?;
        atomic_write(&self.path, &json)
            .await
            .map_err(|source| IndexError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSpec;
    use tempfile::TempDir;

    fn rule(id: &str, name: &str) -> Rule {
        Rule {
            id: id.into(),
            spec: RuleSpec::named(name),
            file_name: format!("{}.yaml", name),
            yaml_content: None,
            created_at: None,
            last_modified: None,
            is_valid: true,
            validation_errors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_index_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(&dir.path().join("meta"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());
        let rules = vec![rule("2", "zeta"), rule("1", "alpha")];

        store.save(&rules).await.unwrap();
        assert_eq!(store.load().await.unwrap(), rules);

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(raw.starts_with("{\n  \"rules\": ["));
    }

    #[tokio::test]
    async fn test_corrupt_index_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());
        tokio::fs::write(store.path(), "{ not json").await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }
}
