//! Catalog sources: where the character tag snapshot comes from.

use std::path::{Path, PathBuf};

use swipe_core::CharacterEntity;

use crate::error::{Result, StoreError};

/// Something that can produce the full character list on demand.
///
/// Implementations may fail; callers keep serving their previous snapshot.
pub trait CatalogSource: Send + Sync {
    fn load_catalog(&self) -> Result<Vec<CharacterEntity>>;

    /// Short human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// A JSON snapshot on disk: an array of `{ "name": ..., "posts": ... }` objects.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for CatalogFile {
    fn load_catalog(&self) -> Result<Vec<CharacterEntity>> {
        let raw = std::fs::read_to_string(&self.path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let serde_json::Value::Array(items) = value else {
            return Err(StoreError::InvalidData(format!(
                "{}: expected a JSON array of characters",
                self.path.display()
            )));
        };

        let mut entities = Vec::with_capacity(items.len());
        let mut skipped = 0usize;
        for item in items {
            match serde_json::from_value::<CharacterEntity>(item) {
                Ok(entity) if !entity.name.trim().is_empty() => entities.push(entity),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(
                path = %self.path.display(),
                skipped,
                "skipped malformed catalog entries"
            );
        }
        tracing::debug!(path = %self.path.display(), count = entities.len(), "catalog file parsed");
        Ok(entities)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fixed in-memory list. Handy for tests and one-off tools.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entities: Vec<CharacterEntity>,
}

impl StaticCatalog {
    pub fn new(entities: Vec<CharacterEntity>) -> Self {
        Self { entities }
    }
}

impl CatalogSource for StaticCatalog {
    fn load_catalog(&self) -> Result<Vec<CharacterEntity>> {
        Ok(self.entities.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} entries)", self.entities.len())
    }
}
