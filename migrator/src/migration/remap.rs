//! Source → target id remapping for one restore run

use std::collections::HashMap;

use crate::migration::snapshot::ResourceCategory;
use crate::services::errors::MigrationError;

/// Ids are only recorded once the target resource is confirmed created, so
/// every successful [`resolve`](IdRemapTable::resolve) names a real target
/// resource.
#[derive(Debug, Default, Clone)]
pub struct IdRemapTable {
    entries: HashMap<(ResourceCategory, String), String>,
}

impl IdRemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        category: ResourceCategory,
        source_id: &str,
        target_id: &str,
    ) -> Result<(), MigrationError> {
        let key = (category, source_id.to_string());
        if let Some(existing) = self.entries.get(&key) {
            return Err(MigrationError::DuplicateMapping {
                category,
                source_id: source_id.to_string(),
                existing: existing.clone(),
            });
        }
        self.entries.insert(key, target_id.to_string());
        Ok(())
    }

    pub fn resolve(&self, category: ResourceCategory, source_id: &str) -> Result<&str, MigrationError> {
        self.entries
            .get(&(category, source_id.to_string()))
            .map(String::as_str)
            .ok_or_else(|| MigrationError::UnresolvedReference {
                category,
                source_id: source_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
