//! In-memory [`MappingStore`] implementation for tests and dry runs.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Counts saves so tests can
//! assert that an operation left the store untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::PageMapping;

use super::MappingStore;

/// In-memory mapping store.
pub struct InMemoryMappingStore {
    mappings: RwLock<HashMap<String, PageMapping>>,
    saves: AtomicUsize,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self {
            mappings: RwLock::new(HashMap::new()),
            saves: AtomicUsize::new(0),
        }
    }

    /// Seed the store without counting as a save.
    pub fn with_mappings(mappings: impl IntoIterator<Item = PageMapping>) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.mappings.write() {
            for m in mappings {
                guard.insert(m.file_path.clone(), m);
            }
        }
        store
    }

    /// Number of successful [`save`](MappingStore::save) calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.mappings.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn find_by_path(&self, path: &str) -> Result<Option<PageMapping>> {
        let mappings = self
            .mappings
            .read()
            .map_err(|_| anyhow!("mapping store lock poisoned"))?;
        Ok(mappings.get(path).cloned())
    }

    async fn save(&self, mapping: &PageMapping) -> Result<()> {
        let mut mappings = self
            .mappings
            .write()
            .map_err(|_| anyhow!("mapping store lock poisoned"))?;
        mappings.insert(mapping.file_path.clone(), mapping.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let mut mappings = self
            .mappings
            .write()
            .map_err(|_| anyhow!("mapping store lock poisoned"))?;
        Ok(mappings.remove(path).is_some())
    }

    async fn find_all(&self) -> Result<Vec<PageMapping>> {
        let mappings = self
            .mappings
            .read()
            .map_err(|_| anyhow!("mapping store lock poisoned"))?;
        let mut all: Vec<PageMapping> = mappings.values().cloned().collect();
        all.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(all)
    }
}
