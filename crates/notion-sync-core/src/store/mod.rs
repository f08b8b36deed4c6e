//! Page-identity mapping storage.
//!
//! The [`MappingStore`] trait is the only view the sync engine has of
//! persisted sync state. Backends are keyed by source path: there is at
//! most one [`PageMapping`] per path at any time.
//!
//! Implementations must be `Send + Sync` so documents can be synced
//! concurrently against one store. A backend whose persisted state cannot
//! be read must report an error instead of behaving as if it were empty;
//! an empty store makes every document look new and would duplicate every
//! page.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::PageMapping;

/// Abstract mapping storage.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_by_path`](MappingStore::find_by_path) | Look up the mapping for a source path |
/// | [`save`](MappingStore::save) | Insert or replace the mapping for `mapping.file_path` |
/// | [`delete`](MappingStore::delete) | Remove the mapping for a path |
/// | [`find_all`](MappingStore::find_all) | All mappings, sorted by path |
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_by_path(&self, path: &str) -> Result<Option<PageMapping>>;

    /// Upsert keyed by `file_path`.
    async fn save(&self, mapping: &PageMapping) -> Result<()>;

    /// Returns `true` if a mapping was removed.
    async fn delete(&self, path: &str) -> Result<bool>;

    async fn find_all(&self) -> Result<Vec<PageMapping>>;
}
