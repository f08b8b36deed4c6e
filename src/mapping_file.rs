//! JSON-file [`MappingStore`].
//!
//! The whole file is loaded once at open and rewritten on every change:
//!
//! ```json
//! {
//!   "version": 1,
//!   "mappings": {
//!     "docs/a.md": {
//!       "page_id": "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0",
//!       "last_synced": "2026-01-01T00:00:00Z",
//!       "checksum": "sha256:…"
//!     }
//!   }
//! }
//! ```
//!
//! A missing file is an empty store. A file that exists but cannot be read
//! or parsed is an error: treating it as empty would create a duplicate page
//! for every document.
//!
//! Writes go to a sibling temp file that is renamed over the target, and a
//! mutex serialises them, so concurrent syncs in one process never lose an
//! update and a crash never leaves a half-written file.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use notion_sync_core::fingerprint::Fingerprint;
use notion_sync_core::models::PageMapping;
use notion_sync_core::store::MappingStore;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum MappingFileError {
    #[error("failed to read mapping file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mapping file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("mapping file {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("failed to write mapping file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct MappingFile {
    version: u32,
    #[serde(default)]
    mappings: BTreeMap<String, MappingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MappingEntry {
    page_id: String,
    #[serde(default)]
    last_synced: Option<DateTime<Utc>>,
    checksum: Fingerprint,
}

impl MappingEntry {
    fn into_mapping(self, path: String) -> PageMapping {
        PageMapping {
            file_path: path,
            page_id: self.page_id,
            checksum: self.checksum,
            last_synced: self.last_synced,
        }
    }
}

impl From<&PageMapping> for MappingEntry {
    fn from(m: &PageMapping) -> Self {
        Self {
            page_id: m.page_id.clone(),
            last_synced: m.last_synced,
            checksum: m.checksum.clone(),
        }
    }
}

pub struct JsonMappingStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, MappingEntry>>,
}

impl JsonMappingStore {
    /// Load the store at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but is unreadable, is not valid JSON, or
    /// has an unknown `version`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, MappingFileError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse(&path, &raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(MappingFileError::Read { path, source }),
        };
        debug!(path = %path.display(), count = entries.len(), "opened mapping file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, entries: &BTreeMap<String, MappingEntry>) -> Result<(), MappingFileError> {
        let file = MappingFile {
            version: FORMAT_VERSION,
            mappings: entries.clone(),
        };
        let write_err = |source| MappingFileError::Write {
            path: self.path.clone(),
            source,
        };

        let mut json = serde_json::to_string_pretty(&file)
            .map_err(|e| write_err(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        json.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

fn parse(path: &Path, raw: &str) -> Result<BTreeMap<String, MappingEntry>, MappingFileError> {
    let file: MappingFile = serde_json::from_str(raw).map_err(|source| MappingFileError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    if file.version != FORMAT_VERSION {
        return Err(MappingFileError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: file.version,
        });
    }
    Ok(file.mappings)
}

#[async_trait]
impl MappingStore for JsonMappingStore {
    async fn find_by_path(&self, path: &str) -> Result<Option<PageMapping>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(path)
            .cloned()
            .map(|e| e.into_mapping(path.to_string())))
    }

    async fn save(&self, mapping: &PageMapping) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(mapping.file_path.clone(), MappingEntry::from(mapping));
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(path) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(path);
        self.persist(&next).await?;
        *entries = next;
        Ok(true)
    }

    async fn find_all(&self) -> Result<Vec<PageMapping>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .map(|(path, e)| e.clone().into_mapping(path.clone()))
            .collect())
    }
}
