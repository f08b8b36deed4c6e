//! In-memory [`DocumentSource`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::Document;

use super::DocumentSource;

pub struct InMemoryDocumentSource {
    documents: RwLock<HashMap<String, Document>>,
    saves: AtomicUsize,
    read_only: AtomicBool,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            saves: AtomicUsize::new(0),
            read_only: AtomicBool::new(false),
        }
    }

    /// Add or replace a document without counting as a save.
    pub fn insert(&self, document: Document) {
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(document.path().to_string(), document);
        }
    }

    pub fn remove(&self, path: &str) -> Option<Document> {
        self.documents.write().ok()?.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<Document> {
        self.documents.read().ok()?.get(path).cloned()
    }

    /// Reject every subsequent save, as a read-only checkout would.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of successful [`save`](DocumentSource::save) calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryDocumentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSource for InMemoryDocumentSource {
    async fn find_by_path(&self, path: &str) -> Result<Option<Document>> {
        let docs = self
            .documents
            .read()
            .map_err(|_| anyhow!("document source lock poisoned"))?;
        Ok(docs.get(path).cloned())
    }

    async fn save(&self, document: &Document) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            bail!("cannot write {}: read-only file system", document.path());
        }
        let mut docs = self
            .documents
            .write()
            .map_err(|_| anyhow!("document source lock poisoned"))?;
        docs.insert(document.path().to_string(), document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
