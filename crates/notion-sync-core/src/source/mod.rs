//! Document source abstraction.
//!
//! A [`DocumentSource`] resolves a source path to its current
//! [`Document`] and persists documents whose frontmatter the link
//! reconciler has updated. The filesystem implementation lives in the
//! `notion-sync` crate; [`memory::InMemoryDocumentSource`] backs tests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load the document at `path`, or `None` if nothing exists there.
    async fn find_by_path(&self, path: &str) -> Result<Option<Document>>;

    /// Persist `document` (body and frontmatter) at its path.
    async fn save(&self, document: &Document) -> Result<()>;
}
