//! Error taxonomy for the sync pipeline.
//!
//! Only [`SyncError::InvalidConfiguration`] is fatal for a whole invocation.
//! Every other variant is scoped to one document: the orchestrator records
//! it in the report and moves on to the next path.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The source path has no resolvable document.
    #[error("Document not found: '{0}'")]
    DocumentNotFound(String),

    /// The remote service has no page with this id.
    ///
    /// The engine never returns this for a mapped page that went missing;
    /// it recreates the page instead.
    #[error("Page not found: '{0}'")]
    PageNotFound(String),

    /// Malformed invocation configuration. Raised before any document is
    /// processed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The page gateway failed while reading or writing the page for `path`.
    #[error("Remote sync failed for '{path}': {source:#}")]
    Remote {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The mapping store failed while reading or writing the mapping for `path`.
    #[error("Mapping store failed for '{path}': {source:#}")]
    Store {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The document source failed to load `path`.
    #[error("Document source failed for '{path}': {source:#}")]
    Source {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub fn remote(path: &str, source: anyhow::Error) -> Self {
        SyncError::Remote {
            path: path.to_string(),
            source,
        }
    }

    pub fn store(path: &str, source: anyhow::Error) -> Self {
        SyncError::Store {
            path: path.to_string(),
            source,
        }
    }

    pub fn document_source(path: &str, source: anyhow::Error) -> Self {
        SyncError::Source {
            path: path.to_string(),
            source,
        }
    }

    /// Whether this error aborts the whole invocation rather than one document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::InvalidConfiguration(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
