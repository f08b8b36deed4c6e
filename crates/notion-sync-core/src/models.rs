//! Core data models used throughout notion-sync.
//!
//! [`Document`] and [`RemotePage`] are values: every `with_*` method
//! consumes the value and returns an updated copy. [`PageMapping`] is the
//! durable join between a source path and a remote page id.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::block::Block;
use crate::error::SyncError;
use crate::fingerprint::{fingerprint, Fingerprint};

/// Insertion-ordered frontmatter.
pub type Metadata = Map<String, Value>;

/// Frontmatter key holding the back-reference to the remote page.
pub const NOTION_URL_KEY: &str = "notion_url";
/// Frontmatter key holding the time of the last link write-back.
pub const LAST_SYNCED_KEY: &str = "last_synced";

/// Canonical browser URL for a page id.
pub fn page_url(page_id: &str) -> String {
    format!("https://www.notion.so/{}", page_id.replace('-', ""))
}

/// One source file at a point in time.
///
/// The fingerprint covers `content` only. Frontmatter written back by the
/// link reconciler therefore never changes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: String,
    content: String,
    metadata: Metadata,
    fingerprint: Fingerprint,
}

impl Document {
    pub fn new(path: impl Into<String>, content: impl Into<String>, metadata: Metadata) -> Self {
        let content = content.into();
        let fingerprint = fingerprint(content.as_bytes());
        Self {
            path: path.into(),
            content,
            metadata,
            fingerprint,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// String value of a frontmatter key, if present and a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Display title: frontmatter `title`, else the file stem, never empty.
    pub fn title(&self) -> String {
        if let Some(title) = self
            .metadata_str("title")
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return title.to_string();
        }

        let trimmed = self.path.trim_end_matches('/');
        let file_name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        let stem = match file_name.rfind('.') {
            Some(dot) if dot > 0 => &file_name[..dot],
            _ => file_name,
        };

        if !stem.is_empty() {
            stem.to_string()
        } else if !self.path.is_empty() {
            self.path.clone()
        } else {
            "Untitled".to_string()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata_entries<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (k, v) in entries {
            self.metadata.insert(k.into(), v);
        }
        self
    }

    /// Replace the body, recomputing the fingerprint.
    pub fn with_content(self, content: impl Into<String>) -> Self {
        Document::new(self.path, content, self.metadata)
    }

    /// Same path and same fingerprint, regardless of metadata.
    pub fn is_content_equivalent(&self, other: &Document) -> bool {
        self.path == other.path && self.fingerprint == other.fingerprint
    }
}

/// Access level applied to created pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PagePermission {
    /// No edits. The most restrictive level and the default.
    #[default]
    ReadOnly,
    Comment,
    Edit,
}

impl PagePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            PagePermission::ReadOnly => "read-only",
            PagePermission::Comment => "comment",
            PagePermission::Edit => "edit",
        }
    }
}

impl fmt::Display for PagePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PagePermission {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read-only" | "read_only" | "readonly" | "no-edit" => Ok(PagePermission::ReadOnly),
            "comment" => Ok(PagePermission::Comment),
            "edit" => Ok(PagePermission::Edit),
            other => Err(SyncError::InvalidConfiguration(format!(
                "unknown page permission '{}'. Must be read-only, comment, or edit.",
                other
            ))),
        }
    }
}

/// Reference fields carried alongside a page's content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notion_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<String>,
}

/// The synced destination artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePage {
    /// `None` until the gateway creates the page.
    pub id: Option<String>,
    pub title: String,
    pub blocks: Vec<Block>,
    pub metadata: PageMetadata,
    pub permissions: PagePermission,
}

impl RemotePage {
    pub fn new(title: impl Into<String>, blocks: Vec<Block>, metadata: PageMetadata) -> Self {
        Self {
            id: None,
            title: title.into(),
            blocks,
            metadata,
            permissions: PagePermission::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_metadata(mut self, metadata: PageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_permissions(mut self, permissions: PagePermission) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_prepended_block(mut self, block: Block) -> Self {
        self.blocks.insert(0, block);
        self
    }

    /// Browser URL: the gateway-reported one, else derived from the id.
    pub fn url(&self) -> Option<String> {
        self.metadata
            .notion_url
            .clone()
            .or_else(|| self.id.as_deref().map(page_url))
    }
}

/// Durable association between a source path and its remote page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMapping {
    pub file_path: String,
    pub page_id: String,
    /// Fingerprint of the body at the last successful sync.
    pub checksum: Fingerprint,
    pub last_synced: Option<DateTime<Utc>>,
}

impl PageMapping {
    pub fn new(
        file_path: impl Into<String>,
        page_id: impl Into<String>,
        checksum: Fingerprint,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            page_id: page_id.into(),
            checksum,
            last_synced: None,
        }
    }

    pub fn synced_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_synced = Some(at);
        self
    }
}

/// Result of one document's sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Created,
    Updated,
    Unchanged,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Created => "created",
            SyncStatus::Updated => "updated",
            SyncStatus::Unchanged => "unchanged",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine did for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub path: String,
    pub status: SyncStatus,
    pub page_id: String,
    pub url: Option<String>,
}
