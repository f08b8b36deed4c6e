//! Bidirectional link reconciliation.
//!
//! After a document has been created or updated remotely, the
//! [`LinkReconciler`] makes each side point at the other:
//!
//! - the document's frontmatter gets `notion_url` (plus `last_synced`),
//!   saved through the [`DocumentSource`];
//! - the page gets a callout block linking back to the file on GitHub,
//!   written through the [`PageGateway`].
//!
//! Both checks are independent and idempotent. Once both links are present,
//! reconciling again performs no writes, so a failure halfway through is
//! safe to retry on the next run.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::block::{Block, RichText, TextSpan};
use crate::error::SyncError;
use crate::gateway::PageGateway;
use crate::models::{page_url, Document, RemotePage, LAST_SYNCED_KEY, NOTION_URL_KEY};
use crate::source::DocumentSource;

/// Which side(s) of the link to maintain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// Only write `notion_url` into the document's frontmatter.
    Frontmatter,
    /// Only add the source callout to the page.
    Callout,
    #[default]
    Both,
}

impl LinkStyle {
    pub fn writes_frontmatter(&self) -> bool {
        matches!(self, LinkStyle::Frontmatter | LinkStyle::Both)
    }

    pub fn writes_callout(&self) -> bool {
        matches!(self, LinkStyle::Callout | LinkStyle::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStyle::Frontmatter => "frontmatter",
            LinkStyle::Callout => "callout",
            LinkStyle::Both => "both",
        }
    }
}

impl fmt::Display for LinkStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStyle {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frontmatter" => Ok(LinkStyle::Frontmatter),
            "callout" => Ok(LinkStyle::Callout),
            "both" | "frontmatter,callout" | "callout,frontmatter" => Ok(LinkStyle::Both),
            other => Err(SyncError::InvalidConfiguration(format!(
                "unknown link style '{}'. Must be frontmatter, callout, or both.",
                other
            ))),
        }
    }
}

/// Where the source files live, used to build GitHub links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    /// e.g. `https://github.com`
    pub server_url: String,
    /// `owner/repo`
    pub repository: String,
    pub branch: String,
}

impl RepoContext {
    /// Browser URL of `path` on the configured branch.
    pub fn file_url(&self, path: &str) -> String {
        format!(
            "{}/{}/blob/{}/{}",
            self.server_url.trim_end_matches('/'),
            self.repository.trim_matches('/'),
            self.branch,
            path.trim_start_matches("./")
        )
    }
}

/// What [`LinkReconciler::update_links`] wrote.
#[derive(Debug, Clone)]
pub struct LinkUpdate {
    pub document: Document,
    pub page: RemotePage,
    pub document_saved: bool,
    pub page_updated: bool,
}

pub struct LinkReconciler {
    source: Arc<dyn DocumentSource>,
    gateway: Arc<dyn PageGateway>,
    style: LinkStyle,
    repo: Option<RepoContext>,
}

impl LinkReconciler {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        gateway: Arc<dyn PageGateway>,
        style: LinkStyle,
        repo: Option<RepoContext>,
    ) -> Self {
        Self {
            source,
            gateway,
            style,
            repo,
        }
    }

    /// Ensure both back-references exist, returning the (possibly) updated
    /// values.
    ///
    /// Both sides are attempted even if the first fails; the error, if any,
    /// describes every failed side.
    pub async fn update_links(&self, document: Document, page: RemotePage) -> Result<LinkUpdate> {
        let page_id = page
            .id
            .clone()
            .ok_or_else(|| anyhow!("page for '{}' has no id", document.path()))?;

        let mut failures = Vec::new();

        let (document, document_saved) = match self.link_document(document, &page_id).await {
            Ok(result) => result,
            Err((document, e)) => {
                warn!(path = document.path(), error = %format!("{:#}", e), "frontmatter link failed");
                failures.push(format!("{:#}", e));
                (document, false)
            }
        };

        let (page, page_updated) = match self.link_page(&document, page).await {
            Ok(result) => result,
            Err((page, e)) => {
                warn!(path = document.path(), error = %format!("{:#}", e), "page link failed");
                failures.push(format!("{:#}", e));
                (page, false)
            }
        };

        if !failures.is_empty() {
            return Err(anyhow!(
                "link reconciliation for '{}' failed: {}",
                document.path(),
                failures.join("; ")
            ));
        }

        Ok(LinkUpdate {
            document,
            page,
            document_saved,
            page_updated,
        })
    }

    /// `page` with the source callout prepended and `github_url` set.
    ///
    /// Returns `page` as is when the style has no callout, the repository
    /// is unknown, or the page already links back.
    pub fn with_source_callout(&self, path: &str, page: RemotePage) -> RemotePage {
        if !self.style.writes_callout() || page.metadata.github_url.is_some() {
            return page;
        }
        let Some(repo) = &self.repo else {
            return page;
        };

        let github_url = repo.file_url(path);
        let mut metadata = page.metadata.clone();
        metadata.github_url = Some(github_url.clone());
        page.with_prepended_block(source_callout(path, &github_url))
            .with_metadata(metadata)
    }

    async fn link_document(
        &self,
        document: Document,
        page_id: &str,
    ) -> Result<(Document, bool), (Document, anyhow::Error)> {
        if !self.style.writes_frontmatter() {
            return Ok((document, false));
        }

        let expected = page_url(page_id);
        if document.metadata_str(NOTION_URL_KEY) == Some(expected.as_str()) {
            return Ok((document, false));
        }

        let linked = document
            .clone()
            .with_metadata(NOTION_URL_KEY, expected)
            .with_metadata(
                LAST_SYNCED_KEY,
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            );

        match self
            .source
            .save(&linked)
            .await
            .with_context(|| format!("failed to save frontmatter for '{}'", linked.path()))
        {
            Ok(()) => {
                debug!(path = linked.path(), "wrote notion_url to frontmatter");
                Ok((linked, true))
            }
            Err(e) => Err((document, e)),
        }
    }

    async fn link_page(
        &self,
        document: &Document,
        page: RemotePage,
    ) -> Result<(RemotePage, bool), (RemotePage, anyhow::Error)> {
        if !self.style.writes_callout() || page.metadata.github_url.is_some() {
            return Ok((page, false));
        }

        if self.repo.is_none() {
            debug!(
                path = document.path(),
                "no repository context; skipping source callout"
            );
            return Ok((page, false));
        }

        let linked = self.with_source_callout(document.path(), page.clone());

        match self
            .gateway
            .update(&linked)
            .await
            .with_context(|| format!("failed to add source link to page for '{}'", document.path()))
        {
            Ok(updated) => {
                debug!(path = document.path(), "added source callout to page");
                Ok((updated, true))
            }
            Err(e) => Err((page, e)),
        }
    }
}

/// Callout shown at the top of every synced page.
pub fn source_callout(path: &str, github_url: &str) -> Block {
    Block::Callout {
        text: RichText(vec![
            TextSpan::plain("Synced from "),
            TextSpan::link(path, github_url),
            TextSpan::plain(". Edit the source file; changes made here are replaced on the next sync."),
        ]),
        icon: Some("🔗".to_string()),
    }
}
