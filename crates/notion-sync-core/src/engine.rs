//! The sync decision engine.
//!
//! [`SyncEngine::sync`] runs one document through its whole life-cycle:
//!
//! ```text
//! resolve document ─▶ resolve mapping ─▶ checksum equal? ──yes──▶ unchanged
//!                                              │ no
//!                                              ▼
//!                                          dry run? ──yes──▶ created/updated (sentinel id)
//!                                              │ no
//!                                              ▼
//!                          mapped page still exists? ──yes──▶ replace blocks (updated)
//!                                              │ no
//!                                              ▼
//!                                        create page (created)
//!                                              │
//!                                              ▼
//!                                 save mapping ─▶ reconcile links
//! ```
//!
//! Collaborators are injected through [`SyncEngine::new`]; the engine never
//! looks anything up on its own. Steps within one document are strictly
//! sequential. Different documents share nothing but the mapping store,
//! whose keys are disjoint per path, so callers may run several
//! [`sync`](SyncEngine::sync) futures concurrently.
//!
//! With a link reconciler attached, the source callout is part of the page
//! the engine writes, so the link step afterwards only touches the
//! document's frontmatter.
//!
//! The mapping is saved after the remote write and before `sync` returns.
//! A crash between those two steps leaves a remote page with no mapping,
//! and the next run creates a duplicate.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{info, warn};

use crate::convert::markdown_to_blocks;
use crate::error::{SyncError, SyncResult};
use crate::gateway::PageGateway;
use crate::links::LinkReconciler;
use crate::models::{
    page_url, Document, PageMapping, PageMetadata, PagePermission, RemotePage, SyncOutcome,
    SyncStatus,
};
use crate::source::DocumentSource;
use crate::store::MappingStore;

/// Page id reported for dry-run outcomes.
pub const DRY_RUN_PAGE_ID: &str = "dry-run";

/// Per-invocation engine settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Report what would happen without any remote, mapping, or document writes.
    pub dry_run: bool,
    /// Reuse the mapped page id for changed documents. When `false`, a
    /// changed document always gets a new page (the skip rule still applies).
    pub preserve_ids: bool,
    /// Access level applied to every created page.
    pub permissions: PagePermission,
    /// Commit the synced content came from, recorded in page metadata.
    pub last_commit: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            preserve_ids: true,
            permissions: PagePermission::ReadOnly,
            last_commit: None,
        }
    }
}

pub struct SyncEngine {
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn MappingStore>,
    gateway: Arc<dyn PageGateway>,
    links: Option<LinkReconciler>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn MappingStore>,
        gateway: Arc<dyn PageGateway>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            gateway,
            links: None,
            options,
        }
    }

    /// Run `links` after every successful create or update.
    pub fn with_link_reconciler(mut self, links: LinkReconciler) -> Self {
        self.links = Some(links);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Sync one document.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DocumentNotFound`] if the source has nothing at `path`.
    /// - [`SyncError::Remote`] if the gateway fails; the mapping is untouched.
    /// - [`SyncError::Store`] / [`SyncError::Source`] for collaborator failures.
    ///
    /// A failed link reconciliation is logged and does not fail the sync.
    pub async fn sync(&self, path: &str) -> SyncResult<SyncOutcome> {
        let document = self
            .source
            .find_by_path(path)
            .await
            .map_err(|e| SyncError::document_source(path, e))?
            .ok_or_else(|| SyncError::DocumentNotFound(path.to_string()))?;

        let mapping = self
            .store
            .find_by_path(path)
            .await
            .map_err(|e| SyncError::store(path, e))?;

        if let Some(mapping) = &mapping {
            if &mapping.checksum == document.fingerprint() {
                info!(path, page_id = %mapping.page_id, "unchanged");
                return Ok(SyncOutcome {
                    path: path.to_string(),
                    status: SyncStatus::Unchanged,
                    page_id: mapping.page_id.clone(),
                    url: Some(page_url(&mapping.page_id)),
                });
            }
        }

        let known_page_id = if self.options.preserve_ids {
            mapping.map(|m| m.page_id)
        } else {
            None
        };

        if self.options.dry_run {
            let status = if known_page_id.is_some() {
                SyncStatus::Updated
            } else {
                SyncStatus::Created
            };
            info!(path, status = %status, "dry run");
            return Ok(SyncOutcome {
                path: path.to_string(),
                status,
                page_id: DRY_RUN_PAGE_ID.to_string(),
                url: None,
            });
        }

        let page = self.build_page(&document);

        let existing = match &known_page_id {
            Some(id) => self
                .gateway
                .find_by_id(id)
                .await
                .map_err(|e| SyncError::remote(path, e))?,
            None => None,
        };

        let (status, synced) = match (existing, known_page_id) {
            (Some(_), Some(id)) => {
                let replacement = page.with_id(id);
                let updated = self
                    .gateway
                    .update(&replacement)
                    .await
                    .map_err(|e| SyncError::remote(path, e))?;
                (SyncStatus::Updated, updated)
            }
            (_, known) => {
                if let Some(id) = known {
                    warn!(path, page_id = %id, "mapped page not found remotely, recreating");
                }
                let created = self
                    .gateway
                    .create(&page)
                    .await
                    .map_err(|e| SyncError::remote(path, e))?;
                (SyncStatus::Created, created)
            }
        };

        let page_id = synced.id.clone().ok_or_else(|| {
            SyncError::remote(path, anyhow!("gateway returned a page without an id"))
        })?;

        let mapping = PageMapping::new(path, page_id.clone(), document.fingerprint().clone())
            .synced_at(Utc::now());
        self.store
            .save(&mapping)
            .await
            .map_err(|e| SyncError::store(path, e))?;

        info!(path, page_id = %page_id, status = %status, "synced");

        let url = synced.url();
        if let Some(links) = &self.links {
            if let Err(e) = links.update_links(document, synced).await {
                warn!(path, error = %format!("{:#}", e), "link reconciliation failed");
            }
        }

        Ok(SyncOutcome {
            path: path.to_string(),
            status,
            page_id,
            url,
        })
    }

    /// The page as it should look remotely, source callout included, so
    /// one create or update writes the final content.
    fn build_page(&self, document: &Document) -> RemotePage {
        let page = RemotePage::new(
            document.title(),
            markdown_to_blocks(document.content()),
            PageMetadata {
                source_file: document.path().to_string(),
                last_commit: self.options.last_commit.clone(),
                ..Default::default()
            },
        )
        .with_permissions(self.options.permissions);

        match &self.links {
            Some(links) => links.with_source_callout(document.path(), page),
            None => page,
        }
    }
}
