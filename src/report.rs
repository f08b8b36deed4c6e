//! Per-invocation sync report.
//!
//! Collects every document's outcome (or error) into counts plus a
//! path-sorted detail list, and renders it for humans, as JSON, and as
//! GitHub Actions step outputs.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use notion_sync_core::error::SyncResult;
use notion_sync_core::models::{SyncOutcome, SyncStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub path: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedPage {
    pub path: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: usize,
    pub details: Vec<ReportEntry>,
}

impl SyncReport {
    /// Build a report from `(path, result)` pairs in any order.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = (String, SyncResult<SyncOutcome>)>,
    {
        let mut report = SyncReport::default();
        for (path, result) in results {
            let entry = match result {
                Ok(outcome) => ReportEntry {
                    path,
                    status: outcome.status,
                    page_id: Some(outcome.page_id),
                    url: outcome.url,
                    error: None,
                },
                Err(e) => ReportEntry {
                    path,
                    status: SyncStatus::Error,
                    page_id: None,
                    url: None,
                    error: Some(e.to_string()),
                },
            };
            match entry.status {
                SyncStatus::Created => report.created += 1,
                SyncStatus::Updated => report.updated += 1,
                SyncStatus::Unchanged => report.unchanged += 1,
                SyncStatus::Error => report.errors += 1,
            }
            report.details.push(entry);
        }
        report.total = report.details.len();
        report.details.sort_by(|a, b| a.path.cmp(&b.path));
        report
    }

    /// Documents that did not error.
    pub fn synced_count(&self) -> usize {
        self.total - self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn synced_pages(&self) -> Vec<SyncedPage> {
        self.details
            .iter()
            .filter(|e| e.status != SyncStatus::Error)
            .map(|e| SyncedPage {
                path: e.path.clone(),
                url: e.url.clone(),
            })
            .collect()
    }

    pub fn print_human(&self, dry_run: bool) {
        if dry_run {
            println!("sync (dry-run)");
        } else {
            println!("sync");
        }
        for entry in &self.details {
            match (&entry.error, &entry.url) {
                (Some(err), _) => println!("  {}  error  {}", entry.path, err),
                (None, Some(url)) => println!("  {}  {}  {}", entry.path, entry.status, url),
                (None, None) => println!("  {}  {}", entry.path, entry.status),
            }
        }
        println!(
            "  total: {}  created: {}  updated: {}  unchanged: {}  errors: {}",
            self.total, self.created, self.updated, self.unchanged, self.errors
        );
        if !self.has_errors() {
            println!("ok");
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append `synced-count`, `synced-pages`, and `report` to a GitHub
    /// Actions output file (the path in `$GITHUB_OUTPUT`).
    pub fn write_github_output(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open GitHub output file: {}", path.display()))?;

        let pages = serde_json::to_string(&self.synced_pages())?;
        let report = serde_json::to_string(self)?;
        write!(
            file,
            "synced-count={}\nsynced-pages={}\nreport={}\n",
            self.synced_count(),
            pages,
            report
        )
        .with_context(|| format!("Failed to write GitHub output file: {}", path.display()))?;
        Ok(())
    }
}
