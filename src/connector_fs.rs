//! Filesystem document source.
//!
//! [`discover`] walks the configured root and returns the relative paths
//! matching `files_pattern`. [`FsDocumentSource`] loads and saves those
//! paths as [`Document`]s, splitting off YAML frontmatter on the way in
//! and rendering it back on the way out.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use notion_sync_core::models::Document;
use notion_sync_core::source::DocumentSource;

use crate::config::SyncConfig;
use crate::frontmatter::{parse_document, render_document};

/// List source paths under `config.root`, relative to it, `/`-separated
/// and sorted.
pub fn discover(config: &SyncConfig) -> Result<Vec<String>> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("sync root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.files_pattern)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.notion-sync/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = to_source_path(relative);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }
        paths.push(rel_str);
    }

    paths.sort();
    debug!(root = %root.display(), count = paths.len(), "discovered source files");
    Ok(paths)
}

/// Normalise a relative path to the `a/b/c.md` form used as mapping key.
fn to_source_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob '{}'", pattern))?);
    }
    Ok(builder.build()?)
}

/// Reads and writes documents relative to a root directory.
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a source path onto the filesystem, refusing anything that
    /// would escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            bail!("source path '{}' must be relative to the sync root", path);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn find_by_path(&self, path: &str) -> Result<Option<Document>> {
        let full = self.resolve(path)?;
        let raw = match tokio::fs::read_to_string(&full).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", full.display()))
            }
        };
        parse_document(path, &raw).map(Some)
    }

    async fn save(&self, document: &Document) -> Result<()> {
        let full = self.resolve(document.path())?;
        let rendered = render_document(document)?;

        // Write next to the target and rename so readers never see a torn file.
        let tmp = full.with_extension("md.notion-sync.tmp");
        tokio::fs::write(&tmp, rendered)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &full)
            .await
            .with_context(|| format!("failed to replace {}", full.display()))?;

        debug!(path = document.path(), "saved document");
        Ok(())
    }
}
