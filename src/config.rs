//! Configuration parsing and validation.
//!
//! Settings come from four layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. the TOML file (`./notion-sync.toml` unless `--config` is given)
//! 3. environment variables (`GITHUB_REPOSITORY`, `GITHUB_REF_NAME`,
//!    `GITHUB_SHA`, `GITHUB_SERVER_URL`; `NOTION_TOKEN` arrives through
//!    the CLI layer)
//! 4. command-line flags, collected in [`ConfigOverrides`]
//!
//! Every problem found while resolving is reported as
//! [`SyncError::InvalidConfiguration`], before any document is touched.
//!
//! # Example
//!
//! ```toml
//! [notion]
//! parent_page_id = "0f1e2d3c4b5a69788796a5b4c3d2e1f0"
//!
//! [sync]
//! files_pattern = ["docs/**/*.md"]
//! page_permissions = "read-only"
//!
//! [links]
//! style = "both"
//! ```

use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use notion_sync_core::error::{SyncError, SyncResult};
use notion_sync_core::links::LinkStyle;
use notion_sync_core::models::PagePermission;

/// Config file read when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_PATH: &str = "notion-sync.toml";

const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotionConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub parent_page_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            parent_page_id: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.notion.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Directory that source paths are relative to.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_files_pattern")]
    pub files_pattern: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Relative paths resolve against `root`.
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub preserve_ids: bool,
    #[serde(default)]
    pub page_permissions: PagePermission,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            files_pattern: default_files_pattern(),
            exclude_globs: Vec::new(),
            mapping_file: default_mapping_file(),
            dry_run: false,
            preserve_ids: true,
            page_permissions: PagePermission::ReadOnly,
            concurrency: default_concurrency(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_files_pattern() -> Vec<String> {
    vec!["**/*.md".to_string()]
}
fn default_mapping_file() -> PathBuf {
    PathBuf::from(".notion-sync/mappings.json")
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    3
}

impl SyncConfig {
    /// The mapping file location with relative paths resolved against `root`.
    pub fn mapping_path(&self) -> PathBuf {
        if self.mapping_file.is_absolute() {
            self.mapping_file.clone()
        } else {
            self.root.join(&self.mapping_file)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub style: LinkStyle,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            style: LinkStyle::Both,
        }
    }
}

/// Repository coordinates used for source links and page metadata.
///
/// Unset fields fall back to the `GITHUB_*` variables, then to the local
/// git checkout (see [`crate::repo_context`]).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GithubConfig {
    /// `owner/repo`
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    /// Commit the docs were synced from. Normally only set from `GITHUB_SHA`.
    #[serde(default)]
    pub sha: Option<String>,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub token: Option<String>,
    pub parent_page_id: Option<String>,
    pub root: Option<PathBuf>,
    pub files_pattern: Vec<String>,
    pub mapping_file: Option<PathBuf>,
    pub dry_run: bool,
    pub preserve_ids: Option<bool>,
    pub page_permissions: Option<PagePermission>,
    pub links_enabled: Option<bool>,
    pub link_style: Option<LinkStyle>,
    pub concurrency: Option<usize>,
}

/// Read and parse a config file without validating it.
///
/// With `path == None` the default location is tried and a missing file
/// yields the defaults. An explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> SyncResult<Config> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    if !path.exists() {
        if explicit {
            return Err(SyncError::InvalidConfiguration(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        SyncError::InvalidConfiguration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        SyncError::InvalidConfiguration(format!(
            "failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Load, layer, and validate the configuration for one invocation.
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> SyncResult<Config> {
    let mut config = load_config(path)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Fill repository settings from the environment. `lookup` is
    /// `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GITHUB_REPOSITORY") {
            self.github.repository = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_REF_NAME") {
            self.github.branch = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_SHA") {
            self.github.sha = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_SERVER_URL") {
            self.github.server_url = Some(v);
        }
    }

    pub fn apply_overrides(&mut self, o: &ConfigOverrides) {
        if let Some(token) = &o.token {
            self.notion.token = Some(token.clone());
        }
        if let Some(parent) = &o.parent_page_id {
            self.notion.parent_page_id = Some(parent.clone());
        }
        if let Some(root) = &o.root {
            self.sync.root = root.clone();
        }
        if !o.files_pattern.is_empty() {
            self.sync.files_pattern = o.files_pattern.clone();
        }
        if let Some(mapping_file) = &o.mapping_file {
            self.sync.mapping_file = mapping_file.clone();
        }
        if o.dry_run {
            self.sync.dry_run = true;
        }
        if let Some(preserve) = o.preserve_ids {
            self.sync.preserve_ids = preserve;
        }
        if let Some(permissions) = o.page_permissions {
            self.sync.page_permissions = permissions;
        }
        if let Some(enabled) = o.links_enabled {
            self.links.enabled = enabled;
        }
        if let Some(style) = o.link_style {
            self.links.style = style;
        }
        if let Some(concurrency) = o.concurrency {
            self.sync.concurrency = concurrency;
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        let invalid = |msg: String| Err(SyncError::InvalidConfiguration(msg));

        if !self.sync.dry_run {
            if self.token().is_none() {
                return invalid(
                    "a Notion token is required (set NOTION_TOKEN or pass --remote-token)".into(),
                );
            }
            if self.parent_page_id().is_none() {
                return invalid(
                    "notion.parent_page_id is required unless running with --dry-run".into(),
                );
            }
        }

        if self.sync.concurrency == 0 {
            return invalid("sync.concurrency must be >= 1".into());
        }

        if self.sync.files_pattern.is_empty() {
            return invalid("sync.files_pattern must contain at least one glob".into());
        }
        for pattern in self.sync.files_pattern.iter().chain(&self.sync.exclude_globs) {
            if pattern.trim().is_empty() {
                return invalid("empty glob pattern".into());
            }
            if let Err(e) = Glob::new(pattern) {
                return invalid(format!("invalid glob '{}': {}", pattern, e));
            }
        }

        if self.notion.max_retries > MAX_RETRIES_LIMIT {
            return invalid(format!(
                "notion.max_retries must be <= {}",
                MAX_RETRIES_LIMIT
            ));
        }
        if self.notion.timeout_secs == 0 {
            return invalid("notion.timeout_secs must be > 0".into());
        }

        Ok(())
    }

    /// The API token, ignoring blank values.
    pub fn token(&self) -> Option<&str> {
        self.notion
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn parent_page_id(&self) -> Option<&str> {
        self.notion
            .parent_page_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}
