//! # notion-sync
//!
//! Publish a repository's markdown documentation as Notion pages.
//!
//! Each source file maps to exactly one page. The mapping file remembers
//! which page a file became and the fingerprint of what was last pushed, so
//! unchanged files cost no API calls and changed files update their
//! existing page in place.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Filesystem   │──▶│   SyncEngine     │──▶│  Notion API  │
//! │ docs/**/*.md │   │ (notion-sync-core)│   │  (reqwest)   │
//! └──────────────┘   └────────┬─────────┘   └──────────────┘
//!        ▲                    │
//!        │ notion_url         ▼
//!        └──────────── mappings.json
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export NOTION_TOKEN=secret_…
//! notion-sync sync --parent-page-id 0f1e… --files-pattern 'docs/**/*.md'
//! notion-sync status
//! notion-sync sync --dry-run
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + env + CLI configuration |
//! | [`connector_fs`] | File discovery and the filesystem document source |
//! | [`frontmatter`] | YAML frontmatter split/parse/render |
//! | [`mapping_file`] | JSON mapping store |
//! | [`notion`] | Notion API gateway and block rendering |
//! | [`repo_context`] | GitHub coordinates for source links |
//! | [`ingest`] | Pipeline orchestration |
//! | [`report`] | Run report and GitHub Actions outputs |
//! | [`progress`] | Progress reporting on stderr |

pub mod config;
pub mod connector_fs;
pub mod frontmatter;
pub mod ingest;
pub mod mapping_file;
pub mod notion;
pub mod progress;
pub mod repo_context;
pub mod report;
