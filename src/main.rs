//! # notion-sync CLI
//!
//! ## Usage
//!
//! ```bash
//! notion-sync [--config ./notion-sync.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `notion-sync sync` | Create or update a Notion page for every changed file |
//! | `notion-sync status` | Show which files are new, changed, or synced (offline) |
//! | `notion-sync mappings` | List stored file → page mappings |
//! | `notion-sync forget <path>` | Drop one mapping so the next sync creates a fresh page |
//!
//! Results go to stdout; logs and progress go to stderr.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use notion_sync::config::{self, Config, ConfigOverrides};
use notion_sync::ingest;
use notion_sync::progress::ProgressMode;
use notion_sync_core::links::LinkStyle;
use notion_sync_core::models::{page_url, PagePermission};
use notion_sync_core::store::MappingStore;

/// Sync markdown documentation into Notion pages.
#[derive(Parser)]
#[command(
    name = "notion-sync",
    about = "Sync markdown documentation from a repository into Notion pages",
    version
)]
struct Cli {
    /// Path to the configuration file (TOML).
    ///
    /// Defaults to `./notion-sync.toml`; a missing default file is fine,
    /// a missing explicit one is an error.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync matching files to Notion.
    ///
    /// Unchanged files are skipped; changed files update their existing
    /// page; new files (or files whose page was deleted) get a new page.
    Sync(SyncArgs),

    /// Show the sync state of every matching file without calling Notion.
    Status(SelectArgs),

    /// List stored file → page mappings.
    Mappings(SelectArgs),

    /// Remove the mapping for one file.
    ///
    /// The next sync creates a new page for it; the old page is left alone.
    Forget {
        /// Source path as stored in the mapping file (e.g. `docs/a.md`).
        path: String,

        #[command(flatten)]
        select: SelectArgs,
    },
}

/// Where the files and the mapping file live.
#[derive(Args, Clone, Default)]
struct SelectArgs {
    /// Directory source paths are relative to.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Glob selecting files to sync (repeatable).
    #[arg(long = "files-pattern")]
    files_pattern: Vec<String>,

    /// Mapping file location (relative paths resolve against the root).
    #[arg(long)]
    mapping_file: Option<PathBuf>,
}

#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    select: SelectArgs,

    /// Notion integration token.
    #[arg(long = "remote-token", env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Page under which new pages are created.
    #[arg(long, env = "NOTION_PARENT_PAGE_ID")]
    parent_page_id: Option<String>,

    /// Report what would change without calling Notion or writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Reuse the mapped page for changed files (`false` always creates new pages).
    #[arg(long)]
    preserve_ids: Option<bool>,

    /// Access level for created pages: read-only, comment, or edit.
    #[arg(long)]
    page_permissions: Option<PagePermission>,

    /// Write links between files and pages after syncing.
    #[arg(long = "enable-bidirectional-links")]
    links: Option<bool>,

    /// Which side gets the link: frontmatter, callout, or both.
    #[arg(long)]
    link_style: Option<LinkStyle>,

    /// Documents synced in parallel.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Progress on stderr: off, human, or json. Default: human on a TTY.
    #[arg(long)]
    progress: Option<ProgressMode>,
}

impl SelectArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root: self.root.clone(),
            files_pattern: self.files_pattern.clone(),
            mapping_file: self.mapping_file.clone(),
            ..Default::default()
        }
    }
}

impl SyncArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            token: self.token.clone(),
            parent_page_id: self.parent_page_id.clone(),
            dry_run: self.dry_run,
            preserve_ids: self.preserve_ids,
            page_permissions: self.page_permissions,
            links_enabled: self.links,
            link_style: self.link_style,
            concurrency: self.concurrency,
            ..self.select.overrides()
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("notion_sync={},notion_sync_core={}", level, level))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Status and mapping commands never need credentials.
fn offline_config(cli_config: Option<&PathBuf>, select: &SelectArgs) -> anyhow::Result<Config> {
    let overrides = ConfigOverrides {
        dry_run: true,
        ..select.overrides()
    };
    Ok(config::resolve_config(cli_config.map(PathBuf::as_path), &overrides)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Sync(args) => {
            let cfg = config::resolve_config(cli.config.as_deref(), &args.overrides())?;
            let progress = args
                .progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();

            let report = ingest::run_sync(&cfg, progress.as_ref()).await?;

            if args.json {
                println!("{}", report.to_json()?);
            } else {
                report.print_human(cfg.sync.dry_run);
            }
            if let Some(path) = std::env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
                report.write_github_output(std::path::Path::new(&path))?;
            }
            if report.has_errors() {
                anyhow::bail!("{} of {} documents failed to sync", report.errors, report.total);
            }
        }
        Commands::Status(select) => {
            let cfg = offline_config(cli.config.as_ref(), &select)?;
            let states = ingest::run_status(&cfg).await?;
            for (path, state) in &states {
                match state {
                    ingest::FileState::Unreadable(err) => {
                        println!("  {:<8} {}  ({})", state.label(), path, err)
                    }
                    _ => println!("  {:<8} {}", state.label(), path),
                }
            }
            println!("{} files", states.len());
        }
        Commands::Mappings(select) => {
            let cfg = offline_config(cli.config.as_ref(), &select)?;
            let store = ingest::open_store(&cfg).await?;
            let mappings = store.find_all().await?;
            for m in &mappings {
                let synced = m
                    .last_synced
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}  {}  {}", m.file_path, page_url(&m.page_id), synced);
            }
            println!("{} mappings", mappings.len());
        }
        Commands::Forget { path, select } => {
            let cfg = offline_config(cli.config.as_ref(), &select)?;
            let store = ingest::open_store(&cfg).await?;
            if store.delete(&path).await? {
                println!("forgot {}", path);
            } else {
                anyhow::bail!("no mapping for '{}'", path);
            }
        }
    }

    Ok(())
}
