//! Sync pipeline orchestration.
//!
//! Wires the concrete collaborators together and drives the engine over
//! every discovered file:
//!
//! ```text
//! discover ─▶ open mapping file ─▶ build engine ─▶ sync × N (buffered) ─▶ report
//! ```
//!
//! A failing document is recorded in the report and never stops the rest.
//! Only configuration problems and an unreadable mapping file abort the run.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use notion_sync_core::engine::{SyncEngine, SyncOptions};
use notion_sync_core::gateway::PageGateway;
use notion_sync_core::links::LinkReconciler;
use notion_sync_core::source::DocumentSource;
use notion_sync_core::store::MappingStore;

use crate::config::Config;
use crate::connector_fs::{self, FsDocumentSource};
use crate::mapping_file::JsonMappingStore;
use crate::notion::{DisabledGateway, NotionGateway};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::repo_context;
use crate::report::SyncReport;

/// Run a full sync as configured and return the report.
pub async fn run_sync(config: &Config, progress: &dyn SyncProgressReporter) -> Result<SyncReport> {
    progress.report(SyncProgressEvent::Discovering {
        root: config.sync.root.display().to_string(),
    });
    let paths = connector_fs::discover(&config.sync)?;
    info!(count = paths.len(), dry_run = config.sync.dry_run, "starting sync");

    let store = open_store(config).await?;
    // A dry run stays offline even when credentials are present.
    let gateway: Arc<dyn PageGateway> = if config.sync.dry_run {
        Arc::new(DisabledGateway)
    } else {
        Arc::new(NotionGateway::new(config)?)
    };

    let engine = build_engine(config, store, gateway);
    Ok(sync_paths(&engine, paths, config.sync.concurrency, progress).await)
}

pub async fn open_store(config: &Config) -> Result<Arc<JsonMappingStore>> {
    let path = config.sync.mapping_path();
    let store = JsonMappingStore::open(&path)
        .await
        .with_context(|| format!("refusing to sync without a readable mapping file ({})", path.display()))?;
    Ok(Arc::new(store))
}

/// Assemble the engine over the filesystem source and the given store and
/// gateway. Links are only reconciled on real runs.
pub fn build_engine(
    config: &Config,
    store: Arc<dyn MappingStore>,
    gateway: Arc<dyn PageGateway>,
) -> SyncEngine {
    let root = &config.sync.root;
    let source: Arc<dyn DocumentSource> = Arc::new(FsDocumentSource::new(root.clone()));

    let options = SyncOptions {
        dry_run: config.sync.dry_run,
        preserve_ids: config.sync.preserve_ids,
        permissions: config.sync.page_permissions,
        last_commit: repo_context::resolve_commit(&config.github, root),
    };

    let engine = SyncEngine::new(source.clone(), store, gateway.clone(), options);
    if !config.links.enabled || config.sync.dry_run {
        return engine;
    }

    let repo = repo_context::resolve(&config.github, root);
    if repo.is_none() && config.links.style.writes_callout() {
        warn!("repository unknown; pages will not link back to their source files");
    }
    engine.with_link_reconciler(LinkReconciler::new(source, gateway, config.links.style, repo))
}

/// Sync `paths` with at most `concurrency` documents in flight.
pub async fn sync_paths(
    engine: &SyncEngine,
    paths: Vec<String>,
    concurrency: usize,
    progress: &dyn SyncProgressReporter,
) -> SyncReport {
    let total = paths.len() as u64;
    let mut results = Vec::with_capacity(paths.len());

    let mut in_flight = stream::iter(paths)
        .map(|path| async move {
            let result = engine.sync(&path).await;
            (path, result)
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((path, result)) = in_flight.next().await {
        if let Err(e) = &result {
            warn!(path = %path, error = %e, "sync failed");
        }
        results.push((path, result));
        progress.report(SyncProgressEvent::Syncing {
            n: results.len() as u64,
            total,
        });
    }

    SyncReport::from_results(results)
}

/// Local view of one discovered file against the mapping file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    /// No mapping yet; the next sync creates a page.
    New,
    /// Mapped, but the body changed since the last sync.
    Changed { page_id: String },
    Synced { page_id: String },
    /// The file could not be read or parsed.
    Unreadable(String),
}

impl FileState {
    pub fn label(&self) -> &'static str {
        match self {
            FileState::New => "new",
            FileState::Changed { .. } => "changed",
            FileState::Synced { .. } => "synced",
            FileState::Unreadable(_) => "error",
        }
    }
}

/// Compare every discovered file with its mapping. Makes no remote calls.
pub async fn run_status(config: &Config) -> Result<Vec<(String, FileState)>> {
    let paths = connector_fs::discover(&config.sync)?;
    let store = open_store(config).await?;
    let source = FsDocumentSource::new(config.sync.root.clone());

    let mut states = Vec::with_capacity(paths.len());
    for path in paths {
        let state = match source.find_by_path(&path).await {
            Ok(Some(doc)) => match store.find_by_path(&path).await? {
                None => FileState::New,
                Some(m) if &m.checksum == doc.fingerprint() => {
                    FileState::Synced { page_id: m.page_id }
                }
                Some(m) => FileState::Changed { page_id: m.page_id },
            },
            Ok(None) => FileState::Unreadable("file disappeared".to_string()),
            Err(e) => FileState::Unreadable(format!("{:#}", e)),
        };
        states.push((path, state));
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use notion_sync_core::fingerprint::fingerprint;
    use notion_sync_core::gateway::memory::InMemoryGateway;
    use async_trait::async_trait;
    use notion_sync_core::models::{PageMapping, RemotePage, SyncStatus};
    use notion_sync_core::store::memory::InMemoryMappingStore;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<SyncProgressEvent>>);

    impl SyncProgressReporter for RecordingProgress {
        fn report(&self, event: SyncProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn workspace() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("docs")).unwrap();
        fs::write(tmp.path().join("docs/a.md"), "# A").unwrap();
        fs::write(tmp.path().join("docs/b.md"), "# B").unwrap();
        let mut config = Config::default();
        config.sync.root = tmp.path().to_path_buf();
        config.links.enabled = false;
        (tmp, config)
    }

    #[tokio::test]
    async fn test_sync_paths_isolates_failures() {
        let (tmp, config) = workspace();
        let store = open_store(&config).await.unwrap();
        let gateway = Arc::new(InMemoryGateway::new());
        let engine = build_engine(&config, store, gateway.clone());
        let progress = RecordingProgress::default();

        let report = sync_paths(
            &engine,
            vec!["docs/b.md".into(), "docs/missing.md".into(), "docs/a.md".into()],
            2,
            &progress,
        )
        .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.created, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.details[2].path, "docs/missing.md");
        assert_eq!(report.details[2].status, SyncStatus::Error);
        assert_eq!(gateway.page_count(), 2);

        let events = progress.0.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], SyncProgressEvent::Syncing { n: 3, total: 3 });

        let raw = fs::read_to_string(tmp.path().join(".notion-sync/mappings.json")).unwrap();
        assert!(raw.contains("docs/a.md"));
        assert!(raw.contains("docs/b.md"));
    }

    /// Counts creates in progress and remembers the peak.
    #[derive(Default)]
    struct InFlightGateway {
        inner: InMemoryGateway,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageGateway for InFlightGateway {
        async fn find_by_id(&self, id: &str) -> Result<Option<RemotePage>> {
            self.inner.find_by_id(id).await
        }

        async fn create(&self, page: &RemotePage) -> Result<RemotePage> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let result = self.inner.create(page).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn update(&self, page: &RemotePage) -> Result<RemotePage> {
            self.inner.update(page).await
        }
    }

    #[tokio::test]
    async fn test_sync_paths_respects_concurrency_cap() {
        let (tmp, config) = workspace();
        let mut paths = Vec::new();
        for i in 0..7 {
            let path = format!("docs/n{}.md", i);
            fs::write(tmp.path().join(&path), format!("# N{}", i)).unwrap();
            paths.push(path);
        }

        for cap in [1, 3] {
            let store: Arc<dyn MappingStore> = Arc::new(InMemoryMappingStore::new());
            let gateway = Arc::new(InFlightGateway::default());
            let engine = build_engine(&config, store, gateway.clone());

            let report = sync_paths(&engine, paths.clone(), cap, &NoProgress).await;
            assert_eq!(report.created, 7);
            assert_eq!(gateway.peak.load(Ordering::SeqCst), cap);
            assert_eq!(gateway.current.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_dry_run_run_sync_is_offline() {
        let (tmp, mut config) = workspace();
        config.sync.dry_run = true;

        let report = run_sync(&config, &NoProgress).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.errors, 0);
        assert!(report
            .details
            .iter()
            .all(|d| d.page_id.as_deref() == Some("dry-run")));
        assert!(!tmp.path().join(".notion-sync/mappings.json").exists());
        assert_eq!(fs::read_to_string(tmp.path().join("docs/a.md")).unwrap(), "# A");
    }

    #[tokio::test]
    async fn test_corrupt_mapping_file_aborts_run() {
        let (tmp, mut config) = workspace();
        config.sync.dry_run = true;
        fs::create_dir_all(tmp.path().join(".notion-sync")).unwrap();
        fs::write(tmp.path().join(".notion-sync/mappings.json"), "not json").unwrap();

        let err = run_sync(&config, &NoProgress).await.unwrap_err();
        assert!(format!("{:#}", err).contains("corrupt"));
    }

    #[tokio::test]
    async fn test_status_reports_new_changed_synced() {
        let (tmp, config) = workspace();
        fs::write(tmp.path().join("docs/c.md"), "# C").unwrap();
        let store = open_store(&config).await.unwrap();
        store
            .save(&PageMapping::new("docs/a.md", "page-a", fingerprint(b"# A")))
            .await
            .unwrap();
        store
            .save(&PageMapping::new("docs/b.md", "page-b", fingerprint(b"# old B")))
            .await
            .unwrap();

        let states = run_status(&config).await.unwrap();
        assert_eq!(
            states,
            vec![
                ("docs/a.md".to_string(), FileState::Synced { page_id: "page-a".into() }),
                ("docs/b.md".to_string(), FileState::Changed { page_id: "page-b".into() }),
                ("docs/c.md".to_string(), FileState::New),
            ]
        );
    }
}
