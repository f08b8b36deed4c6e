//! In-memory [`PageGateway`] for tests.
//!
//! Pages live in a `HashMap` keyed by a generated UUID. Call counters and
//! a failure switch let tests observe exactly which remote operations the
//! engine performed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{page_url, RemotePage};

use super::PageGateway;

pub struct InMemoryGateway {
    pages: RwLock<HashMap<String, RemotePage>>,
    finds: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            finds: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail until switched back off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delete a page out-of-band, as a user would in the remote UI.
    pub fn remove_page(&self, id: &str) -> Option<RemotePage> {
        self.pages.write().ok()?.remove(id)
    }

    pub fn page(&self, id: &str) -> Option<RemotePage> {
        self.pages.read().ok()?.get(id).cloned()
    }

    pub fn page_count(&self) -> usize {
        self.pages.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Create plus update calls.
    pub fn write_calls(&self) -> usize {
        self.create_calls() + self.update_calls()
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("remote service unavailable (HTTP 503)");
        }
        Ok(())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageGateway for InMemoryGateway {
    async fn find_by_id(&self, id: &str) -> Result<Option<RemotePage>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let pages = self.pages.read().map_err(|_| anyhow!("gateway lock poisoned"))?;
        Ok(pages.get(id).cloned())
    }

    async fn create(&self, page: &RemotePage) -> Result<RemotePage> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let id = Uuid::new_v4().to_string();
        let mut created = page.clone().with_id(id.clone());
        created.metadata.notion_url = Some(page_url(&id));
        let mut pages = self.pages.write().map_err(|_| anyhow!("gateway lock poisoned"))?;
        pages.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, page: &RemotePage) -> Result<RemotePage> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let id = page
            .id
            .clone()
            .ok_or_else(|| anyhow!("cannot update a page without an id"))?;
        let mut pages = self.pages.write().map_err(|_| anyhow!("gateway lock poisoned"))?;
        if !pages.contains_key(&id) {
            bail!("page {} does not exist", id);
        }
        pages.insert(id, page.clone());
        Ok(page.clone())
    }
}
