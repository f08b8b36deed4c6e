//! Remote page gateway abstraction.
//!
//! The sync engine treats every gateway call as an atomic
//! succeed-or-fail operation. Retry and backoff for transient failures
//! (rate limits, 5xx) belong to the implementation, not the engine.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RemotePage;

#[async_trait]
pub trait PageGateway: Send + Sync {
    /// Fetch a page by id.
    ///
    /// A page the service reports as missing (or archived) is `Ok(None)`,
    /// never an error: the engine uses it as the signal to recreate.
    async fn find_by_id(&self, id: &str) -> Result<Option<RemotePage>>;

    /// Create `page` and return it with its assigned id.
    async fn create(&self, page: &RemotePage) -> Result<RemotePage>;

    /// Replace the title and the whole block sequence of an existing page.
    async fn update(&self, page: &RemotePage) -> Result<RemotePage>;
}
