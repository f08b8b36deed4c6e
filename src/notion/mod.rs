//! Notion REST API page gateway.
//!
//! [`NotionGateway`] implements [`PageGateway`] on top of the public API
//! (`Notion-Version: 2022-06-28`):
//!
//! | Operation | Requests |
//! |-----------|----------|
//! | `find_by_id` | `GET /v1/pages/{id}` (404 or archived → `None`) |
//! | `create` | `POST /v1/pages` with the first 100 blocks, then `PATCH /v1/blocks/{id}/children` per 100 more |
//! | `update` | `PATCH /v1/pages/{id}` (title), list + `DELETE` old children, append new ones |
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx → retry, honouring `Retry-After`
//! - HTTP 4xx (other than 404 on lookups) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Page permissions cannot be set through the public API. They are carried
//! on the page value and logged, nothing more.

pub mod render;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use notion_sync_core::error::SyncError;
use notion_sync_core::gateway::PageGateway;
use notion_sync_core::models::{page_url, PageMetadata, RemotePage};

use crate::config::Config;
use render::{block_to_json, plain_text_to_json};

pub const NOTION_VERSION: &str = "2022-06-28";

/// Most children Notion accepts in one create or append request.
pub const MAX_CHILDREN_PER_REQUEST: usize = 100;

pub struct NotionGateway {
    client: reqwest::Client,
    api_base: String,
    token: String,
    parent_page_id: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl NotionGateway {
    /// Build a gateway from validated configuration.
    ///
    /// # Errors
    ///
    /// Fails if the token or parent page id is missing, or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let token = config
            .token()
            .ok_or_else(|| SyncError::InvalidConfiguration("Notion token not set".into()))?;
        let parent = config.parent_page_id().ok_or_else(|| {
            SyncError::InvalidConfiguration("notion.parent_page_id not set".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.notion.timeout_secs))
            .user_agent(concat!("notion-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: config.notion.api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            parent_page_id: parent.to_string(),
            max_retries: config.notion.max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Scale the retry delays. Tests use milliseconds instead of seconds.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Send one API request with retry.
    ///
    /// Returns `Ok(None)` for a 404 so lookups can treat it as "absent".
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let url = format!("{}/v1/{}", self.api_base, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            let mut req = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION);
            if let Some(body) = body {
                req = req.json(body);
            }

            debug!(%method, path, attempt, "notion request");
            let (err, retry_after) = match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response
                            .json()
                            .await
                            .with_context(|| format!("invalid JSON from {} {}", method, path))?;
                        return Ok(Some(json));
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let body_text = response.text().await.unwrap_or_default();

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        (
                            anyhow!("Notion API error {} on {} {}: {}", status, method, path, body_text),
                            retry_after,
                        )
                    } else {
                        bail!("Notion API error {} on {} {}: {}", status, method, path, body_text);
                    }
                }
                Err(e) => (anyhow::Error::from(e), None),
            };

            if attempt < self.max_retries {
                let backoff = self.backoff_base * (1u32 << attempt.min(5));
                let delay = retry_after.unwrap_or(backoff).max(backoff);
                warn!(%method, path, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %err, "retrying Notion request");
                tokio::time::sleep(delay).await;
            }
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Notion request failed after retries")))
    }

    /// Like [`request`](Self::request) but a 404 is an error.
    async fn request_existing(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(method.clone(), path, body)
            .await?
            .ok_or_else(|| anyhow!("Notion API error 404 Not Found on {} {}", method, path))
    }

    async fn append_children(&self, block_id: &str, children: &[Value]) -> Result<()> {
        for batch in children.chunks(MAX_CHILDREN_PER_REQUEST) {
            let body = json!({ "children": batch });
            self.request_existing(Method::PATCH, &format!("blocks/{}/children", block_id), Some(&body))
                .await?;
        }
        Ok(())
    }

    /// Ids of every top-level child block, following pagination.
    async fn list_children(&self, block_id: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut path = format!("blocks/{}/children?page_size=100", block_id);
            if let Some(c) = &cursor {
                path.push_str("&start_cursor=");
                path.push_str(c);
            }
            let page = self.request_existing(Method::GET, &path, None).await?;

            if let Some(results) = page.get("results").and_then(Value::as_array) {
                ids.extend(
                    results
                        .iter()
                        .filter_map(|b| b.get("id").and_then(Value::as_str))
                        .map(str::to_string),
                );
            }

            cursor = match (page.get("has_more").and_then(Value::as_bool), page.get("next_cursor").and_then(Value::as_str)) {
                (Some(true), Some(next)) => Some(next.to_string()),
                _ => break,
            };
        }
        Ok(ids)
    }

    fn finish(&self, page: &RemotePage, id: String, response: &Value) -> RemotePage {
        let url = response
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| page_url(&id));
        let mut done = page.clone().with_id(id);
        done.metadata.notion_url = Some(url);
        done
    }
}

fn title_properties(title: &str) -> Value {
    json!({ "title": { "title": plain_text_to_json(title) } })
}

/// Plain text of the page's title property, whatever it is named.
fn page_title(page: &Value) -> String {
    page.get("properties")
        .and_then(Value::as_object)
        .and_then(|props| {
            props
                .values()
                .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
        })
        .and_then(|p| p.get("title"))
        .and_then(Value::as_array)
        .map(|segments| {
            segments
                .iter()
                .filter_map(|s| s.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PageGateway for NotionGateway {
    async fn find_by_id(&self, id: &str) -> Result<Option<RemotePage>> {
        let Some(page) = self.request(Method::GET, &format!("pages/{}", id), None).await? else {
            return Ok(None);
        };

        let archived = page.get("archived").and_then(Value::as_bool).unwrap_or(false)
            || page.get("in_trash").and_then(Value::as_bool).unwrap_or(false);
        if archived {
            debug!(page_id = id, "page is archived");
            return Ok(None);
        }

        let remote = RemotePage::new(page_title(&page), Vec::new(), PageMetadata::default());
        Ok(Some(self.finish(&remote, id.to_string(), &page)))
    }

    async fn create(&self, page: &RemotePage) -> Result<RemotePage> {
        debug!(
            title = %page.title,
            permissions = %page.permissions,
            "page permissions are not enforceable through the API"
        );
        let children: Vec<Value> = page.blocks.iter().map(block_to_json).collect();
        let split = children.len().min(MAX_CHILDREN_PER_REQUEST);
        let (first, rest) = children.split_at(split);

        let body = json!({
            "parent": { "page_id": self.parent_page_id },
            "properties": title_properties(&page.title),
            "children": first,
        });
        let created = self.request_existing(Method::POST, "pages", Some(&body)).await?;
        let id = created
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Notion create response has no page id"))?
            .to_string();

        self.append_children(&id, rest).await?;
        Ok(self.finish(page, id, &created))
    }

    async fn update(&self, page: &RemotePage) -> Result<RemotePage> {
        let id = page
            .id
            .clone()
            .ok_or_else(|| anyhow!("cannot update a page without an id"))?;

        let body = json!({ "properties": title_properties(&page.title) });
        let updated = self
            .request(Method::PATCH, &format!("pages/{}", id), Some(&body))
            .await?
            .ok_or_else(|| SyncError::PageNotFound(id.clone()))?;

        let old = self.list_children(&id).await?;
        debug!(page_id = %id, removing = old.len(), adding = page.blocks.len(), "replacing page content");
        for block_id in &old {
            self.request(Method::DELETE, &format!("blocks/{}", block_id), None)
                .await?;
        }

        let children: Vec<Value> = page.blocks.iter().map(block_to_json).collect();
        self.append_children(&id, &children).await?;
        Ok(self.finish(page, id, &updated))
    }
}

/// Gateway used when no Notion credentials are configured (dry runs).
///
/// Every call fails. The engine never reaches it in dry-run mode, so an
/// error from here means a remote call slipped through.
pub struct DisabledGateway;

#[async_trait]
impl PageGateway for DisabledGateway {
    async fn find_by_id(&self, _id: &str) -> Result<Option<RemotePage>> {
        bail!("Notion gateway is disabled (no credentials configured)")
    }

    async fn create(&self, _page: &RemotePage) -> Result<RemotePage> {
        bail!("Notion gateway is disabled (no credentials configured)")
    }

    async fn update(&self, _page: &RemotePage) -> Result<RemotePage> {
        bail!("Notion gateway is disabled (no credentials configured)")
    }
}
