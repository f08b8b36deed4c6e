//! Integration tests for the Notion gateway against a local fake of the
//! Notion REST endpoints (axum on an ephemeral port).
//!
//! The fake keeps pages and their children in memory, enforces the
//! 100-children-per-request limit, paginates child listings in small pages,
//! and can be told to fail the next N requests with a given status.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use notion_sync::config::Config;
use notion_sync::ingest::run_sync;
use notion_sync::notion::{NotionGateway, NOTION_VERSION};
use notion_sync::progress::NoProgress;
use notion_sync_core::block::Block;
use notion_sync_core::gateway::PageGateway;
use notion_sync_core::models::{PageMetadata, RemotePage, SyncStatus, NOTION_URL_KEY};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const LIST_PAGE_SIZE: usize = 3;

// ─── Fake Notion ────────────────────────────────────────────────────

#[derive(Default)]
struct FakePage {
    title: String,
    archived: bool,
    children: Vec<(String, Value)>,
}

#[derive(Default)]
struct FakeNotion {
    pages: HashMap<String, FakePage>,
    next_id: usize,
    failures: VecDeque<StatusCode>,
    requests: Vec<String>,
    bad_headers: usize,
    reject_appends: bool,
}

impl FakeNotion {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn page_json(id: &str, page: &FakePage) -> Value {
        json!({
            "object": "page",
            "id": id,
            "url": format!("https://www.notion.so/{}", id),
            "archived": page.archived,
            "properties": {
                "title": { "type": "title", "title": [{ "plain_text": page.title }] }
            }
        })
    }

    fn append(&mut self, page_id: &str, children: &[Value]) {
        let ids: Vec<String> = children.iter().map(|_| self.id("block")).collect();
        if let Some(page) = self.pages.get_mut(page_id) {
            page.children
                .extend(ids.into_iter().zip(children.iter().cloned()));
        }
    }
}

type Shared = Arc<Mutex<FakeNotion>>;

/// Record the request; return an error response if one is queued or the
/// headers are wrong.
fn enter(state: &Shared, headers: &HeaderMap, label: String) -> Option<Response> {
    let mut fake = state.lock().unwrap();
    fake.requests.push(label);
    let version_ok = headers
        .get("Notion-Version")
        .and_then(|v| v.to_str().ok())
        == Some(NOTION_VERSION);
    let auth_ok = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer secret_test");
    if !version_ok || !auth_ok {
        fake.bad_headers += 1;
        return Some((StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad headers" }))).into_response());
    }
    fake.failures.pop_front().map(|status| {
        (status, Json(json!({ "message": "injected failure" }))).into_response()
    })
}

fn too_many_children(children: &[Value]) -> Option<Response> {
    (children.len() > 100).then(|| {
        (StatusCode::BAD_REQUEST, Json(json!({ "message": "children length should be ≤ 100" })))
            .into_response()
    })
}

async fn create_page(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(r) = enter(&state, &headers, "POST pages".into()) {
        return r;
    }
    let children = body["children"].as_array().cloned().unwrap_or_default();
    if let Some(r) = too_many_children(&children) {
        return r;
    }
    let mut fake = state.lock().unwrap();
    let id = fake.id("page");
    let title = body["properties"]["title"]["title"][0]["text"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    fake.pages.insert(id.clone(), FakePage { title, ..Default::default() });
    fake.append(&id, &children);
    Json(FakeNotion::page_json(&id, &fake.pages[&id])).into_response()
}

async fn get_page(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Some(r) = enter(&state, &headers, format!("GET pages/{}", id)) {
        return r;
    }
    let fake = state.lock().unwrap();
    match fake.pages.get(&id) {
        Some(page) => Json(FakeNotion::page_json(&id, page)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "code": "object_not_found" }))).into_response(),
    }
}

async fn update_page(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(r) = enter(&state, &headers, format!("PATCH pages/{}", id)) {
        return r;
    }
    let mut fake = state.lock().unwrap();
    let Some(page) = fake.pages.get_mut(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "code": "object_not_found" }))).into_response();
    };
    if let Some(title) = body["properties"]["title"]["title"][0]["text"]["content"].as_str() {
        page.title = title.to_string();
    }
    Json(FakeNotion::page_json(&id, page)).into_response()
}

async fn list_children(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(r) = enter(&state, &headers, format!("GET blocks/{}/children", id)) {
        return r;
    }
    let fake = state.lock().unwrap();
    let Some(page) = fake.pages.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let start: usize = query
        .get("start_cursor")
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let end = (start + LIST_PAGE_SIZE).min(page.children.len());
    let results: Vec<Value> = page.children[start..end]
        .iter()
        .map(|(block_id, block)| json!({ "id": block_id, "type": block["type"] }))
        .collect();
    let has_more = end < page.children.len();
    Json(json!({
        "results": results,
        "has_more": has_more,
        "next_cursor": if has_more { Value::from(end.to_string()) } else { Value::Null },
    }))
    .into_response()
}

async fn append_children(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(r) = enter(&state, &headers, format!("PATCH blocks/{}/children", id)) {
        return r;
    }
    let children = body["children"].as_array().cloned().unwrap_or_default();
    if let Some(r) = too_many_children(&children) {
        return r;
    }
    let mut fake = state.lock().unwrap();
    if fake.reject_appends {
        return (StatusCode::BAD_REQUEST, Json(json!({ "code": "validation_error" }))).into_response();
    }
    if !fake.pages.contains_key(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    fake.append(&id, &children);
    Json(json!({ "results": [] })).into_response()
}

async fn delete_block(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Some(r) = enter(&state, &headers, format!("DELETE blocks/{}", id)) {
        return r;
    }
    let mut fake = state.lock().unwrap();
    for page in fake.pages.values_mut() {
        page.children.retain(|(block_id, _)| block_id != &id);
    }
    Json(json!({ "id": id, "archived": true })).into_response()
}

async fn start_fake() -> (Shared, String) {
    let state: Shared = Arc::new(Mutex::new(FakeNotion::default()));
    let app = Router::new()
        .route("/v1/pages", post(create_page))
        .route("/v1/pages/{id}", get(get_page).patch(update_page))
        .route("/v1/blocks/{id}/children", get(list_children).patch(append_children))
        .route("/v1/blocks/{id}", delete(delete_block))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, format!("http://{}", addr))
}

fn config_for(base: &str) -> Config {
    let mut config = Config::default();
    config.notion.token = Some("secret_test".into());
    config.notion.parent_page_id = Some("parent-page".into());
    config.notion.api_base = base.to_string();
    config.notion.max_retries = 3;
    config
}

fn gateway(base: &str) -> NotionGateway {
    NotionGateway::new(&config_for(base))
        .unwrap()
        .with_backoff_base(Duration::from_millis(1))
}

fn page_with_paragraphs(n: usize) -> RemotePage {
    let blocks = (0..n).map(|i| Block::paragraph(format!("p{}", i))).collect();
    RemotePage::new(
        "Guide",
        blocks,
        PageMetadata {
            source_file: "docs/guide.md".into(),
            ..Default::default()
        },
    )
}

// ─── Gateway tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_create_batches_children() {
    let (state, base) = start_fake().await;
    let created = gateway(&base).create(&page_with_paragraphs(250)).await.unwrap();

    let id = created.id.clone().unwrap();
    assert_eq!(
        created.metadata.notion_url.as_deref(),
        Some(format!("https://www.notion.so/{}", id).as_str())
    );

    let fake = state.lock().unwrap();
    let page = &fake.pages[&id];
    assert_eq!(page.title, "Guide");
    assert_eq!(page.children.len(), 250);
    assert_eq!(page.children[249].1["paragraph"]["rich_text"][0]["text"]["content"], "p249");
    let appends = fake
        .requests
        .iter()
        .filter(|r| r.starts_with("PATCH blocks/"))
        .count();
    assert_eq!(appends, 2);
    assert_eq!(fake.bad_headers, 0);
}

#[tokio::test]
async fn test_update_replaces_all_children() {
    let (state, base) = start_fake().await;
    let gw = gateway(&base);
    let created = gw.create(&page_with_paragraphs(7)).await.unwrap();

    let replacement = RemotePage::new("Guide v2", vec![Block::heading(1, "New")], PageMetadata::default())
        .with_id(created.id.clone().unwrap());
    gw.update(&replacement).await.unwrap();

    let fake = state.lock().unwrap();
    let page = &fake.pages[created.id.as_ref().unwrap()];
    assert_eq!(page.title, "Guide v2");
    assert_eq!(page.children.len(), 1);
    assert_eq!(page.children[0].1["type"], "heading_1");
    let listings = fake
        .requests
        .iter()
        .filter(|r| r.starts_with("GET blocks/"))
        .count();
    assert_eq!(listings, 3, "7 children listed 3 at a time");
}

#[tokio::test]
async fn test_find_by_id_missing_and_archived() {
    let (state, base) = start_fake().await;
    let gw = gateway(&base);
    assert!(gw.find_by_id("page-404").await.unwrap().is_none());

    let created = gw.create(&page_with_paragraphs(1)).await.unwrap();
    let id = created.id.unwrap();
    let found = gw.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(found.title, "Guide");

    state.lock().unwrap().pages.get_mut(&id).unwrap().archived = true;
    assert!(gw.find_by_id(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_of_missing_page_fails() {
    let (_state, base) = start_fake().await;
    let page = page_with_paragraphs(1).with_id("page-gone");
    let err = gateway(&base).update(&page).await.unwrap_err();
    assert!(err.to_string().contains("page-gone"));
}

#[tokio::test]
async fn test_retries_rate_limits_and_server_errors() {
    let (state, base) = start_fake().await;
    state
        .lock()
        .unwrap()
        .failures
        .extend([StatusCode::TOO_MANY_REQUESTS, StatusCode::BAD_GATEWAY]);

    let created = gateway(&base).create(&page_with_paragraphs(1)).await.unwrap();
    assert!(created.id.is_some());

    let fake = state.lock().unwrap();
    let posts = fake.requests.iter().filter(|r| *r == "POST pages").count();
    assert_eq!(posts, 3);
    assert_eq!(fake.pages.len(), 1);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let (state, base) = start_fake().await;
    state
        .lock()
        .unwrap()
        .failures
        .extend([StatusCode::SERVICE_UNAVAILABLE; 10]);

    let err = gateway(&base).create(&page_with_paragraphs(1)).await.unwrap_err();
    assert!(err.to_string().contains("503"));
    let posts = state.lock().unwrap().requests.len();
    assert_eq!(posts, 4, "one attempt plus three retries");
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (state, base) = start_fake().await;
    state.lock().unwrap().failures.push_back(StatusCode::BAD_REQUEST);

    let err = gateway(&base).create(&page_with_paragraphs(1)).await.unwrap_err();
    assert!(err.to_string().contains("400"));
    assert_eq!(state.lock().unwrap().requests.len(), 1);
}

// ─── Full pipeline against the fake ─────────────────────────────────

#[tokio::test]
async fn test_sync_links_and_skips_on_second_run() {
    let (state, base) = start_fake().await;
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("docs")).unwrap();
    fs::write(tmp.path().join("docs/a.md"), "# A\n\nHello.\n").unwrap();

    let mut config = config_for(&base);
    config.sync.root = tmp.path().to_path_buf();
    config.github.repository = Some("acme/docs".into());
    config.github.branch = Some("main".into());
    config.github.server_url = Some("https://github.com".into());

    let first = run_sync(&config, &NoProgress).await.unwrap();
    assert_eq!(first.created, 1);
    let page_id = first.details[0].page_id.clone().unwrap();

    let raw = fs::read_to_string(tmp.path().join("docs/a.md")).unwrap();
    assert!(raw.starts_with("---\n"));
    assert!(raw.contains(NOTION_URL_KEY));
    assert!(raw.ends_with("# A\n\nHello.\n"));

    {
        let fake = state.lock().unwrap();
        let page = &fake.pages[&page_id];
        assert_eq!(page.children[0].1["type"], "callout");
        assert_eq!(
            page.children[0].1["callout"]["rich_text"][1]["text"]["link"]["url"],
            "https://github.com/acme/docs/blob/main/docs/a.md"
        );
        assert_eq!(page.children[1].1["type"], "heading_1");
    }

    let requests_before = state.lock().unwrap().requests.len();
    let second = run_sync(&config, &NoProgress).await.unwrap();
    assert_eq!(second.unchanged, 1);
    assert_eq!(second.details[0].status, SyncStatus::Unchanged);
    assert_eq!(second.details[0].page_id.as_deref(), Some(page_id.as_str()));
    assert_eq!(state.lock().unwrap().requests.len(), requests_before);
}

#[tokio::test]
async fn test_failed_append_fails_document_and_next_run_repairs_page() {
    let (state, base) = start_fake().await;
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("docs")).unwrap();
    fs::write(tmp.path().join("docs/a.md"), "# A\n\nHello.\n").unwrap();

    let mut config = config_for(&base);
    config.sync.root = tmp.path().to_path_buf();
    config.github.repository = Some("acme/docs".into());
    config.github.branch = Some("main".into());
    config.github.server_url = Some("https://github.com".into());

    let first = run_sync(&config, &NoProgress).await.unwrap();
    assert_eq!(first.created, 1);
    let page_id = first.details[0].page_id.clone().unwrap();
    {
        let fake = state.lock().unwrap();
        // Callout and content go out in the create request; nothing follows.
        assert!(!fake.requests.iter().any(|r| r.starts_with("PATCH ")));
        assert_eq!(fake.pages[&page_id].children.len(), 3);
    }

    let raw = fs::read_to_string(tmp.path().join("docs/a.md")).unwrap();
    fs::write(tmp.path().join("docs/a.md"), raw.replace("Hello.", "Changed.")).unwrap();

    state.lock().unwrap().reject_appends = true;
    let failed = run_sync(&config, &NoProgress).await.unwrap();
    assert_eq!(failed.errors, 1);
    assert_eq!(failed.details[0].status, SyncStatus::Error);
    assert!(failed.details[0].error.as_deref().unwrap().contains("400"));

    state.lock().unwrap().reject_appends = false;
    let repaired = run_sync(&config, &NoProgress).await.unwrap();
    assert_eq!(repaired.updated, 1, "{:?}", repaired.details);
    assert_eq!(repaired.details[0].page_id.as_deref(), Some(page_id.as_str()));

    let fake = state.lock().unwrap();
    let page = &fake.pages[&page_id];
    assert_eq!(page.children.len(), 3);
    assert_eq!(page.children[0].1["type"], "callout");
    assert_eq!(page.children[1].1["type"], "heading_1");
    assert_eq!(
        page.children[2].1["paragraph"]["rich_text"][0]["text"]["content"],
        "Changed."
    );
}
