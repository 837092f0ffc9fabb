//! In-process fake of the GitHub releases API.
//!
//! Repositories served (all under owner `owner`):
//! - `app`: five releases, two per page, with `next`/`last` links
//! - `shifting`: pages overlap by one release, as when a release is
//!   published mid-walk
//! - `looping`: every page links back to itself
//! - `endless`: an unbounded chain of `next` links with no `last`
//! - `broken`: answers 500
//!
//! Assets are served from `/download/:tag/:name`. `/slow/:tag/:name` serves
//! the same bytes in small delayed chunks and records whether the client
//! hung up before the body was complete.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use relfetch_core::{ArtifactTable, InstallerConfig};
use serde_json::{json, Value};
use futures::stream;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PAGE_SIZE: usize = 2;
pub const TAGS: [&str; 5] = ["v1.4.0", "v1.3.0", "v1.2.0", "v1.1.0", "v1.0.0"];
pub const GZ_ASSET: &str = "app-linux.gz";
pub const ZIP_ASSET: &str = "app-windows.zip";
pub const EXE_ASSET: &str = "app-macos.exe";
pub const SLOW_CHUNKS: usize = 200;
const SLOW_CHUNK_DELAY: Duration = Duration::from_millis(10);

/// One request seen by the server.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub authorization: Option<String>,
}

pub struct Fixture {
    base: String,
    assets: HashMap<String, Vec<u8>>,
    pub binary: Vec<u8>,
    seen: Mutex<Vec<Seen>>,
    slow_chunks_sent: AtomicUsize,
    slow_abandoned: AtomicBool,
}

impl Fixture {
    pub fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|s| s.path.starts_with(prefix))
            .count()
    }

    pub fn asset(&self, name: &str) -> &[u8] {
        &self.assets[name]
    }

    /// Chunks of the throttled body written so far.
    pub fn slow_chunks_sent(&self) -> usize {
        self.slow_chunks_sent.load(Ordering::SeqCst)
    }

    /// Whether a throttled body was dropped before its last chunk.
    pub fn slow_abandoned(&self) -> bool {
        self.slow_abandoned.load(Ordering::SeqCst)
    }

    /// Download URL of `name` on the throttled route.
    pub fn slow_url(&self, tag: &str, name: &str) -> String {
        format!("{}/slow/{}/{}", self.base, tag, name)
    }

    fn record(&self, uri: &Uri, headers: &HeaderMap) {
        self.seen.lock().unwrap().push(Seen {
            path: uri.path().to_string(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });
    }

    fn release(&self, tag: &str) -> Value {
        let assets: Vec<Value> = self
            .assets
            .iter()
            .map(|(name, data)| {
                json!({
                    "name": name,
                    "size": data.len(),
                    "browser_download_url": format!("{}/download/{}/{}", self.base, tag, name),
                    "created_at": "2024-03-01T10:00:00Z",
                    "updated_at": "2024-03-01T10:05:00Z",
                })
            })
            .collect();

        json!({
            "tag_name": tag,
            "name": format!("Release {}", tag),
            "html_url": format!("https://github.com/owner/app/releases/tag/{}", tag),
            "prerelease": false,
            "created_at": "2024-03-01T09:00:00Z",
            "published_at": "2024-03-01T10:00:00Z",
            "assets": assets,
        })
    }

    fn page_url(&self, repo: &str, page: usize) -> String {
        format!(
            "{}/repos/owner/{}/releases?per_page={}&page={}",
            self.base, repo, PAGE_SIZE, page
        )
    }
}

/// Executable bytes that every artifact decompresses to.
pub fn binary() -> Vec<u8> {
    (0..150_000u32)
        .flat_map(|i| (i.wrapping_mul(2654435761) >> 13).to_le_bytes())
        .collect()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn zip_single(name: &str, data: &[u8]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(name, options).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Start the fake API on an ephemeral port.
pub async fn start() -> Arc<Fixture> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let binary = binary();
    let assets = HashMap::from([
        (GZ_ASSET.to_string(), gzip(&binary)),
        (ZIP_ASSET.to_string(), zip_single("app.exe", &binary)),
        (EXE_ASSET.to_string(), binary.clone()),
    ]);

    let fixture = Arc::new(Fixture {
        base,
        assets,
        binary,
        seen: Mutex::new(Vec::new()),
        slow_chunks_sent: AtomicUsize::new(0),
        slow_abandoned: AtomicBool::new(false),
    });

    let app = Router::new()
        .route("/repos/:owner/:repo/releases", get(list_releases))
        .route("/repos/:owner/:repo/releases/latest", get(latest_release))
        .route("/repos/:owner/:repo/releases/tags/:tag", get(release_by_tag))
        .route("/download/:tag/:name", get(download))
        .route("/slow/:tag/:name", get(slow_download))
        .with_state(fixture.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    fixture
}

/// Configuration pointing at the fake API for `repo`.
pub fn config(fixture: &Fixture, repo: &str) -> InstallerConfig {
    InstallerConfig {
        repo: format!("owner/{}", repo),
        api_base: fixture.base.clone(),
        binary_name: "app".to_string(),
        artifacts: ArtifactTable::new()
            .with_platform("linux", ["app-linux.tar.gz", GZ_ASSET])
            .with_platform("windows", [ZIP_ASSET])
            .with_platform("macos", [EXE_ASSET]),
        ..Default::default()
    }
}

fn with_links(body: Value, links: &[(String, &str)]) -> Response {
    let mut response = Json(body).into_response();
    if !links.is_empty() {
        let value = links
            .iter()
            .map(|(url, rel)| format!("<{}>; rel=\"{}\"", url, rel))
            .collect::<Vec<_>>()
            .join(", ");
        response
            .headers_mut()
            .insert(header::LINK, HeaderValue::from_str(&value).unwrap());
    }
    response
}

async fn list_releases(
    State(fixture): State<Arc<Fixture>>,
    Path((_owner, repo)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    fixture.record(&uri, &headers);
    let page: usize = query
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1)
        .max(1);
    let last = TAGS.len().div_ceil(PAGE_SIZE);

    match repo.as_str() {
        "app" | "shifting" => {
            let mut start = (page - 1) * PAGE_SIZE;
            if repo == "shifting" && page > 1 {
                start -= 1;
            }
            let end = (start + PAGE_SIZE).min(TAGS.len());
            let body: Vec<Value> = TAGS[start.min(end)..end]
                .iter()
                .map(|tag| fixture.release(tag))
                .collect();

            let mut links = Vec::new();
            if page < last {
                links.push((fixture.page_url(&repo, page + 1), "next"));
            }
            links.push((fixture.page_url(&repo, last), "last"));
            with_links(Value::Array(body), &links)
        }
        "looping" => {
            let own = format!("{}{}", fixture.base, uri);
            with_links(json!([fixture.release("v0.1.0")]), &[(own, "next")])
        }
        "endless" => {
            let tag = format!("v0.0.{}", page);
            with_links(
                json!([fixture.release(&tag)]),
                &[(fixture.page_url(&repo, page + 1), "next")],
            )
        }
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn latest_release(
    State(fixture): State<Arc<Fixture>>,
    Path((_owner, repo)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    fixture.record(&uri, &headers);
    match repo.as_str() {
        "app" => Json(fixture.release(TAGS[0])).into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn release_by_tag(
    State(fixture): State<Arc<Fixture>>,
    Path((_owner, repo, tag)): Path<(String, String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    fixture.record(&uri, &headers);
    match repo.as_str() {
        "app" if TAGS.contains(&tag.as_str()) => Json(fixture.release(&tag)).into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Not Found" })),
        )
            .into_response(),
    }
}

async fn download(
    State(fixture): State<Arc<Fixture>>,
    Path((_tag, name)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    fixture.record(&uri, &headers);
    match fixture.assets.get(&name) {
        Some(data) => data.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Body state of a throttled download. Dropping it early marks the
/// download as abandoned.
struct SlowBody {
    fixture: Arc<Fixture>,
    data: Vec<u8>,
    chunk_size: usize,
    offset: usize,
}

impl Drop for SlowBody {
    fn drop(&mut self) {
        if self.offset < self.data.len() {
            self.fixture.slow_abandoned.store(true, Ordering::SeqCst);
        }
    }
}

async fn slow_download(
    State(fixture): State<Arc<Fixture>>,
    Path((_tag, name)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    fixture.record(&uri, &headers);
    let Some(data) = fixture.assets.get(&name).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let body = SlowBody {
        fixture: fixture.clone(),
        chunk_size: data.len().div_ceil(SLOW_CHUNKS),
        data,
        offset: 0,
    };
    let chunks = stream::unfold(body, |mut body| async move {
        if body.offset >= body.data.len() {
            return None;
        }
        tokio::time::sleep(SLOW_CHUNK_DELAY).await;
        let end = (body.offset + body.chunk_size).min(body.data.len());
        let chunk = Bytes::copy_from_slice(&body.data[body.offset..end]);
        body.offset = end;
        body.fixture.slow_chunks_sent.fetch_add(1, Ordering::SeqCst);
        Some((Ok::<_, std::io::Error>(chunk), body))
    });

    Body::from_stream(chunks).into_response()
}
