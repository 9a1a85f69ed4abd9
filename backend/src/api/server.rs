//! HTTP server for the dataprep API.
//!
//! One request drives one operation against one session.
//!
//! # API Endpoints
//!
//! | Method | Path                                   | Description                    |
//! |--------|----------------------------------------|--------------------------------|
//! | GET    | `/health`                              | Health check                   |
//! | POST   | `/api/sessions`                        | Create a session               |
//! | GET    | `/api/sessions/{id}`                   | Session summary                |
//! | DELETE | `/api/sessions/{id}`                   | Drop a session                 |
//! | POST   | `/api/sessions/{id}/upload`            | Upload CSV/Parquet (multipart) |
//! | POST   | `/api/sessions/{id}/operations`        | Apply an operation (JSON)      |
//! | POST   | `/api/sessions/{id}/reset`             | Reset the session              |
//! | GET    | `/api/sessions/{id}/preview`           | First/last rows                |
//! | GET    | `/api/sessions/{id}/describe`          | Descriptive statistics         |
//! | GET    | `/api/sessions/{id}/missing`           | Missing values per column      |
//! | GET    | `/api/sessions/{id}/correlation`       | Correlation matrix             |
//! | GET    | `/api/sessions/{id}/code`              | Generated pandas script        |
//! | GET    | `/api/sessions/{id}/export/{format}`   | Download as csv or parquet     |
//! | GET    | `/api/logs`                            | SSE stream for real-time logs  |

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_warning, LOG_BROADCASTER};
use super::types::{
    CorrelationQuery, PreviewQuery, SessionCreated, SessionResponse, UploadResponse,
};
use crate::cache::LoadCache;
use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult, SessionResult};
use crate::io::{FileFormat, LoadOptions};
use crate::session::{Session, SessionSummary};
use crate::stats::CorrelationMethod;
use crate::table::Table;
use crate::transform::Operation;

/// Room for multipart boundaries and form fields around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

type SharedSession = Arc<Mutex<Session>>;

/// Shared server state.
///
/// The session map is locked only to find or insert a session. Each session
/// has its own lock, held on a blocking thread while it parses or computes.
#[derive(Clone)]
pub struct AppState {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
    cache: Arc<LoadCache>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(max_upload_bytes: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            cache: Arc::new(LoadCache::new()),
            max_upload_bytes,
        }
    }

    async fn session(&self, id: Uuid) -> ServerResult<SharedSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("session {}", id)))
    }

    /// Run `f` against a session on the blocking pool.
    async fn with_session<T, F>(&self, id: &str, f: F) -> ServerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session, &LoadCache) -> ServerResult<T> + Send + 'static,
    {
        let session = self.session(parse_id(id)?).await?;
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || {
            let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *session, &cache)
        })
        .await
        .map_err(|e| {
            log_error(format!("Session task failed: {}", e));
            ServerError::Internal(e.to_string())
        })?
    }
}

fn parse_id(id: &str) -> ServerResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ServerError::BadRequest(format!("Invalid session id '{}'", id)))
}

/// Build the router with all routes and CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = state.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/upload", post(upload))
        .route("/api/sessions/{id}/operations", post(apply_operation))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/sessions/{id}/preview", get(preview))
        .route("/api/sessions/{id}/describe", get(describe))
        .route("/api/sessions/{id}/missing", get(missing))
        .route("/api/sessions/{id}/correlation", get(correlation))
        .route("/api/sessions/{id}/code", get(code))
        .route("/api/sessions/{id}/export/{format}", get(export))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(AppState::new(config.max_upload_bytes));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, max_upload_bytes = config.max_upload_bytes, "🚀 dataprep server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.sessions.read().await.len();
    let cache = state.cache.stats();
    Json(json!({
        "status": "ok",
        "service": "dataprep",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": sessions,
        "cache": cache,
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session = Session::new();
    let id = session.id();
    state
        .sessions
        .write()
        .await
        .insert(id, Arc::new(Mutex::new(session)));
    tracing::info!(session = %id, "Session created");
    (StatusCode::CREATED, Json(SessionCreated { id }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<SessionSummary>> {
    state.with_session(&id, |s, _| Ok(Json(s.summary()))).await
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    let id = parse_id(&id)?;
    let removed = state.sessions.write().await.remove(&id);
    if removed.is_none() {
        return Err(ServerError::NotFound(format!("session {}", id)));
    }
    state.cache.evict_session(id);
    tracing::info!(session = %id, "Session dropped");
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(e: MultipartError, limit: usize) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        log_warning(format!("Upload rejected: over {} bytes", limit));
        ServerError::PayloadTooLarge(limit)
    } else {
        ServerError::BadRequest(format!("Multipart error: {}", e))
    }
}

fn parse_flag(name: &str, value: &str) -> ServerResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ServerError::BadRequest(format!(
            "Invalid value '{}' for {}",
            value, name
        ))),
    }
}

/// Multipart upload: `file` plus optional `header`, `column_names`, `encoding`.
async fn upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    parse_id(&id)?;
    let limit = state.max_upload_bytes;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut options = LoadOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ServerError::BadRequest("File has no name".to_string()))?;
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                if bytes.len() > limit {
                    log_warning(format!("Upload {} rejected: over {} bytes", file_name, limit));
                    return Err(ServerError::PayloadTooLarge(limit));
                }
                file = Some((file_name, bytes.to_vec()));
            }
            "header" => {
                let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
                options.header = parse_flag("header", &text)?;
            }
            "column_names" => {
                let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
                let names: Vec<String> = text
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect();
                options.column_names = (!names.is_empty()).then_some(names);
            }
            "encoding" => {
                let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
                options.encoding = Some(text.trim().to_string()).filter(|e| !e.is_empty());
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
    tracing::info!(session = %id, file_name = %file_name, size_bytes = bytes.len(), "📄 Upload received");

    let response = state
        .with_session(&id, move |session, cache| {
            let outcome = session.load(cache, &file_name, &bytes, &options)?;
            Ok(UploadResponse {
                status: "ok",
                outcome,
                size_bytes: bytes.len(),
                session: session.summary(),
            })
        })
        .await?;
    Ok(Json(response))
}

/// Apply one JSON operation.
async fn apply_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ServerResult<Json<SessionResponse>> {
    let operation: Operation = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid operation: {}", e)))?;

    state
        .with_session(&id, move |session, _| {
            session.apply(&operation)?;
            Ok(Json(SessionResponse::ok(session.summary())))
        })
        .await
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<SessionResponse>> {
    state
        .with_session(&id, |session, cache| {
            session.reset(cache);
            Ok(Json(SessionResponse::ok(session.summary())))
        })
        .await
}

fn table_json(table: SessionResult<Table>) -> ServerResult<Json<Value>> {
    Ok(Json(table?.to_json()))
}

async fn preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> ServerResult<Json<Value>> {
    state
        .with_session(&id, move |s, _| table_json(s.preview(query.head, query.tail)))
        .await
}

async fn describe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    state.with_session(&id, |s, _| table_json(s.describe())).await
}

async fn missing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    state.with_session(&id, |s, _| table_json(s.missing_info())).await
}

async fn correlation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CorrelationQuery>,
) -> ServerResult<Json<Value>> {
    let method = match query.method.as_deref() {
        Some(m) => m
            .parse::<CorrelationMethod>()
            .map_err(|e| ServerError::BadRequest(e.to_string()))?,
        None => CorrelationMethod::default(),
    };
    state
        .with_session(&id, move |s, _| table_json(s.correlation(method)))
        .await
}

async fn code(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<Response> {
    let script = state.with_session(&id, |s, _| Ok(s.generated_code())).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        script,
    )
        .into_response())
}

async fn export(
    State(state): State<AppState>,
    Path((id, format)): Path<(String, String)>,
) -> ServerResult<Response> {
    let format: FileFormat = format
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("Unsupported export format '{}'", format)))?;
    let bytes = state
        .with_session(&id, move |s, _| s.export(format).map_err(ServerError::from))
        .await?;
    let disposition = format!("attachment; filename=\"processed.{}\"", format.extension());
    Ok((
        [
            (header::CONTENT_TYPE, format.mime().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "dataprep-test-boundary";

    /// Serve the router on an ephemeral port and return its base URL.
    async fn spawn(max_upload_bytes: usize) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(max_upload_bytes));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn multipart_body(file_name: &str, content: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn new_session(client: &reqwest::Client, base: &str) -> String {
        let response = client
            .post(format!("{base}/api/sessions"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn upload_csv(
        client: &reqwest::Client,
        base: &str,
        id: &str,
        csv: &str,
    ) -> (u16, Value) {
        let response = client
            .post(format!("{base}/api/sessions/{id}/upload"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body("people.csv", csv.as_bytes(), &[("header", "true")]))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn get_json(client: &reqwest::Client, url: String) -> (u16, Value) {
        let response = client.get(url).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn post_operation(
        client: &reqwest::Client,
        base: &str,
        id: &str,
        op: Value,
    ) -> (u16, Value) {
        let response = client
            .post(format!("{base}/api/sessions/{id}/operations"))
            .json(&op)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(1024).await;
        let (status, body) = get_json(&reqwest::Client::new(), format!("{base}/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "dataprep");
    }

    #[tokio::test]
    async fn test_upload_apply_and_generate() {
        let base = spawn(1024 * 1024).await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;

        let (status, body) =
            upload_csv(&client, &base, &id, "name,age\nAlice,25\nBob,\nCleo,30\n").await;
        assert_eq!(status, 200, "{}", body);
        assert_eq!(body["outcome"], "parsed");
        assert_eq!(body["session"]["shape"], json!([3, 2]));

        let op = json!({"type": "fill_missing", "column": "age", "method": "mean"});
        let (status, body) = post_operation(&client, &base, &id, op).await;
        assert_eq!(status, 200, "{}", body);
        assert_eq!(body["session"]["history"].as_array().unwrap().len(), 2);

        let (status, body) =
            get_json(&client, format!("{base}/api/sessions/{id}/preview?head=5")).await;
        assert_eq!(status, 200);
        assert_eq!(body["rows"][1][1], 27.5);

        let response = client
            .get(format!("{base}/api/sessions/{id}/code"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(
            response.text().await.unwrap(),
            "import pandas as pd\n\
             df = pd.read_csv('people.csv', header=0)\n\
             df['age'] = df['age'].fillna(df['age'].mean())\n"
        );
    }

    #[tokio::test]
    async fn test_same_upload_is_unchanged() {
        let base = spawn(1024 * 1024).await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;

        upload_csv(&client, &base, &id, "a\n1\n").await;
        let (status, body) = upload_csv(&client, &base, &id, "a\n1\n").await;
        assert_eq!(status, 200);
        assert_eq!(body["outcome"], "unchanged");
        assert_eq!(body["session"]["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_export_csv_has_bom() {
        let base = spawn(1024 * 1024).await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;
        upload_csv(&client, &base, &id, "a,b\n1,x\n").await;

        let response = client
            .get(format!("{base}/api/sessions/{id}/export/csv"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert!(response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("processed.csv"));
        let bytes = response.bytes().await.unwrap();
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));

        let (status, _) =
            get_json(&client, format!("{base}/api/sessions/{id}/export/xlsx")).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_stats_endpoints() {
        let base = spawn(1024 * 1024).await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;
        upload_csv(&client, &base, &id, "x,y\n1,2\n2,4\n3,7\n").await;

        for path in ["describe", "missing", "correlation?method=spearman"] {
            let (status, body) =
                get_json(&client, format!("{base}/api/sessions/{id}/{path}")).await;
            assert_eq!(status, 200, "{}", path);
            assert_eq!(body["columns"][0], "column");
        }

        let (status, _) = get_json(
            &client,
            format!("{base}/api/sessions/{id}/correlation?method=kendall"),
        )
        .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let base = spawn(1024 * 1024).await;
        let client = reqwest::Client::new();

        let unknown = Uuid::new_v4();
        let (status, body) = get_json(&client, format!("{base}/api/sessions/{unknown}")).await;
        assert_eq!(status, 404);
        assert_eq!(body["status"], "error");

        let (status, _) = get_json(&client, format!("{base}/api/sessions/not-a-uuid")).await;
        assert_eq!(status, 400);

        let id = new_session(&client, &base).await;
        let (status, _) = get_json(&client, format!("{base}/api/sessions/{id}/describe")).await;
        assert_eq!(status, 409);

        upload_csv(&client, &base, &id, "a\n1\n").await;
        let op = json!({"type": "scale", "column": "nope", "method": "standard"});
        let (status, _) = post_operation(&client, &base, &id, op).await;
        assert_eq!(status, 404);

        let (status, _) = post_operation(&client, &base, &id, json!({"type": "teleport"})).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_sessions_work_concurrently() {
        let base = spawn(1024 * 1024).await;
        let client = reqwest::Client::new();
        let first = new_session(&client, &base).await;
        let second = new_session(&client, &base).await;

        let wide: String = std::iter::once("a,b\n".to_string())
            .chain((0..2000).map(|i| format!("{},{}\n", i, i * 2)))
            .collect();
        let ((s1, b1), (s2, b2)) = tokio::join!(
            upload_csv(&client, &base, &first, &wide),
            upload_csv(&client, &base, &second, "x\n1\n2\n"),
        );
        assert_eq!((s1, s2), (200, 200));
        assert_eq!(b1["session"]["shape"], json!([2000, 2]));
        assert_eq!(b2["session"]["shape"], json!([2, 1]));

        let (status, body) = get_json(&client, format!("{base}/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["sessions"], 2);
        assert_eq!(body["cache"]["entries"], 2);
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let base = spawn(16).await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;
        let (status, _) = upload_csv(&client, &base, &id, "name,age\nAlice,25\nBob,31\n").await;
        assert_eq!(status, 413);
    }

    #[tokio::test]
    async fn test_reset_and_delete() {
        let base = spawn(1024 * 1024).await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;
        upload_csv(&client, &base, &id, "a\n1\n").await;

        let response = client
            .post(format!("{base}/api/sessions/{id}/reset"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["session"]["history"], json!([]));
        assert_eq!(body["session"]["shape"], Value::Null);

        let response = client
            .delete(format!("{base}/api/sessions/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 204);

        let (status, _) = get_json(&client, format!("{base}/api/sessions/{id}")).await;
        assert_eq!(status, 404);
    }
}
