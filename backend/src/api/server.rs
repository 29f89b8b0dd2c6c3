//! HTTP Server for the rowcast API.
//!
//! Jobs run on the blocking thread pool, so a large render never stalls the
//! async runtime. Compiled patterns are shared through a [`ProgramCache`].
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/render`     | Render a JSON job request            |
//! | POST   | `/api/upload`     | Render an uploaded file (multipart)  |
//! | GET    | `/api/functions`  | Pattern function table               |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, env, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_info, log_warning, LOG_BROADCASTER};
use super::types::{decode_upload, error_response, form_bool, function_infos, FunctionInfo, UploadResponse};
use crate::cache::{ProgramCache, DEFAULT_CAPACITY};
use crate::error::{ServerError, ServerResult};
use crate::job::{run_job_blocking, JobOptions, JobRequest, JobResponse};
use crate::parser::SeparatorKind;

/// Default listening port
pub const DEFAULT_PORT: u16 = 3000;

/// Server settings, read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub cache_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Read `ROWCAST_PORT` and `ROWCAST_CACHE_CAPACITY`, loading `.env` first.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: lookup("ROWCAST_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            cache_capacity: lookup("ROWCAST_CACHE_CAPACITY")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.cache_capacity),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ProgramCache>,
    pub options: JobOptions,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            cache: Arc::new(ProgramCache::new(config.cache_capacity)),
            options: JobOptions::default(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(error_response(message)))
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        let status = match err {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, &err.to_string())
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/render", post(render_job))
        .route("/api/upload", post(upload_file))
        .route("/api/functions", get(list_functions))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> ServerResult<()> {
    let app = router(AppState::new(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    eprintln!("🚀 rowcast server running on http://localhost:{}", config.port);
    eprintln!("   POST /api/render    - Render a JSON job");
    eprintln!("   POST /api/upload    - Render an uploaded file");
    eprintln!("   GET  /api/functions - Pattern functions");
    eprintln!("   GET  /api/logs      - SSE log stream");
    eprintln!("   GET  /health        - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "rowcast",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": state.cache.stats(),
        "endpoints": {
            "render": "POST /api/render",
            "upload": "POST /api/upload",
            "functions": "GET /api/functions",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// Function table endpoint
async fn list_functions() -> Json<Vec<FunctionInfo>> {
    Json(function_infos())
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Render a JSON job request. Incomplete requests get `204 No Content`.
async fn render_job(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> Result<Response, ApiError> {
    run(state, request).await.map(|response| match response {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn run(
    state: AppState,
    request: JobRequest,
) -> Result<Option<JobResponse>, ApiError> {
    run_job_blocking(request, state.options.clone(), Some(Arc::clone(&state.cache)))
        .await
        .map_err(|e| {
            log_error(format!("Job failed: {}", e));
            ApiError::from(ServerError::from(e))
        })
}

/// Upload endpoint: `file`, `pattern`, optional `separator` and `hasHeaderRow`.
/// A missing file or an empty pattern gets `204 No Content`.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut pattern = String::new();
    let mut separator: Option<SeparatorKind> = None;
    let mut has_header_row = false;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, &format!("Multipart error: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, &format!("Read error: {}", e)))?
                    .to_vec(),
            );
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, &format!("Read error: {}", e)))?;
        match name.as_str() {
            "pattern" => pattern = text,
            "separator" | "separatorKind" if !text.trim().is_empty() && text.trim() != "auto" => {
                separator = Some(text.trim().parse().map_err(|e: String| {
                    ApiError::from(ServerError::BadRequest(e))
                })?);
            }
            "hasHeaderRow" => has_header_row = form_bool(&text),
            _ => {}
        }
    }

    // No file means no text: an incomplete request, like an empty `rawText`.
    let Some(bytes) = file_data else {
        log_warning("Upload without a file, nothing to render");
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    log_info(format!(
        "📄 Upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let upload = decode_upload(&bytes, pattern, separator, has_header_row).map_err(|e| {
        ApiError::from(ServerError::BadRequest(e.to_string()))
    })?;
    let separator_kind = upload.request.separator_kind;

    let response = match run(state, upload.request).await? {
        Some(result) => Json(UploadResponse {
            job_id: Uuid::new_v4().to_string(),
            file_name,
            encoding: upload.encoding,
            separator_kind,
            result,
        })
        .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::logs::set_echo;
    use crate::error::JobError;
    use axum::extract::FromRequest;

    fn state() -> AppState {
        AppState::new(&ServerConfig::default())
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ServerConfig::from_lookup(|key| match key {
            "ROWCAST_PORT" => Some("8080".to_string()),
            "ROWCAST_CACHE_CAPACITY" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.with_port(1).port, 1);
    }

    #[tokio::test]
    async fn test_render_endpoint() {
        set_echo(false);
        let state = state();
        let request = JobRequest::new("Name\nAda", "Hi $(name)", SeparatorKind::Comma, true);

        let response = render_job(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_render_endpoint_incomplete() {
        set_echo(false);
        let request = JobRequest::new("", "Hi", SeparatorKind::Comma, false);

        let response = render_job(State(state()), Json(request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    async fn upload(body: &'static str) -> Response {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(axum::body::Body::from(body))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();
        upload_file(State(state()), multipart).await.unwrap()
    }

    #[tokio::test]
    async fn test_upload_without_file_is_incomplete() {
        set_echo(false);
        let response = upload(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"pattern\"\r\n\r\n\
             $(0)\r\n\
             --XBOUNDARY--\r\n",
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_upload_with_file_renders() {
        set_echo(false);
        let response = upload(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"people.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             Name\nAda\r\n\
             --XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"pattern\"\r\n\r\n\
             Hi $(name)\r\n\
             --XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"hasHeaderRow\"\r\n\r\n\
             true\r\n\
             --XBOUNDARY--\r\n",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_cache() {
        let Json(body) = health(State(state())).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cache"]["capacity"], DEFAULT_CAPACITY);
    }

    #[tokio::test]
    async fn test_functions_endpoint() {
        let Json(infos) = list_functions().await;
        assert!(infos.iter().any(|f| f.name == "urlEncodeComponent"));
    }

    #[test]
    fn test_server_error_status() {
        let (status, _) = ApiError::from(ServerError::BadRequest("x".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = ApiError::from(ServerError::from(JobError::Worker("x".into())));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
