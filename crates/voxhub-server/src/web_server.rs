//! HTTP server: websocket endpoint, operator APIs, conversion APIs and the
//! static frontend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::stream;
use serde::Deserialize;
use tower_http::services::{ServeDir, ServeFile};
use voxhub_protocol::{clamp_speed, PeerId, DEFAULT_LANGUAGE};
use voxhub_roles::CoordinatorError;
use voxhub_synth::{SynthError, SynthesisRequest};

use crate::hub::Hub;
use crate::session::run_session;

#[derive(Clone)]
struct WebState {
    hub: Hub,
    events_interval: Duration,
}

pub struct WebServer {
    bind_addr: String,
    hub: Hub,
    web_root: PathBuf,
    events_interval: Duration,
}

impl WebServer {
    pub fn new(
        bind_addr: String,
        hub: Hub,
        web_root: Option<PathBuf>,
        events_interval: Duration,
    ) -> Self {
        Self {
            bind_addr,
            hub,
            web_root: web_root.unwrap_or_else(detect_web_root),
            events_interval,
        }
    }

    pub fn router(&self) -> Router {
        let index_file = self.web_root.join("index.html");
        let static_service =
            ServeDir::new(&self.web_root).not_found_service(ServeFile::new(index_file));
        let web_state = WebState {
            hub: self.hub.clone(),
            events_interval: self.events_interval,
        };

        Router::new()
            .route("/ws", get(ws_upgrade))
            .route("/api/health", get(api_health))
            .route("/api/status", get(api_status))
            .route("/api/peers", get(api_peers))
            .route("/api/roles", get(api_roles))
            .route("/api/roles/:target", put(api_assign_role).delete(api_remove_role))
            .route("/api/queue", delete(api_clear_queue))
            .route("/api/events", get(api_events))
            .route("/api/languages", get(api_languages))
            .route("/api/tts", post(api_tts))
            .route("/api/test", get(api_test))
            .fallback_service(static_service)
            .with_state(web_state)
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(
            addr = %self.bind_addr,
            web_root = %self.web_root.display(),
            "voxhub listening"
        );
        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn detect_web_root() -> PathBuf {
    if let Ok(path) = std::env::var("VOXHUB_WEB_ROOT") {
        let p = PathBuf::from(path);
        if p.join("index.html").exists() {
            return p;
        }
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = [
        cwd.join("frontend/public"),
        cwd.join("public"),
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../frontend/public"),
    ];
    for c in candidates {
        if c.join("index.html").exists() {
            return c;
        }
    }

    cwd
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

fn coordinator_error(e: CoordinatorError) -> Response {
    let status = match e {
        CoordinatorError::UnknownPeer(_) => StatusCode::NOT_FOUND,
        CoordinatorError::NotRoleHolder(_) | CoordinatorError::AlreadyRoleHolder(_) => {
            StatusCode::CONFLICT
        }
        CoordinatorError::Registry(_) => StatusCode::BAD_REQUEST,
    };
    error_body(status, e.to_string())
}

fn synth_error(e: SynthError) -> Response {
    let status = match e {
        SynthError::Validation(_) => StatusCode::BAD_REQUEST,
        SynthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        SynthError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_body(status, e.to_string())
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    peer_id: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(web): State<WebState>,
) -> impl IntoResponse {
    let peer_id = query.peer_id.and_then(|raw| PeerId::parse(&raw).ok());
    ws.on_upgrade(move |socket| run_session(socket, web.hub, peer_id))
}

async fn api_health(State(web): State<WebState>) -> Json<serde_json::Value> {
    let snapshot = web.hub.snapshot().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": snapshot.mode,
        "peers": snapshot.peers.len(),
        "roleHolders": snapshot.role_holders.len(),
        "time": chrono::Utc::now(),
    }))
}

async fn api_status(State(web): State<WebState>) -> impl IntoResponse {
    Json(web.hub.snapshot().await)
}

async fn api_peers(State(web): State<WebState>) -> impl IntoResponse {
    Json(web.hub.peers().await)
}

async fn api_roles(State(web): State<WebState>) -> impl IntoResponse {
    Json(web.hub.role_holders().await)
}

async fn api_assign_role(
    State(web): State<WebState>,
    AxumPath(target): AxumPath<String>,
) -> Response {
    match web.hub.force_assign(&target).await {
        Ok(()) => Json(web.hub.role_holders().await).into_response(),
        Err(e) => coordinator_error(e),
    }
}

async fn api_remove_role(
    State(web): State<WebState>,
    AxumPath(target): AxumPath<String>,
) -> Response {
    match web.hub.force_remove(&target).await {
        Ok(()) => Json(web.hub.role_holders().await).into_response(),
        Err(e) => coordinator_error(e),
    }
}

async fn api_clear_queue(State(web): State<WebState>) -> Json<serde_json::Value> {
    let cleared = web.hub.clear_queue().await;
    Json(serde_json::json!({ "cleared": cleared }))
}

async fn api_events(State(web): State<WebState>) -> Response {
    let interval = web.events_interval;
    let sse_stream = stream::unfold((web.hub, false), move |(hub, skip_first_sleep)| async move {
        if skip_first_sleep {
            tokio::time::sleep(interval).await;
        }
        let payload = serde_json::json!({
            "type": "snapshot",
            "time": chrono::Utc::now(),
            "status": hub.snapshot().await,
        });
        let text = format!("data: {}\n\n", payload);
        Some((Ok::<Bytes, std::convert::Infallible>(Bytes::from(text)), (hub, true)))
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(sse_stream),
    )
        .into_response()
}

async fn api_languages(State(web): State<WebState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "languages": web.hub.synthesizer().languages(),
    }))
}

#[derive(Debug, Deserialize)]
struct TtsBody {
    #[serde(default)]
    text: String,
    language: Option<String>,
    speed: Option<f64>,
}

async fn api_tts(State(web): State<WebState>, Json(body): Json<TtsBody>) -> Response {
    let request = SynthesisRequest {
        text: body.text,
        language: body.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        speed: clamp_speed(body.speed),
    };
    match web.hub.synthesizer().synthesize(&request).await {
        Ok(clip) => {
            let mut value = serde_json::to_value(&clip).unwrap_or_default();
            if let Some(map) = value.as_object_mut() {
                map.insert("success".into(), serde_json::Value::Bool(true));
            }
            Json(value).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Direct conversion failed");
            synth_error(e)
        }
    }
}

async fn api_test(State(web): State<WebState>) -> Response {
    match web.hub.synthesizer().probe().await {
        Ok(report) => Json(serde_json::json!({
            "success": true,
            "status": report.status,
            "message": report.message,
            "timestamp": report.checked_at,
        }))
        .into_response(),
        Err(e) => error_body(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}
