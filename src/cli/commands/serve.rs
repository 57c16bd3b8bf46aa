//! HTTP backend for the capture form.
//!
//! Every endpoint maps onto one session transition. Sessions live in a
//! registry keyed by id; each sits behind its own mutex so one worker's
//! requests run strictly in order while other workers proceed.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::{ErrorKind, LogbookError};
use crate::orchestrator::Logbook;
use crate::session::{Session, SessionView};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};
use uuid::Uuid;

/// Largest accepted audio upload; matches the speech service's file limit.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// One registered session.
struct SessionSlot {
    session: Mutex<Session>,
    /// Bumped on every discard. Pending service calls watch it and give up.
    discards: watch::Sender<u64>,
    last_touched: std::sync::Mutex<Instant>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            discards: watch::channel(0).0,
            last_touched: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_touched.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_touched.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Await a service-backed transition unless the session is discarded first.
///
/// Dropping the call leaves the session in the phase it had before the await
/// (`Captured` or `Clarifying`), from which discard is valid.
async fn unless_discarded<T>(
    discarded: &mut watch::Receiver<u64>,
    call: impl Future<Output = crate::error::Result<T>>,
) -> crate::error::Result<T> {
    tokio::select! {
        biased;
        _ = discarded.changed() => Err(LogbookError::InvalidTransition(
            "session was discarded while the request was pending".to_string(),
        )),
        result = call => result,
    }
}

/// Shared application state.
pub struct AppState {
    logbook: Logbook,
    sessions: RwLock<HashMap<Uuid, Arc<SessionSlot>>>,
    idle_ttl: Duration,
}

impl AppState {
    pub fn new(logbook: Logbook, idle_ttl: Duration) -> Self {
        Self {
            logbook,
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    async fn register(&self, session: Session) -> SessionView {
        let view = session.view();
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::new(SessionSlot::new(session)));
        view
    }

    async fn session(&self, id: Uuid) -> Result<Arc<SessionSlot>, ApiError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::from(LogbookError::SessionNotFound(id.to_string())))?;
        slot.touch();
        Ok(slot)
    }

    /// Drop sessions idle for longer than the TTL. Sessions with a request in flight stay.
    async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let keep = slot.idle_for(now) < self.idle_ttl || slot.session.try_lock().is_err();
            if !keep {
                info!(session = %id, "Evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }
}

/// Periodically evict idle sessions.
fn spawn_sweeper(state: Arc<AppState>) {
    let period = (state.idle_ttl / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = state.evict_idle().await;
            if evicted > 0 {
                debug!("Evicted {} idle sessions", evicted);
            }
        }
    });
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/domains", get(list_domains))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/audio", post(upload_audio))
        .route("/sessions/{id}/answer", post(answer_text))
        .route("/sessions/{id}/answer/audio", post(answer_audio))
        .route("/sessions/{id}/save", post(save))
        .route("/sessions/{id}/discard", post(discard))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let logbook = Logbook::new(&settings)?;
    let state = Arc::new(AppState::new(
        logbook,
        Duration::from_secs(settings.server.session_ttl_seconds),
    ));
    spawn_sweeper(state.clone());
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Logbook API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Domains", "GET    /domains");
    Output::kv("Start session", "POST   /sessions {\"domain\": ...}");
    Output::kv("Session", "GET    /sessions/{id}");
    Output::kv("Report audio", "POST   /sessions/{id}/audio");
    Output::kv("Answer (text)", "POST   /sessions/{id}/answer {\"text\": ...}");
    Output::kv("Answer (audio)", "POST   /sessions/{id}/answer/audio");
    Output::kv("Save", "POST   /sessions/{id}/save");
    Output::kv("Discard", "POST   /sessions/{id}/discard");
    Output::kv("Close", "DELETE /sessions/{id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct CreateSessionRequest {
    domain: String,
}

#[derive(Deserialize)]
struct AnswerRequest {
    text: String,
}

#[derive(Serialize)]
struct DomainInfo {
    id: String,
    vocabulary_hints: Vec<String>,
}

#[derive(Serialize)]
struct SaveResponse {
    saved: bool,
    store: String,
    session: SessionView,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: String,
    retryable: bool,
    /// Session state after the failed request, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionView>,
}

/// A failed request, rendered as a JSON error body.
struct ApiError {
    error: LogbookError,
    session: Option<SessionView>,
}

impl ApiError {
    fn with_session(error: LogbookError, session: &Session) -> Self {
        Self {
            error,
            session: Some(session.view()),
        }
    }
}

impl From<LogbookError> for ApiError {
    fn from(error: LogbookError) -> Self {
        Self { error, session: None }
    }
}

fn status_for(error: &LogbookError) -> StatusCode {
    match error {
        LogbookError::DomainNotFound(_) | LogbookError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        LogbookError::InvalidTransition(_) => StatusCode::CONFLICT,
        LogbookError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => match error.kind() {
            ErrorKind::Transcription | ErrorKind::Extraction | ErrorKind::Merge | ErrorKind::Store => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.error.to_string(),
            kind: format!("{:?}", self.error.kind()).to_lowercase(),
            retryable: self.error.is_retryable(),
            session: self.session,
        };
        (status_for(&self.error), Json(body)).into_response()
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_domains(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let domains: Vec<DomainInfo> = state
        .logbook
        .domains()
        .profiles()
        .iter()
        .map(|p| DomainInfo {
            id: p.id.clone(),
            vocabulary_hints: p.vocabulary_hints.clone(),
        })
        .collect();
    Json(domains)
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    state.evict_idle().await;
    let session = state.logbook.start_session(&req.domain)?;
    let view = state.register(session).await;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let slot = state.session(id).await?;
    let view = slot.session.lock().await.view();
    Ok(Json(view))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let removed = state.sessions.write().await.remove(&id);
    match removed {
        Some(slot) => {
            slot.discards.send_modify(|n| *n += 1);
            info!(session = %id, "Session closed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(LogbookError::SessionNotFound(id.to_string()).into()),
    }
}

/// Attach the recorded report and process it right away.
async fn upload_audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<SessionView>, ApiError> {
    let slot = state.session(id).await?;
    let mut discarded = slot.discards.subscribe();
    let mut session = slot.session.lock().await;

    state
        .logbook
        .capture(&mut session, body.to_vec())
        .map_err(|e| ApiError::with_session(e, &session))?;
    let processed = unless_discarded(&mut discarded, state.logbook.process(&mut session)).await;
    if let Err(e) = processed {
        return Err(ApiError::with_session(e, &session));
    }
    Ok(Json(session.view()))
}

async fn answer_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let slot = state.session(id).await?;
    let mut discarded = slot.discards.subscribe();
    let mut session = slot.session.lock().await;

    let merged = unless_discarded(
        &mut discarded,
        state.logbook.answer_text(&mut session, &req.text),
    )
    .await;
    if let Err(e) = merged {
        return Err(ApiError::with_session(e, &session));
    }
    Ok(Json(session.view()))
}

async fn answer_audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<SessionView>, ApiError> {
    let slot = state.session(id).await?;
    let mut discarded = slot.discards.subscribe();
    let mut session = slot.session.lock().await;

    let merged = unless_discarded(
        &mut discarded,
        state.logbook.answer_audio(&mut session, body.to_vec()),
    )
    .await;
    if let Err(e) = merged {
        return Err(ApiError::with_session(e, &session));
    }
    Ok(Json(session.view()))
}

async fn save(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaveResponse>, ApiError> {
    let slot = state.session(id).await?;
    let mut session = slot.session.lock().await;

    if let Err(e) = state.logbook.save(&mut session).await {
        return Err(ApiError::with_session(e, &session));
    }
    Ok(Json(SaveResponse {
        saved: true,
        store: state.logbook.store().name().to_string(),
        session: session.view(),
    }))
}

/// Abandon whatever is pending and drop the record.
async fn discard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let slot = state.session(id).await?;
    // Wake any in-flight call first so the session lock frees up promptly.
    slot.discards.send_modify(|n| *n += 1);
    let mut session = slot.session.lock().await;
    state.logbook.discard(&mut session);
    Ok(Json(session.view()))
}
