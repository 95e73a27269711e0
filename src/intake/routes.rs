//! REST endpoints for intake sessions.
//!
//! Each session is one [`FlowController`] held in memory. Nothing is
//! persisted; restarting the server forgets every session.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::flow::{FlowController, FlowView};
use super::signature::{PointerEvent, SignatureStyle, SurfaceGeometry};
use super::state::Transition;
use super::steps::StepDraft;
use crate::error::{Error, FlowError};
use crate::sink::{Navigator, Screen, SubmissionSink};

/// Default number of sessions held at once.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// Default idle time after which a session is dropped, in seconds.
pub const DEFAULT_SESSION_IDLE_SECS: i64 = 30 * 60;

/// Bounds on the in-memory session map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions held at once; opening past this drops the least recently
    /// used one.
    pub max_sessions: usize,
    /// Sessions untouched for longer than this are dropped.
    pub idle_timeout: TimeDelta,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_timeout: TimeDelta::seconds(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

struct Session {
    flow: FlowController,
    touched_at: DateTime<Utc>,
}

/// In-memory intake sessions.
pub struct IntakeSessions {
    sessions: RwLock<HashMap<Uuid, Session>>,
    sink: Arc<dyn SubmissionSink>,
    navigator: Arc<dyn Navigator>,
    style: SignatureStyle,
    limits: SessionLimits,
}

impl IntakeSessions {
    pub fn new(
        sink: Arc<dyn SubmissionSink>,
        navigator: Arc<dyn Navigator>,
        style: SignatureStyle,
        limits: SessionLimits,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            sink,
            navigator,
            style,
            limits,
        })
    }

    /// Open a fresh session at the first step, dropping idle sessions and,
    /// at capacity, the least recently used one.
    pub async fn open(&self) -> (Uuid, FlowView) {
        self.open_at(Utc::now()).await
    }

    async fn open_at(&self, now: DateTime<Utc>) -> (Uuid, FlowView) {
        let id = Uuid::new_v4();
        let flow = FlowController::new(Arc::clone(&self.sink), Arc::clone(&self.navigator))
            .with_signature_style(self.style);
        let view = flow.view();

        let mut sessions = self.sessions.write().await;
        self.prune(&mut sessions, now);
        sessions.insert(
            id,
            Session {
                flow,
                touched_at: now,
            },
        );
        info!(session_id = %id, open = sessions.len(), "Intake session opened");
        (id, view)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn view(&self, id: Uuid) -> Result<FlowView, Error> {
        self.with_session(id, |_| Ok(())).await.map(|((), view)| view)
    }

    /// Run one operation against a session and return its fresh view.
    pub async fn with_session<T>(
        &self,
        id: Uuid,
        op: impl FnOnce(&mut FlowController) -> Result<T, Error>,
    ) -> Result<(T, FlowView), Error> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(FlowError::SessionNotFound { id })?;
        session.touched_at = Utc::now();
        let out = op(&mut session.flow)?;
        Ok((out, session.flow.view()))
    }

    /// Drop sessions idle at `now`. Returns how many were removed.
    pub async fn expire_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        self.drop_idle(&mut sessions, now)
    }

    fn drop_idle(&self, sessions: &mut HashMap<Uuid, Session>, now: DateTime<Utc>) -> usize {
        let before = sessions.len();
        sessions.retain(|id, s| {
            let keep = now - s.touched_at <= self.limits.idle_timeout;
            if !keep {
                debug!(session_id = %id, "Intake session expired");
            }
            keep
        });
        let expired = before - sessions.len();
        if expired > 0 {
            info!(count = expired, "Expired idle intake sessions");
        }
        expired
    }

    /// Make room for one more session.
    fn prune(&self, sessions: &mut HashMap<Uuid, Session>, now: DateTime<Utc>) {
        self.drop_idle(sessions, now);
        while !sessions.is_empty() && sessions.len() >= self.limits.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, s)| s.touched_at)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session_id = %oldest, "Intake session evicted at capacity");
        }
    }
}

/// Shared state for intake routes.
#[derive(Clone)]
pub struct IntakeRouteState {
    pub sessions: Arc<IntakeSessions>,
}

/// Body returned by every session endpoint.
#[derive(Debug, Serialize)]
struct SessionResponse {
    session_id: Uuid,
    /// Screen the client should show.
    screen: Screen,
    #[serde(skip_serializing_if = "Option::is_none")]
    transition: Option<Transition>,
    view: FlowView,
}

impl SessionResponse {
    fn new(session_id: Uuid, transition: Option<Transition>, view: FlowView) -> Self {
        let screen = match transition {
            Some(Transition::Exited) => Screen::Entry,
            _ => Screen::Intake,
        };
        Self {
            session_id,
            screen,
            transition,
            view,
        }
    }
}

/// Error body with a status mapped from the error kind.
struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Flow(FlowError::SessionNotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Flow(_) => StatusCode::CONFLICT,
            Error::Config(_) | Error::Signature(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Intake request failed: {}", self.0);
        }
        let body = match &self.0 {
            Error::Validation(v) => {
                serde_json::json!({"error": self.0.to_string(), "fields": v.errors})
            }
            other => serde_json::json!({"error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

fn parse_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid session ID"})),
        )
            .into_response()
    })
}

/// Run `op` on the session at `id` and build the standard response.
async fn respond<T>(
    state: &IntakeRouteState,
    id: &str,
    op: impl FnOnce(&mut FlowController) -> Result<T, Error>,
    transition_of: impl FnOnce(&T) -> Option<Transition>,
) -> Response {
    let session_id = match parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.sessions.with_session(session_id, op).await {
        Ok((out, view)) => {
            Json(SessionResponse::new(session_id, transition_of(&out), view)).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "caretaker-match"
    }))
}

/// GET /
///
/// Entry screen: where to go next.
async fn entry() -> impl IntoResponse {
    Json(serde_json::json!({
        "screen": Screen::Entry,
        "title": "CareTaker Match",
        "tagline": "Connecting patients for mutual care after surgery",
        "links": {
            "start_intake": "/api/intake",
            "provider_review": "/api/provider",
        },
        "notice": "DEMO VERSION - Not for clinical use",
    }))
}

/// POST /api/intake
async fn open_session(State(state): State<IntakeRouteState>) -> impl IntoResponse {
    let (id, view) = state.sessions.open().await;
    (
        StatusCode::CREATED,
        Json(SessionResponse::new(id, None, view)),
    )
}

/// GET /api/intake/{id}
async fn get_session(
    State(state): State<IntakeRouteState>,
    Path(id): Path<String>,
) -> Response {
    let session_id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.sessions.view(session_id).await {
        Ok(view) => Json(SessionResponse::new(session_id, None, view)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// POST /api/intake/{id}/steps
async fn submit_step(
    State(state): State<IntakeRouteState>,
    Path(id): Path<String>,
    Json(draft): Json<StepDraft>,
) -> Response {
    respond(&state, &id, |flow| flow.submit_step(draft), |t| Some(*t)).await
}

/// POST /api/intake/{id}/back
async fn go_back(State(state): State<IntakeRouteState>, Path(id): Path<String>) -> Response {
    respond(&state, &id, |flow| Ok(flow.back()), |t| Some(*t)).await
}

/// POST /api/intake/{id}/signature/surface
async fn attach_surface(
    State(state): State<IntakeRouteState>,
    Path(id): Path<String>,
    Json(surface): Json<SurfaceGeometry>,
) -> Response {
    respond(
        &state,
        &id,
        |flow| {
            flow.attach_signature_surface(surface);
            Ok(())
        },
        |_| None,
    )
    .await
}

/// POST /api/intake/{id}/signature/events
///
/// Accepts a batch of pointer samples, applied in order.
async fn signature_events(
    State(state): State<IntakeRouteState>,
    Path(id): Path<String>,
    Json(events): Json<Vec<PointerEvent>>,
) -> Response {
    respond(
        &state,
        &id,
        |flow| {
            for event in &events {
                flow.signature_event(event);
            }
            Ok(())
        },
        |_| None,
    )
    .await
}

/// POST /api/intake/{id}/signature/clear
async fn clear_signature(
    State(state): State<IntakeRouteState>,
    Path(id): Path<String>,
) -> Response {
    respond(
        &state,
        &id,
        |flow| {
            flow.clear_signature();
            Ok(())
        },
        |_| None,
    )
    .await
}

/// POST /api/intake/{id}/consent
async fn complete_consent(
    State(state): State<IntakeRouteState>,
    Path(id): Path<String>,
) -> Response {
    respond(
        &state,
        &id,
        |flow| flow.complete_consent(Utc::now()),
        |t| Some(*t),
    )
    .await
}

/// POST /api/intake/{id}/reset
async fn reset(State(state): State<IntakeRouteState>, Path(id): Path<String>) -> Response {
    respond(
        &state,
        &id,
        |flow| {
            flow.reset();
            Ok(())
        },
        |_| Some(Transition::Exited),
    )
    .await
}

/// Build the intake routes, including the entry screen and health check.
pub fn intake_routes(state: IntakeRouteState) -> Router {
    Router::new()
        .route("/", get(entry))
        .route("/health", get(health))
        .route("/api/intake", post(open_session))
        .route("/api/intake/{id}", get(get_session))
        .route("/api/intake/{id}/steps", post(submit_step))
        .route("/api/intake/{id}/back", post(go_back))
        .route("/api/intake/{id}/signature/surface", post(attach_surface))
        .route("/api/intake/{id}/signature/events", post(signature_events))
        .route("/api/intake/{id}/signature/clear", post(clear_signature))
        .route("/api/intake/{id}/consent", post(complete_consent))
        .route("/api/intake/{id}/reset", post(reset))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::{RecordingNavigator, RecordingSink};

    fn sessions(limits: SessionLimits) -> Arc<IntakeSessions> {
        IntakeSessions::new(
            Arc::new(RecordingSink::default()),
            Arc::new(RecordingNavigator::default()),
            SignatureStyle::default(),
            limits,
        )
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = sessions(SessionLimits::default());
        assert!(store.is_empty().await);
        let now = Utc::now();
        let (first, _) = store.open_at(now).await;
        store.open_at(now).await;
        assert_eq!(store.len().await, 2);

        assert_eq!(store.expire_idle(now + TimeDelta::minutes(5)).await, 0);
        let later = now + TimeDelta::seconds(DEFAULT_SESSION_IDLE_SECS + 1);
        assert_eq!(store.expire_idle(later).await, 2);
        assert!(store.is_empty().await);
        assert!(matches!(
            store.view(first).await,
            Err(Error::Flow(FlowError::SessionNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn opening_drops_idle_sessions() {
        let store = sessions(SessionLimits::default());
        let now = Utc::now();
        let (stale, _) = store.open_at(now).await;
        let later = now + TimeDelta::seconds(DEFAULT_SESSION_IDLE_SECS + 1);
        let (fresh, _) = store.open_at(later).await;
        assert_eq!(store.len().await, 1);
        assert!(store.view(stale).await.is_err());
        assert!(store.view(fresh).await.is_ok());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let store = sessions(SessionLimits {
            max_sessions: 2,
            ..Default::default()
        });
        let now = Utc::now();
        let (a, _) = store.open_at(now - TimeDelta::seconds(30)).await;
        let (b, _) = store.open_at(now - TimeDelta::seconds(20)).await;
        // Touching `a` makes `b` the least recently used
        store.view(a).await.unwrap();
        let (c, _) = store.open_at(now).await;

        assert_eq!(store.len().await, 2);
        assert!(store.view(a).await.is_ok());
        assert!(store.view(b).await.is_err());
        assert!(store.view(c).await.is_ok());
    }
}
