use std::net::SocketAddr;
use std::sync::Arc;

use agentwatch_compliance::{
    Collaborator, ComplianceAssessment, ComplianceEvaluator, EvaluationError,
    FlaggedSessionsError,
};
use agentwatch_protocol::{PortError, Session, SessionId, SessionStorePort};
use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    evaluator: ComplianceEvaluator,
    sessions: Arc<dyn SessionStorePort>,
}

impl AppState {
    pub fn new(evaluator: ComplianceEvaluator, sessions: Arc<dyn SessionStorePort>) -> Self {
        Self {
            evaluator,
            sessions,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionListResponse {
    sessions: Vec<Session>,
}

#[derive(Debug, Serialize)]
struct FlaggedResponse {
    count: usize,
    sessions: Vec<Session>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    collaborator: Option<Collaborator>,
}

impl ApiError {
    fn upstream(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: error.to_string(),
            collaborator: None,
        }
    }
}

impl From<EvaluationError> for ApiError {
    fn from(error: EvaluationError) -> Self {
        let collaborator = error.failing_collaborator();
        let status = match (collaborator, error.port_error()) {
            (Collaborator::EventLog, PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: error.to_string(),
            collaborator: Some(collaborator),
        }
    }
}

impl From<FlaggedSessionsError> for ApiError {
    fn from(error: FlaggedSessionsError) -> Self {
        match error {
            FlaggedSessionsError::Evaluation(error) => error.into(),
            listing @ FlaggedSessionsError::Listing(_) => Self::upstream(listing),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.collaborator {
            Some(collaborator) => json!({ "error": self.message, "collaborator": collaborator }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}/compliance", get(session_compliance))
        .route("/compliance/flagged", get(flagged_sessions))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(listen: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(%listen, "agentwatch api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "agentwatchd"
    }))
}

async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<SessionListResponse>> {
    let sessions = state
        .sessions
        .list_sessions()
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn session_compliance(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<ComplianceAssessment>> {
    let assessment = state
        .evaluator
        .evaluate(&SessionId::from(session_id))
        .await?;
    Ok(Json(assessment))
}

async fn flagged_sessions(State(state): State<AppState>) -> ApiResult<Json<FlaggedResponse>> {
    let sessions = state.evaluator.flagged_sessions().await?;
    Ok(Json(FlaggedResponse {
        count: sessions.len(),
        sessions,
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
