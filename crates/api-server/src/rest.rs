//! REST API handlers for action collection, recommendation queries and
//! operational endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use eventrank_analyzer::RecommendationEngine;
use eventrank_core::config::AnalyzerConfig;
use eventrank_core::error::EventRankError;
use eventrank_core::sink::ActionSink;
use eventrank_core::types::{ActionKind, ItemId, ScoredItem, UserAction, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Maximum number of ids accepted by the interaction-weight endpoint.
const MAX_EVENT_IDS: usize = 1_000;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub actions: Arc<dyn ActionSink>,
    pub analyzer: AnalyzerConfig,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    fn limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.analyzer.default_limit)
            .min(self.analyzer.max_limit)
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

fn unavailable(operation: &'static str, e: EventRankError) -> ApiError {
    error!(operation = operation, error = %e, "Query failed");
    metrics::counter!("api.errors", "operation" => operation).increment(1);
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "repository_unavailable",
        "Recommendation data is temporarily unavailable",
    )
}

/// Inbound action as posted by clients. The timestamp defaults to the time
/// of receipt.
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub user_id: UserId,
    pub event_id: ItemId,
    pub action: ActionKind,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// POST /v1/actions — accept a user action into the pipeline.
pub async fn submit_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<StatusCode, ApiError> {
    let action = UserAction {
        user_id: request.user_id,
        event_id: request.event_id,
        action: request.action,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
    };

    // Sinks may lock and aggregate inline; keep that off the async workers.
    let actions = state.actions.clone();
    let submitted = tokio::task::spawn_blocking(move || actions.submit(action))
        .await
        .unwrap_or_else(|e| Err(EventRankError::Internal(anyhow::Error::from(e))));

    match submitted {
        Ok(()) => {
            metrics::counter!("api.actions_accepted").increment(1);
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => {
            warn!(user_id = request.user_id, error = %e, "Action rejected");
            metrics::counter!("api.actions_rejected").increment(1);
            Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "action_rejected",
                e.to_string(),
            ))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// GET /v1/users/:user_id/recommendations — personalized recommendations.
pub async fn recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ScoredItemsResponse>, ApiError> {
    let limit = state.limit(query.limit);
    state
        .engine
        .recommend_for(user_id, limit)
        .map(|items| Json(ScoredItemsResponse { items }))
        .map_err(|e| unavailable("recommend_for", e))
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub user_id: UserId,
    pub limit: Option<usize>,
}

/// GET /v1/events/:event_id/similar — items similar to one event, unseen by
/// the requesting user.
pub async fn similar_events(
    State(state): State<AppState>,
    Path(event_id): Path<ItemId>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<ScoredItemsResponse>, ApiError> {
    let limit = state.limit(query.limit);
    state
        .engine
        .similar_to(event_id, query.user_id, limit)
        .map(|items| Json(ScoredItemsResponse { items }))
        .map_err(|e| unavailable("similar_to", e))
}

#[derive(Debug, Deserialize)]
pub struct InteractionsRequest {
    pub event_ids: Vec<ItemId>,
}

/// POST /v1/events/interactions — total interaction weight per event.
pub async fn interactions(
    State(state): State<AppState>,
    Json(request): Json<InteractionsRequest>,
) -> Result<Json<ScoredItemsResponse>, ApiError> {
    if request.event_ids.len() > MAX_EVENT_IDS {
        metrics::counter!("api.validation_errors").increment(1);
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "too_many_event_ids",
            format!("at most {MAX_EVENT_IDS} event ids per request"),
        ));
    }
    state
        .engine
        .popularity_of(&request.event_ids)
        .map(|items| Json(ScoredItemsResponse { items }))
        .map_err(|e| unavailable("popularity_of", e))
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe. The state is only built once the stores and
/// the action pipeline exist, so a serving router is ready.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live — Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct ScoredItemsResponse {
    pub items: Vec<ScoredItem>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
