//! Request handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bounties::{self, Bounty, CreateBountyInput, TransitionAction, TransitionInput, TransitionOutcome};
use crate::error::BoardError;
use crate::events::EventFeedParams;
use crate::telemetry::{self, render_metrics};

use super::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// GET /metrics
pub async fn prometheus_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListBountiesQuery {
    pub tag: Option<String>,
}

/// GET /api/v1/bounties
pub async fn list_bounties(
    State(state): State<AppState>,
    Query(query): Query<ListBountiesQuery>,
) -> Result<impl IntoResponse, BoardError> {
    let bounties = match query.tag.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(tag) => state.store.get_bounties_by_tag(tag).await,
        None => state.store.get_bounties().await,
    };
    Ok(Json(ApiResponse::ok(bounties)))
}

/// GET /api/v1/bounties/:id
pub async fn get_bounty(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    let bounty = state
        .store
        .get_bounty_by_id(&id)
        .await
        .ok_or_else(|| BoardError::bounty_not_found(&id))?;
    Ok(Json(ApiResponse::ok(bounty)))
}

/// POST /api/v1/bounties
pub async fn create_bounty(
    State(state): State<AppState>,
    Json(input): Json<CreateBountyInput>,
) -> Result<impl IntoResponse, BoardError> {
    if input.title.trim().is_empty() {
        return Err(BoardError::validation("Bounty title must not be empty"));
    }
    if input.description.trim().is_empty() {
        return Err(BoardError::validation(
            "Bounty description must not be empty",
        ));
    }

    let bounty = state.store.create_bounty(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(bounty))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub action: TransitionAction,
    pub agent_handle: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/v1/bounties/:id/transition
///
/// Rule violations come back as structured 404/409 envelopes rather than
/// bare errors; only storage failures produce a 5xx.
pub async fn transition_bounty(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Result<impl IntoResponse, BoardError> {
    if request.agent_handle.trim().is_empty() {
        return Err(BoardError::validation("agentHandle must not be empty"));
    }

    let action = request.action;
    let outcome = bounties::transition_bounty(
        &state.store,
        TransitionInput {
            bounty_id: id,
            action,
            agent_handle: request.agent_handle,
            notes: request.notes,
        },
    )
    .await?;

    match outcome {
        TransitionOutcome::Applied(bounty) => {
            telemetry::metrics::record_transition(action.as_str(), "applied");
            Ok((StatusCode::OK, Json(ApiResponse::ok(bounty))))
        }
        TransitionOutcome::Rejected(rejection) => {
            telemetry::metrics::record_transition(action.as_str(), "rejected");
            let status = StatusCode::from_u16(rejection.status)
                .unwrap_or(StatusCode::CONFLICT);
            let code = if rejection.status == 404 {
                "BOUNTY_NOT_FOUND"
            } else {
                "INVALID_TRANSITION"
            };
            Ok((
                status,
                Json(ApiResponse::<Bounty>::err(rejection.error, code)),
            ))
        }
    }
}

/// GET /api/v1/events
pub async fn list_agent_events(
    State(state): State<AppState>,
    Query(params): Query<EventFeedParams>,
) -> Result<impl IntoResponse, BoardError> {
    if params.agent_handle.trim().is_empty() {
        return Err(BoardError::validation("agent_handle must not be empty"));
    }

    let page = state.feed.list_agent_events(params).await?;
    Ok(Json(ApiResponse::ok(page)))
}
