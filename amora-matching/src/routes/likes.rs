use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use amora_shared::errors::AppResult;
use amora_shared::types::api::ApiResponse;
use amora_shared::types::auth::AuthUser;

use crate::reconcile::{LikeOutcome, PairState, PendingLike};
use crate::AppState;

fn publish_outcome(state: &AppState, actor: Uuid, target: Uuid, outcome: &LikeOutcome) {
    match outcome {
        LikeOutcome::Pending { created: true } => state.events.like_sent(actor, target),
        LikeOutcome::Matched { pair, created: true } => state.events.match_created(actor, pair),
        _ => {}
    }
}

// --- POST /likes/:user_id ---

pub async fn send_like(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LikeOutcome>>> {
    let outcome = state.reconciler.like(&user, target_id).await?;
    publish_outcome(&state, user.id, target_id, &outcome);

    let message = if outcome.is_match() { "it's a match" } else { "like sent" };
    Ok(Json(ApiResponse::ok_with_message(outcome, message)))
}

// --- DELETE /likes/:user_id ---

pub async fn cancel_like(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.reconciler.cancel_like(&user, target_id).await?;
    Ok(Json(ApiResponse::ok_with_message((), "like cancelled")))
}

// --- PUT /likes/:user_id/respond ---

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RespondOutcome {
    Accepted(LikeOutcome),
    Rejected { rejected: bool },
}

pub async fn respond_like(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(sender_id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> AppResult<Json<ApiResponse<RespondOutcome>>> {
    if !req.accepted {
        state.reconciler.reject_like(&user, sender_id).await?;
        return Ok(Json(ApiResponse::ok_with_message(
            RespondOutcome::Rejected { rejected: true },
            "like rejected",
        )));
    }

    let outcome = state.reconciler.accept_like(&user, sender_id).await?;
    publish_outcome(&state, user.id, sender_id, &outcome);
    Ok(Json(ApiResponse::ok_with_message(
        RespondOutcome::Accepted(outcome),
        "it's a match",
    )))
}

// --- GET /likes/sent ---

pub async fn list_sent(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<PendingLike>>>> {
    let likes = state.reconciler.likes_sent(&user).await?;
    Ok(Json(ApiResponse::ok(likes)))
}

// --- GET /likes/received ---

pub async fn list_received(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<PendingLike>>>> {
    let likes = state.reconciler.likes_received(&user).await?;
    Ok(Json(ApiResponse::ok(likes)))
}

// --- GET /likes/state/:other_id ---

pub async fn pair_state(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(other_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PairState>>> {
    let pair_state = state.reconciler.pair_state(&user, other_id).await?;
    Ok(Json(ApiResponse::ok(pair_state)))
}
