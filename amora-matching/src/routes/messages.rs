use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use amora_shared::errors::AppResult;
use amora_shared::types::api::ApiResponse;
use amora_shared::types::auth::AuthUser;

use crate::messaging;
use crate::models::Message;
use crate::AppState;

// --- GET /matches/:pair_id/messages ---

pub async fn list_messages(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(pair_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Message>>>> {
    let messages = messaging::list_messages(state.store.as_ref(), &user, pair_id).await?;
    Ok(Json(ApiResponse::ok(messages)))
}

// --- POST /matches/:pair_id/messages ---

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

pub async fn send_message(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(pair_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    let message = messaging::send_message(state.store.as_ref(), &user, pair_id, &req.body).await?;
    state.events.message_sent(&message);
    Ok(Json(ApiResponse::ok(message)))
}
