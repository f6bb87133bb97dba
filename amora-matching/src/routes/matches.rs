use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use amora_shared::errors::AppResult;
use amora_shared::types::api::ApiResponse;
use amora_shared::types::auth::AuthUser;

use crate::messaging::{self, MatchSummary};
use crate::AppState;

// --- GET /matches ---

pub async fn list_matches(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<MatchSummary>>>> {
    let matches = messaging::list_matches(state.store.as_ref(), &user).await?;
    Ok(Json(ApiResponse::ok(matches)))
}
