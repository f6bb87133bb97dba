use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use amora_shared::errors::AppResult;
use amora_shared::types::api::ApiResponse;
use amora_shared::types::auth::AuthUser;

use crate::feed::candidate_feed;
use crate::models::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<usize>,
}

// --- GET /feed ---

pub async fn get_feed(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    let limit = query.limit.unwrap_or(state.config.feed_page_size);
    let candidates = candidate_feed(state.store.as_ref(), &user, limit).await?;
    Ok(Json(ApiResponse::ok(candidates)))
}
