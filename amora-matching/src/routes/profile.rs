use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use amora_shared::errors::AppResult;
use amora_shared::types::api::ApiResponse;
use amora_shared::types::auth::AuthUser;

use crate::models::User;
use crate::profile::{self, UpdateProfile};
use crate::AppState;

// --- GET /me ---

pub async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<User>>> {
    let profile = profile::ensure_profile(state.store.as_ref(), &user).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- PATCH /me ---

pub async fn update_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateProfile>,
) -> AppResult<Json<ApiResponse<User>>> {
    let profile = profile::update_profile(state.store.as_ref(), &user, payload).await?;
    Ok(Json(ApiResponse::ok(profile)))
}
