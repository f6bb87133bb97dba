use serde::Deserialize;
use validator::Validate;

use amora_shared::types::auth::IdentityProvider;

use crate::error::{MatchError, MatchResult};
use crate::models::{User, UserUpsert};
use crate::require_actor;
use crate::storage::Storage;

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 50, message = "display name must be 1-50 characters"))]
    pub display_name: Option<String>,
    #[validate(range(min = 18, max = 120, message = "age must be between 18 and 120"))]
    pub age: Option<i32>,
    #[validate(length(max = 30, message = "gender must be at most 30 characters"))]
    pub gender: Option<String>,
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "photo url must be a valid URL"))]
    pub photo_url: Option<String>,
}

/// The caller's profile, created empty on first visit.
pub async fn ensure_profile(store: &dyn Storage, identity: &impl IdentityProvider) -> MatchResult<User> {
    let me = require_actor(identity)?;
    if let Some(user) = store.get_user(me).await? {
        return Ok(user);
    }
    let user = store.upsert_user(UserUpsert::minimal(me)).await?;
    tracing::info!(user = %me, "profile created on first visit");
    Ok(user)
}

/// Update the caller's own profile. Omitted fields are left unchanged.
pub async fn update_profile(
    store: &dyn Storage,
    identity: &impl IdentityProvider,
    mut update: UpdateProfile,
) -> MatchResult<User> {
    let me = require_actor(identity)?;
    update.display_name = update.display_name.map(|n| n.trim().to_string());
    update
        .validate()
        .map_err(|e| MatchError::Validation(e.to_string()))?;

    let user = store
        .upsert_user(UserUpsert {
            id: me,
            display_name: update.display_name,
            age: update.age,
            gender: update.gender,
            bio: update.bio,
            photo_url: update.photo_url,
        })
        .await?;

    tracing::debug!(user = %me, "profile updated");
    Ok(user)
}
