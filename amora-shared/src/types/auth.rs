use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the identity provider. `sub` is the stable user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(user_id: Uuid, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub token_id: Uuid,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            token_id: claims.jti,
        }
    }
}

/// Source of the authenticated caller for a flow entry point.
///
/// `None` means the caller is anonymous. Flows take the identity as an
/// explicit argument so they can be driven without an HTTP session.
pub trait IdentityProvider {
    fn current_user_id(&self) -> Option<Uuid>;
}

impl IdentityProvider for AuthUser {
    fn current_user_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

impl IdentityProvider for Option<AuthUser> {
    fn current_user_id(&self) -> Option<Uuid> {
        self.as_ref().map(|u| u.id)
    }
}

impl IdentityProvider for Uuid {
    fn current_user_id(&self) -> Option<Uuid> {
        Some(*self)
    }
}

impl IdentityProvider for Option<Uuid> {
    fn current_user_id(&self) -> Option<Uuid> {
        *self
    }
}

/// An unauthenticated caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_user_id(&self) -> Option<Uuid> {
        None
    }
}
