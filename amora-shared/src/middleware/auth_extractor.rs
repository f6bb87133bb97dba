use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims};

/// HS256 secret shared with the identity provider.
#[derive(Clone)]
pub struct JwtSecret(pub String);

impl JwtSecret {
    /// Sign claims with this secret. Used by tests and local tooling; tokens
    /// in production come from the identity provider.
    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.0.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.0.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::new(ErrorCode::TokenExpired, "token has expired")
            }
            _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
        })?;

        Ok(token_data.claims)
    }
}

/// Router state that can hand out the token secret.
pub trait JwtSource {
    fn jwt_secret(&self) -> &JwtSecret;
}

impl JwtSource for JwtSecret {
    fn jwt_secret(&self) -> &JwtSecret {
        self
    }
}

impl<T: JwtSource + ?Sized> JwtSource for Arc<T> {
    fn jwt_secret(&self) -> &JwtSecret {
        (**self).jwt_secret()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: JwtSource + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = state.jwt_secret().verify(&token)?;

        if claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) => Ok(token.to_string()),
        None => Err(AppError::new(
            ErrorCode::Unauthorized,
            "authorization header must use Bearer scheme",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    #[test]
    fn signed_token_round_trips_subject() {
        let secret = JwtSecret("test-secret".into());
        let id = Uuid::now_v7();
        let token = secret.sign(&Claims::new(id, 60)).unwrap();
        assert_eq!(secret.verify(&token).unwrap().sub, id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtSecret("a".into()).sign(&Claims::new(Uuid::now_v7(), 60)).unwrap();
        let err = JwtSecret("b".into()).verify(&token).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TokenInvalid);
    }

    #[test]
    fn bearer_scheme_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc");
    }

    #[tokio::test]
    async fn extractor_reads_secret_from_shared_state() {
        let state = Arc::new(JwtSecret("state-secret".into()));
        let id = Uuid::now_v7();
        let token = state.sign(&Claims::new(id, 60)).unwrap();

        let request = axum::http::Request::builder()
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.id, id);
    }
}
