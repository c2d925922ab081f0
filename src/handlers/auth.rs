//! Bearer-token extractor for authenticated routes

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::auth::extract_auth;

/// Caller identity taken from a validated JWT
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let auth = extract_auth(header, &state.jwt_secret)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        Ok(AuthUser(auth.user_id))
    }
}
