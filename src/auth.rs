//! Authentication utilities: JWT token management

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    #[serde(default)]
    pub email: String,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthInfo {
    pub user_id: Uuid,
}

/// Generate a JWT access token
pub fn generate_token(user_id: Uuid, email: &str, secret: &str) -> Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;
    let exp = now + 8 * 60 * 60; // 8 hours

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Extract authentication info from an `Authorization` header value.
///
/// Only `Bearer <jwt>` is accepted.
pub fn extract_auth(authorization: Option<&str>, jwt_secret: &str) -> Result<AuthInfo> {
    let header = authorization.ok_or_else(|| anyhow!("No authentication provided, JWT token is required"))?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("Authorization header must use the Bearer scheme"))?;

    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;

    Ok(AuthInfo { user_id })
}

// =============================================================================
// Tests
// =============================================================================
