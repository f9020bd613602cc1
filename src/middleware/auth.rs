// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! Tokens are issued by the identity provider and carry the opaque user id
//! in `sub` plus the account email. A valid token becomes a [`Session`]
//! in the request extensions; admin routes additionally get an
//! [`AdminSession`].

use crate::error::AppError;
use crate::services::identity::{AdminSession, Session};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie set by the frontend after sign-in.
pub const SESSION_COOKIE: &str = "booking_token";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (opaque user id)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => bearer_token(&request).ok_or(AppError::Unauthorized)?,
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let claims = decode::<Claims>(&token, &key, &validation)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::InvalidToken
        })?
        .claims;

    if claims.sub.trim().is_empty() {
        return Err(AppError::InvalidToken);
    }

    let session = state.identity.resolve(&claims.sub, claims.email.as_deref());
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Middleware for `/api/admin`: only the administrator passes.
///
/// Must run after [`require_auth`].
pub async fn require_admin(mut request: Request, next: Next) -> Result<Response, AppError> {
    let admin: AdminSession = match request.extensions().get::<Session>() {
        Some(Session::Admin(admin)) => admin.clone(),
        Some(Session::Client(client)) => {
            tracing::warn!(user_id = client.user_id(), "Non-admin tried an admin route");
            return Err(AppError::PermissionDenied(
                "Administrator access required".to_string(),
            ));
        }
        None => return Err(AppError::Unauthorized),
    };

    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, email: Option<&str>, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        iat: now,
        exp: now + 7 * 24 * 60 * 60, // 7 days
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_round_trip_keeps_email() {
        let key = b"test_jwt_key_32_bytes_minimum!!";
        let token = create_jwt("uid-1", Some("a@example.com"), key).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(key),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "uid-1");
        assert_eq!(data.claims.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let token = create_jwt("uid-1", None, b"one_key_that_is_long_enough____").unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other_key_that_is_long_enough__"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }
}
