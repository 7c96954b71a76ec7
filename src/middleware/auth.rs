// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::cookies::{cookie_value, ACCESS_TOKEN_COOKIE};
use crate::error::AppError;
use crate::models::User;
use crate::services::TokenError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Authenticated user, loaded from the store for this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// Middleware that requires a valid access token.
///
/// The token is read from the `accessToken` cookie, falling back to an
/// `Authorization: Bearer` header for non-browser clients.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match cookie_value(&jar, ACCESS_TOKEN_COOKIE) {
        Some(token) => token,
        None => request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Unauthorized request"))?,
    };

    let claims = state
        .sessions
        .tokens()
        .verify_access_token(&token)
        .map_err(|e| match e {
            TokenError::Expired => AppError::unauthorized("Access token expired"),
            TokenError::Invalid => AppError::unauthorized("Invalid access token"),
        })?;

    let user = state
        .db
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid access token"))?;

    request.extensions_mut().insert(AuthUser { user });

    Ok(next.run(request).await)
}
