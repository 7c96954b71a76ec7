// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User account and session routes.

use axum::{
    body::Bytes,
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::cookies::{
    cookie_value, with_session_cookies, without_session_cookies, REFRESH_TOKEN_COOKIE,
};
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{
    ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest, UpdateAccountRequest,
    UserResponse,
};
use crate::response::{ApiResponse, Empty};
use crate::services::{ImageSlot, RegisterInput, TokenPair, UploadedFile};
use crate::AppState;

/// Routes reachable without an access token.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
}

/// Routes that sit behind `require_auth`.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Text fields and files of a multipart form, keyed by field name.
#[derive(Debug, Default)]
struct MultipartForm {
    texts: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field.text().await?;
                    form.texts.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    fn text(&mut self, name: &str) -> String {
        self.texts.remove(name).unwrap_or_default()
    }

    fn file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// Register a new user from a multipart form.
async fn register(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserResponse>> {
    let mut form = MultipartForm::read(multipart?).await?;

    let input = RegisterInput {
        fields: RegisterRequest {
            fullname: form.text("fullname"),
            username: form.text("username"),
            email: form.text("email"),
            password: form.text("password"),
        },
        avatar: form.file("avatar"),
        cover_image: form.file("coverImage"),
    };

    let user = state.sessions.register(input).await?;

    Ok(ApiResponse::created(
        user.sanitized(),
        "User registered successfully",
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>)> {
    let Json(request) = payload?;
    let outcome = state.sessions.login(request).await?;

    let jar = with_session_cookies(
        jar,
        &outcome.tokens,
        state.sessions.tokens(),
        state.config.cookie_secure,
    );

    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user: outcome.user.sanitized(),
                access_token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Empty>)> {
    state.sessions.logout(auth.id()).await?;

    let jar = without_session_cookies(jar, state.config.cookie_secure);
    Ok((jar, ApiResponse::ok(Empty::default(), "User logged out")))
}

/// Exchange a refresh token for a new pair. The cookie wins over the body.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<TokenPair>)> {
    let presented = match cookie_value(&jar, REFRESH_TOKEN_COOKIE) {
        Some(token) => Some(token),
        None if body.iter().all(u8::is_ascii_whitespace) => None,
        None => {
            let request: RefreshRequest = serde_json::from_slice(&body)
                .map_err(|e| AppError::validation(format!("Invalid JSON body: {e}")))?;
            request.refresh_token
        }
    };

    let tokens = state.sessions.refresh(presented.as_deref()).await?;

    let jar = with_session_cookies(
        jar,
        &tokens,
        state.sessions.tokens(),
        state.config.cookie_secure,
    );
    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<Empty>> {
    let Json(request) = payload?;
    state.sessions.change_password(auth.id(), request).await?;

    Ok(ApiResponse::ok(
        Empty::default(),
        "Password changed successfully",
    ))
}

async fn current_user(Extension(auth): Extension<AuthUser>) -> ApiResponse<UserResponse> {
    ApiResponse::ok(auth.user.sanitized(), "User fetched successfully")
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<ApiResponse<UserResponse>> {
    let Json(request) = payload?;
    let user = state.sessions.update_account(auth.id(), request).await?;

    Ok(ApiResponse::ok(
        user.sanitized(),
        "Account details updated successfully",
    ))
}

async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserResponse>> {
    let mut form = MultipartForm::read(multipart?).await?;
    let user = state
        .sessions
        .update_image(auth.id(), ImageSlot::Avatar, form.file("avatar"))
        .await?;

    Ok(ApiResponse::ok(user.sanitized(), "Avatar updated successfully"))
}

async fn update_cover_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserResponse>> {
    let mut form = MultipartForm::read(multipart?).await?;
    let user = state
        .sessions
        .update_image(auth.id(), ImageSlot::CoverImage, form.file("coverImage"))
        .await?;

    Ok(ApiResponse::ok(
        user.sanitized(),
        "Cover image updated successfully",
    ))
}
