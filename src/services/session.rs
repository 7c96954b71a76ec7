// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account and session lifecycle.
//!
//! Each operation is a self-contained transition over the stored user record:
//! validate input, read or mutate the store, then issue or invalidate tokens.
//! The only server-side session state is the single refresh token kept on the
//! user document; replacing it revokes whatever was issued before.

use crate::db::UserStore;
use crate::error::{AppError, Result};
use crate::models::user::{generate_user_id, now_rfc3339};
use crate::models::{
    ChangePasswordRequest, ImageSlot, LoginRequest, RegisterRequest, UpdateAccountRequest,
    User,
};
use crate::services::media::{MediaService, UploadedFile};
use crate::services::password::{hash_password_async, verify_password_async};
use crate::services::token::{TokenError, TokenIssuer, TokenPair};
use validator::Validate;

/// Registration form: text fields plus the uploaded images.
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub fields: RegisterRequest,
    pub avatar: Option<UploadedFile>,
    pub cover_image: Option<UploadedFile>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

fn missing_image_message(slot: ImageSlot) -> &'static str {
    match slot {
        ImageSlot::Avatar => "Avatar file is required",
        ImageSlot::CoverImage => "Cover image file is required",
    }
}

/// Orchestrates registration, login, logout, refresh and profile updates.
#[derive(Clone)]
pub struct SessionService {
    db: UserStore,
    media: MediaService,
    tokens: TokenIssuer,
}

impl SessionService {
    pub fn new(db: UserStore, media: MediaService, tokens: TokenIssuer) -> Self {
        Self { db, media, tokens }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn media(&self) -> &MediaService {
        &self.media
    }

    /// Create an account. Nothing is written unless every field validates,
    /// the identity is unused, and the avatar upload succeeds.
    pub async fn register(&self, input: RegisterInput) -> Result<User> {
        let fields = input.fields.normalized();
        fields.validate()?;

        // Fast rejection before uploading anything. The store enforces
        // uniqueness again when the record is created.
        let existing = self
            .db
            .find_by_username_or_email(Some(&fields.username), Some(&fields.email))
            .await?;
        if !existing.is_empty() {
            tracing::info!(username = %fields.username, "Registration rejected: identity in use");
            return Err(AppError::Conflict(
                "User with this username or email already exists".to_string(),
            ));
        }

        let avatar_file = input
            .avatar
            .ok_or_else(|| AppError::validation("Avatar is required"))?;
        let avatar = self.media.upload(&avatar_file).await?;

        // A failed cover upload does not block registration.
        let cover_image = match input.cover_image {
            Some(file) => match self.media.upload(&file).await {
                Ok(uploaded) => uploaded.url,
                Err(e) => {
                    tracing::warn!(error = %e, "Cover image upload failed, continuing without it");
                    String::new()
                }
            },
            None => String::new(),
        };

        let password_hash = hash_password_async(fields.password).await?;
        let now = now_rfc3339();

        let user = User {
            id: generate_user_id()?,
            username: fields.username,
            email: fields.email,
            fullname: fields.fullname,
            password_hash,
            avatar: avatar.url,
            cover_image,
            refresh_token: None,
            created_at: now.clone(),
            updated_at: now,
        };
        if let Err(e) = self.db.create_user(&user).await {
            tracing::info!(username = %user.username, error = %e, "Registration lost identity race");
            return Err(e);
        }

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(user)
    }

    /// Verify credentials and start a session. The new refresh token replaces
    /// any previously stored one.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome> {
        let (username, email) = request.identifiers();
        if username.is_none() && email.is_none() {
            return Err(AppError::validation("Username or email is required"));
        }
        if request.password.is_empty() {
            return Err(AppError::validation("Password is required"));
        }

        let mut user = self
            .db
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        let valid =
            verify_password_async(request.password, user.password_hash.clone()).await?;
        if !valid {
            tracing::warn!(user_id = %user.id, "Login rejected: bad password");
            return Err(AppError::unauthorized("Invalid user credentials"));
        }

        let tokens = self.tokens.issue_pair(&user)?;
        if !self
            .db
            .set_refresh_token(&user.id, Some(&tokens.refresh_token))
            .await?
        {
            return Err(AppError::NotFound("User does not exist".to_string()));
        }
        user.refresh_token = Some(tokens.refresh_token.clone());

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome { user, tokens })
    }

    /// End the session by forgetting the stored refresh token.
    pub async fn logout(&self, user_id: &str) -> Result<()> {
        if !self.db.set_refresh_token(user_id, None).await? {
            tracing::warn!(user_id, "Logout for unknown user");
        }
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Exchange the presented refresh token for a new pair. The presented
    /// token must be the one currently stored; it is swapped out atomically,
    /// so it cannot be used again.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<TokenPair> {
        let presented = presented
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Unauthorized request"))?;

        let claims = self
            .tokens
            .verify_refresh_token(presented)
            .map_err(|e| match e {
                TokenError::Expired => AppError::unauthorized("Refresh token expired"),
                TokenError::Invalid => AppError::unauthorized("Invalid refresh token"),
            })?;

        let user = self
            .db
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

        let tokens = self.tokens.issue_pair(&user)?;
        let swapped = self
            .db
            .swap_refresh_token(&user.id, presented, &tokens.refresh_token)
            .await?;
        if !swapped {
            tracing::warn!(user_id = %user.id, "Refresh rejected: token already rotated or revoked");
            return Err(AppError::unauthorized("Refresh token is expired or used"));
        }

        tracing::debug!(user_id = %user.id, "Refresh token rotated");

        Ok(tokens)
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: &str,
        request: ChangePasswordRequest,
    ) -> Result<()> {
        let request = request.normalized();
        request.validate()?;

        let user = self.current_user(user_id).await?;

        let valid =
            verify_password_async(request.old_password, user.password_hash.clone()).await?;
        if !valid {
            tracing::warn!(user_id, "Password change rejected: bad old password");
            return Err(AppError::unauthorized("Invalid old password"));
        }

        let password_hash = hash_password_async(request.new_password).await?;
        if !self.db.set_password_hash(user_id, &password_hash).await? {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    pub async fn current_user(&self, user_id: &str) -> Result<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Update fullname, username and email together.
    pub async fn update_account(
        &self,
        user_id: &str,
        request: UpdateAccountRequest,
    ) -> Result<User> {
        let request = request.normalized();
        request.validate()?;

        let taken = self
            .db
            .find_by_username_or_email(Some(&request.username), Some(&request.email))
            .await?
            .into_iter()
            .any(|other| other.id != user_id);
        if taken {
            return Err(AppError::Conflict(
                "Username or email is already taken".to_string(),
            ));
        }

        let user = self
            .db
            .update_profile(user_id, &request.fullname, &request.username, &request.email)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => {
                    AppError::Conflict("Username or email is already taken".to_string())
                }
                other => other,
            })?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        tracing::info!(user_id, "Account details updated");
        Ok(user)
    }

    /// Upload a new avatar or cover image and store its URL.
    pub async fn update_image(
        &self,
        user_id: &str,
        slot: ImageSlot,
        file: Option<UploadedFile>,
    ) -> Result<User> {
        let file = file.ok_or_else(|| AppError::validation(missing_image_message(slot)))?;

        self.current_user(user_id).await?;
        let uploaded = self.media.upload(&file).await?;

        let user = self
            .db
            .set_image(user_id, slot, &uploaded.url)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        tracing::info!(user_id, slot = ?slot, "Profile image updated");
        Ok(user)
    }
}
