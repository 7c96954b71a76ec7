// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed request bodies, validated before any store access.

use serde::Deserialize;
use validator::Validate;

/// Text fields of the registration form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "fullname is required"))]
    pub fullname: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

impl RegisterRequest {
    /// Trim identity fields and lower-case username and email. The password is kept
    /// verbatim unless it is entirely whitespace, which counts as missing.
    pub fn normalized(mut self) -> Self {
        self.fullname = self.fullname.trim().to_string();
        self.username = self.username.trim().to_lowercase();
        self.email = self.email.trim().to_lowercase();
        if self.password.trim().is_empty() {
            self.password.clear();
        }
        self
    }
}

/// Login body: either identifier plus the password.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Trimmed, lower-cased username and email, with blanks treated as absent.
    pub fn identifiers(&self) -> (Option<String>, Option<String>) {
        let username = self
            .username
            .as_deref()
            .map(|u| u.trim().to_lowercase())
            .filter(|u| !u.is_empty());
        let email = self
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        (username, email)
    }
}

/// Optional refresh-token body; the cookie takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "oldPassword is required"))]
    pub old_password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "newPassword is required"))]
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn normalized(mut self) -> Self {
        if self.new_password.trim().is_empty() {
            self.new_password.clear();
        }
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "fullname is required"))]
    pub fullname: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
}

impl UpdateAccountRequest {
    pub fn normalized(mut self) -> Self {
        self.fullname = self.fullname.trim().to_string();
        self.username = self.username.trim().to_lowercase();
        self.email = self.email.trim().to_lowercase();
        self
    }
}
