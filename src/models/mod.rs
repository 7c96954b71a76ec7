// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod requests;
pub mod user;

pub use requests::{
    ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest, UpdateAccountRequest,
};
pub use user::{ImageSlot, User, UserResponse};
