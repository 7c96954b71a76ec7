// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod media;
pub mod password;
pub mod session;
pub mod token;

pub use media::{MediaService, UploadedFile, UploadedMedia};
pub use crate::models::ImageSlot;
pub use session::{LoginOutcome, RegisterInput, SessionService};
pub use token::{AccessClaims, RefreshClaims, TokenError, TokenIssuer, TokenPair};
