// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, error rendering, security headers).

pub mod auth;
pub mod errors;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use errors::expose_error_details;
pub use security::add_security_headers;
