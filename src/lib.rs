// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Accounts API: user registration, login and JWT session management
//!
//! This crate provides a REST backend for user accounts. Profile images are
//! stored on an external media host and users live in Firestore; sessions
//! are an access/refresh token pair carried in HTTP-only cookies.

pub mod config;
pub mod cookies;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;

use config::Config;
use db::UserStore;
use services::{MediaService, SessionService, TokenIssuer};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: UserStore,
    pub sessions: SessionService,
}

impl AppState {
    /// Wire the session controller over an explicitly constructed store and
    /// media host.
    pub fn new(config: Config, db: UserStore, media: MediaService) -> Self {
        let tokens = TokenIssuer::from_config(&config);
        let sessions = SessionService::new(db.clone(), media, tokens);
        Self {
            config,
            db,
            sessions,
        }
    }
}
