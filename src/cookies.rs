// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie transport.

use crate::services::{TokenIssuer, TokenPair};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::time::Duration;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// HttpOnly cookie scoped to the whole site. Removal must repeat the same
/// attributes with an empty value and `Max-Age=0` or browsers ignore it.
fn session_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

/// Set both session cookies, each living as long as its token.
pub fn with_session_cookies(
    jar: CookieJar,
    tokens: &TokenPair,
    issuer: &TokenIssuer,
    secure: bool,
) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        issuer.access_ttl(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        issuer.refresh_ttl(),
        secure,
    ))
}

/// Expire both session cookies.
pub fn without_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        String::new(),
        Duration::ZERO,
        secure,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        String::new(),
        Duration::ZERO,
        secure,
    ))
}

/// Value of a cookie, ignoring empty ones.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
