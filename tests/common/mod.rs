// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use accounts_api::config::Config;
use accounts_api::db::{FirestoreDb, UserStore};
use accounts_api::models::RegisterRequest;
use accounts_api::routes::create_router;
use accounts_api::services::{MediaService, RegisterInput, SessionService, UploadedFile};
use accounts_api::AppState;
use axum::{
    body::Body,
    http::{header, Request, Response},
};
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over the in-memory store and mock media host.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        config,
        UserStore::in_memory(),
        MediaService::new_mock(),
    ));
    (create_router(state.clone()), state)
}

/// Session controller over a fresh in-memory store, for service-level tests.
#[allow(dead_code)]
pub fn test_sessions() -> (SessionService, UserStore) {
    let state = AppState::new(
        Config::default(),
        UserStore::in_memory(),
        MediaService::new_mock(),
    );
    (state.sessions, state.db)
}

#[allow(dead_code)]
pub fn avatar_file() -> UploadedFile {
    UploadedFile {
        file_name: "avatar.png".to_string(),
        content_type: Some("image/png".to_string()),
        bytes: b"\x89PNG fake avatar".to_vec(),
    }
}

#[allow(dead_code)]
pub fn register_input(username: &str, email: &str, password: &str) -> RegisterInput {
    RegisterInput {
        fields: RegisterRequest {
            fullname: "Test User".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        },
        avatar: Some(avatar_file()),
        cover_image: None,
    }
}

const BOUNDARY: &str = "----accounts-api-test-boundary";

/// Builder for `multipart/form-data` request bodies.
#[derive(Default)]
#[allow(dead_code)]
pub struct MultipartBody {
    body: Vec<u8>,
}

#[allow(dead_code)]
impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// Multipart registration form with an avatar attached.
#[allow(dead_code)]
pub fn registration_form(username: &str, email: &str, password: &str) -> MultipartBody {
    MultipartBody::new()
        .text("fullname", "Test User")
        .text("username", username)
        .text("email", email)
        .text("password", password)
        .file("avatar", "avatar.png", "image/png", b"\x89PNG fake avatar")
}

#[allow(dead_code)]
pub fn multipart_request(method: &str, uri: &str, form: MultipartBody) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, MultipartBody::content_type())
        .body(Body::from(form.finish()))
        .unwrap()
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub async fn register(app: &axum::Router, username: &str, email: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(multipart_request(
            "POST",
            "/api/v1/users/register",
            registration_form(username, email, password),
        ))
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn login(app: &axum::Router, username: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/users/login",
            serde_json::json!({ "username": username, "password": password }),
        ))
        .await
        .unwrap()
}

/// Register then log in, returning the access and refresh tokens.
#[allow(dead_code)]
pub async fn register_and_login(app: &axum::Router, username: &str) -> (String, String) {
    let email = format!("{username}@example.com");
    let response = register(app, username, &email, "p1-secret").await;
    assert_eq!(response.status(), 201);

    let response = login(app, username, "p1-secret").await;
    assert_eq!(response.status(), 200);
    let body = body_json(response).await;
    (
        body["data"]["accessToken"].as_str().unwrap().to_string(),
        body["data"]["refreshToken"].as_str().unwrap().to_string(),
    )
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All `Set-Cookie` headers on a response.
#[allow(dead_code)]
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` header for one cookie name.
#[allow(dead_code)]
pub fn set_cookie_for(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&format!("{name}=")))
}
