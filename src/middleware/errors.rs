// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Development-only error detail middleware.

use crate::config::AppEnv;
use crate::error::ErrorDetail;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

/// In development, copy the internal error text attached by
/// [`crate::error::AppError`] into the envelope as `stack`. Production
/// responses pass through untouched.
pub async fn expose_error_details(
    State(app_env): State<AppEnv>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if app_env != AppEnv::Development {
        return response;
    }

    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer error body");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let mut envelope: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    if let Some(object) = envelope.as_object_mut() {
        object.insert("stack".to_string(), serde_json::Value::String(detail));
    }

    let body = match serde_json::to_vec(&envelope) {
        Ok(body) => body,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(body))
}
