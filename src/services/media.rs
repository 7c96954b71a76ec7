// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Media host client for avatar and cover-image uploads.
//!
//! Production uploads go to Cloudinary as signed multipart requests. The mock
//! backend keeps everything in-process: it hands out deterministic URLs and
//! can be told to fail, which is how upload errors are exercised in tests.

use crate::config::CloudinaryConfig;
use crate::error::AppError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A file received from the client, held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    pub url: String,
    pub public_id: String,
}

/// Cloudinary upload API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    folder: Option<String>,
}

/// Subset of Cloudinary's upload response we rely on.
#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
    public_id: String,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!(
                "https://api.cloudinary.com/v1_1/{}/auto/upload",
                config.cloud_name
            ),
            api_key: config.api_key,
            api_secret: config.api_secret,
            folder: config.folder,
        }
    }

    /// Upload a file and return its durable HTTPS URL.
    pub async fn upload(&self, file: &UploadedFile) -> Result<UploadedMedia, AppError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut signed_params = vec![("timestamp", timestamp.clone())];
        if let Some(folder) = &self.folder {
            signed_params.push(("folder", folder.clone()));
        }
        let signature = sign_params(&signed_params, &self.api_secret);

        let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| AppError::Upload(format!("Invalid content type: {}", e)))?;
        }

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        if let Some(folder) = &self.folder {
            form = form.text("folder", folder.clone());
        }

        let response = self
            .http
            .post(&self.base_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Upload request failed: {}", e)))?;

        let uploaded: CloudinaryUploadResponse = check_response_json(response).await?;

        tracing::info!(public_id = %uploaded.public_id, "File uploaded to Cloudinary");

        Ok(UploadedMedia {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, with the API secret appended, then SHA-256 hex.
fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upload(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Upload(format!("JSON parse error: {}", e)))
}

/// In-process stand-in for the media host.
#[derive(Default)]
struct MockMedia {
    fail: AtomicBool,
    uploads: AtomicUsize,
}

#[derive(Clone)]
enum MediaBackend {
    Cloudinary(CloudinaryClient),
    Mock(Arc<MockMedia>),
}

/// Media upload service used by the session controller.
#[derive(Clone)]
pub struct MediaService {
    backend: MediaBackend,
}

impl MediaService {
    pub fn cloudinary(config: CloudinaryConfig) -> Self {
        Self {
            backend: MediaBackend::Cloudinary(CloudinaryClient::new(config)),
        }
    }

    /// Create a mock media service (offline mode).
    pub fn new_mock() -> Self {
        Self {
            backend: MediaBackend::Mock(Arc::new(MockMedia::default())),
        }
    }

    /// Make subsequent mock uploads fail (or succeed again). No effect on a
    /// real backend.
    pub fn set_mock_failure(&self, fail: bool) {
        if let MediaBackend::Mock(mock) = &self.backend {
            mock.fail.store(fail, Ordering::SeqCst);
        }
    }

    /// Number of successful mock uploads so far.
    pub fn mock_upload_count(&self) -> usize {
        match &self.backend {
            MediaBackend::Mock(mock) => mock.uploads.load(Ordering::SeqCst),
            MediaBackend::Cloudinary(_) => 0,
        }
    }

    pub async fn upload(&self, file: &UploadedFile) -> Result<UploadedMedia, AppError> {
        match &self.backend {
            MediaBackend::Cloudinary(client) => client.upload(file).await,
            MediaBackend::Mock(mock) => {
                if mock.fail.load(Ordering::SeqCst) {
                    return Err(AppError::Upload("Mock media host unavailable".to_string()));
                }
                let n = mock.uploads.fetch_add(1, Ordering::SeqCst) + 1;
                let public_id = format!("mock/{}", n);
                Ok(UploadedMedia {
                    url: format!("https://media.invalid/{}/{}", public_id, file.file_name),
                    public_id,
                })
            }
        }
    }
}
