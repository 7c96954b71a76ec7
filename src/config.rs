// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development. Token secrets are required;
//! everything else has a default suitable for running against the Firestore
//! emulator.

use std::env;
use std::time::Duration;

/// Default access token lifetime (1 day).
const DEFAULT_ACCESS_TOKEN_EXPIRY: &str = "1d";
/// Default refresh token lifetime (10 days).
const DEFAULT_REFRESH_TOKEN_EXPIRY: &str = "10d";
/// Default upper bound on request bodies, which covers multipart uploads.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Deployment environment. Controls whether internal error details are
/// returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::Invalid("APP_ENV", raw.to_string())),
        }
    }
}

/// Which credential store backend to connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND", raw.to_string())),
        }
    }
}

/// Cloudinary credentials for signed uploads.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Optional folder uploads are placed in.
    pub folder: Option<String>,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Allowed browser origin for credentialed requests
    pub cors_origin: String,
    pub app_env: AppEnv,
    pub store_backend: StoreBackend,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,

    /// HMAC key for access tokens (raw bytes)
    pub access_token_secret: Vec<u8>,
    pub access_token_expiry: Duration,
    /// HMAC key for refresh tokens (raw bytes), distinct from the access key
    pub refresh_token_secret: Vec<u8>,
    pub refresh_token_expiry: Duration,

    /// Whether session cookies carry the `Secure` attribute
    pub cookie_secure: bool,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,

    /// Media host credentials. `None` means uploads go to the in-process mock.
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8000,
            cors_origin: "http://localhost:5173".to_string(),
            app_env: AppEnv::Development,
            store_backend: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            access_token_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            access_token_expiry: Duration::from_secs(15 * 60),
            refresh_token_secret: b"test_refresh_secret_32_bytes_min".to_vec(),
            refresh_token_expiry: Duration::from_secs(10 * 24 * 60 * 60),
            cookie_secure: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cloudinary: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let access_token_expiry = parse_expiry(
            "ACCESS_TOKEN_EXPIRY",
            &env::var("ACCESS_TOKEN_EXPIRY")
                .unwrap_or_else(|_| DEFAULT_ACCESS_TOKEN_EXPIRY.to_string()),
        )?;
        let refresh_token_expiry = parse_expiry(
            "REFRESH_TOKEN_EXPIRY",
            &env::var("REFRESH_TOKEN_EXPIRY")
                .unwrap_or_else(|_| DEFAULT_REFRESH_TOKEN_EXPIRY.to_string()),
        )?;

        let access_token_secret = required_secret("ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = required_secret("REFRESH_TOKEN_SECRET")?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid(
                "REFRESH_TOKEN_SECRET",
                "must differ from ACCESS_TOKEN_SECRET".to_string(),
            ));
        }

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            app_env: AppEnv::parse(
                &env::var("APP_ENV").unwrap_or_else(|_| "production".to_string()),
            )?,
            store_backend: StoreBackend::parse(
                &env::var("STORE_BACKEND").unwrap_or_else(|_| "firestore".to_string()),
            )?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            access_token_secret,
            access_token_expiry,
            refresh_token_secret,
            refresh_token_expiry,
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
                .unwrap_or(true),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            cloudinary: cloudinary_from_env()?,
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env == AppEnv::Development
    }
}

fn required_secret(name: &'static str) -> Result<Vec<u8>, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value.as_bytes().to_vec())
}

/// Cloudinary settings are all-or-nothing: a cloud name without the key pair
/// is a configuration mistake, not a request for the mock.
fn cloudinary_from_env() -> Result<Option<CloudinaryConfig>, ConfigError> {
    let Ok(cloud_name) = env::var("CLOUDINARY_CLOUD_NAME") else {
        return Ok(None);
    };

    Ok(Some(CloudinaryConfig {
        cloud_name: cloud_name.trim().to_string(),
        api_key: env::var("CLOUDINARY_API_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("CLOUDINARY_API_KEY"))?,
        api_secret: env::var("CLOUDINARY_API_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("CLOUDINARY_API_SECRET"))?,
        folder: env::var("CLOUDINARY_FOLDER")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    }))
}

/// Parse a token lifetime such as `15m`, `1d`, `12h`, `30s` or bare seconds.
pub fn parse_expiry(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::Invalid(name, raw.to_string());

    let (digits, multiplier) = match raw.char_indices().last() {
        Some((idx, 's')) => (&raw[..idx], 1),
        Some((idx, 'm')) => (&raw[..idx], 60),
        Some((idx, 'h')) => (&raw[..idx], 60 * 60),
        Some((idx, 'd')) => (&raw[..idx], 24 * 60 * 60),
        Some(_) => (raw, 1),
        None => return Err(invalid()),
    };

    let amount: u64 = digits.trim().parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
