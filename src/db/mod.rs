//! Credential store (Firestore, or in-process for tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{ImageSlot, User};
use subtle::ConstantTimeEq;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Username claims, keyed by the hex-encoded username.
    pub const USERNAMES: &str = "usernames";
    /// Email claims, keyed by the hex-encoded email.
    pub const EMAILS: &str = "emails";
}

/// Handle to the user collection, constructed once at startup and shared
/// through `AppState`.
///
/// Every mutation touches only the fields it owns, so concurrent requests
/// for the same user never undo each other.
#[derive(Clone)]
pub struct UserStore {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

impl UserStore {
    pub fn firestore(db: FirestoreDb) -> Self {
        Self {
            backend: Backend::Firestore(db),
        }
    }

    pub fn memory(db: MemoryDb) -> Self {
        Self {
            backend: Backend::Memory(db),
        }
    }

    /// Fresh, empty in-process store.
    pub fn in_memory() -> Self {
        Self::memory(MemoryDb::new())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.get_user(user_id).await,
            Backend::Memory(db) => Ok(db.get_user(user_id)),
        }
    }

    /// Users matching the username or the email. Either may be omitted.
    pub async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Vec<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.find_by_username_or_email(username, email).await,
            Backend::Memory(db) => Ok(db.find_by_username_or_email(username, email)),
        }
    }

    /// Store a new user. Fails with `Conflict` if its username or email
    /// belongs to another user, checked atomically with the insert.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.create_user(user).await,
            Backend::Memory(db) => db.create_user(user),
        }
    }

    /// Replace the identity fields. Returns `None` if the user is gone.
    pub async fn update_profile(
        &self,
        user_id: &str,
        fullname: &str,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => {
                db.update_profile(user_id, fullname, username, email)
                    .await
            }
            Backend::Memory(db) => db.update_profile(user_id, fullname, username, email),
        }
    }

    pub async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.set_password_hash(user_id, password_hash).await,
            Backend::Memory(db) => Ok(db.set_password_hash(user_id, password_hash)),
        }
    }

    pub async fn set_image(
        &self,
        user_id: &str,
        slot: ImageSlot,
        url: &str,
    ) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.set_image(user_id, slot, url).await,
            Backend::Memory(db) => Ok(db.set_image(user_id, slot, url)),
        }
    }

    /// Overwrite the refresh token (login) or clear it (logout).
    pub async fn set_refresh_token(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.set_refresh_token(user_id, token).await,
            Backend::Memory(db) => Ok(db.set_refresh_token(user_id, token)),
        }
    }

    /// Compare-and-swap used by refresh rotation. Returns `false` when the
    /// stored token is not `expected` (already rotated, cleared, or the user
    /// is gone).
    pub async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Firestore(db) => {
                db.swap_refresh_token(user_id, expected, replacement)
                    .await
            }
            Backend::Memory(db) => Ok(db.swap_refresh_token(user_id, expected, replacement)),
        }
    }
}

/// Error for a username or email owned by someone else.
pub(crate) fn identity_conflict() -> AppError {
    AppError::Conflict("User with this username or email already exists".to_string())
}

/// Constant-time comparison of a stored refresh token against a presented one.
pub(crate) fn tokens_match(stored: Option<&str>, presented: &str) -> bool {
    match stored {
        Some(stored) => stored.as_bytes().ct_eq(presented.as_bytes()).into(),
        None => false,
    }
}
