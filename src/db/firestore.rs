// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed user operations.

use crate::db::{collections, identity_conflict, tokens_match};
use crate::error::AppError;
use crate::models::{ImageSlot, User};
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreResult, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};

/// Ownership record for a username or email. The document ID is the
/// hex-encoded key, so creating one with `Exists(false)` fails if another
/// user already holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityClaim {
    user_id: String,
}

fn claim_id(key: &str) -> String {
    hex::encode(key.as_bytes())
}

/// Commit failures that mean another transaction touched the same
/// documents first.
fn lost_race(err: &FirestoreError) -> bool {
    match err {
        FirestoreError::DataConflictError(_) => true,
        FirestoreError::DatabaseError(e) => e.public.code == "Aborted",
        _ => false,
    }
}

fn database_error(err: FirestoreError) -> AppError {
    AppError::Database(err.to_string())
}

enum ProfileUpdate {
    Updated(User),
    Missing,
    Taken,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator rejects real credentials, so skip the default token source.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All users whose username or email matches either identifier.
    pub async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Vec<User>, AppError> {
        if username.is_none() && email.is_none() {
            return Ok(Vec::new());
        }

        let username = username.map(str::to_string);
        let email = email.map(str::to_string);

        self.client
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| {
                q.for_any([
                    username
                        .clone()
                        .and_then(|name| q.field("username").eq(name)),
                    email.clone().and_then(|mail| q.field("email").eq(mail)),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Client whose reads run inside `transaction`, so the commit fails if a
    /// document read through it changed in the meantime.
    fn reader(&self, transaction: &firestore::FirestoreTransaction<'_>) -> firestore::FirestoreDb {
        self.client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
    }

    async fn read_claim(
        reader: &firestore::FirestoreDb,
        collection: &str,
        key: &str,
    ) -> FirestoreResult<Option<IdentityClaim>> {
        reader
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(claim_id(key))
            .await
    }

    /// Queue creation of a claim document. The commit fails if it exists.
    fn add_claim(
        &self,
        transaction: &mut firestore::FirestoreTransaction<'_>,
        collection: &str,
        key: &str,
        claim: &IdentityClaim,
    ) -> FirestoreResult<()> {
        self.client
            .fluent()
            .update()
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(claim_id(key))
            .object(claim)
            .add_to_transaction(transaction)?;
        Ok(())
    }

    fn remove_claim(
        &self,
        transaction: &mut firestore::FirestoreTransaction<'_>,
        collection: &str,
        key: &str,
    ) -> FirestoreResult<()> {
        self.client
            .fluent()
            .delete()
            .from(collection)
            .document_id(claim_id(key))
            .add_to_transaction(transaction)?;
        Ok(())
    }

    /// Store a new user together with its username and email claims.
    ///
    /// Fails with `Conflict` if either identifier is claimed by another user,
    /// including one being created concurrently.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        match self.try_create_user(user).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(identity_conflict()),
            Err(e) if lost_race(&e) => Err(identity_conflict()),
            Err(e) => Err(database_error(e)),
        }
    }

    async fn try_create_user(&self, user: &User) -> FirestoreResult<bool> {
        let mut transaction = self.client.begin_transaction().await?;
        let reader = self.reader(&transaction);

        let username_claim =
            Self::read_claim(&reader, collections::USERNAMES, &user.username).await?;
        let email_claim = Self::read_claim(&reader, collections::EMAILS, &user.email).await?;
        if username_claim.is_some() || email_claim.is_some() {
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        let claim = IdentityClaim {
            user_id: user.id.clone(),
        };
        self.add_claim(&mut transaction, collections::USERNAMES, &user.username, &claim)?;
        self.add_claim(&mut transaction, collections::EMAILS, &user.email, &claim)?;

        self.client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;
        Ok(true)
    }

    /// Read a user inside a transaction, let `apply` change it, and write
    /// back only `fields` plus `updated_at`.
    ///
    /// Returns `None` without writing if the user is missing or `apply`
    /// declines the change.
    async fn modify_user<F>(
        &self,
        user_id: &str,
        fields: &[&str],
        apply: F,
    ) -> FirestoreResult<Option<User>>
    where
        F: FnOnce(&mut User) -> bool,
    {
        let mut transaction = self.client.begin_transaction().await?;

        let current: Option<User> = self
            .reader(&transaction)
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await?;

        let Some(mut user) = current else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };
        if !apply(&mut user) {
            let _ = transaction.rollback().await;
            return Ok(None);
        }
        user.touch();

        self.client
            .fluent()
            .update()
            .fields(fields.iter().copied().chain(["updated_at"]))
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&user.id)
            .object(&user)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;
        Ok(Some(user))
    }

    /// Replace fullname, username and email, moving the identity claims
    /// when the username or email changes.
    pub async fn update_profile(
        &self,
        user_id: &str,
        fullname: &str,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        match self
            .try_update_profile(user_id, fullname, username, email)
            .await
        {
            Ok(ProfileUpdate::Updated(user)) => Ok(Some(user)),
            Ok(ProfileUpdate::Missing) => Ok(None),
            Ok(ProfileUpdate::Taken) => Err(identity_conflict()),
            Err(e @ FirestoreError::DataConflictError(_)) => {
                tracing::debug!(error = %e, "Identity claimed concurrently");
                Err(identity_conflict())
            }
            Err(e) => Err(database_error(e)),
        }
    }

    async fn try_update_profile(
        &self,
        user_id: &str,
        fullname: &str,
        username: &str,
        email: &str,
    ) -> FirestoreResult<ProfileUpdate> {
        let mut transaction = self.client.begin_transaction().await?;
        let reader = self.reader(&transaction);

        let current: Option<User> = reader
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await?;
        let Some(mut user) = current else {
            let _ = transaction.rollback().await;
            return Ok(ProfileUpdate::Missing);
        };

        let new_username = user.username != username;
        let new_email = user.email != email;

        let username_taken = new_username
            && Self::read_claim(&reader, collections::USERNAMES, username)
                .await?
                .is_some_and(|claim| claim.user_id != user_id);
        let email_taken = new_email
            && Self::read_claim(&reader, collections::EMAILS, email)
                .await?
                .is_some_and(|claim| claim.user_id != user_id);
        if username_taken || email_taken {
            let _ = transaction.rollback().await;
            return Ok(ProfileUpdate::Taken);
        }

        let claim = IdentityClaim {
            user_id: user_id.to_string(),
        };
        if new_username {
            self.remove_claim(&mut transaction, collections::USERNAMES, &user.username)?;
            self.add_claim(&mut transaction, collections::USERNAMES, username, &claim)?;
        }
        if new_email {
            self.remove_claim(&mut transaction, collections::EMAILS, &user.email)?;
            self.add_claim(&mut transaction, collections::EMAILS, email, &claim)?;
        }

        user.fullname = fullname.to_string();
        user.username = username.to_string();
        user.email = email.to_string();
        user.touch();

        self.client
            .fluent()
            .update()
            .fields(["fullname", "username", "email", "updated_at"])
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&user.id)
            .object(&user)
            .add_to_transaction(&mut transaction)?;

        transaction.commit().await?;
        Ok(ProfileUpdate::Updated(user))
    }

    /// Replace the password hash. Returns `false` if the user does not exist.
    pub async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let updated = self
            .modify_user(user_id, &["password_hash"], |user| {
                user.password_hash = password_hash.to_string();
                true
            })
            .await
            .map_err(database_error)?;
        Ok(updated.is_some())
    }

    /// Point one of the profile images at a new URL.
    pub async fn set_image(
        &self,
        user_id: &str,
        slot: ImageSlot,
        url: &str,
    ) -> Result<Option<User>, AppError> {
        let field = match slot {
            ImageSlot::Avatar => "avatar",
            ImageSlot::CoverImage => "cover_image",
        };
        self.modify_user(user_id, &[field], |user| {
            match slot {
                ImageSlot::Avatar => user.avatar = url.to_string(),
                ImageSlot::CoverImage => user.cover_image = url.to_string(),
            }
            true
        })
        .await
        .map_err(database_error)
    }

    /// Overwrite (or clear) the stored refresh token.
    ///
    /// Returns `false` if the user does not exist.
    pub async fn set_refresh_token(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<bool, AppError> {
        let updated = self
            .modify_user(user_id, &["refresh_token"], |user| {
                user.refresh_token = token.map(str::to_string);
                true
            })
            .await
            .map_err(database_error)?;
        Ok(updated.is_some())
    }

    /// Replace the stored refresh token only if it still equals `expected`.
    ///
    /// The comparison reads inside the same transaction as the write. If a
    /// concurrent writer gets there first the commit aborts, which counts
    /// as a lost swap.
    pub async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, AppError> {
        let result = self
            .modify_user(user_id, &["refresh_token"], |user| {
                if !tokens_match(user.refresh_token.as_deref(), expected) {
                    return false;
                }
                user.refresh_token = Some(replacement.to_string());
                true
            })
            .await;

        match result {
            Ok(updated) => Ok(updated.is_some()),
            Err(e) if lost_race(&e) => {
                tracing::debug!(error = %e, "Refresh token rotated concurrently");
                Ok(false)
            }
            Err(e) => Err(database_error(e)),
        }
    }
}
