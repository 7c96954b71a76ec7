// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process user store for tests and local development.

use crate::db::{identity_conflict, tokens_match};
use crate::error::AppError;
use crate::models::{ImageSlot, User};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Users keyed by ID, plus username and email indexes pointing back at the
/// owning ID. Each user entry is locked for the duration of a single
/// mutation, which gives the same per-document atomicity Firestore does.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, User>>,
    usernames: Arc<DashMap<String, String>>,
    emails: Arc<DashMap<String, String>>,
}

/// Take `key` for `user_id` unless someone else holds it.
fn claim(index: &DashMap<String, String>, key: &str, user_id: &str) -> bool {
    match index.entry(key.to_string()) {
        Entry::Occupied(owner) => owner.get() == user_id,
        Entry::Vacant(slot) => {
            slot.insert(user_id.to_string());
            true
        }
    }
}

fn release(index: &DashMap<String, String>, key: &str, user_id: &str) {
    index.remove_if(key, |_, owner| owner == user_id);
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Vec<User> {
        self.users
            .iter()
            .filter(|entry| {
                let user = entry.value();
                username.is_some_and(|u| user.username == u)
                    || email.is_some_and(|e| user.email == e)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Insert a new user, claiming its username and email first. Nothing is
    /// stored if either is already owned by another user.
    pub fn create_user(&self, user: &User) -> Result<(), AppError> {
        if !claim(&self.usernames, &user.username, &user.id) {
            return Err(identity_conflict());
        }
        if !claim(&self.emails, &user.email, &user.id) {
            release(&self.usernames, &user.username, &user.id);
            return Err(identity_conflict());
        }

        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    /// Apply `apply` to one user under its entry lock. Returns the updated
    /// user, or `None` if the user is missing or `apply` declined.
    fn modify_user(&self, user_id: &str, apply: impl FnOnce(&mut User) -> bool) -> Option<User> {
        let mut entry = self.users.get_mut(user_id)?;
        if !apply(entry.value_mut()) {
            return None;
        }
        entry.touch();
        Some(entry.value().clone())
    }

    /// Move the user to a new identity. New keys are claimed before the
    /// record changes; the old ones are released afterwards.
    pub fn update_profile(
        &self,
        user_id: &str,
        fullname: &str,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(current) = self.get_user(user_id) else {
            return Ok(None);
        };

        let new_username = current.username != username;
        let new_email = current.email != email;

        if new_username && !claim(&self.usernames, username, user_id) {
            return Err(identity_conflict());
        }
        if new_email && !claim(&self.emails, email, user_id) {
            if new_username {
                release(&self.usernames, username, user_id);
            }
            return Err(identity_conflict());
        }

        let mut previous = None;
        let updated = self.modify_user(user_id, |user| {
            previous = Some((user.username.clone(), user.email.clone()));
            user.fullname = fullname.to_string();
            user.username = username.to_string();
            user.email = email.to_string();
            true
        });

        match (updated, previous) {
            (Some(user), Some((old_username, old_email))) => {
                if old_username != username {
                    release(&self.usernames, &old_username, user_id);
                }
                if old_email != email {
                    release(&self.emails, &old_email, user_id);
                }
                Ok(Some(user))
            }
            _ => {
                if new_username {
                    release(&self.usernames, username, user_id);
                }
                if new_email {
                    release(&self.emails, email, user_id);
                }
                Ok(None)
            }
        }
    }

    pub fn set_password_hash(&self, user_id: &str, password_hash: &str) -> bool {
        self.modify_user(user_id, |user| {
            user.password_hash = password_hash.to_string();
            true
        })
        .is_some()
    }

    pub fn set_image(&self, user_id: &str, slot: ImageSlot, url: &str) -> Option<User> {
        self.modify_user(user_id, |user| {
            match slot {
                ImageSlot::Avatar => user.avatar = url.to_string(),
                ImageSlot::CoverImage => user.cover_image = url.to_string(),
            }
            true
        })
    }

    pub fn set_refresh_token(&self, user_id: &str, token: Option<&str>) -> bool {
        self.modify_user(user_id, |user| {
            user.refresh_token = token.map(str::to_string);
            true
        })
        .is_some()
    }

    pub fn swap_refresh_token(&self, user_id: &str, expected: &str, replacement: &str) -> bool {
        self.modify_user(user_id, |user| {
            if !tokens_match(user.refresh_token.as_deref(), expected) {
                return false;
            }
            user.refresh_token = Some(replacement.to_string());
            true
        })
        .is_some()
    }
}
