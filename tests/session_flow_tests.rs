// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle tests against the session controller.
//!
//! These tests verify that:
//! 1. Registration rejects bad input without writing anything
//! 2. Refresh tokens rotate and cannot be replayed
//! 3. Logout and password changes revoke what they should
//! 4. Concurrent requests for the same identity or user do not undo each other

use accounts_api::error::AppError;
use accounts_api::models::{ChangePasswordRequest, LoginRequest, UpdateAccountRequest};
use accounts_api::services::{ImageSlot, RegisterInput};
use std::time::Duration;

mod common;
use common::{avatar_file, register_input, test_sessions};

fn login_request(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        username: Some(username.to_string()),
        email: None,
        password: password.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REGISTRATION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_register_stores_normalized_user() {
    let (sessions, db) = test_sessions();

    let user = sessions
        .register(register_input("  Alice ", "a@x.com", "p1"))
        .await
        .unwrap();

    assert_eq!(user.username, "alice");
    assert!(user.avatar.starts_with("https://"));
    assert_eq!(user.cover_image, "");
    assert!(user.refresh_token.is_none());
    assert_ne!(user.password_hash, "p1");

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.email, "a@x.com");
}

#[tokio::test]
async fn test_register_missing_field_writes_nothing() {
    let (sessions, db) = test_sessions();

    for input in [
        register_input("", "a@x.com", "p1"),
        register_input("alice", "   ", "p1"),
        register_input("alice", "a@x.com", "  "),
    ] {
        let err = sessions.register(input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }), "got {err:?}");
    }

    let found = db
        .find_by_username_or_email(Some("alice"), Some("a@x.com"))
        .await
        .unwrap();
    assert!(found.is_empty());
    assert_eq!(sessions.media().mock_upload_count(), 0);
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let (sessions, db) = test_sessions();
    sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();

    // Same username, different email
    let err = sessions
        .register(register_input("ALICE", "other@x.com", "p2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Same email, different username
    let err = sessions
        .register(register_input("bob", "a@x.com", "p2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let found = db
        .find_by_username_or_email(Some("alice"), Some("a@x.com"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_register_requires_avatar() {
    let (sessions, _db) = test_sessions();

    let mut input = register_input("alice", "a@x.com", "p1");
    input.avatar = None;

    let err = sessions.register(input).await.unwrap_err();
    match err {
        AppError::Validation { message, .. } => assert_eq!(message, "Avatar is required"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_upload_failure_writes_nothing() {
    let (sessions, db) = test_sessions();
    sessions.media().set_mock_failure(true);

    let err = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Upload(_)));

    let found = db
        .find_by_username_or_email(Some("alice"), None)
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_register_with_cover_image() {
    let (sessions, _db) = test_sessions();

    let input = RegisterInput {
        cover_image: Some(avatar_file()),
        ..register_input("alice", "a@x.com", "p1")
    };
    let user = sessions.register(input).await.unwrap();

    assert!(!user.cover_image.is_empty());
    assert_ne!(user.cover_image, user.avatar);
    assert_eq!(sessions.media().mock_upload_count(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// LOGIN & REFRESH
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_login_errors() {
    let (sessions, _db) = test_sessions();
    sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();

    let err = sessions
        .login(LoginRequest {
            username: None,
            email: None,
            password: "p1".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = sessions.login(login_request("nobody", "p1")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = sessions.login(login_request("alice", "wrong")).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_login_by_email_persists_refresh_token() {
    let (sessions, db) = test_sessions();
    let user = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();

    let outcome = sessions
        .login(LoginRequest {
            username: None,
            email: Some("a@x.com".to_string()),
            password: "p1".to_string(),
        })
        .await
        .unwrap();

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(
        stored.refresh_token.as_deref(),
        Some(outcome.tokens.refresh_token.as_str())
    );

    let claims = sessions
        .tokens()
        .verify_access_token(&outcome.tokens.access_token)
        .unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.username, "alice");
}

#[tokio::test]
async fn test_email_is_case_insensitive() {
    let (sessions, _db) = test_sessions();
    let user = sessions
        .register(register_input("alice", " A@X.com ", "p1"))
        .await
        .unwrap();
    assert_eq!(user.email, "a@x.com");

    let outcome = sessions
        .login(LoginRequest {
            username: None,
            email: Some("a@x.COM".to_string()),
            password: "p1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.user.id, user.id);

    let err = sessions
        .register(register_input("bob", "a@x.com", "p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_refresh_rotation_rejects_replay() {
    let (sessions, _db) = test_sessions();
    sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    let original = sessions.login(login_request("alice", "p1")).await.unwrap();

    let rotated = sessions
        .refresh(Some(&original.tokens.refresh_token))
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, original.tokens.refresh_token);

    let rotated_again = sessions.refresh(Some(&rotated.refresh_token)).await.unwrap();
    assert_ne!(rotated_again.refresh_token, rotated.refresh_token);

    // Replaying the original after rotation must fail
    let err = sessions
        .refresh(Some(&original.tokens.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_second_login_revokes_first_refresh_token() {
    let (sessions, _db) = test_sessions();
    sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();

    let first = sessions.login(login_request("alice", "p1")).await.unwrap();
    let second = sessions.login(login_request("alice", "p1")).await.unwrap();

    assert!(sessions.refresh(Some(&first.tokens.refresh_token)).await.is_err());
    assert!(sessions.refresh(Some(&second.tokens.refresh_token)).await.is_ok());
}

#[tokio::test]
async fn test_refresh_rejects_missing_and_foreign_tokens() {
    let (sessions, _db) = test_sessions();
    sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    let outcome = sessions.login(login_request("alice", "p1")).await.unwrap();

    for presented in [None, Some(""), Some("not-a-jwt")] {
        let err = sessions.refresh(presented).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    // An access token is signed with a different secret
    let err = sessions
        .refresh(Some(&outcome.tokens.access_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let (sessions, db) = test_sessions();
    let user = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    let outcome = sessions.login(login_request("alice", "p1")).await.unwrap();

    sessions.logout(&user.id).await.unwrap();

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(stored.refresh_token.is_none());

    let err = sessions
        .refresh(Some(&outcome.tokens.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_change_password() {
    let (sessions, db) = test_sessions();
    let user = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();

    let err = sessions
        .change_password(
            &user.id,
            ChangePasswordRequest {
                old_password: "wrong".to_string(),
                new_password: "p2".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    let unchanged = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(unchanged.password_hash, user.password_hash);

    sessions
        .change_password(
            &user.id,
            ChangePasswordRequest {
                old_password: "p1".to_string(),
                new_password: "p2".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(sessions.login(login_request("alice", "p2")).await.is_ok());
    let err = sessions.login(login_request("alice", "p1")).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_update_account() {
    let (sessions, _db) = test_sessions();
    let alice = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    sessions
        .register(register_input("bob", "b@x.com", "p1"))
        .await
        .unwrap();

    let err = sessions
        .update_account(
            &alice.id,
            UpdateAccountRequest {
                fullname: "Alice".to_string(),
                username: "bob".to_string(),
                email: "a@x.com".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = sessions
        .update_account(&alice.id, UpdateAccountRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    // Keeping her own email is not a conflict
    let updated = sessions
        .update_account(
            &alice.id,
            UpdateAccountRequest {
                fullname: " Alice Liddell ".to_string(),
                username: "Wonder".to_string(),
                email: "a@x.com".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.fullname, "Alice Liddell");
    assert_eq!(updated.username, "wonder");

    let fetched = sessions.current_user(&alice.id).await.unwrap();
    assert_eq!(fetched.username, "wonder");
}

#[tokio::test]
async fn test_update_images() {
    let (sessions, _db) = test_sessions();
    let user = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();

    let err = sessions
        .update_image(&user.id, ImageSlot::Avatar, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let updated = sessions
        .update_image(&user.id, ImageSlot::CoverImage, Some(avatar_file()))
        .await
        .unwrap();
    assert!(!updated.cover_image.is_empty());
    assert_eq!(updated.avatar, user.avatar);

    sessions.media().set_mock_failure(true);
    let err = sessions
        .update_image(&user.id, ImageSlot::Avatar, Some(avatar_file()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Upload(_)));
    let fetched = sessions.current_user(&user.id).await.unwrap();
    assert_eq!(fetched.avatar, user.avatar);
}

#[tokio::test]
async fn test_current_user_unknown_id() {
    let (sessions, _db) = test_sessions();
    let err = sessions.current_user("missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// CONCURRENCY
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_single_winner() {
    let (sessions, db) = test_sessions();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                sessions
                    .register(register_input("alice", "a@x.com", "p1"))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert!(matches!(err, AppError::Conflict(_)), "got {err:?}"),
        }
    }
    assert_eq!(created, 1);

    let found = db
        .find_by_username_or_email(Some("alice"), Some("a@x.com"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_same_email() {
    let (sessions, db) = test_sessions();

    let first = tokio::spawn({
        let sessions = sessions.clone();
        async move {
            sessions
                .register(register_input("alice", "shared@x.com", "p1"))
                .await
        }
    });
    let second = tokio::spawn({
        let sessions = sessions.clone();
        async move {
            sessions
                .register(register_input("bob", "shared@x.com", "p1"))
                .await
        }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let found = db
        .find_by_username_or_email(None, Some("shared@x.com"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_single_winner() {
    let (sessions, _db) = test_sessions();
    sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    let outcome = sessions.login(login_request("alice", "p1")).await.unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let sessions = sessions.clone();
            let token = outcome.tokens.refresh_token.clone();
            tokio::spawn(async move { sessions.refresh(Some(&token)).await })
        })
        .collect();

    let mut rotated = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => rotated += 1,
            Err(err) => assert!(matches!(err, AppError::Unauthorized(_)), "got {err:?}"),
        }
    }
    assert_eq!(rotated, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_logout_during_password_change_stays_logged_out() {
    let (sessions, db) = test_sessions();
    let user = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    let outcome = sessions.login(login_request("alice", "p1")).await.unwrap();

    // Hashing takes long enough for the logout to land in the middle
    let change = tokio::spawn({
        let sessions = sessions.clone();
        let user_id = user.id.clone();
        async move {
            sessions
                .change_password(
                    &user_id,
                    ChangePasswordRequest {
                        old_password: "p1".to_string(),
                        new_password: "p2".to_string(),
                    },
                )
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    sessions.logout(&user.id).await.unwrap();
    change.await.unwrap().unwrap();

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(stored.refresh_token.is_none());
    assert!(sessions
        .refresh(Some(&outcome.tokens.refresh_token))
        .await
        .is_err());
    assert!(sessions.login(login_request("alice", "p2")).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_logout_during_image_update_stays_logged_out() {
    let (sessions, db) = test_sessions();
    let user = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    let outcome = sessions.login(login_request("alice", "p1")).await.unwrap();

    let update = tokio::spawn({
        let sessions = sessions.clone();
        let user_id = user.id.clone();
        async move {
            sessions
                .update_image(&user_id, ImageSlot::CoverImage, Some(avatar_file()))
                .await
        }
    });
    sessions.logout(&user.id).await.unwrap();
    let updated = update.await.unwrap().unwrap();

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(stored.refresh_token.is_none());
    assert_eq!(stored.cover_image, updated.cover_image);
    assert!(sessions
        .refresh(Some(&outcome.tokens.refresh_token))
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_account_updates_to_same_username() {
    let (sessions, db) = test_sessions();
    let alice = sessions
        .register(register_input("alice", "a@x.com", "p1"))
        .await
        .unwrap();
    let bob = sessions
        .register(register_input("bob", "b@x.com", "p1"))
        .await
        .unwrap();

    let tasks: Vec<_> = [(alice.id.clone(), "a@x.com"), (bob.id.clone(), "b@x.com")]
        .into_iter()
        .map(|(user_id, email)| {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                sessions
                    .update_account(
                        &user_id,
                        UpdateAccountRequest {
                            fullname: "Renamed".to_string(),
                            username: "wonder".to_string(),
                            email: email.to_string(),
                        },
                    )
                    .await
            })
        })
        .collect();

    let mut renamed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => renamed += 1,
            Err(err) => assert!(matches!(err, AppError::Conflict(_)), "got {err:?}"),
        }
    }
    assert_eq!(renamed, 1);

    let found = db
        .find_by_username_or_email(Some("wonder"), None)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    // The winner's old username is free again
    let freed = if found[0].id == alice.id { "alice" } else { "bob" };
    sessions
        .register(register_input(freed, "new@x.com", "p1"))
        .await
        .unwrap();
}
