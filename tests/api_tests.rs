mod common;

use axum::http::StatusCode;
use common::{ADMIN_PASSWORD, spawn_app};
use quill::admin::{AccountAdmin, AdminSite};
use quill::db::AccountChanges;
use quill::forms::{AccountChangeForm, AccountCreationForm, ChangeInput, ChangeScope, FormMeta};
use quill::identity::ManagerError;
use quill::services::AuthError;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_signup_persists_one_ordinary_account() {
    let app = spawn_app().await;

    let response = app.signup("alice", "S3cret!", "S3cret!").await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    assert_eq!(response.body["data"]["username"], "alice");
    assert_eq!(response.body["data"]["is_staff"], false);
    assert!(response.body["data"].get("password_hash").is_none());

    assert_eq!(app.account_count().await, 1);

    let stored = app
        .state
        .store
        .get_account_by_username("alice")
        .await
        .unwrap()
        .expect("alice was not stored");
    assert!(!stored.is_privileged());
    assert!(!stored.is_superuser);

    let hash = app
        .state
        .store
        .get_account_password_hash(stored.id)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(hash, "S3cret!");
    assert!(hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn test_signup_with_mismatched_passwords_persists_nothing() {
    let app = spawn_app().await;

    let response = app.signup("bob", "S3cret!", "Different!").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(
        response.body["errors"]["password2"][0],
        "The two password fields didn't match."
    );

    assert_eq!(app.account_count().await, 0);
}

#[tokio::test]
async fn test_signup_field_errors() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/api/auth/signup",
            None,
            json!({ "username": "not valid!", "email": "nope", "password1": "123", "password2": "123" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["errors"]["username"].is_array());
    assert!(response.body["errors"]["email"].is_array());
    assert!(response.body["errors"]["password2"].is_array());
    assert_eq!(app.account_count().await, 0);
}

#[tokio::test]
async fn test_duplicate_submission_hits_storage_constraint() {
    let app = spawn_app().await;

    let first = app.signup("alice", "S3cret!", "S3cret!").await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.signup("alice", "S3cret!", "S3cret!").await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(
        second.body["errors"]["username"][0],
        "A user with that username already exists."
    );

    assert_eq!(app.account_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_submissions_commit_once() {
    let app = spawn_app().await;

    let payload = || quill::forms::CreationInput {
        username: "carol".to_string(),
        email: "carol@example.com".to_string(),
        password1: "S3cret!".to_string(),
        password2: "S3cret!".to_string(),
    };

    let (a, b) = tokio::join!(
        app.state.auth.signup(payload()),
        app.state.auth.signup(payload())
    );

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let integrity = results
        .iter()
        .filter(|r| matches!(r, Err(AuthError::Integrity(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(integrity, 1);
    assert_eq!(app.account_count().await, 1);
}

#[tokio::test]
async fn test_admin_surface_requires_privileged_flag() {
    let app = spawn_app().await;
    app.create_admin().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);

    let admin_cookie = app.login("admin", ADMIN_PASSWORD).await;
    let response = app.get("/admin/accounts/account", Some(&admin_cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    let usernames: Vec<&str> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["username"].as_str())
        .collect();
    assert!(usernames.contains(&"admin"));
    assert!(usernames.contains(&"alice"));

    let alice_cookie = app.login("alice", "S3cret!").await;
    let response = app.get("/admin/accounts/account", Some(&alice_cookie)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.get("data").is_none());

    let response = app.get("/admin", Some(&alice_cookie)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get("/admin/accounts/account", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unprivileged_admin_writes_are_denied_regardless_of_payload() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);
    let alice_cookie = app.login("alice", "S3cret!").await;

    let valid = json!({
        "username": "mallory",
        "email": "mallory@example.com",
        "password1": "An0ther-pass",
        "password2": "An0ther-pass",
    });
    let invalid = json!({ "username": "", "password1": "x", "password2": "y" });

    for payload in [valid, invalid] {
        let response = app
            .post("/admin/accounts/account", Some(&alice_cookie), payload)
            .await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert!(response.body.get("errors").is_none());
    }

    let alice_id = app
        .state
        .store
        .get_account_by_username("alice")
        .await
        .unwrap()
        .unwrap()
        .id;
    let response = app
        .put(
            &format!("/admin/accounts/account/{alice_id}"),
            Some(&alice_cookie),
            json!({ "is_staff": true }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    assert_eq!(app.account_count().await, 1);
    let alice = app.state.store.get_account(alice_id).await.unwrap().unwrap();
    assert!(!alice.is_staff);
}

#[tokio::test]
async fn test_unprivileged_malformed_admin_requests_are_forbidden() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);
    let alice_cookie = app.login("alice", "S3cret!").await;
    let alice_id = app
        .state
        .store
        .get_account_by_username("alice")
        .await
        .unwrap()
        .unwrap()
        .id;

    let response = app
        .post("/admin/accounts/account", Some(&alice_cookie), json!({ "username": 5 }))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.get("errors").is_none());

    let response = app
        .put(
            &format!("/admin/accounts/account/{alice_id}"),
            Some(&alice_cookie),
            json!({ "is_staff": "yes" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get("/admin/accounts/account/abc", Some(&alice_cookie)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .put("/admin/accounts/account/abc", Some(&alice_cookie), json!([1, 2]))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .post("/admin/accounts/account", None, json!({ "username": 5 }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.account_count().await, 1);
    let alice = app.state.store.get_account(alice_id).await.unwrap().unwrap();
    assert!(!alice.is_staff);
}

#[tokio::test]
async fn test_createsuperuser_rejects_invalid_identity_fields() {
    let app = spawn_app().await;
    let manager = app.state.identity.manager();

    let long_handle = "x".repeat(200);
    let cases = [
        (long_handle.as_str(), "", vec!["username"]),
        ("bad name!", "not-an-email", vec!["username", "email"]),
        ("", "", vec!["username"]),
    ];

    for (username, email, fields) in cases {
        let err = manager
            .create_superuser(username, email, ADMIN_PASSWORD)
            .await
            .unwrap_err();
        let errors = match err {
            ManagerError::Invalid(errors) => errors,
            other => panic!("expected field errors for {username:?}, got {other:?}"),
        };
        for field in fields {
            assert!(errors.has(field), "{field} not flagged for {username:?}");
        }
    }

    assert_eq!(app.account_count().await, 0);

    let account = manager
        .create_superuser(" root ", "Root@EXAMPLE.com", ADMIN_PASSWORD)
        .await
        .unwrap();
    assert_eq!(account.username, "root");
    assert_eq!(account.email, "Root@example.com");
    assert!(account.is_privileged());
}

#[tokio::test]
async fn test_narrowed_change_binding_restricts_admin_edits() {
    let app = spawn_app().await;
    app.create_admin().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);

    let store = &app.state.store;
    let operator = store.get_account_by_username("admin").await.unwrap().unwrap();
    let alice = store.get_account_by_username("alice").await.unwrap().unwrap();

    let identity = Arc::clone(&app.state.identity);
    let add_form = AccountCreationForm::meta_for(&identity).unwrap();
    let change_form =
        FormMeta::for_model(identity.shape(), &["first_name", "last_name"]).unwrap();
    let admin = AccountAdmin::new(identity, add_form, change_form)
        .unwrap()
        .with_list_display(&["username"])
        .unwrap();
    let mut site = AdminSite::new();
    site.register(admin).unwrap();

    let input = ChangeInput {
        username: Some("mallory".to_string()),
        first_name: Some("Al".to_string()),
        is_staff: Some(true),
        ..ChangeInput::default()
    };
    let changed = site
        .change(store, &operator, "accounts.Account", alice.id, input)
        .await
        .unwrap();
    assert_eq!(changed.first_name, "Al");
    assert_eq!(changed.username, "alice");
    assert!(!changed.is_staff);

    let rows = site
        .changelist(store, &operator, "accounts.account")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.columns.keys().copied().collect::<Vec<_>>(), vec!["username"]);
    }
}

#[tokio::test]
async fn test_reset_lookup_matches_email_case_insensitively_and_skips_inactive() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);
    let store = &app.state.store;

    let found = store
        .list_active_accounts_by_email("ALICE@Example.com")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "alice");
    assert!(store.list_active_accounts_by_email("bob@example.com").await.unwrap().is_empty());

    let alice = found[0].clone();
    store
        .update_account(
            alice.id,
            AccountChanges {
                username: alice.username,
                first_name: alice.first_name,
                last_name: alice.last_name,
                email: alice.email,
                is_staff: alice.is_staff,
                is_superuser: alice.is_superuser,
                is_active: false,
            },
        )
        .await
        .unwrap();

    assert!(
        store
            .list_active_accounts_by_email("alice@example.com")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_admin_add_and_change() {
    let app = spawn_app().await;
    app.create_admin().await;
    let cookie = app.login("admin", ADMIN_PASSWORD).await;

    let response = app
        .post(
            "/admin/accounts/account",
            Some(&cookie),
            json!({
                "username": "dave",
                "email": "dave@example.com",
                "password1": "An0ther-pass",
                "password2": "An0ther-pass",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    assert_eq!(response.body["data"]["is_staff"], false);
    let dave_id = response.body["data"]["id"].as_i64().unwrap();

    let response = app
        .put(
            &format!("/admin/accounts/account/{dave_id}"),
            Some(&cookie),
            json!({ "first_name": "Dave", "is_staff": true }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["data"]["first_name"], "Dave");
    assert_eq!(response.body["data"]["is_staff"], true);
    assert_eq!(response.body["data"]["username"], "dave");

    let response = app
        .post(
            "/admin/accounts/account",
            Some(&cookie),
            json!({
                "username": "dave",
                "password1": "An0ther-pass",
                "password2": "An0ther-pass",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app.get("/admin/auth/user", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.get("/admin/accounts/account/9999", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unchanged_change_form_round_trips() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);

    let before = app
        .state
        .store
        .get_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();

    let initial = AccountChangeForm::initial(&before, ChangeScope::Operator);
    let mut form = AccountChangeForm::bind(
        app.state.identity.clone(),
        before.clone(),
        initial,
        ChangeScope::Operator,
    )
    .unwrap();
    assert!(form.is_valid());
    assert!(form.changed_fields().is_empty());
    form.save().await.unwrap();

    let after = app.state.store.get_account(before.id).await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_admin_detail_round_trips_through_http() {
    let app = spawn_app().await;
    app.create_admin().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);
    let cookie = app.login("admin", ADMIN_PASSWORD).await;

    let alice_id = app
        .state
        .store
        .get_account_by_username("alice")
        .await
        .unwrap()
        .unwrap()
        .id;
    let uri = format!("/admin/accounts/account/{alice_id}");

    let before = app.get(&uri, Some(&cookie)).await;
    assert_eq!(before.status, StatusCode::OK);

    let saved = app.put(&uri, Some(&cookie), before.body["data"].clone()).await;
    assert_eq!(saved.status, StatusCode::OK);

    let after = app.get(&uri, Some(&cookie)).await;
    assert_eq!(before.body["data"], after.body["data"]);
}

#[tokio::test]
async fn test_self_service_cannot_raise_privilege() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);
    let cookie = app.login("alice", "S3cret!").await;

    let response = app
        .put(
            "/api/auth/me",
            Some(&cookie),
            json!({ "first_name": "Alice", "is_staff": true, "is_superuser": true }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["first_name"], "Alice");
    assert_eq!(response.body["data"]["is_staff"], false);
    assert_eq!(response.body["data"]["is_superuser"], false);

    let response = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.body["data"]["first_name"], "Alice");
    assert_eq!(response.body["data"]["is_staff"], false);
}

#[tokio::test]
async fn test_login_logout() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);

    let response = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": "wrong-pass" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/api/auth/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let cookie = app.login("alice", "S3cret!").await;
    let response = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["username"], "alice");
    assert!(response.body["data"]["last_login"].is_string());

    let response = app
        .request(axum::http::Method::POST, "/api/auth/logout", Some(&cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_account_loses_access() {
    let app = spawn_app().await;
    app.create_admin().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);

    let alice_cookie = app.login("alice", "S3cret!").await;
    let admin_cookie = app.login("admin", ADMIN_PASSWORD).await;

    let alice_id = app
        .state
        .store
        .get_account_by_username("alice")
        .await
        .unwrap()
        .unwrap()
        .id;
    let response = app
        .put(
            &format!("/admin/accounts/account/{alice_id}"),
            Some(&admin_cookie),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/api/auth/me", Some(&alice_cookie)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": "S3cret!" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);
    let cookie = app.login("alice", "S3cret!").await;

    let response = app
        .put(
            "/api/auth/password",
            Some(&cookie),
            json!({ "old_password": "nope", "new_password1": "N3w-secret", "new_password2": "N3w-secret" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["errors"]["old_password"].is_array());

    let response = app
        .put(
            "/api/auth/password",
            Some(&cookie),
            json!({ "old_password": "S3cret!", "new_password1": "N3w-secret", "new_password2": "N3w-secret" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    app.login("alice", "N3w-secret").await;
    let response = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": "S3cret!" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

fn extract_token(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|line| {
            line.split_once('.')
                .is_some_and(|(s, v)| s.len() == 32 && v.len() == 64)
        })
        .expect("no reset token in message")
        .to_string()
}

#[tokio::test]
async fn test_password_reset_is_single_use() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);

    let response = app
        .post(
            "/api/auth/password-reset",
            None,
            json!({ "email": "nobody@example.com" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(app.mailer.outbox().await.is_empty());

    let response = app
        .post(
            "/api/auth/password-reset",
            None,
            json!({ "email": "alice@EXAMPLE.com" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let outbox = app.mailer.outbox().await;
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, "alice@example.com");
    let token = extract_token(&outbox[0].body);

    let confirm = json!({
        "token": token,
        "new_password1": "R3set-pass",
        "new_password2": "R3set-pass",
    });

    let response = app
        .post("/api/auth/password-reset/confirm", None, confirm.clone())
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    app.login("alice", "R3set-pass").await;

    let response = app
        .post("/api/auth/password-reset/confirm", None, confirm)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post(
            "/api/auth/password-reset/confirm",
            None,
            json!({ "token": "garbage", "new_password1": "R3set-pass", "new_password2": "R3set-pass" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_posts() {
    let app = spawn_app().await;
    assert_eq!(app.signup("alice", "S3cret!", "S3cret!").await.status, StatusCode::CREATED);

    let response = app
        .post("/api/posts", None, json!({ "body": "anonymous" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let cookie = app.login("alice", "S3cret!").await;

    let response = app
        .post("/api/posts", Some(&cookie), json!({ "body": "hello board" }))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["data"]["author_username"], "alice");

    let response = app
        .post("/api/posts", Some(&cookie), json!({ "body": "x".repeat(281) }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.get("/api/posts", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    let posts = response.body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["body"], "hello board");
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;

    let response = app.get("/api/system/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["identity_model"], "accounts.Account");
}
