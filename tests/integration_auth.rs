//! Authentication flow integration tests
//!
//! Tests the authentication system including:
//! - Login and token use on protected endpoints
//! - Failure delay and generic rejections
//! - Token expiry
//! - Login rate limiting and client addressing

mod common;

use std::time::{Duration, Instant};

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

/// Test 1: Login token opens the status endpoint
#[tokio::test]
async fn test_login_and_status() {
    let ctx = spawn_app().await;
    let token = login(&ctx).await;

    let response = reqwest::Client::new()
        .get(ctx.url("/api/status"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["server"], "running");
    assert_eq!(body["publish_mode"], "disabled");
    assert_eq!(body["user"], ADMIN_USER);
}

/// Test 2: Login response shape
#[tokio::test]
async fn test_login_response_fields() {
    let ctx = spawn_app().await;

    let response = reqwest::Client::new()
        .post(ctx.url("/api/auth"))
        .json(&json!({"username": ADMIN_USER, "password": ADMIN_PASS}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"], ADMIN_USER);
    assert_eq!(body["expiresIn"], "2h");
    assert_eq!(body["expiresAt"], "2024-05-01T14:00:00.000Z");

    let token = body["token"].as_str().unwrap();
    assert_eq!(token.matches('.').count(), 1);
    assert!(token.is_ascii());
}

/// Test 3: Wrong password is answered after the failure delay
#[tokio::test]
async fn test_wrong_password_is_delayed() {
    let ctx = spawn_app().await;

    let start = Instant::now();
    let response = reqwest::Client::new()
        .post(ctx.url("/api/auth"))
        .json(&json!({"username": ADMIN_USER, "password": "wrong"}))
        .send()
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid credentials");
}

/// Test 4: Oversized input is rejected as invalid
#[tokio::test]
async fn test_oversized_input() {
    let ctx = spawn_app().await;

    let response = reqwest::Client::new()
        .post(ctx.url("/api/auth"))
        .json(&json!({"username": "a".repeat(51), "password": ADMIN_PASS}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid input");
}

/// Test 5: Tokens stop working after they expire
#[tokio::test]
async fn test_token_expires() {
    let ctx = spawn_app().await;
    let token = login(&ctx).await;
    let client = reqwest::Client::new();

    ctx.clock.advance(chrono::Duration::minutes(119));
    let response = client
        .get(ctx.url("/api/status"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    ctx.clock.advance(chrono::Duration::minutes(2));
    let response = client
        .get(ctx.url("/api/status"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Authentication required");
}

/// Test 6: Tokens signed with another secret are rejected
#[tokio::test]
async fn test_token_from_other_server_rejected() {
    let other = spawn_app_with(|config| {
        config.auth.secret_key = Some("a-different-secret".to_string());
    })
    .await;
    let foreign_token = login(&other).await;

    let ctx = spawn_app().await;
    let response = reqwest::Client::new()
        .get(ctx.url("/api/content"))
        .bearer_auth(&foreign_token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Test 7: Login attempts are rate limited per client
#[tokio::test]
async fn test_login_rate_limit() {
    let ctx = spawn_app_with(|config| {
        config.auth.rate_limit.max_requests = 3;
    })
    .await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let response = client
            .post(ctx.url("/api/auth"))
            .json(&json!({"username": "", "password": ""}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = client
        .post(ctx.url("/api/auth"))
        .json(&json!({"username": ADMIN_USER, "password": ADMIN_PASS}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "300");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Too many requests");

    // The window slides; once it has passed the client may log in again.
    ctx.clock.advance(chrono::Duration::minutes(5));
    let response = client
        .post(ctx.url("/api/auth"))
        .json(&json!({"username": ADMIN_USER, "password": ADMIN_PASS}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Test 8: X-Forwarded-For is ignored unless trusted
#[tokio::test]
async fn test_forwarded_for_ignored_by_default() {
    let ctx = spawn_app_with(|config| {
        config.auth.rate_limit.max_requests = 2;
    })
    .await;
    let client = reqwest::Client::new();

    for (i, expected) in [
        StatusCode::BAD_REQUEST,
        StatusCode::BAD_REQUEST,
        StatusCode::TOO_MANY_REQUESTS,
    ]
    .into_iter()
    .enumerate()
    {
        let response = client
            .post(ctx.url("/api/auth"))
            .header("X-Forwarded-For", format!("198.51.100.{}", i))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

/// Test 9: Trusted X-Forwarded-For gives each client its own budget
#[tokio::test]
async fn test_forwarded_for_trusted() {
    let ctx = spawn_app_with(|config| {
        config.auth.rate_limit.max_requests = 1;
        config.auth.trust_forwarded_for = true;
    })
    .await;
    let client = reqwest::Client::new();

    let send = |forwarded: &'static str| {
        client
            .post(ctx.url("/api/auth"))
            .header("X-Forwarded-For", forwarded)
            .json(&json!({}))
            .send()
    };

    assert_eq!(
        send("198.51.100.1").await.unwrap().status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        send("198.51.100.1, 10.0.0.1").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        send("198.51.100.2").await.unwrap().status(),
        StatusCode::BAD_REQUEST
    );
}
