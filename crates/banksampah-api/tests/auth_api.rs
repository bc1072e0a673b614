mod common;

use banksampah_core::{new_id, security::JwtManager, BankStore, Session};
use chrono::{Duration, Utc};
use common::{login, register, spawn_app, spawn_app_with, staff_token, test_settings};
use serde_json::{json, Value};

#[tokio::test]
async fn health_endpoint_is_public() {
    let app = spawn_app();

    let resp = app.server.get("/health").await;
    assert_eq!(resp.status_code(), 200);
    let body: Value = resp.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(
        resp.headers()
            .get("x-content-type-options")
            .and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let app = spawn_app();
    app.server.get("/health").await;

    let resp = app.server.get("/metrics").await;
    assert_eq!(resp.status_code(), 200);
    assert!(resp.text().contains("banksampah_http_requests_total"));
}

#[tokio::test]
async fn register_validates_fields() {
    let app = spawn_app();

    let resp = app
        .server
        .post("/auth/register")
        .json(&json!({ "email": "a@b.c", "password": "x" }))
        .await;
    assert_eq!(resp.status_code(), 400);
    assert_eq!(
        resp.json::<Value>()["error"],
        "All fields (email, password, confirm password, and username) are required."
    );

    let resp = app
        .server
        .post("/auth/register")
        .json(&json!({
            "email": "a@b.c",
            "password": "rahasia123",
            "confirmPassword": "rahasia124",
            "username": "budi",
        }))
        .await;
    assert_eq!(resp.status_code(), 400);
    assert_eq!(resp.json::<Value>()["error"], "Passwords do not match.");
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = spawn_app();
    register(&app.server, "budi", "rahasia123").await;

    let resp = app
        .server
        .post("/auth/register")
        .json(&json!({
            "email": "other@example.com",
            "password": "rahasia123",
            "confirmPassword": "rahasia123",
            "username": "budi",
        }))
        .await;
    assert_eq!(resp.status_code(), 409);
}

#[tokio::test]
async fn login_returns_token_pair() {
    let app = spawn_app();
    register(&app.server, "budi", "rahasia123").await;

    let body = login(&app.server, "budi", "rahasia123").await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 15 * 60);
    assert!(body["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refreshToken"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = spawn_app();
    register(&app.server, "budi", "rahasia123").await;

    let resp = app
        .server
        .post("/auth/login")
        .json(&json!({ "username": "budi" }))
        .await;
    assert_eq!(resp.status_code(), 400);
    assert_eq!(
        resp.json::<Value>()["error"],
        "Username and password must be provided."
    );

    for (username, password) in [("budi", "salah"), ("siapa", "rahasia123")] {
        let resp = app
            .server
            .post("/auth/login")
            .json(&json!({ "username": username, "password": password }))
            .await;
        assert_eq!(resp.status_code(), 401);
        assert_eq!(resp.json::<Value>()["error"], "Invalid credentials.");
    }
}

#[tokio::test]
async fn login_attempts_are_throttled_per_username() {
    let mut settings = test_settings();
    settings.security.login_attempts_per_minute = 2;
    let app = spawn_app_with(settings);
    register(&app.server, "budi", "rahasia123").await;

    for _ in 0..2 {
        let resp = app
            .server
            .post("/auth/login")
            .json(&json!({ "username": "budi", "password": "salah" }))
            .await;
        assert_eq!(resp.status_code(), 401);
    }

    let resp = app
        .server
        .post("/auth/login")
        .json(&json!({ "username": "budi", "password": "rahasia123" }))
        .await;
    assert_eq!(resp.status_code(), 429);

    // Other usernames have their own budget.
    register(&app.server, "siti", "rahasia123").await;
    login(&app.server, "siti", "rahasia123").await;
}

#[tokio::test]
async fn protected_routes_require_access_token() {
    let app = spawn_app();

    let resp = app.server.get("/customers").await;
    assert_eq!(resp.status_code(), 401);

    let resp = app
        .server
        .get("/customers")
        .authorization_bearer("not-a-jwt")
        .await;
    assert_eq!(resp.status_code(), 401);

    register(&app.server, "budi", "rahasia123").await;
    let tokens = login(&app.server, "budi", "rahasia123").await;
    let refresh = tokens["refreshToken"].as_str().unwrap();
    let resp = app
        .server
        .get("/stock")
        .authorization_bearer(refresh)
        .await;
    assert_eq!(resp.status_code(), 401, "refresh tokens are not access tokens");

    let access = tokens["accessToken"].as_str().unwrap();
    let resp = app.server.get("/stock").authorization_bearer(access).await;
    assert_eq!(resp.status_code(), 200);
}

#[tokio::test]
async fn refresh_rotates_and_detects_reuse() {
    let app = spawn_app();
    register(&app.server, "budi", "rahasia123").await;
    let first = login(&app.server, "budi", "rahasia123").await;
    let first_refresh = first["refreshToken"].as_str().unwrap().to_string();

    let resp = app
        .server
        .post("/auth/refresh")
        .json(&json!({ "refreshToken": first_refresh }))
        .await;
    assert_eq!(resp.status_code(), 200);
    let second: Value = resp.json();
    let second_refresh = second["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(second_refresh, first_refresh);

    // Replaying the rotated token kills the session.
    let resp = app
        .server
        .post("/auth/refresh")
        .json(&json!({ "refreshToken": first_refresh }))
        .await;
    assert_eq!(resp.status_code(), 401);

    let resp = app
        .server
        .post("/auth/refresh")
        .json(&json!({ "refreshToken": second_refresh }))
        .await;
    assert_eq!(resp.status_code(), 401);

    let access = second["accessToken"].as_str().unwrap();
    let resp = app.server.get("/stock").authorization_bearer(access).await;
    assert_eq!(resp.status_code(), 401);
}

#[tokio::test]
async fn logout_revokes_session() {
    let app = spawn_app();
    register(&app.server, "budi", "rahasia123").await;
    let tokens = login(&app.server, "budi", "rahasia123").await;
    let access = tokens["accessToken"].as_str().unwrap();

    let resp = app
        .server
        .post("/auth/logout")
        .json(&json!({ "refreshToken": tokens["refreshToken"] }))
        .await;
    assert_eq!(resp.status_code(), 200);

    let resp = app.server.get("/stock").authorization_bearer(access).await;
    assert_eq!(resp.status_code(), 401);

    let resp = app
        .server
        .post("/auth/refresh")
        .json(&json!({ "refreshToken": tokens["refreshToken"] }))
        .await;
    assert_eq!(resp.status_code(), 401);
}

#[tokio::test]
async fn sessions_are_independent() {
    let app = spawn_app();
    let token = staff_token(&app.server).await;
    let other = login(&app.server, "petugas", "rahasia123").await;

    app.server
        .post("/auth/logout")
        .json(&json!({ "refreshToken": other["refreshToken"] }))
        .await;

    let resp = app.server.get("/stock").authorization_bearer(&token).await;
    assert_eq!(resp.status_code(), 200);
}

#[tokio::test]
async fn expired_sessions_reject_access_tokens() {
    let app = spawn_app();
    register(&app.server, "petugas", "rahasia123").await;
    let user = app
        .store
        .find_user_by_username("petugas")
        .await
        .unwrap()
        .unwrap();

    // Access token still valid, session already past its end.
    let session_id = new_id();
    let secret = test_settings().auth.jwt_secret.unwrap();
    let jwt = JwtManager::new(&secret, Duration::minutes(15), Duration::days(7));
    let pair = jwt.issue_pair(&user, &session_id).unwrap();
    app.store
        .insert_session(Session {
            id: session_id,
            user_id: user.id.clone(),
            refresh_jti: pair.refresh_jti.clone(),
            expires_at: Utc::now() - Duration::minutes(1),
            revoked: false,
        })
        .await
        .unwrap();

    let resp = app
        .server
        .get("/stock")
        .authorization_bearer(&pair.access_token)
        .await;
    assert_eq!(resp.status_code(), 401);
    assert_eq!(resp.json::<Value>()["error"], "Session is no longer active.");
}
