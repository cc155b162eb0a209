//! Session store: login, register, logout, the startup check and the
//! shared state, driven by a scripted transport.

mod common;

use common::*;
use taskdesk_core::{ApiError, TokenStore};

// ---------------------------------------------------------------------------
// Login and register
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_stores_token_and_sets_user() {
    let transport = ScriptedTransport::new();
    transport.push(200, &auth_body("tok-1"));
    let (desk, tokens) = desk(&transport, None);

    let user = desk.session().login("ada@example.com", "secret1").await.unwrap();

    assert_eq!(user.email, "ada@example.com");
    assert_eq!(tokens.load().unwrap().as_deref(), Some("tok-1"));
    let state = desk.session().state();
    assert_eq!(state.user, Some(user));
    assert_eq!(state.error, None);

    let request = &transport.requests()[0];
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "email": "ada@example.com", "password": "secret1" })
    );
}

#[tokio::test]
async fn login_failure_surfaces_server_message_without_refresh() {
    let transport = ScriptedTransport::new();
    transport.push(401, &error_body("Invalid email or password"));
    let (desk, tokens) = desk(&transport, None);

    let err = desk.session().login("ada@example.com", "nope").await.unwrap_err();

    assert_eq!(err.message(), "Invalid email or password");
    assert_eq!(transport.calls(), vec!["POST /auth/login"]);
    assert_eq!(tokens.load().unwrap(), None);
    let state = desk.session().state();
    assert!(state.user.is_none());
    assert_eq!(state.error.as_deref(), Some("Invalid email or password"));
}

#[tokio::test]
async fn login_failure_without_message_uses_default() {
    let transport = ScriptedTransport::new();
    transport.push_error(ApiError::Transport("connection refused".to_string()));
    let (desk, _) = desk(&transport, None);

    let err = desk.session().login("ada@example.com", "secret1").await.unwrap_err();

    assert_eq!(err.message(), "An error occurred during login");
    assert_eq!(
        desk.session().state().error.as_deref(),
        Some("An error occurred during login")
    );
}

#[tokio::test]
async fn login_clears_a_previous_error() {
    let transport = ScriptedTransport::new();
    transport.push(200, &auth_body("tok-1"));
    let (desk, _) = desk(&transport, None);
    desk.session().set_error(Some("stale".to_string()));

    desk.session().login("ada@example.com", "secret1").await.unwrap();

    assert_eq!(desk.session().state().error, None);
}

#[tokio::test]
async fn register_posts_all_fields_and_signs_in() {
    let transport = ScriptedTransport::new();
    transport.push(201, &auth_body("tok-new"));
    let (desk, tokens) = desk(&transport, None);

    let user = desk
        .session()
        .register("ada", "ada@example.com", "secret1")
        .await
        .unwrap();

    assert_eq!(user.username, "ada");
    assert_eq!(tokens.load().unwrap().as_deref(), Some("tok-new"));
    assert_eq!(transport.calls(), vec!["POST /auth/register"]);
    let body: serde_json::Value =
        serde_json::from_str(transport.requests()[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["username"], "ada");
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["password"], "secret1");
}

#[tokio::test]
async fn register_failure_uses_default_when_body_is_empty() {
    let transport = ScriptedTransport::new();
    transport.push(500, "");
    let (desk, _) = desk(&transport, None);

    let err = desk
        .session()
        .register("ada", "ada@example.com", "secret1")
        .await
        .unwrap_err();

    assert_eq!(err.message(), "An error occurred during registration");
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logout_clears_token_and_user() {
    let transport = ScriptedTransport::new();
    transport.push(200, &auth_body("tok-1"));
    transport.push(200, LOGOUT_OK);
    let (desk, tokens) = desk(&transport, None);
    desk.session().login("ada@example.com", "secret1").await.unwrap();

    desk.session().logout().await;

    assert_eq!(transport.calls(), vec!["POST /auth/login", "POST /auth/logout"]);
    assert_eq!(
        transport.requests()[1].header("authorization"),
        Some("Bearer tok-1")
    );
    assert_eq!(tokens.load().unwrap(), None);
    let state = desk.session().state();
    assert!(state.user.is_none());
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn logout_server_failure_still_clears_locally() {
    let transport = ScriptedTransport::new();
    transport.push(200, &auth_body("tok-1"));
    transport.push_error(ApiError::Transport("connection reset".to_string()));
    let (desk, tokens) = desk(&transport, None);
    desk.session().login("ada@example.com", "secret1").await.unwrap();

    desk.session().logout().await;

    assert_eq!(tokens.load().unwrap(), None);
    let state = desk.session().state();
    assert!(state.user.is_none());
    assert_eq!(state.error.as_deref(), Some("An error occurred during logout"));
}

// ---------------------------------------------------------------------------
// Startup check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn check_auth_without_token_makes_no_request() {
    let transport = ScriptedTransport::new();
    let (desk, _) = desk(&transport, None);
    assert!(desk.session().state().loading);

    desk.session().check_auth().await;

    assert!(transport.requests().is_empty());
    let state = desk.session().state();
    assert!(!state.loading);
    assert!(state.user.is_none());
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn check_auth_restores_user_through_refresh() {
    let transport = ScriptedTransport::new();
    transport.push(200, &auth_body("tok-2"));
    let (desk, tokens) = desk(&transport, Some("tok-1"));

    desk.session().check_auth().await;

    assert_eq!(transport.calls(), vec!["POST /auth/refresh"]);
    assert_eq!(tokens.load().unwrap().as_deref(), Some("tok-2"));
    let state = desk.session().state();
    assert!(!state.loading);
    assert_eq!(state.user.map(|u| u.username).as_deref(), Some("ada"));
}

#[tokio::test]
async fn check_auth_failure_drops_token() {
    let transport = ScriptedTransport::new();
    transport.push(401, &error_body("Invalid refresh token"));
    let (desk, tokens) = desk(&transport, Some("tok-1"));

    desk.session().check_auth().await;

    assert_eq!(transport.calls(), vec!["POST /auth/refresh"]);
    assert_eq!(tokens.load().unwrap(), None);
    let state = desk.session().state();
    assert!(!state.loading);
    assert!(state.user.is_none());
    assert_eq!(state.error.as_deref(), Some("Invalid refresh token"));
}

#[tokio::test]
async fn check_auth_failure_without_message_reports_expired_session() {
    let transport = ScriptedTransport::new();
    transport.push(500, "");
    let (desk, _) = desk(&transport, Some("tok-1"));

    desk.session().check_auth().await;

    assert_eq!(desk.session().state().error.as_deref(), Some("Session expired"));
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribers_see_login_and_logout() {
    let transport = ScriptedTransport::new();
    transport.push(200, &auth_body("tok-1"));
    transport.push(200, LOGOUT_OK);
    let (desk, _) = desk(&transport, None);
    let mut rx = desk.session().subscribe();

    desk.session().login("ada@example.com", "secret1").await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().user.is_some());

    desk.session().logout().await;
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().user.is_none());
}

#[tokio::test]
async fn set_error_replaces_and_clears() {
    let transport = ScriptedTransport::new();
    let (desk, _) = desk(&transport, None);

    desk.session().set_error(Some("Form invalid".to_string()));
    assert_eq!(desk.session().state().error.as_deref(), Some("Form invalid"));

    desk.session().set_error(None);
    assert_eq!(desk.session().state().error, None);
}
