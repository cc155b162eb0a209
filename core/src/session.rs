//! Session store: login, register, logout and the startup session check.
//!
//! # Design
//! `Session` owns no state of its own; it drives the gateway's
//! `SessionHandle` and token store. Login and register clear the shared
//! error when they start and replace it when they fail. Logout and
//! `check_auth` never fail outward: their errors land in the shared
//! `error` field only.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::error;

use crate::error::{ApiError, AuthError, SESSION_EXPIRED};
use crate::gateway::Gateway;
use crate::http::HttpRequest;
use crate::state::SessionState;
use crate::types::{AuthPayload, LoginRequest, RegisterRequest, User};

pub const LOGIN_FAILED: &str = "An error occurred during login";
pub const REGISTER_FAILED: &str = "An error occurred during registration";

#[derive(Clone)]
pub struct Session {
    gateway: Arc<Gateway>,
}

impl Session {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.gateway.session().set_error(None);
        let input = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let outcome = match self.gateway.auth().build_login(&input) {
            Ok(request) => self.authenticate(request).await,
            Err(e) => Err(e),
        };
        self.finish_authentication(outcome, LOGIN_FAILED, "login failed")
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        self.gateway.session().set_error(None);
        let input = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let outcome = match self.gateway.auth().build_register(&input) {
            Ok(request) => self.authenticate(request).await,
            Err(e) => Err(e),
        };
        self.finish_authentication(outcome, REGISTER_FAILED, "registration failed")
    }

    /// Invalidate the session on the server if possible; the local token and
    /// user are cleared whatever the server says.
    pub async fn logout(&self) {
        self.gateway.logout().await;
    }

    /// Startup check. Without a stored token the session stays empty. With
    /// one, a silent refresh either restores the user or drops the token.
    pub async fn check_auth(&self) {
        let state = self.gateway.session();
        match self.gateway.access_token() {
            Ok(Some(_)) => match self.gateway.refresh_token().await {
                Ok(payload) => state.set_user(payload.user),
                Err(e) => {
                    let message = e.message_or(SESSION_EXPIRED);
                    error!(error = %e, message = %message, "session check failed");
                    state.set_error(Some(message));
                    self.gateway.end_session();
                }
            },
            Ok(None) => {}
            Err(e) => {
                let message = e.message_or(SESSION_EXPIRED);
                error!(error = %e, message = %message, "session check could not read the token");
                state.set_error(Some(message));
            }
        }
        state.finish_loading();
    }

    /// Set or clear the shared error from outside, e.g. when a form is reset.
    pub fn set_error(&self, error: Option<String>) {
        self.gateway.session().set_error(error);
    }

    pub fn current_user(&self) -> Option<User> {
        self.gateway.session().user()
    }

    pub fn state(&self) -> SessionState {
        self.gateway.session().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.gateway.session().subscribe()
    }

    async fn authenticate(&self, request: HttpRequest) -> Result<AuthPayload, ApiError> {
        let response = self.gateway.send_once(request).await?;
        let payload = self.gateway.auth().parse_session(response)?;
        self.gateway.store_token(&payload.access_token)?;
        Ok(payload)
    }

    fn finish_authentication(
        &self,
        outcome: Result<AuthPayload, ApiError>,
        default: &str,
        what: &str,
    ) -> Result<User, AuthError> {
        match outcome {
            Ok(payload) => {
                self.gateway.session().set_user(payload.user.clone());
                Ok(payload.user)
            }
            Err(e) => {
                let message = e.message_or(default);
                error!(error = %e, message = %message, "{what}");
                self.gateway.session().set_error(Some(message.clone()));
                Err(AuthError::new(message))
            }
        }
    }
}
