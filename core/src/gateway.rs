//! Shared HTTP client wrapper with the request and response interceptors.
//!
//! # Design
//! Every network call goes through one `Gateway`. It prefixes nothing itself
//! (the sans-IO clients build absolute URLs from the same base URL) but adds
//! the default headers, attaches the stored bearer token, and runs the
//! refresh protocol on the response:
//!
//! - 2xx: returned as is.
//! - 401 on a request not yet retried: the request is marked retried, one
//!   refresh is performed, the new token is stored and the original request
//!   is replayed once with it. The replay's outcome is final.
//! - anything else, or a 401 on a retried request: terminal rejection.
//! - refresh failure: logout (best-effort server call, unconditional local
//!   teardown) and rejection with the refresh's message.
//!
//! Concurrent 401s share one refresh. `RefreshGate::generation` counts
//! completed refreshes; a request reads it before it is authorized, and a
//! 401 arriving after a newer refresh finished reuses that outcome instead
//! of refreshing again.
//!
//! Auth endpoints use [`Gateway::send_once`], which authorizes but never
//! refreshes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::auth::AuthClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::state::SessionHandle;
use crate::storage::TokenStore;
use crate::transport::Transport;
use crate::types::AuthPayload;

/// Fallback message for rejected requests without a server message.
pub const REQUEST_FAILED: &str = "Request failed";
/// Fallback message for a failed best-effort logout.
pub const LOGOUT_FAILED: &str = "An error occurred during logout";

const DEFAULT_HEADERS: [(&str, &str); 3] = [
    ("content-type", "application/json"),
    ("accept", "application/json"),
    ("x-requested-with", "XMLHttpRequest"),
];

#[derive(Debug, Default)]
struct RefreshGate {
    generation: AtomicU64,
    last: Mutex<Option<Result<String, ApiError>>>,
}

pub struct Gateway {
    auth: AuthClient,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    session: SessionHandle,
    refresh: RefreshGate,
}

impl Gateway {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            auth: AuthClient::new(&config.base_url),
            transport,
            tokens,
            session: SessionHandle::new(),
            refresh: RefreshGate::default(),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn access_token(&self) -> Result<Option<String>, ApiError> {
        self.tokens.load()
    }

    pub(crate) fn store_token(&self, token: &str) -> Result<(), ApiError> {
        self.tokens.save(token)
    }

    /// Request interceptor: default headers plus the stored bearer token.
    pub fn authorize(&self, request: &mut HttpRequest) -> Result<(), ApiError> {
        for (name, value) in DEFAULT_HEADERS {
            if request.header(name).is_none() {
                request.set_header(name, value);
            }
        }
        let token = self.tokens.load().inspect_err(|e| {
            error!(error = %e, "request interceptor could not read the access token");
            self.session.set_error(Some(e.message_or(REQUEST_FAILED)));
        })?;
        if let Some(token) = token {
            request.set_header("authorization", bearer(&token));
        }
        Ok(())
    }

    /// Send a request through both interceptors. Returns the 2xx response
    /// or the terminal rejection.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.send_with_refresh(request).await.inspect_err(|e| {
            let message = e.message_or(REQUEST_FAILED);
            error!(error = %e, message = %message, "request rejected");
            self.session.set_error(Some(message));
        })
    }

    /// Send a request with the bearer token but without refresh handling.
    pub async fn send_once(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.authorize(&mut request)?;
        let response = self.transport.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        Err(ApiError::from_response(&response))
    }

    async fn send_with_refresh(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let observed = self.refresh.generation.load(Ordering::Acquire);
        self.authorize(&mut request)?;

        let response = self.transport.execute(request.clone()).await?;
        if response.is_success() {
            return Ok(response);
        }
        if response.status != 401 || request.retried {
            return Err(ApiError::from_response(&response));
        }

        request.retried = true;
        debug!(path = %request.path, "401 received, refreshing access token");
        let token = self.refresh_shared(observed).await?;
        request.set_header("authorization", bearer(&token));

        debug!(path = %request.path, "replaying request with refreshed token");
        let replay = self.transport.execute(request).await?;
        if replay.is_success() {
            return Ok(replay);
        }
        Err(ApiError::from_response(&replay))
    }

    /// Refresh once for every request that saw its 401 before the refresh
    /// finished. Returns the new token or the refresh failure.
    async fn refresh_shared(&self, observed: u64) -> Result<String, ApiError> {
        let mut last = self.refresh.last.lock().await;
        if self.refresh.generation.load(Ordering::Acquire) != observed {
            if let Some(outcome) = last.as_ref() {
                debug!("reusing refresh completed by a concurrent request");
                return outcome.clone();
            }
        }

        let outcome = match self.refresh_token().await {
            Ok(payload) => Ok(payload.access_token),
            Err(e) => {
                let message = e.message_or(crate::error::SESSION_EXPIRED);
                error!(error = %e, message = %message, "token refresh failed");
                self.logout().await;
                self.session.set_error(Some(message));
                Err(ApiError::SessionExpired(e.server_message().map(str::to_string)))
            }
        };
        *last = Some(outcome.clone());
        self.refresh.generation.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Exchange the refresh cookie for a new access token and persist it.
    pub(crate) async fn refresh_token(&self) -> Result<AuthPayload, ApiError> {
        let response = self.send_once(self.auth.build_refresh()).await?;
        let payload = self.auth.parse_session(response)?;
        self.tokens.save(&payload.access_token)?;
        Ok(payload)
    }

    /// Best-effort server logout followed by unconditional local teardown.
    pub(crate) async fn logout(&self) {
        let outcome = match self.send_once(self.auth.build_logout()).await {
            Ok(response) => self.auth.parse_logout(response).map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            let message = e.message_or(LOGOUT_FAILED);
            error!(error = %e, message = %message, "logout request failed");
            self.session.set_error(Some(message));
        }
        self.end_session();
    }

    /// Drop the stored token and the current user.
    pub(crate) fn end_session(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "could not clear the stored access token");
        }
        self.session.clear_user();
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
