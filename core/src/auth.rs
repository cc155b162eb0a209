//! Stateless request builder and response parser for the auth endpoints.
//!
//! Login, register and refresh all answer with `{user, accessToken}`; logout
//! answers with a bare message. The refresh call carries no body: the
//! backend authenticates it with the refresh cookie kept by the transport.

use crate::client::{json_request, parse_data, parse_message};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{AuthPayload, LoginRequest, RegisterRequest};

#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Post, format!("{}/auth/login", self.base_url), input)
    }

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Post, format!("{}/auth/register", self.base_url), input)
    }

    pub fn build_refresh(&self) -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, format!("{}/auth/refresh", self.base_url))
    }

    pub fn build_logout(&self) -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, format!("{}/auth/logout", self.base_url))
    }

    /// Parse the response of login, register or refresh.
    pub fn parse_session(&self, response: HttpResponse) -> Result<AuthPayload, ApiError> {
        parse_data(&response)
    }

    pub fn parse_logout(&self, response: HttpResponse) -> Result<String, ApiError> {
        parse_message(&response)
    }
}
