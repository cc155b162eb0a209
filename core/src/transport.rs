//! The I/O seam: executes an `HttpRequest` and returns an `HttpResponse`.
//!
//! # Design
//! Non-2xx statuses come back as data, never as `Err`, so the gateway can
//! inspect 401s and extract server messages. `Err` is reserved for requests
//! that produced no response at all.
//!
//! `UreqTransport` drives a blocking `ureq` agent on tokio's blocking pool.
//! The agent keeps a cookie jar, which is how the refresh cookie set at
//! login travels back on `/auth/refresh` (credential mode).

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
    }
}

fn decorate<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    builder
}

fn execute_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, ApiError> {
    debug!(method = request.method.as_str(), path = %request.path, "sending request");

    let url = request.path.as_str();
    let result = match (request.method, request.body.as_deref()) {
        (HttpMethod::Get, _) => decorate(agent.get(url), &request).call(),
        (HttpMethod::Delete, _) => decorate(agent.delete(url), &request).call(),
        (HttpMethod::Post, Some(body)) => decorate(agent.post(url), &request).send(body.as_bytes()),
        (HttpMethod::Post, None) => decorate(agent.post(url), &request).send_empty(),
        (HttpMethod::Put, Some(body)) => decorate(agent.put(url), &request).send(body.as_bytes()),
        (HttpMethod::Put, None) => decorate(agent.put(url), &request).send_empty(),
    };
    let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
