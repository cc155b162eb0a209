//! Shared fixtures for the gateway and session tests.
//!
//! `ScriptedTransport` records every request it receives and answers with
//! the next queued response, so a test can assert exactly which calls the
//! refresh protocol made and in what order.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use taskdesk_core::{
    ApiError, ClientConfig, HttpRequest, HttpResponse, MemoryTokenStore, TaskDesk, TokenStore,
    Transport,
};

pub const BASE_URL: &str = "http://localhost:8000/api";

#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
    }

    pub fn push_error(&self, error: ApiError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `"METHOD path"` of every request, in order.
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method.as_str(), r.path.trim_start_matches(BASE_URL)))
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.trim_start_matches(BASE_URL) == path)
            .count()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted response left".to_string())))
    }
}

/// A client wired to `transport`, with the given token already stored.
pub fn desk(transport: &Arc<ScriptedTransport>, token: Option<&str>) -> (TaskDesk, Arc<MemoryTokenStore>) {
    let tokens = Arc::new(match token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::new(),
    });
    let transport: Arc<dyn Transport> = transport.clone();
    let store: Arc<dyn TokenStore> = tokens.clone();
    (TaskDesk::new(&ClientConfig::new(BASE_URL), transport, store), tokens)
}

pub fn user_json() -> &'static str {
    r#"{"id":1,"username":"ada","email":"ada@example.com",
        "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}"#
}

pub fn auth_body(token: &str) -> String {
    format!(
        r#"{{"status":"success","data":{{"user":{},"accessToken":"{token}"}}}}"#,
        user_json()
    )
}

pub fn task_json(id: i64) -> String {
    format!(
        r#"{{"id":{id},"title":"Task {id}","description":null,"completed":false,
            "priority":"medium","dueDate":null,"userId":1,
            "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}}"#
    )
}

pub fn task_body(id: i64) -> String {
    format!(r#"{{"status":"success","data":{{"task":{}}}}}"#, task_json(id))
}

pub fn list_body(ids: &[i64]) -> String {
    let tasks: Vec<String> = ids.iter().map(|id| task_json(*id)).collect();
    format!(
        r#"{{"status":"success","data":{{"tasks":[{}],
            "pagination":{{"total":{},"page":1,"totalPages":1}}}}}}"#,
        tasks.join(","),
        ids.len()
    )
}

pub fn error_body(message: &str) -> String {
    format!(r#"{{"status":"error","message":"{message}"}}"#)
}

pub const LOGOUT_OK: &str = r#"{"status":"success","message":"Logged out successfully"}"#;
