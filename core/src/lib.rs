//! Async API client for the task service, with session token lifecycle.
//!
//! # Overview
//! Requests are built and parsed as plain data (`AuthClient`, `TaskClient`)
//! and executed through a `Transport`. A single `Gateway` sits in between:
//! it attaches the stored bearer token to every request and, on a 401,
//! refreshes the token once and replays the request once.
//!
//! # Design
//! - `Session` covers login, register, logout and the startup check, and
//!   exposes the shared `{ user, loading, error }` state.
//! - `TaskService` wraps every task operation and fails with
//!   `ResourceError`; `Session` fails with `AuthError`. Raw transport errors
//!   never reach callers.
//! - Session state has one owner, the gateway's `SessionHandle`; concurrent
//!   401s share one in-flight refresh.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod session;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod transport;
pub mod types;

use std::sync::Arc;

pub use auth::AuthClient;
pub use client::TaskClient;
pub use config::ClientConfig;
pub use error::{ApiError, AuthError, ConfigError, ResourceError};
pub use gateway::Gateway;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::Session;
pub use state::{SessionHandle, SessionState};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY};
pub use tasks::TaskService;
pub use transport::{Transport, UreqTransport};
pub use types::{
    AuthPayload, CreateTask, Pagination, Priority, SortField, SortOrder, Task, TaskFilters,
    TaskPage, UpdateTask, User,
};

/// A session store and a task service sharing one gateway.
#[derive(Clone)]
pub struct TaskDesk {
    gateway: Arc<Gateway>,
    session: Session,
    tasks: TaskService,
}

impl TaskDesk {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let gateway = Arc::new(Gateway::new(config, transport, tokens));
        Self {
            session: Session::new(Arc::clone(&gateway)),
            tasks: TaskService::new(&config.base_url, Arc::clone(&gateway)),
            gateway,
        }
    }

    /// Wire a `UreqTransport` and the token store the config asks for: a
    /// `FileTokenStore` when `token_file` is set, memory otherwise.
    pub fn from_config(config: &ClientConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(UreqTransport::new(config.timeout));
        let tokens: Arc<dyn TokenStore> = match &config.token_file {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Self::new(config, transport, tokens)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::from_config(&ClientConfig::from_env()?))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}
