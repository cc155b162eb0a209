//! Async task operations over the gateway.
//!
//! Each call builds its request with `TaskClient`, sends it through the
//! gateway (bearer token, refresh on 401) and parses the payload. Any failure
//! becomes a `ResourceError` holding the server's message, or the
//! operation's default message when the server gave none.

use std::sync::Arc;

use tracing::error;

use crate::client::TaskClient;
use crate::error::{ApiError, ResourceError};
use crate::gateway::Gateway;
use crate::types::{CreateTask, Task, TaskFilters, TaskPage, UpdateTask};

const FETCH_TASKS_FAILED: &str = "Failed to fetch tasks";
const FETCH_TASK_FAILED: &str = "Failed to fetch task";
const CREATE_TASK_FAILED: &str = "Failed to create task";
const UPDATE_TASK_FAILED: &str = "Failed to update task";
const DELETE_TASK_FAILED: &str = "Failed to delete task";
const TOGGLE_TASK_FAILED: &str = "Failed to update task completion status";
const FETCH_FILTERED_FAILED: &str = "Failed to fetch filtered tasks";

#[derive(Clone)]
pub struct TaskService {
    client: TaskClient,
    gateway: Arc<Gateway>,
}

impl TaskService {
    pub fn new(base_url: &str, gateway: Arc<Gateway>) -> Self {
        Self {
            client: TaskClient::new(base_url),
            gateway,
        }
    }

    pub async fn get_tasks(&self, filters: &TaskFilters) -> Result<TaskPage, ResourceError> {
        let outcome = self.gateway.send(self.client.build_list_tasks(filters)).await;
        let outcome = outcome.and_then(|response| self.client.parse_list_tasks(response));
        wrap(outcome, "get tasks", FETCH_TASKS_FAILED)
    }

    pub async fn get_task(&self, id: i64) -> Result<Task, ResourceError> {
        let outcome = self.gateway.send(self.client.build_get_task(id)).await;
        let outcome = outcome.and_then(|response| self.client.parse_task(response));
        wrap(outcome, "get task", FETCH_TASK_FAILED)
    }

    pub async fn create_task(&self, input: &CreateTask) -> Result<Task, ResourceError> {
        let outcome = match self.client.build_create_task(input) {
            Ok(request) => self.gateway.send(request).await,
            Err(e) => Err(e),
        };
        let outcome = outcome.and_then(|response| self.client.parse_task(response));
        wrap(outcome, "create task", CREATE_TASK_FAILED)
    }

    pub async fn update_task(&self, id: i64, input: &UpdateTask) -> Result<Task, ResourceError> {
        let outcome = match self.client.build_update_task(id, input) {
            Ok(request) => self.gateway.send(request).await,
            Err(e) => Err(e),
        };
        let outcome = outcome.and_then(|response| self.client.parse_task(response));
        wrap(outcome, "update task", UPDATE_TASK_FAILED)
    }

    /// Returns the server's confirmation message.
    pub async fn delete_task(&self, id: i64) -> Result<String, ResourceError> {
        let outcome = self.gateway.send(self.client.build_delete_task(id)).await;
        let outcome = outcome.and_then(|response| self.client.parse_delete_task(response));
        wrap(outcome, "delete task", DELETE_TASK_FAILED)
    }

    pub async fn toggle_task_completion(
        &self,
        id: i64,
        completed: bool,
    ) -> Result<Task, ResourceError> {
        let outcome = match self.client.build_toggle_completion(id, completed) {
            Ok(request) => self.gateway.send(request).await,
            Err(e) => Err(e),
        };
        let outcome = outcome.and_then(|response| self.client.parse_task(response));
        wrap(outcome, "toggle task completion", TOGGLE_TASK_FAILED)
    }

    /// List with `createdAt`/`DESC`/page 1/limit 10 defaults; unset filters
    /// are not sent at all.
    pub async fn get_filtered_tasks(&self, filters: &TaskFilters) -> Result<TaskPage, ResourceError> {
        let outcome = self.gateway.send(self.client.build_filtered_tasks(filters)).await;
        let outcome = outcome.and_then(|response| self.client.parse_list_tasks(response));
        wrap(outcome, "get filtered tasks", FETCH_FILTERED_FAILED)
    }
}

fn wrap<T>(outcome: Result<T, ApiError>, operation: &str, default: &str) -> Result<T, ResourceError> {
    outcome.map_err(|e| {
        let message = e.message_or(default);
        error!(operation, error = %e, message = %message, "task request failed");
        ResourceError::new(message)
    })
}
