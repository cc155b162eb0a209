//! Stateless HTTP request builder and response parser for the task resource.
//!
//! # Design
//! `TaskClient` holds only a `base_url` and carries no mutable state between
//! calls. Each task operation is split into a `build_*` method that produces
//! an `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Authorization and refresh are added by the `Gateway`, not here.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{check_success, ApiError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CreateTask, Envelope, MessageBody, Task, TaskData, TaskFilters, TaskPage, UpdateTask,
};

/// Synchronous, stateless request builder for `/tasks`.
#[derive(Debug, Clone)]
pub struct TaskClient {
    base_url: String,
}

impl TaskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// List tasks with the caller's filters as given. Unset fields are left
    /// out of the query and no defaults are applied.
    pub fn build_list_tasks(&self, filters: &TaskFilters) -> HttpRequest {
        let mut req = HttpRequest::new(HttpMethod::Get, format!("{}/tasks", self.base_url));
        req.query = filters.to_query();
        req
    }

    /// List tasks with sort and paging defaults filled in. Unset filters are
    /// stripped, so the server sees them as absent rather than empty.
    pub fn build_filtered_tasks(&self, filters: &TaskFilters) -> HttpRequest {
        self.build_list_tasks(&filters.clone().with_defaults())
    }

    pub fn build_get_task(&self, id: i64) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, format!("{}/tasks/{id}", self.base_url))
    }

    pub fn build_create_task(&self, input: &CreateTask) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Post, format!("{}/tasks", self.base_url), input)
    }

    pub fn build_update_task(&self, id: i64, input: &UpdateTask) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Put, format!("{}/tasks/{id}", self.base_url), input)
    }

    /// Flip completion only; the body carries nothing but `completed`.
    pub fn build_toggle_completion(&self, id: i64, completed: bool) -> Result<HttpRequest, ApiError> {
        let input = UpdateTask {
            completed: Some(completed),
            ..UpdateTask::default()
        };
        self.build_update_task(id, &input)
    }

    pub fn build_delete_task(&self, id: i64) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, format!("{}/tasks/{id}", self.base_url))
    }

    pub fn parse_list_tasks(&self, response: HttpResponse) -> Result<TaskPage, ApiError> {
        parse_data(&response)
    }

    pub fn parse_task(&self, response: HttpResponse) -> Result<Task, ApiError> {
        parse_data::<TaskData>(&response).map(|data| data.task)
    }

    /// Returns the server's confirmation message.
    pub fn parse_delete_task(&self, response: HttpResponse) -> Result<String, ApiError> {
        parse_message(&response)
    }
}

/// Build a request whose body is `input` serialized as JSON.
pub(crate) fn json_request<T: Serialize>(
    method: HttpMethod,
    path: String,
    input: &T,
) -> Result<HttpRequest, ApiError> {
    let body = serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
    let mut req = HttpRequest::new(method, path);
    req.set_header("content-type", "application/json");
    req.body = Some(body);
    Ok(req)
}

/// Check for 2xx and unwrap the `data` member of the envelope.
pub(crate) fn parse_data<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_success(response)?;
    serde_json::from_str::<Envelope<T>>(&response.body)
        .map(|envelope| envelope.data)
        .map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Check for 2xx and read the `message` member, tolerating an empty body.
pub(crate) fn parse_message(response: &HttpResponse) -> Result<String, ApiError> {
    check_success(response)?;
    if response.body.trim().is_empty() {
        return Ok(String::new());
    }
    serde_json::from_str::<MessageBody>(&response.body)
        .map(|body| body.message)
        .map_err(|e| ApiError::Deserialization(e.to_string()))
}
