use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    /// Absent leaves the field alone; `null` clears it.
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    pub completed: Option<String>,
    pub priority: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn default_priority() -> Priority {
    Priority::Medium
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct Store {
    next_user_id: i64,
    next_task_id: i64,
    accounts: HashMap<i64, Account>,
    access_tokens: HashMap<String, i64>,
    refresh_tokens: HashMap<String, i64>,
    tasks: HashMap<i64, Task>,
    refresh_calls: u64,
}

impl Store {
    fn issue_tokens(&mut self, user_id: i64) -> (String, String) {
        let access = Uuid::new_v4().to_string();
        let refresh = Uuid::new_v4().to_string();
        self.access_tokens.insert(access.clone(), user_id);
        self.refresh_tokens.insert(refresh.clone(), user_id);
        (access, refresh)
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Shared backend state. Tests keep a clone to force token expiry.
#[derive(Clone, Default)]
pub struct MockState {
    db: Db,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every issued access token; refresh tokens stay valid.
    pub async fn expire_access_tokens(&self) {
        self.db.write().await.access_tokens.clear();
    }

    /// Invalidate every refresh token, so the next refresh fails.
    pub async fn revoke_refresh_tokens(&self) {
        self.db.write().await.refresh_tokens.clear();
    }

    /// Number of `/auth/refresh` calls received so far.
    pub async fn refresh_calls(&self) -> u64 {
        self.db.read().await.refresh_calls
    }
}

/// Error body `{status: "error", message}` with its status code.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn task_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Task not found")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = Json(json!({ "status": "error", "message": self.message }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiFailure>;

pub fn app() -> Router {
    app_with_state(MockState::new())
}

pub fn app_with_state(state: MockState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).put(update_task).delete(delete_task));
    Router::new().nest("/api", api).with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, MockState::new()).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn refresh_cookie(token: &str) -> HeaderValue {
    let cookie = format!("{REFRESH_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax");
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn cleared_cookie() -> HeaderValue {
    HeaderValue::from_static("refreshToken=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax")
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| pair.trim().strip_prefix(&format!("{name}=")).map(str::to_string))
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn authenticate(store: &Store, headers: &HeaderMap) -> ApiResult<i64> {
    let token = bearer_token(headers).ok_or_else(|| ApiFailure::unauthorized("Not authorized"))?;
    store
        .access_tokens
        .get(token)
        .copied()
        .ok_or_else(|| ApiFailure::unauthorized("Invalid or expired token"))
}

fn session_response(status: StatusCode, user: &User, access: &str, refresh: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, refresh_cookie(refresh));
    let body = json!({
        "status": "success",
        "data": { "user": user, "accessToken": access },
    });
    (status, headers, Json(body)).into_response()
}

fn task_response(status: StatusCode, task: &Task) -> Response {
    (status, Json(json!({ "status": "success", "data": { "task": task } }))).into_response()
}

async fn register(State(state): State<MockState>, Json(input): Json<RegisterInput>) -> ApiResult<Response> {
    if input.username.trim().is_empty() || input.email.trim().is_empty() {
        return Err(ApiFailure::bad_request("Username and email are required"));
    }
    if input.password.len() < 6 {
        return Err(ApiFailure::bad_request("Password must be at least 6 characters"));
    }

    let mut store = state.db.write().await;
    if store.accounts.values().any(|a| a.user.email == input.email) {
        return Err(ApiFailure::new(StatusCode::CONFLICT, "Email already registered"));
    }

    store.next_user_id += 1;
    let now = Utc::now();
    let user = User {
        id: store.next_user_id,
        username: input.username,
        email: input.email,
        created_at: now,
        updated_at: now,
    };
    store.accounts.insert(
        user.id,
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    let (access, refresh) = store.issue_tokens(user.id);
    info!(user_id = user.id, "user registered");
    Ok(session_response(StatusCode::CREATED, &user, &access, &refresh))
}

async fn login(State(state): State<MockState>, Json(input): Json<LoginInput>) -> ApiResult<Response> {
    let mut store = state.db.write().await;
    let user = store
        .accounts
        .values()
        .find(|a| a.user.email == input.email && a.password == input.password)
        .map(|a| a.user.clone())
        .ok_or_else(|| ApiFailure::unauthorized("Invalid email or password"))?;
    let (access, refresh) = store.issue_tokens(user.id);
    info!(user_id = user.id, "user logged in");
    Ok(session_response(StatusCode::OK, &user, &access, &refresh))
}

async fn refresh(State(state): State<MockState>, headers: HeaderMap) -> ApiResult<Response> {
    let mut store = state.db.write().await;
    store.refresh_calls += 1;
    let presented = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiFailure::unauthorized("Refresh token missing"))?;
    let Some(user_id) = store.refresh_tokens.remove(&presented) else {
        warn!("refresh with unknown token");
        return Err(ApiFailure::unauthorized("Invalid refresh token"));
    };
    let user = store
        .accounts
        .get(&user_id)
        .map(|a| a.user.clone())
        .ok_or_else(|| ApiFailure::unauthorized("Invalid refresh token"))?;
    let (access, rotated) = store.issue_tokens(user_id);
    Ok(session_response(StatusCode::OK, &user, &access, &rotated))
}

async fn logout(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Some(token) = cookie_value(&headers, REFRESH_COOKIE) {
        state.db.write().await.refresh_tokens.remove(&token);
    }
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, cleared_cookie());
    let body = Json(json!({ "status": "success", "message": "Logged out successfully" }));
    (StatusCode::OK, response_headers, body).into_response()
}

fn compare(a: &Task, b: &Task, sort_by: &str) -> Ordering {
    let primary = match sort_by {
        "title" => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        "priority" => a.priority.rank().cmp(&b.priority.rank()),
        "dueDate" => a.due_date.cmp(&b.due_date),
        "updatedAt" => a.updated_at.cmp(&b.updated_at),
        _ => a.created_at.cmp(&b.created_at),
    };
    primary.then(a.id.cmp(&b.id))
}

async fn list_tasks(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let store = state.db.read().await;
    let user_id = authenticate(&store, &headers)?;

    let completed = match params.completed.as_deref() {
        None => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(_) => return Err(ApiFailure::bad_request("completed must be true or false")),
    };
    let priority = match params.priority.as_deref() {
        None => None,
        Some(raw) => Some(
            Priority::parse(raw).ok_or_else(|| ApiFailure::bad_request("Invalid priority"))?,
        ),
    };
    let search = params.search.as_deref().map(str::to_lowercase);

    let mut tasks: Vec<Task> = store
        .tasks
        .values()
        .filter(|t| t.user_id == user_id)
        .filter(|t| completed.map_or(true, |c| t.completed == c))
        .filter(|t| priority.map_or(true, |p| t.priority == p))
        .filter(|t| {
            search.as_deref().map_or(true, |needle| {
                t.title.to_lowercase().contains(needle)
                    || t.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(needle))
            })
        })
        .cloned()
        .collect();

    let sort_by = params.sort_by.as_deref().unwrap_or("createdAt");
    let descending = !params.order.as_deref().is_some_and(|o| o.eq_ignore_ascii_case("ASC"));
    tasks.sort_by(|a, b| {
        let ordering = compare(a, b, sort_by);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let total = tasks.len() as u64;
    let total_pages = total.div_ceil(u64::from(limit));
    let tasks: Vec<Task> = tasks
        .into_iter()
        .skip((u64::from(page - 1) * u64::from(limit)) as usize)
        .take(limit as usize)
        .collect();

    let body = json!({
        "status": "success",
        "data": {
            "tasks": tasks,
            "pagination": { "total": total, "page": page, "totalPages": total_pages },
        },
    });
    Ok(Json(body).into_response())
}

async fn create_task(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(input): Json<CreateTaskInput>,
) -> ApiResult<Response> {
    let mut store = state.db.write().await;
    let user_id = authenticate(&store, &headers)?;
    if input.title.trim().is_empty() {
        return Err(ApiFailure::bad_request("Title is required"));
    }

    store.next_task_id += 1;
    let now = Utc::now();
    let task = Task {
        id: store.next_task_id,
        title: input.title,
        description: input.description,
        completed: false,
        priority: input.priority,
        due_date: input.due_date,
        user_id,
        created_at: now,
        updated_at: now,
    };
    store.tasks.insert(task.id, task.clone());
    Ok(task_response(StatusCode::CREATED, &task))
}

async fn get_task(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let store = state.db.read().await;
    let user_id = authenticate(&store, &headers)?;
    let task = store
        .tasks
        .get(&id)
        .filter(|t| t.user_id == user_id)
        .ok_or_else(ApiFailure::task_not_found)?;
    Ok(task_response(StatusCode::OK, task))
}

async fn update_task(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTaskInput>,
) -> ApiResult<Response> {
    let mut store = state.db.write().await;
    let user_id = authenticate(&store, &headers)?;
    let task = store
        .tasks
        .get_mut(&id)
        .filter(|t| t.user_id == user_id)
        .ok_or_else(ApiFailure::task_not_found)?;
    if let Some(title) = input.title {
        if title.trim().is_empty() {
            return Err(ApiFailure::bad_request("Title is required"));
        }
        task.title = title;
    }
    if let Some(description) = input.description {
        task.description = description;
    }
    if let Some(completed) = input.completed {
        task.completed = completed;
    }
    if let Some(priority) = input.priority {
        task.priority = priority;
    }
    if let Some(due_date) = input.due_date {
        task.due_date = due_date;
    }
    task.updated_at = Utc::now();
    Ok(task_response(StatusCode::OK, task))
}

async fn delete_task(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let mut store = state.db.write().await;
    let user_id = authenticate(&store, &headers)?;
    if !store.tasks.get(&id).is_some_and(|t| t.user_id == user_id) {
        return Err(ApiFailure::task_not_found());
    }
    store.tasks.remove(&id);
    let body = json!({ "status": "success", "message": "Task deleted successfully" });
    Ok(Json(body).into_response())
}
