//! Full session and task lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `TaskDesk` over real
//! HTTP with `UreqTransport`. The refresh cookie travels through ureq's
//! cookie jar, so the silent refresh path runs exactly as it would against
//! the real backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mock_server::MockState;
use taskdesk_core::{
    ClientConfig, CreateTask, MemoryTokenStore, Priority, SortField, SortOrder, TaskDesk,
    TaskFilters, TokenStore, Transport, UpdateTask, UreqTransport,
};

/// Serve the mock backend on a random port and return its API base URL.
async fn start_server(state: MockState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run_with_state(listener, state));
    format!("http://{addr}/api")
}

fn connect(base_url: &str) -> (TaskDesk, Arc<MemoryTokenStore>) {
    let config = ClientConfig::new(base_url);
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::new(Some(Duration::from_secs(5))));
    let tokens = Arc::new(MemoryTokenStore::new());
    let store: Arc<dyn TokenStore> = tokens.clone();
    (TaskDesk::new(&config, transport, store), tokens)
}

fn new_task(title: &str, priority: Priority) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: None,
        priority,
        due_date: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn task_lifecycle() {
    let base_url = start_server(MockState::new()).await;
    let (desk, tokens) = connect(&base_url);
    let tasks = desk.tasks();

    // Step 1: register signs the user in.
    let user = desk
        .session()
        .register("ada", "ada@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert!(tokens.load().unwrap().is_some());

    // Step 2: empty list.
    let page = tasks.get_tasks(&TaskFilters::default()).await.unwrap();
    assert!(page.tasks.is_empty());
    assert_eq!(page.pagination.total, 0);

    // Step 3: create.
    let milk = tasks.create_task(&new_task("Buy milk", Priority::Low)).await.unwrap();
    let walk = tasks.create_task(&new_task("Walk dog", Priority::High)).await.unwrap();
    assert_eq!(milk.title, "Buy milk");
    assert!(!milk.completed);
    assert_eq!(milk.user_id, user.id);

    // Step 4: get.
    let fetched = tasks.get_task(milk.id).await.unwrap();
    assert_eq!(fetched, milk);

    // Step 5: partial update keeps the other fields.
    let due = Utc.with_ymd_and_hms(2030, 6, 1, 9, 0, 0).unwrap();
    let update = UpdateTask {
        description: Some(Some("two litres".to_string())),
        due_date: Some(Some(due)),
        ..UpdateTask::default()
    };
    let updated = tasks.update_task(milk.id, &update).await.unwrap();
    assert_eq!(updated.title, "Buy milk");
    assert_eq!(updated.description.as_deref(), Some("two litres"));
    assert_eq!(updated.due_date, Some(due));
    assert_eq!(updated.priority, Priority::Low);

    // Step 5b: an explicit null removes the due date and nothing else.
    let clear = UpdateTask {
        due_date: Some(None),
        ..UpdateTask::default()
    };
    let cleared = tasks.update_task(milk.id, &clear).await.unwrap();
    assert_eq!(cleared.due_date, None);
    assert_eq!(cleared.description.as_deref(), Some("two litres"));

    // Step 6: toggle.
    let toggled = tasks.toggle_task_completion(walk.id, true).await.unwrap();
    assert!(toggled.completed);

    // Step 7: filters.
    let done = tasks
        .get_tasks(&TaskFilters {
            completed: Some(true),
            ..TaskFilters::default()
        })
        .await
        .unwrap();
    assert_eq!(done.tasks.len(), 1);
    assert_eq!(done.tasks[0].id, walk.id);

    let sorted = tasks
        .get_filtered_tasks(&TaskFilters {
            sort_by: Some(SortField::Title),
            order: Some(SortOrder::Desc),
            ..TaskFilters::default()
        })
        .await
        .unwrap();
    let titles: Vec<&str> = sorted.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Walk dog", "Buy milk"]);
    assert_eq!(sorted.pagination.page, 1);

    let searched = tasks
        .get_filtered_tasks(&TaskFilters {
            search: Some("MILK".to_string()),
            ..TaskFilters::default()
        })
        .await
        .unwrap();
    assert_eq!(searched.tasks.len(), 1);
    assert_eq!(searched.tasks[0].id, milk.id);

    // Step 8: delete, then the task is gone.
    let message = tasks.delete_task(milk.id).await.unwrap();
    assert_eq!(message, "Task deleted successfully");
    let err = tasks.get_task(milk.id).await.unwrap_err();
    assert_eq!(err.message(), "Task not found");
    // the rejection is also recorded in the shared error
    assert_eq!(desk.session().state().error.as_deref(), Some("Task not found"));

    // Step 9: logout keeps the recorded error and drops the session.
    desk.session().logout().await;
    assert!(tokens.load().unwrap().is_none());
    assert!(desk.session().current_user().is_none());
    assert_eq!(desk.session().state().error.as_deref(), Some("Task not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_access_token_is_refreshed_silently() {
    let state = MockState::new();
    let base_url = start_server(state.clone()).await;
    let (desk, tokens) = connect(&base_url);

    desk.session().login("nobody@example.com", "secret1").await.unwrap_err();
    desk.session()
        .register("ada", "ada@example.com", "secret1")
        .await
        .unwrap();
    let first = tokens.load().unwrap().unwrap();
    let created = desk
        .tasks()
        .create_task(&new_task("Survive expiry", Priority::Medium))
        .await
        .unwrap();

    state.expire_access_tokens().await;

    let fetched = desk.tasks().get_task(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(state.refresh_calls().await, 1);
    let second = tokens.load().unwrap().unwrap();
    assert_ne!(first, second);
    assert!(desk.session().current_user().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn revoked_refresh_token_ends_the_session() {
    let state = MockState::new();
    let base_url = start_server(state.clone()).await;
    let (desk, tokens) = connect(&base_url);

    desk.session()
        .register("ada", "ada@example.com", "secret1")
        .await
        .unwrap();
    state.expire_access_tokens().await;
    state.revoke_refresh_tokens().await;

    let err = desk.tasks().get_tasks(&TaskFilters::default()).await.unwrap_err();

    assert_eq!(err.message(), "Invalid refresh token");
    assert_eq!(state.refresh_calls().await, 1);
    assert!(tokens.load().unwrap().is_none());
    assert!(desk.session().current_user().is_none());
    assert_eq!(
        desk.session().state().error.as_deref(),
        Some("Invalid refresh token")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn check_auth_restores_session_from_cookie() {
    let base_url = start_server(MockState::new()).await;
    let (desk, _) = connect(&base_url);
    desk.session()
        .register("ada", "ada@example.com", "secret1")
        .await
        .unwrap();

    desk.session().check_auth().await;

    let state = desk.session().state();
    assert!(!state.loading);
    assert_eq!(state.user.map(|u| u.email).as_deref(), Some("ada@example.com"));
}
