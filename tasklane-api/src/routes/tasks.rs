/// Task endpoints
///
/// # Endpoints
///
/// - `POST /v1/tasks` - Create task
/// - `GET /v1/tasks` - List own tasks, newest first
/// - `GET /v1/tasks/:id` - Get task
/// - `PUT /v1/tasks/:id` - Partially update task
/// - `DELETE /v1/tasks/:id` - Delete task
///
/// A task that exists but belongs to someone else answers 403.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use tasklane_shared::{
    auth::context::AuthContext,
    models::task::{CreateTask, Task, TaskStatus, UpdateTask},
};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,

    /// Defaults to `todo`
    pub status: Option<TaskStatus>,
}

/// Update task request
///
/// Absent fields are left alone; `"description": null` clears the description.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Pagination query
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List tasks response
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
    pub total: i64,
}

/// Loads a task and checks the caller owns it
async fn load_owned(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Task> {
    let task = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if !task.is_owned_by(auth.user_id) {
        return Err(ApiError::Forbidden(
            "You don't have access to this task".to_string(),
        ));
    }

    Ok(task)
}

/// Create a task
///
/// # Endpoint
///
/// ```text
/// POST /v1/tasks
/// Authorization: Bearer <token>
///
/// { "name": "Write report", "description": "Q3 numbers", "status": "todo" }
/// ```
///
/// # Response
///
/// `201 Created` with the task.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    let task = Task::create(
        &state.db,
        CreateTask {
            user_id: auth.user_id,
            name: req.name,
            description: req.description,
            status: req.status,
        },
    )
    .await?;

    tracing::debug!(task_id = %task.id, user_id = %auth.user_id, "Task created");

    Ok((StatusCode::CREATED, Json(task)))
}

/// List the caller's tasks
///
/// `limit` defaults to 50 and is capped at 100.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<ListTasksResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let tasks = Task::list_by_user(&state.db, auth.user_id, limit, offset).await?;
    let total = Task::count_by_user(&state.db, auth.user_id).await?;

    Ok(Json(ListTasksResponse { tasks, total }))
}

/// Get a task
///
/// # Errors
///
/// - `403 Forbidden`: Task belongs to another user
/// - `404 Not Found`: Task doesn't exist
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(load_owned(&state, &auth, id).await?))
}

/// Update a task
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to update
/// - `403 Forbidden`: Task belongs to another user
/// - `404 Not Found`: Task doesn't exist
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;
    load_owned(&state, &auth, id).await?;

    let update = UpdateTask {
        name: req.name,
        description: req.description,
        status: req.status,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let task = Task::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(task))
}

/// Delete a task
///
/// # Errors
///
/// - `403 Forbidden`: Task belongs to another user
/// - `404 Not Found`: Task doesn't exist
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_owned(&state, &auth, id).await?;

    if !Task::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let absent: UpdateTaskRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.description, None);

        let cleared: UpdateTaskRequest = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: UpdateTaskRequest = serde_json::from_str(r#"{"description":"d"}"#).unwrap();
        assert_eq!(set.description, Some(Some("d".to_string())));
    }

    #[test]
    fn test_create_request_validation() {
        let empty = CreateTaskRequest {
            name: String::new(),
            description: None,
            status: None,
        };
        assert!(empty.validate().is_err());

        let long = CreateTaskRequest {
            name: "x".repeat(256),
            description: None,
            status: Some(TaskStatus::Done),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"name":"a","status":"in_progress"}"#).unwrap();
        assert_eq!(req.status, Some(TaskStatus::InProgress));
    }
}
