use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_max_length, check_min_length, require_text};
use crate::api::error::{ApiError, FieldErrors};
use crate::api::extract::AuthedUser;
use crate::api::pagination::{Page, PageQuery};
use crate::api::AppState;
use crate::db::entities::tasks;

#[derive(Debug, Serialize)]
pub struct TaskOut {
    id: i32,
    body: String,
    status: String,
    total_subtasks: u64,
}

impl TaskOut {
    /// Sub-task totals count every status, deleted ones included.
    async fn build(state: &AppState, task: &tasks::Model) -> Result<Self, ApiError> {
        let total_subtasks = state.repo.count_subtasks(task.id).await?;
        Ok(Self {
            id: task.id,
            body: task.body.clone(),
            status: task.status.to_string(),
            total_subtasks,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskPayload {
    body: Option<String>,
}

fn validate_body(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let body = require_text(errors, "body", "Body cannot be empty.", raw)?;
    if check_min_length(errors, "body", &body, 3) {
        check_max_length(errors, "body", &body, 250);
    }
    Some(body)
}

/// GET /api/v1/tasks - the caller's visible tasks, newest first.
pub async fn list(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<TaskOut>>, ApiError> {
    let page = query.page()?;
    let per_page = state.config.api.page_size;

    let (items, total) = state.repo.list_tasks(user.id, page, per_page).await?;
    let mut results = Vec::with_capacity(items.len());
    for task in &items {
        results.push(TaskOut::build(&state, task).await?);
    }
    Ok(Json(Page::build(results, total, page, per_page)?))
}

/// GET /api/v1/tasks/{id}
pub async fn retrieve(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
) -> Result<Json<TaskOut>, ApiError> {
    let task = state
        .repo
        .get_task(user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(TaskOut::build(&state, &task).await?))
}

/// POST /api/v1/tasks
pub async fn create(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(payload): Json<TaskPayload>,
) -> Result<(StatusCode, Json<TaskOut>), ApiError> {
    let mut errors = FieldErrors::new();
    let body = validate_body(&mut errors, payload.body.as_deref());

    let Some(body) = body.filter(|_| errors.is_empty()) else {
        return Err(ApiError::Validation(errors));
    };

    let task = state.repo.create_task(user.id, body).await?;
    info!("User {} created task {}", user.id, task.id);
    Ok((StatusCode::CREATED, Json(TaskOut::build(&state, &task).await?)))
}

/// PATCH /api/v1/tasks/{id}
pub async fn partial_update(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
    Json(payload): Json<TaskPayload>,
) -> Result<Json<TaskOut>, ApiError> {
    let task = state
        .repo
        .get_task(user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut errors = FieldErrors::new();
    let body = payload
        .body
        .as_deref()
        .and_then(|raw| validate_body(&mut errors, Some(raw)));

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let updated = state.repo.update_task(task, body).await?;
    info!("User {} updated task {}", user.id, updated.id);
    Ok(Json(TaskOut::build(&state, &updated).await?))
}

/// DELETE /api/v1/tasks/{id} - soft delete.
pub async fn destroy(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<TaskOut>), ApiError> {
    let task = state
        .repo
        .get_task(user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let deleted = state.repo.mark_task_deleted(task).await?;
    info!("User {} deleted task {}", user.id, deleted.id);
    Ok((
        StatusCode::ACCEPTED,
        Json(TaskOut::build(&state, &deleted).await?),
    ))
}
