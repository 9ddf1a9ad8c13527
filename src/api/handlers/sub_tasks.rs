use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_max_length, require_text};
use crate::api::error::{field_error, ApiError, FieldErrors};
use crate::api::extract::AuthedUser;
use crate::api::pagination::{Page, PageQuery};
use crate::api::AppState;
use crate::db::entities::{sub_tasks, tasks, users};

#[derive(Debug, Serialize)]
pub struct SubTaskOut {
    id: i32,
    description: String,
    status: String,
    due_date: NaiveDate,
}

impl From<&sub_tasks::Model> for SubTaskOut {
    fn from(sub_task: &sub_tasks::Model) -> Self {
        Self {
            id: sub_task.id,
            description: sub_task.description.clone(),
            status: sub_task.status.to_string(),
            due_date: sub_task.due_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubTaskPayload {
    description: Option<String>,
    due_date: Option<String>,
}

/// All sub-task routes hang off a task; missing or foreign parents are a 404
/// before anything else happens.
async fn resolve_parent(
    state: &AppState,
    user: &users::Model,
    task_id: i32,
) -> Result<tasks::Model, ApiError> {
    state
        .repo
        .get_task(user.id, task_id)
        .await?
        .ok_or(ApiError::NotFound)
}

fn validate_description(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let description = require_text(errors, "description", "Description cannot be empty.", raw)?;
    check_max_length(errors, "description", &description, 250);
    Some(description)
}

fn validate_due_date(errors: &mut FieldErrors, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = require_text(errors, "due_date", "Due date must be provided.", raw)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            field_error(
                errors,
                "due_date",
                "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
            );
            None
        }
    }
}

/// GET /api/v1/tasks/{id}/subtasks
pub async fn list(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(task_id): Path<i32>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<SubTaskOut>>, ApiError> {
    let task = resolve_parent(&state, &user, task_id).await?;
    let page = query.page()?;
    let per_page = state.config.api.page_size;

    let (items, total) = state.repo.list_sub_tasks(task.id, page, per_page).await?;
    let results = items.iter().map(SubTaskOut::from).collect();
    Ok(Json(Page::build(results, total, page, per_page)?))
}

/// GET /api/v1/tasks/{id}/subtasks/{sub_id}
pub async fn retrieve(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path((task_id, sub_id)): Path<(i32, i32)>,
) -> Result<Json<SubTaskOut>, ApiError> {
    let task = resolve_parent(&state, &user, task_id).await?;
    let sub_task = state
        .repo
        .get_sub_task(task.id, sub_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(SubTaskOut::from(&sub_task)))
}

/// POST /api/v1/tasks/{id}/subtasks
pub async fn create(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(task_id): Path<i32>,
    Json(payload): Json<SubTaskPayload>,
) -> Result<(StatusCode, Json<SubTaskOut>), ApiError> {
    let task = resolve_parent(&state, &user, task_id).await?;

    let mut errors = FieldErrors::new();
    let description = validate_description(&mut errors, payload.description.as_deref());
    let due_date = validate_due_date(&mut errors, payload.due_date.as_deref());

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let (Some(description), Some(due_date)) = (description, due_date) else {
        return Err(ApiError::Validation(errors));
    };

    let sub_task = state
        .repo
        .create_sub_task(task.id, description, due_date)
        .await?;

    info!("User {} created sub-task {} under task {}", user.id, sub_task.id, task.id);
    Ok((StatusCode::CREATED, Json(SubTaskOut::from(&sub_task))))
}

/// PATCH /api/v1/tasks/{id}/subtasks/{sub_id}
pub async fn partial_update(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path((task_id, sub_id)): Path<(i32, i32)>,
    Json(payload): Json<SubTaskPayload>,
) -> Result<Json<SubTaskOut>, ApiError> {
    let task = resolve_parent(&state, &user, task_id).await?;
    let sub_task = state
        .repo
        .get_sub_task(task.id, sub_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut errors = FieldErrors::new();
    let description = payload
        .description
        .as_deref()
        .and_then(|raw| validate_description(&mut errors, Some(raw)));
    let due_date = payload
        .due_date
        .as_deref()
        .and_then(|raw| validate_due_date(&mut errors, Some(raw)));

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let updated = state
        .repo
        .update_sub_task(sub_task, description, due_date)
        .await?;

    info!("User {} updated sub-task {}", user.id, updated.id);
    Ok(Json(SubTaskOut::from(&updated)))
}

/// DELETE /api/v1/tasks/{id}/subtasks/{sub_id} - soft delete.
pub async fn destroy(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path((task_id, sub_id)): Path<(i32, i32)>,
) -> Result<(StatusCode, Json<SubTaskOut>), ApiError> {
    let task = resolve_parent(&state, &user, task_id).await?;
    let sub_task = state
        .repo
        .get_sub_task(task.id, sub_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let deleted = state.repo.mark_sub_task_deleted(sub_task).await?;
    info!("User {} deleted sub-task {}", user.id, deleted.id);
    Ok((StatusCode::ACCEPTED, Json(SubTaskOut::from(&deleted))))
}
