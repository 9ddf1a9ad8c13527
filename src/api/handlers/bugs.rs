use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_max_length, require_text};
use crate::api::error::{field_error, ApiError, FieldErrors};
use crate::api::extract::AuthedUser;
use crate::api::pagination::{Page, PageQuery};
use crate::api::AppState;
use crate::db::entities::bugs;
use crate::db::types::Priority;

#[derive(Debug, Serialize)]
pub struct BugOut {
    id: i32,
    title: String,
    description: String,
    priority: String,
    status: String,
}

impl From<&bugs::Model> for BugOut {
    fn from(bug: &bugs::Model) -> Self {
        Self {
            id: bug.id,
            title: bug.title.clone(),
            description: bug.description.clone(),
            priority: bug.priority.to_string(),
            status: bug.status.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BugPayload {
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
}

fn validate_title(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let title = require_text(errors, "title", "Title cannot be empty.", raw)?;
    check_max_length(errors, "title", &title, 100);
    Some(title)
}

fn validate_description(errors: &mut FieldErrors, raw: Option<&str>) -> Option<String> {
    let description = require_text(errors, "description", "Description cannot be empty.", raw)?;
    check_max_length(errors, "description", &description, 1000);
    Some(description)
}

fn validate_priority(errors: &mut FieldErrors, raw: Option<&str>) -> Option<Priority> {
    let raw = require_text(errors, "priority", "Priority cannot be empty.", raw)?;
    match Priority::from_str(&raw) {
        Some(priority) => Some(priority),
        None => {
            field_error(
                errors,
                "priority",
                format!("\"{raw}\" is not a valid choice."),
            );
            None
        }
    }
}

/// GET /api/v1/bugs - the caller's visible bugs, newest first.
pub async fn list(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<BugOut>>, ApiError> {
    let page = query.page()?;
    let per_page = state.config.api.page_size;

    let (items, total) = state.repo.list_bugs(user.id, page, per_page).await?;
    let results = items.iter().map(BugOut::from).collect();
    Ok(Json(Page::build(results, total, page, per_page)?))
}

/// GET /api/v1/bugs/{id}
pub async fn retrieve(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
) -> Result<Json<BugOut>, ApiError> {
    let bug = state
        .repo
        .get_bug(user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(BugOut::from(&bug)))
}

/// POST /api/v1/bugs
pub async fn create(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(payload): Json<BugPayload>,
) -> Result<(StatusCode, Json<BugOut>), ApiError> {
    let mut errors = FieldErrors::new();
    let title = validate_title(&mut errors, payload.title.as_deref());
    let description = validate_description(&mut errors, payload.description.as_deref());
    let priority = validate_priority(&mut errors, payload.priority.as_deref());

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let (Some(title), Some(description), Some(priority)) = (title, description, priority) else {
        return Err(ApiError::Validation(errors));
    };

    let bug = state
        .repo
        .create_bug(user.id, title, description, priority)
        .await?;

    info!("User {} created bug {}", user.id, bug.id);
    Ok((StatusCode::CREATED, Json(BugOut::from(&bug))))
}

/// PATCH /api/v1/bugs/{id} - partial update; only provided fields are
/// validated and written.
pub async fn partial_update(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
    Json(payload): Json<BugPayload>,
) -> Result<Json<BugOut>, ApiError> {
    let bug = state
        .repo
        .get_bug(user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut errors = FieldErrors::new();
    let title = payload
        .title
        .as_deref()
        .and_then(|raw| validate_title(&mut errors, Some(raw)));
    let description = payload
        .description
        .as_deref()
        .and_then(|raw| validate_description(&mut errors, Some(raw)));
    let priority = payload
        .priority
        .as_deref()
        .and_then(|raw| validate_priority(&mut errors, Some(raw)));

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let updated = state
        .repo
        .update_bug(bug, title, description, priority)
        .await?;

    info!("User {} updated bug {}", user.id, updated.id);
    Ok(Json(BugOut::from(&updated)))
}

/// DELETE /api/v1/bugs/{id} - soft delete; the row stays but drops out of
/// every listing.
pub async fn destroy(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<BugOut>), ApiError> {
    let bug = state
        .repo
        .get_bug(user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let deleted = state.repo.mark_bug_deleted(bug).await?;
    info!("User {} deleted bug {}", user.id, deleted.id);
    Ok((StatusCode::ACCEPTED, Json(BugOut::from(&deleted))))
}
