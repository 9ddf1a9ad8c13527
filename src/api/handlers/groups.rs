use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_max_length, require_text};
use crate::api::error::{field_error, ApiError, FieldErrors};
use crate::api::extract::{require_superuser, AuthedUser};
use crate::api::pagination::{Page, PageQuery};
use crate::api::AppState;
use crate::db::entities::groups;

#[derive(Debug, Serialize)]
pub struct GroupOut {
    id: i32,
    name: String,
}

impl From<&groups::Model> for GroupOut {
    fn from(group: &groups::Model) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupPayload {
    name: Option<String>,
}

/// GET /api/v1/groups - superuser only.
pub async fn list(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<GroupOut>>, ApiError> {
    require_superuser(&user)?;
    let page = query.page()?;
    let per_page = state.config.api.page_size;

    let (items, total) = state.repo.list_groups(page, per_page).await?;
    let results = items.iter().map(GroupOut::from).collect();
    Ok(Json(Page::build(results, total, page, per_page)?))
}

/// GET /api/v1/groups/{id}
pub async fn retrieve(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
) -> Result<Json<GroupOut>, ApiError> {
    require_superuser(&user)?;
    let group = state.repo.get_group(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(GroupOut::from(&group)))
}

/// POST /api/v1/groups
pub async fn create(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(payload): Json<GroupPayload>,
) -> Result<(StatusCode, Json<GroupOut>), ApiError> {
    require_superuser(&user)?;

    let mut errors = FieldErrors::new();
    let name = require_text(
        &mut errors,
        "name",
        "Name cannot be empty.",
        payload.name.as_deref(),
    );
    if let Some(name) = &name {
        if check_max_length(&mut errors, "name", name, 150)
            && state.repo.group_name_taken(name).await?
        {
            field_error(&mut errors, "name", "Group with this name already exists.");
        }
    }
    let Some(name) = name.filter(|_| errors.is_empty()) else {
        return Err(ApiError::Validation(errors));
    };

    let group = state.repo.create_group(name).await?;
    info!("Created group {} ({})", group.id, group.name);
    Ok((StatusCode::CREATED, Json(GroupOut::from(&group))))
}
