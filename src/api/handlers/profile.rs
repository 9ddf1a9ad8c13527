use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::extract::{require_superuser, AuthedUser};
use crate::api::pagination::{Page, PageQuery};
use crate::api::AppState;
use crate::db::entities::users;
use crate::db::repo::ProfileStats;

/// User fields plus aggregate counts, recomputed on every request.
#[derive(Debug, Serialize)]
pub struct ProfileOut {
    id: i32,
    username: String,
    email: String,
    name: String,
    total_bugs: u64,
    active_bugs: u64,
    total_tasks: u64,
    last_login: Option<String>,
    date_joined: String,
    total_logins: u64,
    total_subtasks: u64,
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

impl ProfileOut {
    fn new(user: &users::Model, stats: ProfileStats) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.first_name.clone(),
            total_bugs: stats.total_bugs,
            active_bugs: stats.active_bugs,
            total_tasks: stats.total_tasks,
            last_login: user.last_login.map(format_timestamp),
            date_joined: format_timestamp(user.date_joined),
            total_logins: stats.total_logins,
            total_subtasks: stats.total_subtasks,
        }
    }
}

/// GET /api/v1/users/{id}/profile - superuser only; wrapped in the usual page
/// envelope even though it always holds a single element.
pub async fn retrieve(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ProfileOut>>, ApiError> {
    require_superuser(&user)?;
    let page = query.page()?;

    let target = state.repo.get_user(id).await?.ok_or(ApiError::NotFound)?;
    let stats = state.repo.profile_stats(target.id).await?;

    let results = vec![ProfileOut::new(&target, stats)];
    Ok(Json(Page::build(
        results,
        1,
        page,
        state.config.api.page_size,
    )?))
}
