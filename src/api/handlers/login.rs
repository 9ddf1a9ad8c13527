use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::auth;

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginOut {
    token: String,
    #[serde(rename = "userId")]
    user_id: i32,
    seconds_to_expire: i64,
}

/// POST /api/v1/login - issues (or rotates) the caller's token and records
/// the login.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginOut>, ApiError> {
    let (Some(username), Some(password)) = (payload.username, payload.password) else {
        return Err(ApiError::MissingCredentials);
    };

    let user = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !user.is_active || !auth::verify_password(&password, &user.password)? {
        return Err(ApiError::InvalidCredentials);
    }

    let ttl = state.config.auth.token_ttl_secs;
    let token = state.repo.record_login(user.id, ttl).await?;

    info!("User {} logged in", user.id);
    Ok(Json(LoginOut {
        seconds_to_expire: auth::seconds_to_expire(token.created_at, ttl),
        token: token.key,
        user_id: user.id,
    }))
}
