use std::sync::LazyLock;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{check_max_length, require_text};
use crate::api::error::{field_error, ApiError, FieldErrors};
use crate::api::extract::AuthedUser;
use crate::api::pagination::{Page, PageQuery};
use crate::api::AppState;
use crate::auth;
use crate::db::entities::users;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Debug, Serialize)]
pub struct UserOut {
    id: i32,
    username: String,
    email: String,
    name: String,
}

impl From<&users::Model> for UserOut {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.first_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    username: Option<String>,
    email: Option<String>,
    name: Option<String>,
    password: Option<String>,
}

/// Validated signup/update fields, post length and format checks.
struct ValidUser {
    username: String,
    email: String,
    name: String,
    password: String,
}

async fn validate_user_payload(
    state: &AppState,
    payload: &UserPayload,
    exclude_id: Option<i32>,
) -> Result<ValidUser, ApiError> {
    let mut errors = FieldErrors::new();

    let username = require_text(
        &mut errors,
        "username",
        "Username cannot be empty.",
        payload.username.as_deref(),
    );
    let email = require_text(
        &mut errors,
        "email",
        "Email cannot be empty.",
        payload.email.as_deref(),
    );
    let name = require_text(
        &mut errors,
        "name",
        "Name cannot be empty.",
        payload.name.as_deref(),
    );
    let password = require_text(
        &mut errors,
        "password",
        "Password cannot be empty.",
        payload.password.as_deref(),
    );

    if let Some(username) = &username {
        if check_max_length(&mut errors, "username", username, 150)
            && state.repo.username_taken(username, exclude_id).await?
        {
            field_error(
                &mut errors,
                "username",
                "A user with that username already exists.",
            );
        }
    }
    if let Some(email) = &email {
        if check_max_length(&mut errors, "email", email, 254) && !EMAIL_REGEX.is_match(email) {
            field_error(&mut errors, "email", "Enter a valid email address.");
        }
    }
    if let Some(name) = &name {
        check_max_length(&mut errors, "name", name, 30);
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let (Some(username), Some(email), Some(name), Some(password)) =
        (username, email, name, password)
    else {
        return Err(ApiError::Validation(errors));
    };

    Ok(ValidUser {
        username,
        email,
        name,
        password,
    })
}

/// GET /api/v1/users - superusers see everyone, others only themselves.
pub async fn list(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<UserOut>>, ApiError> {
    let page = query.page()?;
    let per_page = state.config.api.page_size;

    let (items, total) = if user.is_superuser {
        state.repo.list_users(page, per_page).await?
    } else {
        (vec![user], 1)
    };

    let results = items.iter().map(UserOut::from).collect();
    Ok(Json(Page::build(results, total, page, per_page)?))
}

/// GET /api/v1/users/{id}
pub async fn retrieve(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
) -> Result<Json<UserOut>, ApiError> {
    if user.id != id && !user.is_superuser {
        return Err(ApiError::NotFound);
    }

    let target = state.repo.get_user(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(UserOut::from(&target)))
}

/// POST /api/v1/users - open signup; also creates the profile and joins the
/// default group.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<UserPayload>,
) -> Result<(StatusCode, Json<UserOut>), ApiError> {
    let valid = validate_user_payload(&state, &payload, None).await?;

    let password_hash = auth::hash_password(&valid.password)?;
    let user = state
        .repo
        .create_user(
            valid.username,
            valid.email,
            valid.name,
            password_hash,
            &state.config.api.default_group,
        )
        .await?;

    info!("Created user {} ({})", user.id, user.username);
    Ok((StatusCode::CREATED, Json(UserOut::from(&user))))
}

/// PUT /api/v1/users/{id} - full update; the password is re-hashed.
pub async fn update(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<i32>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<UserOut>, ApiError> {
    if user.id != id && !user.is_superuser {
        return Err(ApiError::NotFound);
    }
    let target = state.repo.get_user(id).await?.ok_or(ApiError::NotFound)?;

    let valid = validate_user_payload(&state, &payload, Some(target.id)).await?;

    let password_hash = auth::hash_password(&valid.password)?;
    let updated = state
        .repo
        .update_user(target, valid.username, valid.email, valid.name, password_hash)
        .await?;

    info!("Updated user {}", updated.id);
    Ok(Json(UserOut::from(&updated)))
}
