use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use super::error::ApiError;
use super::AppState;
use crate::auth;
use crate::db::entities::users;

/// The requesting user, resolved from the `Authorization: Token <key>` header.
pub struct AuthedUser(pub users::Model);

/// Pull the token key out of the Authorization header, if it carries one.
fn extract_token_key(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let mut words = value.split_whitespace();
            match (words.next(), words.next(), words.next()) {
                (Some(scheme), Some(key), None) if scheme.eq_ignore_ascii_case("token") => {
                    Some(key.to_string())
                }
                _ => None,
            }
        })
}

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = extract_token_key(parts).ok_or(ApiError::Unauthorized(
            "Authentication credentials were not provided.",
        ))?;

        let (token, user) = state
            .repo
            .find_token_with_user(&key)
            .await?
            .ok_or(ApiError::Unauthorized("Invalid Token"))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized("User is not active"));
        }

        if auth::token_is_expired(token.created_at, state.config.auth.token_ttl_secs) {
            return Err(ApiError::Unauthorized("The Token is expired"));
        }

        Ok(AuthedUser(user))
    }
}

/// Gate for superuser-only actions.
pub fn require_superuser(user: &users::Model) -> Result<(), ApiError> {
    if user.is_superuser {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_extract_token_key() {
        assert_eq!(
            extract_token_key(&parts_with_auth(Some("Token abc123"))),
            Some("abc123".to_string())
        );
        assert_eq!(
            extract_token_key(&parts_with_auth(Some("token abc123"))),
            Some("abc123".to_string())
        );
        assert_eq!(extract_token_key(&parts_with_auth(None)), None);
        assert_eq!(extract_token_key(&parts_with_auth(Some("Bearer abc"))), None);
        assert_eq!(extract_token_key(&parts_with_auth(Some("Token"))), None);
        assert_eq!(
            extract_token_key(&parts_with_auth(Some("Token a b"))),
            None
        );
    }
}
