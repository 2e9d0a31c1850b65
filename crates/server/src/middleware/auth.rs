//! Authentication extractors for API routes.
//!
//! Requests authenticate with a bearer token matched against
//! `users.api_token`. Handlers declare what they need through the
//! extractors; role checks beyond staff/customer stay in the handlers.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::user::User;
use crate::state::AppState;

/// Length of generated API tokens.
const API_TOKEN_LENGTH: usize = 40;

/// Extractor that requires an authenticated user.
///
/// Rejects with 401 when the bearer token is missing or unknown.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let user = UserRepository::new(state.pool())
            .find_by_api_token(token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid API token".to_string()))?;

        // Associate any later errors on this request with the user
        set_sentry_user(&user.id);

        Ok(Self(user))
    }
}

/// Extractor that requires a back-office user.
///
/// Rejects with 401 when unauthenticated and 403 when the user is a
/// customer.
pub struct RequireStaff(pub User);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !user.role.is_staff() {
            return Err(AppError::Forbidden("staff access required".to_string()));
        }

        Ok(Self(user))
    }
}

/// Pull the bearer token out of the Authorization header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Generate a random API token for a new user.
#[must_use]
pub fn generate_api_token() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    use rand::Rng;

    let mut rng = rand::rng();
    (0..API_TOKEN_LENGTH)
        .map(|_| {
            // random_range keeps idx inside CHARSET
            let idx = rng.random_range(0..CHARSET.len());
            char::from(*CHARSET.get(idx).expect("idx within bounds"))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/orders");
        if let Some(v) = value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_bearer_token_extraction() {
        let parts = parts_with_auth(Some("Bearer abc123"));
        assert_eq!(bearer_token(&parts), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing_header() {
        let parts = parts_with_auth(None);
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_api_token();
        let b = generate_api_token();

        assert_eq!(a.len(), API_TOKEN_LENGTH);
        assert_ne!(a, b);
    }
}
