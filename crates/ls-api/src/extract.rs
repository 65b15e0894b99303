//! Bearer-token authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use ls_core::error::AppError;
use ls_core::models::SessionUser;

use crate::{ApiError, AppState};

/// The signed-in caller, resolved from the `Authorization: Bearer` header.
///
/// Adding this extractor to a handler is what makes a route auth-gated.
pub struct CurrentUser {
    pub user: SessionUser,
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let token = header
            .strip_prefix("Bearer ")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError(AppError::AuthRejected("missing bearer token".into())))?;
        let user = state
            .session
            .resolve(token)
            .await?
            .ok_or_else(|| ApiError(AppError::AuthRejected("session expired or unknown".into())))?;
        Ok(CurrentUser {
            user,
            token: token.to_string(),
        })
    }
}
