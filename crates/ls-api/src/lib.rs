//! # ls-api
//!
//! The web routing and orchestration layer for LitScope: one JSON route per
//! user-facing view, plus a server-sent-event stream carrying the live club
//! and thread snapshots.

pub mod extract;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use ls_core::error::AppError;
use ls_core::traits::{BookCatalog, ClubStore, ThreadStore};
use ls_sync::{CheckInTracker, ClubDirectory, DiscussionSync, MembershipSync, SessionSync};

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub clubs: Arc<dyn ClubStore>,
    pub threads: Arc<dyn ThreadStore>,
    pub session: Arc<SessionSync>,
    pub directory: Arc<ClubDirectory>,
    pub check_ins: Arc<CheckInTracker>,
    pub catalog: Arc<dyn BookCatalog>,
}

impl AppState {
    /// Membership synchronizer scoped to one club.
    pub fn membership(&self, club_id: Uuid) -> MembershipSync {
        MembershipSync::new(Arc::clone(&self.clubs), club_id)
    }

    /// Discussion synchronizer scoped to one club.
    pub fn discussion(&self, club_id: Uuid) -> DiscussionSync {
        DiscussionSync::new(Arc::clone(&self.clubs), Arc::clone(&self.threads), club_id)
    }
}

/// Builds the full route table.
///
/// # Developer Note
/// The router is returned unmounted so the binary (and the integration
/// tests) can decide where it lives and which listener serves it.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        // Auth
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/login", post(handlers::sign_in))
        .route("/auth/login/provider", post(handlers::sign_in_with_provider))
        .route("/auth/logout", post(handlers::sign_out))
        .route("/auth/reset", post(handlers::send_password_reset))
        // Profile
        .route("/profile", get(handlers::profile).put(handlers::update_profile))
        .route("/profile/check-in", post(handlers::check_in))
        // Club directory
        .route("/clubs", get(handlers::list_clubs).post(handlers::create_club))
        .route("/my-clubs", get(handlers::my_clubs))
        // One club
        .route(
            "/clubs/{club_id}",
            get(handlers::club_detail)
                .patch(handlers::edit_club)
                .delete(handlers::delete_club),
        )
        .route("/clubs/{club_id}/cover", put(handlers::update_cover))
        .route("/clubs/{club_id}/live", get(handlers::club_live))
        .route("/clubs/{club_id}/join", post(handlers::join_club))
        .route("/clubs/{club_id}/leave", post(handlers::leave_club))
        .route(
            "/clubs/{club_id}/requests/{user_id}",
            post(handlers::respond_to_request),
        )
        // Threads and comments
        .route("/clubs/{club_id}/threads", post(handlers::post_thread))
        .route(
            "/clubs/{club_id}/threads/{thread_id}",
            patch(handlers::edit_thread).delete(handlers::delete_thread),
        )
        .route(
            "/clubs/{club_id}/threads/{thread_id}/like",
            post(handlers::toggle_like),
        )
        .route(
            "/clubs/{club_id}/threads/{thread_id}/comments",
            post(handlers::add_comment),
        )
        .route(
            "/clubs/{club_id}/threads/{thread_id}/comments/{comment_id}",
            patch(handlers::edit_comment).delete(handlers::delete_comment),
        )
        // Catalog
        .route("/books", get(handlers::search_books))
        .route("/books/{book_id}", get(handlers::book_detail))
        .layer(middleware::cors_policy())
        .layer(middleware::trace_layer())
        .with_state(state)
}

/// Response-side wrapper turning an [`AppError`] into an HTTP reply.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::NotFound(_, _) => StatusCode::NOT_FOUND,
            AppError::AuthRejected(_) => StatusCode::UNAUTHORIZED,
            AppError::NotMember(_) | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::AlreadyMember(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// A handler result carrying the shared error mapping.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
