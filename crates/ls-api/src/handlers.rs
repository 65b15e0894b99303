//! # ls-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the
//! synchronizer layer. Authorization that the synchronizers leave to the
//! calling view (founder-only club administration) is enforced here.

use std::convert::Infallible;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use ls_core::error::AppError;
use ls_core::models::{BookDetail, BookSummary, Club, Comment, SessionUser, Thread, UserProfile};
use ls_core::traits::{ClubStore, ThreadStore};
use ls_sync::{reconcile, CheckIn, ClubCard, ClubView, CoverImage, NewClubInput, Relation};

use crate::extract::CurrentUser;
use crate::{ApiError, ApiResult, AppState};

/// A simple landing handler for "/".
pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "litscope",
        "message": "Join virtual book discussions, connect with readers worldwide.",
    }))
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SignUpForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(form): Json<SignUpForm>,
) -> ApiResult<(StatusCode, Json<SessionUser>)> {
    let user = state
        .session
        .sign_up(&form.username, &form.email, &form.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: SessionUser,
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(form): Json<SignInForm>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.session.sign_in(&form.email, &form.password).await?;
    Ok(Json(SessionResponse {
        token: session.token,
        user: session.user,
    }))
}

#[derive(Deserialize)]
pub struct ProviderForm {
    pub assertion: String,
}

pub async fn sign_in_with_provider(
    State(state): State<AppState>,
    Json(form): Json<ProviderForm>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.session.sign_in_with_provider(&form.assertion).await?;
    Ok(Json(SessionResponse {
        token: session.token,
        user: session.user,
    }))
}

pub async fn sign_out(State(state): State<AppState>, auth: CurrentUser) -> ApiResult<StatusCode> {
    state.session.sign_out(&auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ResetForm {
    pub email: String,
}

pub async fn send_password_reset(
    State(state): State<AppState>,
    Json(form): Json<ResetForm>,
) -> ApiResult<StatusCode> {
    state.session.send_password_reset(&form.email).await?;
    Ok(StatusCode::ACCEPTED)
}

// ── Profile ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: SessionUser,
    pub profile: Option<UserProfile>,
}

pub async fn profile(
    State(state): State<AppState>,
    auth: CurrentUser,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state.session.profile(&auth.user.uid).await?;
    Ok(Json(ProfileResponse {
        user: auth.user,
        profile,
    }))
}

#[derive(Deserialize)]
pub struct UpdateProfileForm {
    pub display_name: Option<String>,
    pub username: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: CurrentUser,
    Json(form): Json<UpdateProfileForm>,
) -> ApiResult<StatusCode> {
    state
        .session
        .update_profile(
            &auth.user,
            form.display_name.as_deref(),
            form.username.as_deref(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct CheckInResponse {
    pub streak: u32,
    pub already_checked_in: bool,
}

pub async fn check_in(
    State(state): State<AppState>,
    auth: CurrentUser,
) -> ApiResult<Json<CheckInResponse>> {
    let today = chrono::Utc::now().date_naive();
    let outcome = state.check_ins.record_check_in(&auth.user.uid, today).await?;
    Ok(Json(CheckInResponse {
        streak: outcome.streak(),
        already_checked_in: matches!(outcome, CheckIn::AlreadyCheckedIn { .. }),
    }))
}

// ── Club directory ───────────────────────────────────────────────────────────

pub async fn list_clubs(State(state): State<AppState>) -> ApiResult<Json<Vec<ClubCard>>> {
    Ok(Json(state.directory.list_clubs().await?))
}

pub async fn my_clubs(
    State(state): State<AppState>,
    auth: CurrentUser,
) -> ApiResult<Json<Vec<ClubCard>>> {
    Ok(Json(state.directory.clubs_with_member(&auth.user.uid).await?))
}

/// Creates a club from a multipart form: `name`, `description`, `is_public`,
/// and an optional `image` file part.
pub async fn create_club(
    State(state): State<AppState>,
    auth: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Club>)> {
    // 1. Collect the form fields and the optional cover upload.
    let mut name = String::new();
    let mut description = String::new();
    let mut is_public = true;
    let mut cover = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = field.text().await.map_err(bad_multipart)?,
            "description" => description = field.text().await.map_err(bad_multipart)?,
            "is_public" => {
                let value = field.text().await.map_err(bad_multipart)?;
                is_public = matches!(value.as_str(), "true" | "on" | "1");
            }
            "image" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if !bytes.is_empty() {
                    cover = Some(CoverImage {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    // 2. Hand off to the directory, which uploads the cover first.
    let club = state
        .directory
        .create_club(
            &auth.user,
            NewClubInput {
                name,
                description,
                is_public,
            },
            cover,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(club)))
}

// ── One club ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ClubDetailResponse {
    pub club: Club,
    pub relation: Relation,
    pub threads: Vec<Thread>,
}

pub async fn club_detail(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(club_id): Path<Uuid>,
) -> ApiResult<Json<ClubDetailResponse>> {
    // The view call runs the reconciliation step, including the self-healing
    // founder repair when the stored document needs it.
    let view = state.membership(club_id).view().await?;
    let threads = state.discussion(club_id).snapshot().await?;
    let relation = view.relation(&auth.user.uid);
    Ok(Json(ClubDetailResponse {
        club: view.club,
        relation,
        threads,
    }))
}

#[derive(Deserialize)]
pub struct EditClubForm {
    pub name: String,
    pub description: String,
}

pub async fn edit_club(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(club_id): Path<Uuid>,
    Json(form): Json<EditClubForm>,
) -> ApiResult<StatusCode> {
    let membership = state.membership(club_id);
    require_creator(&membership, &auth.user.uid).await?;
    membership.edit_details(&form.name, &form.description).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_club(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(club_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let membership = state.membership(club_id);
    require_creator(&membership, &auth.user.uid).await?;
    membership.delete().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct CoverResponse {
    pub image_url: String,
}

pub async fn update_cover(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(club_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<CoverResponse>> {
    let membership = state.membership(club_id);
    require_creator(&membership, &auth.user.uid).await?;

    let mut cover = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            cover = Some(CoverImage {
                file_name,
                bytes: bytes.to_vec(),
            });
        }
    }
    let cover = cover
        .ok_or_else(|| ApiError(AppError::Validation("missing image field".into())))?;
    let image_url = state.directory.update_cover(club_id, cover).await?;
    Ok(Json(CoverResponse { image_url }))
}

pub async fn join_club(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(club_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .membership(club_id)
        .request_join(&auth.user.uid, &join_name(&auth.user))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn leave_club(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(club_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.membership(club_id).leave(&auth.user.uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct RespondForm {
    pub accept: bool,
}

pub async fn respond_to_request(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path((club_id, user_id)): Path<(Uuid, String)>,
    Json(form): Json<RespondForm>,
) -> ApiResult<StatusCode> {
    let membership = state.membership(club_id);
    require_creator(&membership, &auth.user.uid).await?;
    membership.respond_to_request(&user_id, form.accept).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Live view of one club: `club` events carry the reconciled club view,
/// `threads` events carry the full thread list, each re-sent on every
/// upstream commit. Closing the connection tears both subscriptions down.
pub async fn club_live(
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let club_events = WatchStream::new(state.clubs.watch_club(club_id))
        .map(|snapshot| Ok(sse_event("club", &snapshot.as_ref().map(reconcile))));
    let thread_events = WatchStream::new(state.threads.watch_club_threads(club_id))
        .map(|threads| Ok(sse_event("threads", &threads)));
    Sse::new(club_events.merge(thread_events)).keep_alive(KeepAlive::default())
}

// ── Threads and comments ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ContentForm {
    pub content: String,
}

pub async fn post_thread(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(club_id): Path<Uuid>,
    Json(form): Json<ContentForm>,
) -> ApiResult<(StatusCode, Json<Thread>)> {
    let thread = state
        .discussion(club_id)
        .post_thread(&auth.user, &form.content)
        .await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn edit_thread(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path((club_id, thread_id)): Path<(Uuid, Uuid)>,
    Json(form): Json<ContentForm>,
) -> ApiResult<StatusCode> {
    state
        .discussion(club_id)
        .edit_thread(thread_id, &auth.user.uid, &form.content)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_thread(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path((club_id, thread_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .discussion(club_id)
        .delete_thread(thread_id, &auth.user.uid)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub likes: u32,
}

pub async fn toggle_like(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path((club_id, thread_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<LikeResponse>> {
    let likes = state
        .discussion(club_id)
        .toggle_like(thread_id, &auth.user.uid)
        .await?;
    Ok(Json(LikeResponse { likes }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path((club_id, thread_id)): Path<(Uuid, Uuid)>,
    Json(form): Json<ContentForm>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .discussion(club_id)
        .add_comment(thread_id, &auth.user, &form.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path((club_id, thread_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(form): Json<ContentForm>,
) -> ApiResult<StatusCode> {
    state
        .discussion(club_id)
        .edit_comment(thread_id, comment_id, &auth.user.uid, &form.content)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path((club_id, thread_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .discussion(club_id)
        .delete_comment(thread_id, comment_id, &auth.user.uid)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Catalog ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

pub async fn search_books(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<BookSummary>> {
    Json(state.catalog.search(&params.q).await)
}

pub async fn book_detail(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> ApiResult<Json<BookDetail>> {
    match state.catalog.volume(&book_id).await {
        Some(detail) => Ok(Json(detail)),
        None => Err(ApiError(AppError::NotFound("Book".into(), book_id))),
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn require_creator(
    membership: &ls_sync::MembershipSync,
    uid: &str,
) -> ApiResult<ClubView> {
    let view = membership.view().await?;
    if view.relation(uid) != Relation::Creator {
        return Err(ApiError(AppError::Forbidden(
            "only the club founder can do that".into(),
        )));
    }
    Ok(view)
}

fn join_name(user: &SessionUser) -> String {
    if user.display_name.trim().is_empty() {
        "Anonymous".to_string()
    } else {
        user.display_name.clone()
    }
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError(AppError::Validation(format!("malformed upload: {err}")))
}

fn sse_event<T: Serialize>(name: &str, data: &T) -> Event {
    match Event::default().event(name).json_data(data) {
        Ok(event) => event,
        // Serialization of our own models cannot realistically fail; send a
        // bare event rather than killing the stream.
        Err(_) => Event::default().event(name),
    }
}
