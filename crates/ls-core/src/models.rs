//! # Domain Models
//!
//! These structs represent the core entities of LitScope.
//! Clubs and threads are owned by the document store; everything here is a
//! snapshot of store state, never an independently persisted copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External identity of a user, assigned by the session provider.
pub type UserId = String;

/// A document read together with the store's revision counter.
///
/// The version is bumped by the store on every committed write and is the
/// precondition handle for conditional updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

/// A named discussion group with public/private visibility and a membership set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    /// Founder of the club; must always appear in `members`.
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Set semantics: the store's union/remove mutators keep entries unique.
    pub members: Vec<UserId>,
    /// Derived cache of `members` length.
    pub member_count: u32,
    pub pending_requests: Vec<JoinRequest>,
    pub image_url: Option<String>,
}

impl Club {
    /// Whether `uid` is in the membership set, counting the founder even when
    /// the stored `members` array predates the founder-inclusion invariant.
    pub fn has_member(&self, uid: &str) -> bool {
        self.created_by == uid || self.members.iter().any(|m| m == uid)
    }

    pub fn has_pending_request(&self, uid: &str) -> bool {
        self.pending_requests.iter().any(|r| r.user_id == uid)
    }
}

/// A recorded intent to join a club, awaiting the founder's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub user_id: UserId,
    /// Display name at request time; shown to the founder.
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Input for creating a club. The store assigns the document id.
#[derive(Debug, Clone)]
pub struct NewClub {
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

/// A top-level post within a club, carrying likes and nested comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub club_id: Uuid,
    pub author_id: UserId,
    /// Display-name snapshot at posting time, not live-updated.
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    /// Derived cache; must equal `liked_by` length.
    pub likes: u32,
    pub liked_by: Vec<UserId>,
    pub comments: Vec<Comment>,
}

/// Input for posting a thread. Likes and comments start empty.
#[derive(Debug, Clone)]
pub struct NewThread {
    pub club_id: Uuid,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A reply nested under a thread.
///
/// Comments carry a stable generated id so edits and deletes address the
/// intended entry even while other clients insert or remove siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub author_id: UserId,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
}

/// Per-user profile document, keyed by the external identity uid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: UserId,
    pub username: String,
    pub email: String,
    /// Consecutive check-in days.
    pub streak: u32,
    /// ISO `YYYY-MM-DD` date of the most recent check-in.
    pub last_check_in: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The identity provider's view of a signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub uid: UserId,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A provider-issued session: opaque bearer token plus the resolved user.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: SessionUser,
}

// ── Field-granular patches ───────────────────────────────────────────────────
//
// One patch struct per document kind, mirroring the store's update
// granularity: plain `Option` fields overwrite, the `*_union` / `*_remove`
// vectors apply set semantics server-side.

#[derive(Debug, Clone, Default)]
pub struct ClubPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub members: Option<Vec<UserId>>,
    pub members_union: Vec<UserId>,
    pub members_remove: Vec<UserId>,
    pub member_count: Option<u32>,
    pub pending_requests: Option<Vec<JoinRequest>>,
    pub pending_requests_union: Vec<JoinRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct ThreadPatch {
    pub content: Option<String>,
    pub edited: Option<bool>,
    pub likes: Option<u32>,
    pub liked_by_union: Vec<UserId>,
    pub liked_by_remove: Vec<UserId>,
    pub comments: Option<Vec<Comment>>,
}

/// Merge-write patch for profile documents; absent fields are left untouched,
/// and the document is created if missing.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub streak: Option<u32>,
    pub last_check_in: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Outcome of a conditional document update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// The patch committed; `version` is the document's new revision.
    Applied { version: u64 },
    /// The version precondition failed; the caller should re-read and retry.
    Conflict,
    /// No document with that id exists.
    Missing,
}

// ── Catalog records ──────────────────────────────────────────────────────────

/// One search hit from the external book catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub thumbnail: Option<String>,
}

/// Full catalog record for one volume.
///
/// `description_html` is raw markup trusted from this one external source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDetail {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub description_html: Option<String>,
    pub thumbnail: Option<String>,
    pub preview_link: Option<String>,
    pub page_count: Option<u32>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u32>,
    pub identifiers: Vec<BookIdentifier>,
}

/// Industry identifier pair, e.g. `ISBN_13` / `9780000000000`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookIdentifier {
    pub kind: String,
    pub value: String,
}
