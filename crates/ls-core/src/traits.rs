//! # Core Traits (Ports)
//!
//! Every external collaborator is consumed through one of these traits; a
//! plugin crate must implement them to be wired into the binary.
//!
//! Live subscriptions are `tokio::sync::watch` receivers: each receiver
//! observes the latest committed snapshot of a document or query result, in
//! commit order, and tears the subscription down when dropped.

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{
    AuthSession, BookDetail, BookSummary, Club, ClubPatch, NewClub, NewThread, ProfilePatch,
    SessionUser, Thread, ThreadPatch, UpdateResult, UserProfile, Versioned,
};

/// Snapshot stream of one club document. `None` after the club is deleted
/// (or when the id never existed).
pub type ClubSnapshots = watch::Receiver<Option<Versioned<Club>>>;

/// Snapshot stream of the query "threads in club X, newest first".
pub type ThreadSnapshots = watch::Receiver<Vec<Thread>>;

/// Snapshot stream of one user's profile document.
pub type ProfileSnapshots = watch::Receiver<Option<UserProfile>>;

/// Stream of session-state changes from the identity provider.
pub type SessionSnapshots = watch::Receiver<Option<SessionUser>>;

/// Persistence contract for club documents.
#[async_trait]
pub trait ClubStore: Send + Sync {
    /// Inserts a club, assigning its id, and returns the stored document.
    async fn add_club(&self, club: NewClub) -> anyhow::Result<Club>;
    async fn get_club(&self, id: Uuid) -> anyhow::Result<Option<Versioned<Club>>>;
    async fn list_clubs(&self) -> anyhow::Result<Vec<Club>>;
    /// Clubs whose membership set contains `uid` (founder included).
    async fn clubs_with_member(&self, uid: &str) -> anyhow::Result<Vec<Club>>;
    /// Applies a field patch. When `expected` is set, the write commits only
    /// if the document is still at that version.
    async fn update_club(
        &self,
        id: Uuid,
        patch: ClubPatch,
        expected: Option<u64>,
    ) -> anyhow::Result<UpdateResult>;
    async fn delete_club(&self, id: Uuid) -> anyhow::Result<()>;
    /// Live-subscribes to one club document.
    fn watch_club(&self, id: Uuid) -> ClubSnapshots;
}

/// Persistence contract for thread documents.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn add_thread(&self, thread: NewThread) -> anyhow::Result<Thread>;
    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Versioned<Thread>>>;
    /// All threads in a club, ordered by `created_at` descending.
    async fn threads_in_club(&self, club_id: Uuid) -> anyhow::Result<Vec<Thread>>;
    async fn count_in_club(&self, club_id: Uuid) -> anyhow::Result<usize>;
    async fn update_thread(
        &self,
        id: Uuid,
        patch: ThreadPatch,
        expected: Option<u64>,
    ) -> anyhow::Result<UpdateResult>;
    async fn delete_thread(&self, id: Uuid) -> anyhow::Result<()>;
    /// Live-subscribes to the club's thread list.
    fn watch_club_threads(&self, club_id: Uuid) -> ThreadSnapshots;
}

/// Persistence contract for user profile documents.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> anyhow::Result<Option<UserProfile>>;
    /// Merge write: absent patch fields stay untouched, missing documents are
    /// created.
    async fn merge_profile(&self, uid: &str, patch: ProfilePatch) -> anyhow::Result<()>;
    fn watch_profile(&self, uid: &str) -> ProfileSnapshots;
}

/// Identity and session contract.
///
/// Credential storage, token issuance, and mail delivery all belong to the
/// provider. The email-verification gate does NOT: providers hand back
/// unverified sessions, and the session synchronizer rejects them.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Registers a user and triggers the verification mail.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> anyhow::Result<SessionUser>;

    /// `None` means the provider rejected the credentials.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> anyhow::Result<Option<AuthSession>>;

    /// Federated sign-in with an assertion from an external identity
    /// provider; accounts arrive pre-verified.
    async fn sign_in_with_provider(&self, assertion: &str) -> anyhow::Result<AuthSession>;

    async fn send_verification_email(&self, uid: &str) -> anyhow::Result<()>;
    async fn send_password_reset(&self, email: &str) -> anyhow::Result<()>;
    async fn sign_out(&self, token: &str) -> anyhow::Result<()>;

    /// Resolves a bearer token to its session user, if the session is live.
    async fn session_user(&self, token: &str) -> anyhow::Result<Option<SessionUser>>;

    async fn update_display_name(&self, uid: &str, name: &str) -> anyhow::Result<()>;

    /// Most recent sign-in/out event on this provider instance.
    fn on_session_change(&self) -> SessionSnapshots;
}

/// Blob storage contract for club cover images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the bytes under `key` and returns a public download URL.
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<String>;
}

/// External book catalog lookup.
///
/// Infallible by contract: network and decode failures are logged by the
/// adapter and surface as an empty result, never as an error.
#[async_trait]
pub trait BookCatalog: Send + Sync {
    async fn search(&self, query: &str) -> Vec<BookSummary>;
    async fn volume(&self, id: &str) -> Option<BookDetail>;
}
