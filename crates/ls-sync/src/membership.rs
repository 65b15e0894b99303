//! # Membership State Synchronizer
//!
//! Reconciles one club's membership list, pending join requests, and derived
//! member count against the store's live document feed, and exposes the
//! join/approve/decline/leave mutations.
//!
//! Every read-modify-write here runs as a conditional update: the patch is
//! computed from a fresh versioned read and commits only if the document is
//! still at that version, retrying a bounded number of times otherwise.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use ls_core::error::{AppError, Result};
use ls_core::models::{Club, ClubPatch, JoinRequest, UpdateResult, Versioned};
use ls_core::traits::{ClubSnapshots, ClubStore};

/// Attempts before a contended conditional update gives up.
const UPDATE_RETRIES: usize = 5;

/// The viewing user's relationship to a club.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Creator,
    Member,
    Pending,
    None,
}

/// Reconciled projection of one club snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ClubView {
    pub club: Club,
    /// Store revision the projection was derived from.
    pub version: u64,
    /// True when the stored document was missing its founder and the
    /// projection (and a corrective write) had to add them back.
    pub repaired: bool,
}

impl ClubView {
    pub fn relation(&self, uid: &str) -> Relation {
        if self.club.created_by == uid {
            Relation::Creator
        } else if self.club.members.iter().any(|m| m == uid) {
            Relation::Member
        } else if self.club.has_pending_request(uid) {
            Relation::Pending
        } else {
            Relation::None
        }
    }
}

/// Pure reconciliation step: founder unioned into the membership set, member
/// count recomputed from the resulting set.
pub fn reconcile(stored: &Versioned<Club>) -> ClubView {
    let mut club = stored.doc.clone();
    let repaired =
        !club.created_by.is_empty() && !club.members.iter().any(|m| *m == club.created_by);
    if repaired {
        club.members.push(club.created_by.clone());
    }
    club.member_count = club.members.len() as u32;
    ClubView {
        club,
        version: stored.version,
        repaired,
    }
}

pub struct MembershipSync {
    clubs: Arc<dyn ClubStore>,
    club_id: Uuid,
}

impl MembershipSync {
    pub fn new(clubs: Arc<dyn ClubStore>, club_id: Uuid) -> Self {
        Self { clubs, club_id }
    }

    pub fn club_id(&self) -> Uuid {
        self.club_id
    }

    /// Current reconciled view from a point read, issuing the self-healing
    /// founder repair when the stored document needs it.
    pub async fn view(&self) -> Result<ClubView> {
        let stored = self.read().await?;
        let view = reconcile(&stored);
        if view.repaired {
            repair_membership(&self.clubs, self.club_id, &stored, &view).await?;
        }
        Ok(view)
    }

    /// Live-subscribes to the club document.
    pub fn subscribe(&self) -> ClubViews {
        ClubViews {
            snapshots: self.clubs.watch_club(self.club_id),
            clubs: Arc::clone(&self.clubs),
            club_id: self.club_id,
        }
    }

    /// Records `user_id`'s intent to join. A repeated request is a no-op (the
    /// original timestamp stands); a request from a member is rejected.
    pub async fn request_join(&self, user_id: &str, user_name: &str) -> Result<()> {
        self.update_with_retry(|stored| {
            let club = &stored.doc;
            if club.has_member(user_id) {
                return Err(AppError::AlreadyMember(user_id.to_string()));
            }
            if club.has_pending_request(user_id) {
                return Ok(None);
            }
            Ok(Some(ClubPatch {
                pending_requests_union: vec![JoinRequest {
                    user_id: user_id.to_string(),
                    user_name: user_name.to_string(),
                    timestamp: Utc::now(),
                }],
                ..ClubPatch::default()
            }))
        })
        .await
    }

    /// Resolves a pending request: every entry for `request_user_id` is
    /// removed, and on accept the user is unioned into the membership set
    /// with the count recomputed from the result.
    pub async fn respond_to_request(&self, request_user_id: &str, accept: bool) -> Result<()> {
        self.update_with_retry(|stored| {
            let club = &stored.doc;
            let remaining: Vec<JoinRequest> = club
                .pending_requests
                .iter()
                .filter(|r| r.user_id != request_user_id)
                .cloned()
                .collect();
            if accept {
                let mut members = club.members.clone();
                if !members.iter().any(|m| m == request_user_id) {
                    members.push(request_user_id.to_string());
                }
                Ok(Some(ClubPatch {
                    member_count: Some(members.len() as u32),
                    members: Some(members),
                    pending_requests: Some(remaining),
                    ..ClubPatch::default()
                }))
            } else {
                Ok(Some(ClubPatch {
                    pending_requests: Some(remaining),
                    ..ClubPatch::default()
                }))
            }
        })
        .await
    }

    /// Removes a non-founder member from the club.
    pub async fn leave(&self, user_id: &str) -> Result<()> {
        self.update_with_retry(|stored| {
            let club = &stored.doc;
            if club.created_by == user_id {
                return Err(AppError::Forbidden(
                    "the founder cannot leave their own club".into(),
                ));
            }
            if !club.members.iter().any(|m| m == user_id) {
                return Err(AppError::NotMember(user_id.to_string()));
            }
            let members: Vec<String> = club
                .members
                .iter()
                .filter(|m| *m != user_id)
                .cloned()
                .collect();
            Ok(Some(ClubPatch {
                member_count: Some(members.len() as u32),
                members: Some(members),
                ..ClubPatch::default()
            }))
        })
        .await
    }

    /// Overwrites name and description. Last write wins; founder-only access
    /// is enforced by the calling layer.
    pub async fn edit_details(&self, name: &str, description: &str) -> Result<()> {
        if name.trim().is_empty() || description.trim().is_empty() {
            return Err(AppError::Validation(
                "club name and description must not be empty".into(),
            ));
        }
        let patch = ClubPatch {
            name: Some(name.trim().to_string()),
            description: Some(description.trim().to_string()),
            updated_at: Some(Utc::now()),
            ..ClubPatch::default()
        };
        match self.clubs.update_club(self.club_id, patch, None).await? {
            UpdateResult::Missing => Err(self.not_found()),
            _ => Ok(()),
        }
    }

    /// Removes the club document. Threads are intentionally left behind and
    /// stay queryable by club id.
    pub async fn delete(&self) -> Result<()> {
        self.clubs.delete_club(self.club_id).await?;
        Ok(())
    }

    async fn read(&self) -> Result<Versioned<Club>> {
        self.clubs
            .get_club(self.club_id)
            .await?
            .ok_or_else(|| self.not_found())
    }

    fn not_found(&self) -> AppError {
        AppError::NotFound("Club".into(), self.club_id.to_string())
    }

    async fn update_with_retry<F>(&self, mut make_patch: F) -> Result<()>
    where
        F: FnMut(&Versioned<Club>) -> Result<Option<ClubPatch>>,
    {
        for _ in 0..UPDATE_RETRIES {
            let stored = self.read().await?;
            let Some(patch) = make_patch(&stored)? else {
                return Ok(());
            };
            match self
                .clubs
                .update_club(self.club_id, patch, Some(stored.version))
                .await?
            {
                UpdateResult::Applied { .. } => return Ok(()),
                UpdateResult::Conflict => continue,
                UpdateResult::Missing => return Err(self.not_found()),
            }
        }
        Err(AppError::Conflict(format!(
            "club {} update lost the version race {UPDATE_RETRIES} times",
            self.club_id
        )))
    }
}

/// Reconciled view stream over the club's live snapshots.
///
/// Dropping the stream tears the subscription down.
pub struct ClubViews {
    snapshots: ClubSnapshots,
    clubs: Arc<dyn ClubStore>,
    club_id: Uuid,
}

impl ClubViews {
    /// Latest reconciled view without waiting; `None` once the club is gone.
    pub fn current(&self) -> Option<ClubView> {
        self.snapshots.borrow().as_ref().map(reconcile)
    }

    /// Waits for the next snapshot and reconciles it, issuing the founder
    /// repair when needed. `Ok(None)` means the club was deleted.
    pub async fn changed(&mut self) -> Result<Option<ClubView>> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| AppError::Internal("club subscription closed".into()))?;
        let stored = self.snapshots.borrow_and_update().clone();
        let Some(stored) = stored else {
            return Ok(None);
        };
        let view = reconcile(&stored);
        if view.repaired {
            repair_membership(&self.clubs, self.club_id, &stored, &view).await?;
        }
        Ok(Some(view))
    }
}

/// Corrective write restoring the founder-in-members invariant.
///
/// Conditional on the observed version: when several observers race to repair
/// the same snapshot, the losers see a fresh snapshot that no longer needs
/// repair, so the write cannot loop.
async fn repair_membership(
    clubs: &Arc<dyn ClubStore>,
    club_id: Uuid,
    stored: &Versioned<Club>,
    view: &ClubView,
) -> Result<()> {
    let patch = ClubPatch {
        members: Some(view.club.members.clone()),
        member_count: Some(view.club.member_count),
        ..ClubPatch::default()
    };
    match clubs.update_club(club_id, patch, Some(stored.version)).await? {
        UpdateResult::Applied { version } => {
            debug!(%club_id, version, "restored founder membership");
        }
        UpdateResult::Conflict => {
            debug!(%club_id, "membership repair superseded by a newer write");
        }
        UpdateResult::Missing => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ls_core::models::NewClub;
    use ls_store_memory::MemoryDocumentStore;

    async fn seed_club(store: &Arc<MemoryDocumentStore>, founder: &str) -> Uuid {
        let club = store
            .add_club(NewClub {
                name: "Rust Readers".into(),
                description: "One chapter a week".into(),
                is_public: true,
                created_by: founder.into(),
                created_at: Utc::now(),
                image_url: None,
            })
            .await
            .unwrap();
        club.id
    }

    fn sync(store: &Arc<MemoryDocumentStore>, club_id: Uuid) -> MembershipSync {
        MembershipSync::new(store.clone() as Arc<dyn ClubStore>, club_id)
    }

    #[tokio::test]
    async fn test_reconcile_restores_founder_and_count() {
        let store = Arc::new(MemoryDocumentStore::new());
        let club_id = seed_club(&store, "founder").await;

        // Degrade to the legacy shape: founder dropped from members.
        store
            .update_club(
                club_id,
                ClubPatch {
                    members: Some(vec!["reader".into()]),
                    member_count: Some(1),
                    ..ClubPatch::default()
                },
                None,
            )
            .await
            .unwrap();

        let view = sync(&store, club_id).view().await.unwrap();
        assert!(view.repaired);
        assert!(view.club.members.contains(&"founder".to_string()));
        assert_eq!(view.club.member_count, 2);

        // The corrective write must have landed in the store as well.
        let stored = store.get_club(club_id).await.unwrap().unwrap();
        assert!(stored.doc.members.contains(&"founder".to_string()));
        assert_eq!(stored.doc.member_count, 2);

        // And a second pass finds nothing to repair.
        let view = sync(&store, club_id).view().await.unwrap();
        assert!(!view.repaired);
    }

    #[tokio::test]
    async fn test_request_join_is_deduplicated_by_user() {
        let store = Arc::new(MemoryDocumentStore::new());
        let club_id = seed_club(&store, "founder").await;
        let sync = sync(&store, club_id);

        sync.request_join("reader", "Grace").await.unwrap();
        sync.request_join("reader", "Grace").await.unwrap();

        let view = sync.view().await.unwrap();
        assert_eq!(view.club.pending_requests.len(), 1);
        assert_eq!(view.relation("reader"), Relation::Pending);

        let err = sync.request_join("founder", "Me").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyMember(_)));
    }

    #[tokio::test]
    async fn test_accept_moves_requester_into_members() {
        let store = Arc::new(MemoryDocumentStore::new());
        let club_id = seed_club(&store, "founder").await;
        let sync = sync(&store, club_id);

        sync.request_join("reader", "Grace").await.unwrap();
        sync.respond_to_request("reader", true).await.unwrap();

        let view = sync.view().await.unwrap();
        assert_eq!(view.relation("reader"), Relation::Member);
        assert!(!view.club.has_pending_request("reader"));
        assert_eq!(view.club.member_count, 2);
    }

    #[tokio::test]
    async fn test_decline_removes_from_both_sets() {
        let store = Arc::new(MemoryDocumentStore::new());
        let club_id = seed_club(&store, "founder").await;
        let sync = sync(&store, club_id);

        sync.request_join("reader", "Grace").await.unwrap();
        sync.respond_to_request("reader", false).await.unwrap();

        let view = sync.view().await.unwrap();
        assert_eq!(view.relation("reader"), Relation::None);
        assert_eq!(view.club.member_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_accepts_both_land() {
        let store = Arc::new(MemoryDocumentStore::new());
        let club_id = seed_club(&store, "founder").await;
        let sync_a = sync(&store, club_id);
        let sync_b = sync(&store, club_id);

        sync_a.request_join("reader-1", "Grace").await.unwrap();
        sync_a.request_join("reader-2", "Alan").await.unwrap();

        let (a, b) = tokio::join!(
            sync_a.respond_to_request("reader-1", true),
            sync_b.respond_to_request("reader-2", true),
        );
        a.unwrap();
        b.unwrap();

        let view = sync_a.view().await.unwrap();
        assert_eq!(view.club.member_count, 3);
        assert!(view.club.pending_requests.is_empty());
    }

    #[tokio::test]
    async fn test_leave_rules() {
        let store = Arc::new(MemoryDocumentStore::new());
        let club_id = seed_club(&store, "founder").await;
        let sync = sync(&store, club_id);

        sync.request_join("reader", "Grace").await.unwrap();
        sync.respond_to_request("reader", true).await.unwrap();
        sync.leave("reader").await.unwrap();

        let view = sync.view().await.unwrap();
        assert_eq!(view.relation("reader"), Relation::None);
        assert_eq!(view.club.member_count, 1);

        let err = sync.leave("founder").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = sync.leave("stranger").await.unwrap_err();
        assert!(matches!(err, AppError::NotMember(_)));
    }

    #[tokio::test]
    async fn test_subscription_streams_reconciled_views() {
        let store = Arc::new(MemoryDocumentStore::new());
        let club_id = seed_club(&store, "founder").await;
        let sync = sync(&store, club_id);
        let mut views = sync.subscribe();

        assert_eq!(views.current().unwrap().club.member_count, 1);

        sync.request_join("reader", "Grace").await.unwrap();
        let view = views.changed().await.unwrap().unwrap();
        assert!(view.club.has_pending_request("reader"));

        sync.delete().await.unwrap();
        assert!(views.changed().await.unwrap().is_none());
    }
}
