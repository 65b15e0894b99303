//! End-to-end membership scenario at the synchronizer layer: two users, two
//! live subscriptions, one club lifecycle from creation through deletion.

use chrono::Utc;

use integration_tests::app_state;
use ls_core::models::SessionUser;
use ls_core::traits::ThreadStore;
use ls_sync::{NewClubInput, Relation};

fn user(uid: &str, name: &str) -> SessionUser {
    SessionUser {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        display_name: name.into(),
        email_verified: true,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn public_club_lifecycle_is_visible_to_both_sides() {
    let (state, store, _) = app_state();
    let founder = user("founder", "Ada");
    let joiner = user("joiner", "Grace");

    // Creation: the club appears in the public directory with one member.
    let club = state
        .directory
        .create_club(
            &founder,
            NewClubInput {
                name: "Orbit Readers".into(),
                description: "Space opera only".into(),
                is_public: true,
            },
            None,
        )
        .await
        .unwrap();
    let listed = state.directory.list_clubs().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].club.member_count, 1);

    // Each side holds its own synchronizer, as two clients would.
    let founder_side = state.membership(club.id);
    let joiner_side = state.membership(club.id);
    let mut founder_views = founder_side.subscribe();
    let mut joiner_views = joiner_side.subscribe();

    // The join request lands in the founder's live view.
    joiner_side.request_join("joiner", "Grace").await.unwrap();
    let seen = founder_views.changed().await.unwrap().unwrap();
    assert!(seen.club.has_pending_request("joiner"));
    assert_eq!(seen.relation("joiner"), Relation::Pending);

    // Acceptance flows back to the joiner's live view.
    founder_side.respond_to_request("joiner", true).await.unwrap();
    let seen = joiner_views.changed().await.unwrap().unwrap();
    assert_eq!(seen.relation("joiner"), Relation::Member);
    assert_eq!(seen.club.member_count, 2);
    assert!(!seen.club.has_pending_request("joiner"));

    // "My clubs" now includes it for the joiner.
    let mine = state.directory.clubs_with_member("joiner").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].club.member_count, 2);

    // A thread posted before deletion...
    let thread = state
        .discussion(club.id)
        .post_thread(&joiner, "What about Banks?")
        .await
        .unwrap();

    // ...survives the club's deletion as an orphan, while the club itself
    // drops out of every listing and both live views.
    founder_side.delete().await.unwrap();
    assert!(founder_views.changed().await.unwrap().is_none());
    assert!(joiner_views.changed().await.unwrap().is_none());
    assert!(state.directory.list_clubs().await.unwrap().is_empty());

    let orphans = store.threads_in_club(club.id).await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].id, thread.id);
}

#[tokio::test]
async fn declined_request_leaves_no_trace() {
    let (state, _, _) = app_state();
    let founder = user("founder", "Ada");

    let club = state
        .directory
        .create_club(
            &founder,
            NewClubInput {
                name: "Closed Shop".into(),
                description: "Invite only".into(),
                is_public: false,
            },
            None,
        )
        .await
        .unwrap();

    let membership = state.membership(club.id);
    membership.request_join("hopeful", "Eve").await.unwrap();
    membership.respond_to_request("hopeful", false).await.unwrap();

    let view = membership.view().await.unwrap();
    assert_eq!(view.relation("hopeful"), Relation::None);
    assert!(!view.club.members.iter().any(|m| m == "hopeful"));
    assert!(!view.club.has_pending_request("hopeful"));
    assert_eq!(view.club.member_count, 1);
}
