//! Discussion scenarios across two live subscribers: ordering, likes, and
//! id-addressed comments under interleaved mutations.

use chrono::Utc;

use integration_tests::app_state;
use ls_core::models::SessionUser;
use ls_core::traits::ThreadStore;
use ls_sync::NewClubInput;

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
async fn thread_feed_stays_in_sync_across_subscribers() {
    let (state, _, _) = app_state();
    let founder = user("founder", "Ada");

    let club = state
        .directory
        .create_club(
            &founder,
            NewClubInput {
                name: "Serial Readers".into(),
                description: "One thread per chapter".into(),
                is_public: true,
            },
            None,
        )
        .await
        .unwrap();

    let poster = state.discussion(club.id);
    let watcher = state.discussion(club.id);
    let mut feed = watcher.subscribe();

    let first = poster.post_thread(&founder, "Chapter 1").await.unwrap();
    feed.changed().await.unwrap();
    feed.borrow_and_update();
    let second = poster.post_thread(&founder, "Chapter 2").await.unwrap();
    feed.changed().await.unwrap();

    // Newest first, on the watcher's side too.
    let snapshot = feed.borrow_and_update().clone();
    let ids: Vec<_> = snapshot.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    // An edit re-publishes the whole list with the edited flag set.
    poster
        .edit_thread(first.id, "founder", "Chapter 1 (revised)")
        .await
        .unwrap();
    feed.changed().await.unwrap();
    let snapshot = feed.borrow_and_update().clone();
    let edited = snapshot.iter().find(|t| t.id == first.id).unwrap();
    assert!(edited.edited);
    assert_eq!(edited.content, "Chapter 1 (revised)");
}

#[tokio::test]
async fn likes_and_comments_from_two_clients_converge() {
    let (state, store, _) = app_state();
    let founder = user("founder", "Ada");
    let reader = user("reader", "Grace");

    let club = state
        .directory
        .create_club(
            &founder,
            NewClubInput {
                name: "Debate Club".into(),
                description: "Strong opinions".into(),
                is_public: true,
            },
            None,
        )
        .await
        .unwrap();
    state
        .membership(club.id)
        .request_join("reader", "Grace")
        .await
        .unwrap();
    state
        .membership(club.id)
        .respond_to_request("reader", true)
        .await
        .unwrap();

    let side_a = state.discussion(club.id);
    let side_b = state.discussion(club.id);
    let thread = side_a.post_thread(&founder, "Hot take").await.unwrap();

    // Two users like concurrently; the count equals the set size.
    let (a, b) = tokio::join!(
        side_a.toggle_like(thread.id, "founder"),
        side_b.toggle_like(thread.id, "reader"),
    );
    a.unwrap();
    b.unwrap();
    let stored = store.get_thread(thread.id).await.unwrap().unwrap();
    assert_eq!(stored.doc.likes, 2);
    assert_eq!(stored.doc.likes as usize, stored.doc.liked_by.len());

    // Comments from both sides keep their identity: deleting one client's
    // comment never shifts the other's edit onto the wrong entry.
    let from_a = side_a
        .add_comment(thread.id, &founder, "First!")
        .await
        .unwrap();
    let from_b = side_b
        .add_comment(thread.id, &reader, "Counterpoint")
        .await
        .unwrap();

    side_a.delete_comment(thread.id, from_a.id, "founder").await.unwrap();
    side_b
        .edit_comment(thread.id, from_b.id, "reader", "Counterpoint, refined")
        .await
        .unwrap();

    let stored = store.get_thread(thread.id).await.unwrap().unwrap();
    assert_eq!(stored.doc.comments.len(), 1);
    assert_eq!(stored.doc.comments[0].id, from_b.id);
    assert_eq!(stored.doc.comments[0].content, "Counterpoint, refined");
}
