//! # ls-store-memory
//!
//! In-process implementation of the document store ports: versioned
//! documents, field-granular patches with set-union/set-remove semantics,
//! conditional updates, and watch-channel live subscriptions that re-publish
//! the full snapshot on every committed write.
//!
//! Snapshots are published while the collection lock is held, so every
//! subscription observes commits in commit order.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use ls_core::models::{
    Club, ClubPatch, NewClub, NewThread, ProfilePatch, Thread, ThreadPatch, UpdateResult,
    UserProfile, Versioned,
};
use ls_core::traits::{
    ClubSnapshots, ClubStore, ProfileSnapshots, ProfileStore, ThreadSnapshots, ThreadStore,
};

pub struct MemoryDocumentStore {
    clubs: RwLock<HashMap<Uuid, Versioned<Club>>>,
    threads: RwLock<HashMap<Uuid, Versioned<Thread>>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    club_watchers: DashMap<Uuid, watch::Sender<Option<Versioned<Club>>>>,
    thread_watchers: DashMap<Uuid, watch::Sender<Vec<Thread>>>,
    profile_watchers: DashMap<String, watch::Sender<Option<UserProfile>>>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            clubs: RwLock::new(HashMap::new()),
            threads: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            club_watchers: DashMap::new(),
            thread_watchers: DashMap::new(),
            profile_watchers: DashMap::new(),
        }
    }

    fn publish_club(&self, id: Uuid, snapshot: Option<Versioned<Club>>) {
        if let Some(tx) = self.club_watchers.get(&id) {
            // Receivers may all be gone; a dropped subscription is not an error.
            let _ = tx.send(snapshot);
        }
    }

    fn publish_threads(&self, map: &HashMap<Uuid, Versioned<Thread>>, club_id: Uuid) {
        if let Some(tx) = self.thread_watchers.get(&club_id) {
            let _ = tx.send(threads_of(map, club_id));
        }
    }

    fn publish_profile(&self, uid: &str, snapshot: Option<UserProfile>) {
        if let Some(tx) = self.profile_watchers.get(uid) {
            let _ = tx.send(snapshot);
        }
    }
}

/// Query "threads where club_id = X ordered by created_at descending".
fn threads_of(map: &HashMap<Uuid, Versioned<Thread>>, club_id: Uuid) -> Vec<Thread> {
    let mut threads: Vec<Thread> = map
        .values()
        .filter(|v| v.doc.club_id == club_id)
        .map(|v| v.doc.clone())
        .collect();
    threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    threads
}

fn apply_club_patch(club: &mut Club, patch: ClubPatch) {
    if let Some(name) = patch.name {
        club.name = name;
    }
    if let Some(description) = patch.description {
        club.description = description;
    }
    if let Some(image_url) = patch.image_url {
        club.image_url = Some(image_url);
    }
    if let Some(updated_at) = patch.updated_at {
        club.updated_at = Some(updated_at);
    }
    if let Some(members) = patch.members {
        club.members = members;
    }
    for uid in patch.members_union {
        if !club.members.contains(&uid) {
            club.members.push(uid);
        }
    }
    if !patch.members_remove.is_empty() {
        club.members.retain(|m| !patch.members_remove.contains(m));
    }
    if let Some(count) = patch.member_count {
        club.member_count = count;
    }
    if let Some(requests) = patch.pending_requests {
        club.pending_requests = requests;
    }
    for request in patch.pending_requests_union {
        // Union semantics: only an identical element is a duplicate.
        if !club.pending_requests.contains(&request) {
            club.pending_requests.push(request);
        }
    }
}

fn apply_thread_patch(thread: &mut Thread, patch: ThreadPatch) {
    if let Some(content) = patch.content {
        thread.content = content;
    }
    if let Some(edited) = patch.edited {
        thread.edited = edited;
    }
    if let Some(likes) = patch.likes {
        thread.likes = likes;
    }
    for uid in patch.liked_by_union {
        if !thread.liked_by.contains(&uid) {
            thread.liked_by.push(uid);
        }
    }
    if !patch.liked_by_remove.is_empty() {
        thread.liked_by.retain(|u| !patch.liked_by_remove.contains(u));
    }
    if let Some(comments) = patch.comments {
        thread.comments = comments;
    }
}

#[async_trait]
impl ClubStore for MemoryDocumentStore {
    async fn add_club(&self, club: NewClub) -> anyhow::Result<Club> {
        let doc = Club {
            id: Uuid::now_v7(),
            name: club.name,
            description: club.description,
            is_public: club.is_public,
            members: vec![club.created_by.clone()],
            member_count: 1,
            created_by: club.created_by,
            created_at: club.created_at,
            updated_at: None,
            pending_requests: vec![],
            image_url: club.image_url,
        };
        let mut clubs = self.clubs.write().expect("club collection poisoned");
        clubs.insert(
            doc.id,
            Versioned {
                version: 1,
                doc: doc.clone(),
            },
        );
        self.publish_club(
            doc.id,
            Some(Versioned {
                version: 1,
                doc: doc.clone(),
            }),
        );
        Ok(doc)
    }

    async fn get_club(&self, id: Uuid) -> anyhow::Result<Option<Versioned<Club>>> {
        let clubs = self.clubs.read().expect("club collection poisoned");
        Ok(clubs.get(&id).cloned())
    }

    async fn list_clubs(&self) -> anyhow::Result<Vec<Club>> {
        let clubs = self.clubs.read().expect("club collection poisoned");
        let mut all: Vec<Club> = clubs.values().map(|v| v.doc.clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn clubs_with_member(&self, uid: &str) -> anyhow::Result<Vec<Club>> {
        let clubs = self.clubs.read().expect("club collection poisoned");
        let mut mine: Vec<Club> = clubs
            .values()
            .filter(|v| v.doc.has_member(uid))
            .map(|v| v.doc.clone())
            .collect();
        mine.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(mine)
    }

    async fn update_club(
        &self,
        id: Uuid,
        patch: ClubPatch,
        expected: Option<u64>,
    ) -> anyhow::Result<UpdateResult> {
        let mut clubs = self.clubs.write().expect("club collection poisoned");
        let Some(stored) = clubs.get_mut(&id) else {
            return Ok(UpdateResult::Missing);
        };
        if let Some(expected) = expected {
            if stored.version != expected {
                return Ok(UpdateResult::Conflict);
            }
        }
        apply_club_patch(&mut stored.doc, patch);
        stored.version += 1;
        let snapshot = stored.clone();
        let version = snapshot.version;
        self.publish_club(id, Some(snapshot));
        Ok(UpdateResult::Applied { version })
    }

    async fn delete_club(&self, id: Uuid) -> anyhow::Result<()> {
        let mut clubs = self.clubs.write().expect("club collection poisoned");
        // Idempotent, like the upstream store's delete. Threads are left in
        // place; orphan retention is the documented policy.
        if clubs.remove(&id).is_some() {
            self.publish_club(id, None);
        }
        Ok(())
    }

    fn watch_club(&self, id: Uuid) -> ClubSnapshots {
        // Registering under the collection read lock keeps the seed snapshot
        // consistent with the publish-under-write-lock discipline.
        let clubs = self.clubs.read().expect("club collection poisoned");
        let current = clubs.get(&id).cloned();
        self.club_watchers
            .entry(id)
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }
}

#[async_trait]
impl ThreadStore for MemoryDocumentStore {
    async fn add_thread(&self, thread: NewThread) -> anyhow::Result<Thread> {
        let doc = Thread {
            id: Uuid::now_v7(),
            club_id: thread.club_id,
            author_id: thread.author_id,
            author_name: thread.author_name,
            content: thread.content,
            created_at: thread.created_at,
            edited: false,
            likes: 0,
            liked_by: vec![],
            comments: vec![],
        };
        let mut threads = self.threads.write().expect("thread collection poisoned");
        threads.insert(
            doc.id,
            Versioned {
                version: 1,
                doc: doc.clone(),
            },
        );
        self.publish_threads(&threads, doc.club_id);
        Ok(doc)
    }

    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Versioned<Thread>>> {
        let threads = self.threads.read().expect("thread collection poisoned");
        Ok(threads.get(&id).cloned())
    }

    async fn threads_in_club(&self, club_id: Uuid) -> anyhow::Result<Vec<Thread>> {
        let threads = self.threads.read().expect("thread collection poisoned");
        Ok(threads_of(&threads, club_id))
    }

    async fn count_in_club(&self, club_id: Uuid) -> anyhow::Result<usize> {
        let threads = self.threads.read().expect("thread collection poisoned");
        Ok(threads.values().filter(|v| v.doc.club_id == club_id).count())
    }

    async fn update_thread(
        &self,
        id: Uuid,
        patch: ThreadPatch,
        expected: Option<u64>,
    ) -> anyhow::Result<UpdateResult> {
        let mut threads = self.threads.write().expect("thread collection poisoned");
        let Some(stored) = threads.get_mut(&id) else {
            return Ok(UpdateResult::Missing);
        };
        if let Some(expected) = expected {
            if stored.version != expected {
                return Ok(UpdateResult::Conflict);
            }
        }
        apply_thread_patch(&mut stored.doc, patch);
        stored.version += 1;
        let version = stored.version;
        let club_id = stored.doc.club_id;
        self.publish_threads(&threads, club_id);
        Ok(UpdateResult::Applied { version })
    }

    async fn delete_thread(&self, id: Uuid) -> anyhow::Result<()> {
        let mut threads = self.threads.write().expect("thread collection poisoned");
        if let Some(removed) = threads.remove(&id) {
            self.publish_threads(&threads, removed.doc.club_id);
        }
        Ok(())
    }

    fn watch_club_threads(&self, club_id: Uuid) -> ThreadSnapshots {
        let threads = self.threads.read().expect("thread collection poisoned");
        let current = threads_of(&threads, club_id);
        self.thread_watchers
            .entry(club_id)
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }
}

#[async_trait]
impl ProfileStore for MemoryDocumentStore {
    async fn get_profile(&self, uid: &str) -> anyhow::Result<Option<UserProfile>> {
        let profiles = self.profiles.read().expect("profile collection poisoned");
        Ok(profiles.get(uid).cloned())
    }

    async fn merge_profile(&self, uid: &str, patch: ProfilePatch) -> anyhow::Result<()> {
        let mut profiles = self.profiles.write().expect("profile collection poisoned");
        let profile = profiles.entry(uid.to_string()).or_insert_with(|| UserProfile {
            uid: uid.to_string(),
            ..UserProfile::default()
        });
        if let Some(username) = patch.username {
            profile.username = username;
        }
        if let Some(email) = patch.email {
            profile.email = email;
        }
        if let Some(streak) = patch.streak {
            profile.streak = streak;
        }
        if let Some(last_check_in) = patch.last_check_in {
            profile.last_check_in = Some(last_check_in);
        }
        if let Some(updated_at) = patch.updated_at {
            profile.updated_at = Some(updated_at);
        }
        let snapshot = profile.clone();
        self.publish_profile(uid, Some(snapshot));
        Ok(())
    }

    fn watch_profile(&self, uid: &str) -> ProfileSnapshots {
        let profiles = self.profiles.read().expect("profile collection poisoned");
        let current = profiles.get(uid).cloned();
        self.profile_watchers
            .entry(uid.to_string())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }
}
