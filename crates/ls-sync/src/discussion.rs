//! # Discussion Synchronizer
//!
//! Live view of one club's threads (newest first) plus the mutations on
//! threads and their nested comments. Posting is gated on club membership;
//! edits and deletes are gated on authorship. Like-toggles and comment
//! mutations run as conditional updates so concurrent writers cannot lose
//! each other's changes, and comments are addressed by their stable id.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use ls_core::error::{AppError, Result};
use ls_core::models::{
    Comment, NewThread, SessionUser, Thread, ThreadPatch, UpdateResult, Versioned,
};
use ls_core::traits::{ClubStore, ThreadSnapshots, ThreadStore};

const UPDATE_RETRIES: usize = 5;

pub struct DiscussionSync {
    clubs: Arc<dyn ClubStore>,
    threads: Arc<dyn ThreadStore>,
    club_id: Uuid,
}

impl DiscussionSync {
    pub fn new(clubs: Arc<dyn ClubStore>, threads: Arc<dyn ThreadStore>, club_id: Uuid) -> Self {
        Self {
            clubs,
            threads,
            club_id,
        }
    }

    /// Live-subscribes to the club's thread list, newest first.
    pub fn subscribe(&self) -> ThreadSnapshots {
        self.threads.watch_club_threads(self.club_id)
    }

    /// Point read of the current thread list.
    pub async fn snapshot(&self) -> Result<Vec<Thread>> {
        Ok(self.threads.threads_in_club(self.club_id).await?)
    }

    /// Posts a new thread. Non-members are rejected; nothing is written.
    pub async fn post_thread(&self, author: &SessionUser, content: &str) -> Result<Thread> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("thread content must not be empty".into()));
        }
        let club = self
            .clubs
            .get_club(self.club_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Club".into(), self.club_id.to_string()))?;
        if !club.doc.has_member(&author.uid) {
            return Err(AppError::NotMember(
                "you must be a member to post in this club".into(),
            ));
        }
        let thread = self
            .threads
            .add_thread(NewThread {
                club_id: self.club_id,
                author_id: author.uid.clone(),
                author_name: display_name(author),
                content: content.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        Ok(thread)
    }

    /// Flips the caller's like on a thread and returns the new like count.
    /// Applying it twice with no intervening change restores the original
    /// state.
    pub async fn toggle_like(&self, thread_id: Uuid, user_id: &str) -> Result<u32> {
        let mut new_likes = 0;
        self.update_with_retry(thread_id, |stored| {
            let thread = &stored.doc;
            if thread.liked_by.iter().any(|u| u == user_id) {
                new_likes = thread.liked_by.len() as u32 - 1;
                Ok(Some(ThreadPatch {
                    likes: Some(new_likes),
                    liked_by_remove: vec![user_id.to_string()],
                    ..ThreadPatch::default()
                }))
            } else {
                new_likes = thread.liked_by.len() as u32 + 1;
                Ok(Some(ThreadPatch {
                    likes: Some(new_likes),
                    liked_by_union: vec![user_id.to_string()],
                    ..ThreadPatch::default()
                }))
            }
        })
        .await?;
        Ok(new_likes)
    }

    /// Rewrites a thread's content and marks it edited. Author-only.
    pub async fn edit_thread(&self, thread_id: Uuid, editor: &str, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("thread content must not be empty".into()));
        }
        self.update_with_retry(thread_id, |stored| {
            if stored.doc.author_id != editor {
                return Err(AppError::Forbidden("only the author can edit a thread".into()));
            }
            Ok(Some(ThreadPatch {
                content: Some(content.to_string()),
                edited: Some(true),
                ..ThreadPatch::default()
            }))
        })
        .await
    }

    /// Hard-deletes a thread. Author-only; no soft-delete.
    pub async fn delete_thread(&self, thread_id: Uuid, caller: &str) -> Result<()> {
        let stored = self.read(thread_id).await?;
        if stored.doc.author_id != caller {
            return Err(AppError::Forbidden("only the author can delete a thread".into()));
        }
        self.threads.delete_thread(thread_id).await?;
        Ok(())
    }

    /// Appends a comment with a freshly assigned id and returns it.
    pub async fn add_comment(
        &self,
        thread_id: Uuid,
        author: &SessionUser,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment must not be empty".into()));
        }
        let comment = Comment {
            id: Uuid::now_v7(),
            content: content.to_string(),
            author_id: author.uid.clone(),
            author_name: display_name(author),
            created_at: Utc::now(),
            edited: false,
        };
        self.update_with_retry(thread_id, |stored| {
            let mut comments = stored.doc.comments.clone();
            comments.push(comment.clone());
            Ok(Some(ThreadPatch {
                comments: Some(comments),
                ..ThreadPatch::default()
            }))
        })
        .await?;
        Ok(comment)
    }

    /// Rewrites one comment, addressed by id. Author-only.
    pub async fn edit_comment(
        &self,
        thread_id: Uuid,
        comment_id: Uuid,
        editor: &str,
        content: &str,
    ) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment must not be empty".into()));
        }
        self.update_with_retry(thread_id, |stored| {
            let mut comments = stored.doc.comments.clone();
            let Some(comment) = comments.iter_mut().find(|c| c.id == comment_id) else {
                return Err(AppError::NotFound("Comment".into(), comment_id.to_string()));
            };
            if comment.author_id != editor {
                return Err(AppError::Forbidden("only the author can edit a comment".into()));
            }
            comment.content = content.to_string();
            comment.edited = true;
            Ok(Some(ThreadPatch {
                comments: Some(comments),
                ..ThreadPatch::default()
            }))
        })
        .await
    }

    /// Removes one comment, addressed by id. Author-only.
    pub async fn delete_comment(&self, thread_id: Uuid, comment_id: Uuid, caller: &str) -> Result<()> {
        self.update_with_retry(thread_id, |stored| {
            let Some(comment) = stored.doc.comments.iter().find(|c| c.id == comment_id) else {
                return Err(AppError::NotFound("Comment".into(), comment_id.to_string()));
            };
            if comment.author_id != caller {
                return Err(AppError::Forbidden(
                    "only the author can delete a comment".into(),
                ));
            }
            let comments: Vec<Comment> = stored
                .doc
                .comments
                .iter()
                .filter(|c| c.id != comment_id)
                .cloned()
                .collect();
            Ok(Some(ThreadPatch {
                comments: Some(comments),
                ..ThreadPatch::default()
            }))
        })
        .await
    }

    /// Point read scoped to this club; a thread parked under another club is
    /// reported as missing rather than acted on.
    async fn read(&self, thread_id: Uuid) -> Result<Versioned<Thread>> {
        let stored = self
            .threads
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Thread".into(), thread_id.to_string()))?;
        if stored.doc.club_id != self.club_id {
            return Err(AppError::NotFound("Thread".into(), thread_id.to_string()));
        }
        Ok(stored)
    }

    async fn update_with_retry<F>(&self, thread_id: Uuid, mut make_patch: F) -> Result<()>
    where
        F: FnMut(&Versioned<Thread>) -> Result<Option<ThreadPatch>>,
    {
        for _ in 0..UPDATE_RETRIES {
            let stored = self.read(thread_id).await?;
            let Some(patch) = make_patch(&stored)? else {
                return Ok(());
            };
            match self
                .threads
                .update_thread(thread_id, patch, Some(stored.version))
                .await?
            {
                UpdateResult::Applied { .. } => return Ok(()),
                UpdateResult::Conflict => continue,
                UpdateResult::Missing => {
                    return Err(AppError::NotFound("Thread".into(), thread_id.to_string()))
                }
            }
        }
        Err(AppError::Conflict(format!(
            "thread {thread_id} update lost the version race {UPDATE_RETRIES} times"
        )))
    }
}

fn display_name(user: &SessionUser) -> String {
    if user.display_name.trim().is_empty() {
        "Anonymous".to_string()
    } else {
        user.display_name.clone()
    }
}
