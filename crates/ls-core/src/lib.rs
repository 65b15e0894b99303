//! litscope/crates/ls-core/src/lib.rs
//!
//! The central domain models and interface definitions for LitScope.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use uuid::Uuid;

    #[test]
    fn test_thread_creation_v7() {
        let id = Uuid::now_v7();
        let thread = Thread {
            id,
            club_id: Uuid::now_v7(),
            author_id: "uid-42".to_string(),
            author_name: "Ada".to_string(),
            content: "Hello Rust!".to_string(),
            created_at: chrono::Utc::now(),
            edited: false,
            likes: 0,
            liked_by: vec![],
            comments: vec![],
        };
        assert_eq!(thread.id, id);
        assert_eq!(thread.likes as usize, thread.liked_by.len());
    }

    #[test]
    fn test_club_membership_counts_founder() {
        let club = Club {
            id: Uuid::now_v7(),
            name: "Sci-Fi Circle".into(),
            description: "Weekly reads".into(),
            is_public: true,
            created_by: "founder".into(),
            created_at: chrono::Utc::now(),
            updated_at: None,
            // Legacy document shape: founder missing from members
            members: vec!["reader-1".into()],
            member_count: 1,
            pending_requests: vec![],
            image_url: None,
        };
        assert!(club.has_member("founder"));
        assert!(club.has_member("reader-1"));
        assert!(!club.has_member("stranger"));
    }
}
