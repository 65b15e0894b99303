//! # Club Directory
//!
//! Creation and listing of clubs outside the scope of any single club's
//! live view: the public directory, the caller's own clubs, and cover-image
//! handling against the object store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use ls_core::error::{AppError, Result};
use ls_core::models::{Club, ClubPatch, NewClub, SessionUser, UpdateResult};
use ls_core::traits::{ClubStore, ImageStore, ThreadStore};

/// Directory entry: a club enriched with its discussion count.
#[derive(Debug, Clone, Serialize)]
pub struct ClubCard {
    #[serde(flatten)]
    pub club: Club,
    pub discussion_count: usize,
}

#[derive(Debug, Clone)]
pub struct NewClubInput {
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

/// An uploaded cover image, as received from the client.
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct ClubDirectory {
    clubs: Arc<dyn ClubStore>,
    threads: Arc<dyn ThreadStore>,
    images: Arc<dyn ImageStore>,
}

impl ClubDirectory {
    pub fn new(
        clubs: Arc<dyn ClubStore>,
        threads: Arc<dyn ThreadStore>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            clubs,
            threads,
            images,
        }
    }

    /// Creates a club with the founder as its sole member, uploading the
    /// cover image first when one was provided.
    pub async fn create_club(
        &self,
        founder: &SessionUser,
        input: NewClubInput,
        cover: Option<CoverImage>,
    ) -> Result<Club> {
        if input.name.trim().is_empty() || input.description.trim().is_empty() {
            return Err(AppError::Validation(
                "club name and description must not be empty".into(),
            ));
        }
        let image_url = match cover {
            Some(cover) => Some(self.upload_cover(cover).await?),
            None => None,
        };
        let club = self
            .clubs
            .add_club(NewClub {
                name: input.name.trim().to_string(),
                description: input.description.trim().to_string(),
                is_public: input.is_public,
                created_by: founder.uid.clone(),
                created_at: Utc::now(),
                image_url,
            })
            .await?;
        Ok(club)
    }

    /// Every club, enriched with discussion counts.
    pub async fn list_clubs(&self) -> Result<Vec<ClubCard>> {
        let clubs = self.clubs.list_clubs().await?;
        self.enrich(clubs).await
    }

    /// Clubs the user belongs to, enriched with discussion counts.
    pub async fn clubs_with_member(&self, uid: &str) -> Result<Vec<ClubCard>> {
        let clubs = self.clubs.clubs_with_member(uid).await?;
        self.enrich(clubs).await
    }

    /// Replaces a club's cover image and returns the new URL.
    pub async fn update_cover(&self, club_id: Uuid, cover: CoverImage) -> Result<String> {
        let url = self.upload_cover(cover).await?;
        let patch = ClubPatch {
            image_url: Some(url.clone()),
            updated_at: Some(Utc::now()),
            ..ClubPatch::default()
        };
        match self.clubs.update_club(club_id, patch, None).await? {
            UpdateResult::Missing => Err(AppError::NotFound("Club".into(), club_id.to_string())),
            _ => Ok(url),
        }
    }

    async fn enrich(&self, clubs: Vec<Club>) -> Result<Vec<ClubCard>> {
        let mut cards = Vec::with_capacity(clubs.len());
        for club in clubs {
            let discussion_count = self.threads.count_in_club(club.id).await?;
            cards.push(ClubCard {
                club,
                discussion_count,
            });
        }
        Ok(cards)
    }

    /// Object key: `club-images/{millis}_{sanitized original filename}`.
    async fn upload_cover(&self, cover: CoverImage) -> Result<String> {
        if cover.bytes.is_empty() {
            return Err(AppError::Validation("cover image is empty".into()));
        }
        let key = format!(
            "club-images/{}_{}",
            Utc::now().timestamp_millis(),
            safe_file_name(&cover.file_name)
        );
        let url = self.images.upload(&key, cover.bytes).await?;
        Ok(url)
    }
}

fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.trim_matches('-').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use ls_store_memory::MemoryDocumentStore;

    /// Object-store stand-in that records nothing and echoes the key back.
    struct EchoImages;

    #[async_trait]
    impl ImageStore for EchoImages {
        async fn upload(&self, key: &str, _bytes: Vec<u8>) -> anyhow::Result<String> {
            Ok(format!("mem://{key}"))
        }
    }

    fn founder() -> SessionUser {
        SessionUser {
            uid: "founder".into(),
            email: "f@example.com".into(),
            display_name: "Ada".into(),
            email_verified: true,
            created_at: Utc::now(),
        }
    }

    fn directory(store: &Arc<MemoryDocumentStore>) -> ClubDirectory {
        ClubDirectory::new(
            store.clone() as Arc<dyn ClubStore>,
            store.clone() as Arc<dyn ThreadStore>,
            Arc::new(EchoImages),
        )
    }

    #[tokio::test]
    async fn test_create_club_uploads_cover_and_seeds_membership() {
        let store = Arc::new(MemoryDocumentStore::new());
        let dir = directory(&store);

        let club = dir
            .create_club(
                &founder(),
                NewClubInput {
                    name: "Hard SF".into(),
                    description: "Physics first".into(),
                    is_public: false,
                },
                Some(CoverImage {
                    file_name: "cover image!.png".into(),
                    bytes: vec![1, 2, 3],
                }),
            )
            .await
            .unwrap();

        assert_eq!(club.member_count, 1);
        assert_eq!(club.members, vec!["founder".to_string()]);
        let url = club.image_url.unwrap();
        assert!(url.starts_with("mem://club-images/"));
        assert!(url.ends_with("_cover-image-.png"));
    }

    #[tokio::test]
    async fn test_listings_carry_discussion_counts() {
        let store = Arc::new(MemoryDocumentStore::new());
        let dir = directory(&store);

        let club = dir
            .create_club(
                &founder(),
                NewClubInput {
                    name: "Counted".into(),
                    description: "d".into(),
                    is_public: true,
                },
                None,
            )
            .await
            .unwrap();
        store
            .add_thread(ls_core::models::NewThread {
                club_id: club.id,
                author_id: "founder".into(),
                author_name: "Ada".into(),
                content: "hello".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let all = dir.list_clubs().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].discussion_count, 1);

        let mine = dir.clubs_with_member("founder").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(dir.clubs_with_member("stranger").await.unwrap().is_empty());
    }
}
