//! Shared harness for the cross-crate scenarios: a fully wired [`AppState`]
//! over the in-process adapters, with object-store and catalog stand-ins
//! that keep the tests network-free.

use std::sync::Arc;

use async_trait::async_trait;

use ls_api::AppState;
use ls_auth_local::LocalSessionProvider;
use ls_core::models::{BookDetail, BookIdentifier, BookSummary};
use ls_core::traits::{
    BookCatalog, ClubStore, ImageStore, ProfileStore, SessionProvider, ThreadStore,
};
use ls_store_memory::MemoryDocumentStore;
use ls_sync::{CheckInTracker, ClubDirectory, SessionSync};

/// Object-store stand-in: accepts every upload and echoes a URL back.
pub struct EchoImages;

#[async_trait]
impl ImageStore for EchoImages {
    async fn upload(&self, key: &str, _bytes: Vec<u8>) -> anyhow::Result<String> {
        Ok(format!("mem://{key}"))
    }
}

/// Catalog stand-in serving a fixed shelf of volumes.
pub struct StaticCatalog {
    volumes: Vec<BookDetail>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self {
            volumes: vec![BookDetail {
                id: "dune-1965".into(),
                title: "Dune".into(),
                subtitle: None,
                authors: vec!["Frank Herbert".into()],
                description_html: Some("<p>Arrakis.</p>".into()),
                thumbnail: None,
                preview_link: None,
                page_count: Some(412),
                average_rating: Some(4.5),
                ratings_count: Some(10000),
                identifiers: vec![BookIdentifier {
                    kind: "ISBN_13".into(),
                    value: "9780441013593".into(),
                }],
            }],
        }
    }
}

#[async_trait]
impl BookCatalog for StaticCatalog {
    async fn search(&self, query: &str) -> Vec<BookSummary> {
        let query = query.to_ascii_lowercase();
        self.volumes
            .iter()
            .filter(|v| v.title.to_ascii_lowercase().contains(&query))
            .map(|v| BookSummary {
                id: v.id.clone(),
                title: v.title.clone(),
                authors: v.authors.clone(),
                thumbnail: v.thumbnail.clone(),
            })
            .collect()
    }

    async fn volume(&self, id: &str) -> Option<BookDetail> {
        self.volumes.iter().find(|v| v.id == id).cloned()
    }
}

/// Wires every port to its in-process adapter and hands back the concrete
/// store and provider so tests can reach behind the trait objects (e.g. to
/// verify an email without the mail loop).
pub fn app_state() -> (AppState, Arc<MemoryDocumentStore>, Arc<LocalSessionProvider>) {
    let store = Arc::new(MemoryDocumentStore::new());
    let provider = Arc::new(LocalSessionProvider::new());

    let clubs: Arc<dyn ClubStore> = store.clone();
    let threads: Arc<dyn ThreadStore> = store.clone();
    let profiles: Arc<dyn ProfileStore> = store.clone();
    let session_provider: Arc<dyn SessionProvider> = provider.clone();

    let state = AppState {
        clubs: clubs.clone(),
        threads: threads.clone(),
        session: Arc::new(SessionSync::new(session_provider, profiles.clone())),
        directory: Arc::new(ClubDirectory::new(clubs, threads, Arc::new(EchoImages))),
        check_ins: Arc::new(CheckInTracker::new(profiles)),
        catalog: Arc::new(StaticCatalog::default()),
    };
    (state, store, provider)
}
