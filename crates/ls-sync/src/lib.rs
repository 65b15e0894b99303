//! litscope/crates/ls-sync/src/lib.rs
//!
//! The synchronizer layer: pure reducers over the store's live snapshot
//! streams, plus the mutations each view exposes. Everything here talks to
//! the outside world only through the ls-core ports, so the whole layer runs
//! unchanged against the in-memory adapters in tests.

pub mod directory;
pub mod discussion;
pub mod membership;
pub mod session;
pub mod streak;

pub use directory::{ClubCard, ClubDirectory, CoverImage, NewClubInput};
pub use discussion::DiscussionSync;
pub use membership::{reconcile, ClubView, ClubViews, MembershipSync, Relation};
pub use session::{SessionSync, UserSnapshot};
pub use streak::{next_streak, CheckIn, CheckInTracker};
