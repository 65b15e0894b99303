//! # Check-in / Streak Tracker
//!
//! Pure date-difference state machine over the profile document: same day is
//! a no-op, consecutive days extend the streak, any gap resets it to one.
//! Dates are compared as ISO `YYYY-MM-DD` strings, the format they are
//! stored in.

use std::sync::Arc;

use chrono::{Days, NaiveDate};

use ls_core::error::Result;
use ls_core::models::ProfilePatch;
use ls_core::traits::ProfileStore;

const DATE_FMT: &str = "%Y-%m-%d";

/// Outcome of a check-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckIn {
    /// Today's check-in already happened; nothing was written.
    AlreadyCheckedIn { streak: u32 },
    /// The streak advanced (or reset) and was persisted.
    Recorded { streak: u32 },
}

impl CheckIn {
    pub fn streak(&self) -> u32 {
        match *self {
            CheckIn::AlreadyCheckedIn { streak } | CheckIn::Recorded { streak } => streak,
        }
    }
}

/// Next streak value for a check-in on `today`, or `None` when today is
/// already recorded.
pub fn next_streak(last_check_in: Option<&str>, today: NaiveDate, current: u32) -> Option<u32> {
    let today_str = today.format(DATE_FMT).to_string();
    if last_check_in == Some(today_str.as_str()) {
        return None;
    }
    let yesterday = today
        .checked_sub_days(Days::new(1))
        .map(|d| d.format(DATE_FMT).to_string());
    if last_check_in.is_some() && last_check_in == yesterday.as_deref() {
        Some(current + 1)
    } else {
        Some(1)
    }
}

pub struct CheckInTracker {
    profiles: Arc<dyn ProfileStore>,
}

impl CheckInTracker {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    pub async fn record_check_in(&self, uid: &str, today: NaiveDate) -> Result<CheckIn> {
        let profile = self.profiles.get_profile(uid).await?.unwrap_or_default();
        match next_streak(profile.last_check_in.as_deref(), today, profile.streak) {
            None => Ok(CheckIn::AlreadyCheckedIn {
                streak: profile.streak,
            }),
            Some(streak) => {
                self.profiles
                    .merge_profile(
                        uid,
                        ProfilePatch {
                            streak: Some(streak),
                            last_check_in: Some(today.format(DATE_FMT).to_string()),
                            ..ProfilePatch::default()
                        },
                    )
                    .await?;
                Ok(CheckIn::Recorded { streak })
            }
        }
    }
}
