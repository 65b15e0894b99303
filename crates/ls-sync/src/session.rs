//! # Session Synchronizer
//!
//! Front door to the identity provider plus the live join of "who is signed
//! in" with "their profile document". The provider only knows about
//! credentials, while usernames, streaks and check-ins live in the store.
//!
//! The email-verification gate lives here: providers happily hand back
//! sessions for unverified accounts, and this layer refuses them.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;

use ls_core::error::{AppError, Result};
use ls_core::models::{AuthSession, ProfilePatch, SessionUser, UserProfile};
use ls_core::traits::{ProfileSnapshots, ProfileStore, SessionProvider};

/// Minimum the provider will accept anyway; checked early for a clean error.
const MIN_PASSWORD_LEN: usize = 6;

/// One emission of the session-profile join.
#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    pub user: SessionUser,
    pub profile: Option<UserProfile>,
}

pub struct SessionSync {
    provider: Arc<dyn SessionProvider>,
    profiles: Arc<dyn ProfileStore>,
}

impl SessionSync {
    pub fn new(provider: Arc<dyn SessionProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { provider, profiles }
    }

    /// Registers an account; the provider queues the verification mail.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Result<SessionUser> {
        if username.trim().is_empty() {
            return Err(AppError::Validation("username must not be empty".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        self.provider
            .sign_up(email, password, username.trim())
            .await
            .map_err(|err| AppError::Validation(err.to_string()))
    }

    /// Password sign-in, gated on a verified email address.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self
            .provider
            .sign_in_with_password(email, password)
            .await?
            .ok_or_else(|| AppError::AuthRejected("invalid email or password".into()))?;
        if !session.user.email_verified {
            // Don't leave a usable token behind for a gated account.
            self.provider.sign_out(&session.token).await?;
            return Err(AppError::AuthRejected(
                "please verify your email before logging in".into(),
            ));
        }
        Ok(session)
    }

    /// Federated sign-in; accounts from external providers arrive verified.
    pub async fn sign_in_with_provider(&self, assertion: &str) -> Result<AuthSession> {
        self.provider
            .sign_in_with_provider(assertion)
            .await
            .map_err(|err| AppError::AuthRejected(err.to_string()))
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(AppError::Validation("please enter your email first".into()));
        }
        self.provider.send_password_reset(email).await?;
        Ok(())
    }

    pub async fn sign_out(&self, token: &str) -> Result<()> {
        self.provider.sign_out(token).await?;
        Ok(())
    }

    /// Resolves a bearer token to its session user, if any.
    pub async fn resolve(&self, token: &str) -> Result<Option<SessionUser>> {
        Ok(self.provider.session_user(token).await?)
    }

    pub async fn profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get_profile(uid).await?)
    }

    /// Saves profile edits: display name through the provider, username and
    /// email as a merge write on the profile document.
    pub async fn update_profile(
        &self,
        user: &SessionUser,
        display_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<()> {
        if let Some(name) = display_name {
            if name != user.display_name {
                self.provider.update_display_name(&user.uid, name).await?;
            }
        }
        self.profiles
            .merge_profile(
                &user.uid,
                ProfilePatch {
                    username: username.map(|u| u.to_string()),
                    email: Some(user.email.clone()),
                    updated_at: Some(Utc::now()),
                    ..ProfilePatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Joined live feed of session changes and the signed-in user's profile
    /// document. Signing out drops the profile subscription and emits `None`;
    /// the feed task ends once every receiver is gone.
    pub fn user_feed(&self) -> watch::Receiver<Option<UserSnapshot>> {
        let (tx, rx) = watch::channel(None);
        let mut sessions = self.provider.on_session_change();
        let profiles = Arc::clone(&self.profiles);

        tokio::spawn(async move {
            let mut current: Option<SessionUser> = sessions.borrow().clone();
            let mut profile_rx: Option<ProfileSnapshots> =
                current.as_ref().map(|u| profiles.watch_profile(&u.uid));
            // The channel already starts at None; only a live session is
            // worth an initial emission.
            if current.is_some() && emit(&tx, &current, profile_rx.as_ref()).is_err() {
                return;
            }
            loop {
                tokio::select! {
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        current = sessions.borrow_and_update().clone();
                        profile_rx = current.as_ref().map(|u| profiles.watch_profile(&u.uid));
                        if emit(&tx, &current, profile_rx.as_ref()).is_err() {
                            break;
                        }
                    }
                    changed = wait_profile(&mut profile_rx) => {
                        if changed.is_err() {
                            profile_rx = None;
                            continue;
                        }
                        if let Some(rx) = profile_rx.as_mut() {
                            rx.borrow_and_update();
                        }
                        if emit(&tx, &current, profile_rx.as_ref()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        rx
    }
}

async fn wait_profile(
    profile_rx: &mut Option<ProfileSnapshots>,
) -> std::result::Result<(), watch::error::RecvError> {
    match profile_rx.as_mut() {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}

fn emit(
    tx: &watch::Sender<Option<UserSnapshot>>,
    user: &Option<SessionUser>,
    profile_rx: Option<&ProfileSnapshots>,
) -> std::result::Result<(), watch::error::SendError<Option<UserSnapshot>>> {
    tx.send(user.clone().map(|user| UserSnapshot {
        user,
        profile: profile_rx.and_then(|rx| rx.borrow().clone()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ls_auth_local::LocalSessionProvider;
    use ls_store_memory::MemoryDocumentStore;

    fn harness() -> (Arc<LocalSessionProvider>, Arc<MemoryDocumentStore>, SessionSync) {
        let provider = Arc::new(LocalSessionProvider::new());
        let store = Arc::new(MemoryDocumentStore::new());
        let sync = SessionSync::new(
            provider.clone() as Arc<dyn SessionProvider>,
            store.clone() as Arc<dyn ProfileStore>,
        );
        (provider, store, sync)
    }

    #[tokio::test]
    async fn test_unverified_sign_in_is_rejected() {
        let (provider, _, sync) = harness();
        sync.sign_up("ada", "ada@example.com", "hunter22").await.unwrap();

        let err = sync.sign_in("ada@example.com", "hunter22").await.unwrap_err();
        assert!(matches!(err, AppError::AuthRejected(_)));

        provider.force_verify("ada@example.com");
        let session = sync.sign_in("ada@example.com", "hunter22").await.unwrap();
        assert!(session.user.email_verified);
        assert_eq!(session.user.display_name, "ada");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_rejected() {
        let (provider, _, sync) = harness();
        sync.sign_up("ada", "ada@example.com", "hunter22").await.unwrap();
        provider.force_verify("ada@example.com");

        let err = sync.sign_in("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::AuthRejected(_)));
        let err = sync.sign_in("nobody@example.com", "hunter22").await.unwrap_err();
        assert!(matches!(err, AppError::AuthRejected(_)));
    }

    #[tokio::test]
    async fn test_short_password_fails_validation() {
        let (_, _, sync) = harness();
        let err = sync.sign_up("ada", "ada@example.com", "tiny").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_user_feed_joins_session_and_profile() {
        let (provider, store, sync) = harness();
        let user = sync.sign_up("ada", "ada@example.com", "hunter22").await.unwrap();
        provider.force_verify("ada@example.com");

        let mut feed = sync.user_feed();
        assert!(feed.borrow().is_none());

        let session = sync.sign_in("ada@example.com", "hunter22").await.unwrap();
        feed.changed().await.unwrap();
        {
            let snapshot = feed.borrow_and_update();
            let snapshot = snapshot.as_ref().unwrap();
            assert_eq!(snapshot.user.uid, user.uid);
            assert!(snapshot.profile.is_none());
        }

        // A profile write while signed in flows into the feed.
        store
            .merge_profile(
                &user.uid,
                ProfilePatch {
                    username: Some("ada_reads".into()),
                    ..ProfilePatch::default()
                },
            )
            .await
            .unwrap();
        feed.changed().await.unwrap();
        {
            let snapshot = feed.borrow_and_update();
            let profile = snapshot.as_ref().unwrap().profile.as_ref().unwrap();
            assert_eq!(profile.username, "ada_reads");
        }

        sync.sign_out(&session.token).await.unwrap();
        feed.changed().await.unwrap();
        assert!(feed.borrow_and_update().is_none());
    }
}
