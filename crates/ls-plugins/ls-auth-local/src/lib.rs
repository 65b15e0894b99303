//! # ls-auth-local
//!
//! Argon2-based implementation of `SessionProvider`: an in-process credential
//! registry with opaque bearer-token sessions and email-verification /
//! password-reset tokens. Mail delivery is stood in for by a tracing log
//! line plus an outbox accessor, so flows that normally bounce through an
//! inbox stay drivable end to end.

use anyhow::{bail, Context};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use ls_core::models::{AuthSession, SessionUser};
use ls_core::traits::{SessionProvider, SessionSnapshots};

struct StoredUser {
    uid: String,
    email: String,
    display_name: String,
    /// Absent for accounts created through a federated provider.
    password_hash: Option<String>,
    email_verified: bool,
    created_at: DateTime<Utc>,
}

impl StoredUser {
    fn session_user(&self) -> SessionUser {
        SessionUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            email_verified: self.email_verified,
            created_at: self.created_at,
        }
    }
}

pub struct LocalSessionProvider {
    users: DashMap<String, StoredUser>,
    uid_by_email: DashMap<String, String>,
    /// token -> uid
    sessions: DashMap<String, String>,
    verify_tokens: DashMap<String, String>,
    reset_tokens: DashMap<String, String>,
    session_events: watch::Sender<Option<SessionUser>>,
}

impl Default for LocalSessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSessionProvider {
    pub fn new() -> Self {
        let (session_events, _) = watch::channel(None);
        Self {
            users: DashMap::new(),
            uid_by_email: DashMap::new(),
            sessions: DashMap::new(),
            verify_tokens: DashMap::new(),
            reset_tokens: DashMap::new(),
            session_events,
        }
    }

    /// Redeems a verification token, as the link in the mail would.
    pub fn verify_with_token(&self, token: &str) -> bool {
        let Some((_, uid)) = self.verify_tokens.remove(token) else {
            return false;
        };
        match self.users.get_mut(&uid) {
            Some(mut user) => {
                user.email_verified = true;
                true
            }
            None => false,
        }
    }

    /// Operator/test hook: marks an account verified without the mail loop.
    pub fn force_verify(&self, email: &str) -> bool {
        let Some(uid) = self.uid_by_email.get(&normalize(email)).map(|u| u.value().clone()) else {
            return false;
        };
        match self.users.get_mut(&uid) {
            Some(mut user) => {
                user.email_verified = true;
                true
            }
            None => false,
        }
    }

    /// Outbox accessor for the most recent verification token of an account.
    pub fn pending_verification_token(&self, email: &str) -> Option<String> {
        let uid = self.uid_by_email.get(&normalize(email))?.clone();
        self.verify_tokens
            .iter()
            .find(|entry| *entry.value() == uid)
            .map(|entry| entry.key().clone())
    }

    /// Redeems a reset token and installs a new password hash.
    pub fn reset_password_with_token(&self, token: &str, new_password: &str) -> anyhow::Result<bool> {
        let Some((_, uid)) = self.reset_tokens.remove(token) else {
            return Ok(false);
        };
        let hash = hash_password(new_password)?;
        match self.users.get_mut(&uid) {
            Some(mut user) => {
                user.password_hash = Some(hash);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn issue_session(&self, user: &StoredUser) -> AuthSession {
        let token = new_token();
        self.sessions.insert(token.clone(), user.uid.clone());
        let session_user = user.session_user();
        let _ = self.session_events.send(Some(session_user.clone()));
        AuthSession {
            token,
            user: session_user,
        }
    }

    fn queue_verification(&self, uid: &str, email: &str) {
        let token = new_token();
        self.verify_tokens.insert(token.clone(), uid.to_string());
        info!(email, token, "verification email queued");
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> anyhow::Result<SessionUser> {
        let email = normalize(email);
        if !email.contains('@') {
            bail!("invalid email address");
        }
        if self.uid_by_email.contains_key(&email) {
            bail!("email already registered");
        }
        let user = StoredUser {
            uid: Uuid::new_v4().to_string(),
            email: email.clone(),
            display_name: display_name.to_string(),
            password_hash: Some(hash_password(password)?),
            email_verified: false,
            created_at: Utc::now(),
        };
        let session_user = user.session_user();
        self.uid_by_email.insert(email.clone(), user.uid.clone());
        self.queue_verification(&user.uid, &email);
        self.users.insert(user.uid.clone(), user);
        Ok(session_user)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> anyhow::Result<Option<AuthSession>> {
        let Some(uid) = self.uid_by_email.get(&normalize(email)).map(|u| u.value().clone()) else {
            return Ok(None);
        };
        let Some(user) = self.users.get(&uid) else {
            return Ok(None);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            // Federated account; there is no password to check.
            return Ok(None);
        };
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(None),
        };
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Ok(None);
        }
        Ok(Some(self.issue_session(&user)))
    }

    async fn sign_in_with_provider(&self, assertion: &str) -> anyhow::Result<AuthSession> {
        // The assertion stands in for a federated id token; it carries the
        // asserted, already-verified email address.
        let email = normalize(assertion);
        if !email.contains('@') {
            bail!("malformed identity assertion");
        }
        // Guard dropped before any insert below touches the same map.
        let existing = self.uid_by_email.get(&email).map(|uid| uid.value().clone());
        let uid = match existing {
            Some(uid) => uid,
            None => {
                let display_name = email
                    .split('@')
                    .next()
                    .unwrap_or("reader")
                    .to_string();
                let user = StoredUser {
                    uid: Uuid::new_v4().to_string(),
                    email: email.clone(),
                    display_name,
                    password_hash: None,
                    email_verified: true,
                    created_at: Utc::now(),
                };
                let uid = user.uid.clone();
                self.uid_by_email.insert(email.clone(), uid.clone());
                self.users.insert(uid.clone(), user);
                uid
            }
        };
        let user = self.users.get(&uid).context("account vanished during sign-in")?;
        Ok(self.issue_session(&user))
    }

    async fn send_verification_email(&self, uid: &str) -> anyhow::Result<()> {
        let user = self.users.get(uid).context("no such account")?;
        self.queue_verification(uid, &user.email);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> anyhow::Result<()> {
        // Unknown addresses are not reported back to the caller.
        if let Some(uid) = self.uid_by_email.get(&normalize(email)) {
            let token = new_token();
            self.reset_tokens.insert(token.clone(), uid.value().clone());
            info!(email, token, "password reset email queued");
        }
        Ok(())
    }

    async fn sign_out(&self, token: &str) -> anyhow::Result<()> {
        if self.sessions.remove(token).is_some() {
            let _ = self.session_events.send(None);
        }
        Ok(())
    }

    async fn session_user(&self, token: &str) -> anyhow::Result<Option<SessionUser>> {
        let Some(uid) = self.sessions.get(token).map(|u| u.value().clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&uid).map(|u| u.session_user()))
    }

    async fn update_display_name(&self, uid: &str, name: &str) -> anyhow::Result<()> {
        let mut user = self.users.get_mut(uid).context("no such account")?;
        user.display_name = name.to_string();
        Ok(())
    }

    fn on_session_change(&self) -> SessionSnapshots {
        self.session_events.subscribe()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("password hashing failed: {err}"))?;
    Ok(hash.to_string())
}

fn new_token() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
