//! Custom auth store.
//!
//! Registered accounts persist under `custom-auth-storage`. The active session
//! lives in the volatile area under `auth-session`; with "remember me" it is
//! also mirrored into the durable area with an expiry of
//! `remember_me_ttl_hours`. Form validation failures are returned to the
//! caller and never touch the store's `error`; credential rejections do.

pub mod directory;
pub mod validation;

use std::sync::Arc;

use chrono::Duration;
use iverton_types::auth::{Account, Credentials, Session, SignUpRequest, User, UserRole};
use iverton_types::config::SessionPolicy;
use iverton_types::error::{AuthError, ValidationErrors};
use iverton_types::storage::{AUTH_SESSION_KEY, AUTH_STORAGE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Clock;
use crate::storage::KvBacking;
use crate::store::{PersistOptions, PersistedState, PersistedStore};

pub use directory::{DEMO_ACCOUNTS, PasswordHasher};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthState {
    fn account(&self, email: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.user.email == email)
    }
}

impl PersistedState for AuthState {
    fn partialize(&self) -> Result<Value, serde_json::Error> {
        Ok(serde_json::json!({ "accounts": serde_json::to_value(&self.accounts)? }))
    }
}

/// Result of an auth action that passed form validation.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(User),
    Rejected(AuthError),
}

pub struct AuthStore<D, V> {
    inner: PersistedStore<AuthState>,
    durable: Arc<D>,
    volatile: Arc<V>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
}

impl<D, V> AuthStore<D, V>
where
    D: KvBacking + 'static,
    V: KvBacking + 'static,
{
    pub async fn open(
        durable: Arc<D>,
        volatile: Arc<V>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        let inner = PersistedStore::open(
            Arc::clone(&durable),
            PersistOptions::new(AUTH_STORAGE),
            AuthState::default(),
        )
        .await;

        // Seed the demo logins into an empty directory only, so a restart
        // does not rehash them.
        if inner.get_state().accounts.is_empty() {
            let demo = directory::demo_accounts(hasher.as_ref(), clock.now());
            inner.update(|s| {
                if !s.accounts.is_empty() || demo.is_empty() {
                    return None;
                }
                s.accounts = demo;
                Some(())
            });
        }

        Self {
            inner,
            durable,
            volatile,
            hasher,
            clock,
            policy,
        }
    }

    pub fn state(&self) -> Arc<AuthState> {
        self.inner.get_state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.get_state().is_authenticated
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner
            .get_state()
            .session
            .as_ref()
            .map(|s| s.user.clone())
    }

    pub fn error(&self) -> Option<String> {
        self.inner.get_state().error.clone()
    }

    pub async fn sign_in(
        &self,
        credentials: Credentials,
        remember_me: bool,
    ) -> Result<AuthOutcome, ValidationErrors> {
        validation::validate_sign_in(&credentials)?;
        let email = credentials.email.trim().to_lowercase();

        let user = {
            let state = self.inner.get_state();
            state
                .account(&email)
                .filter(|a| {
                    self.hasher
                        .verify(&credentials.password, &a.password_hash)
                })
                .map(|a| a.user.clone())
        };

        let Some(user) = user else {
            tracing::info!(email = %email, "sign-in rejected");
            return Ok(self.reject(AuthError::InvalidCredentials));
        };

        Ok(self.start_session(user, remember_me).await)
    }

    /// Register a new viewer account and sign it in.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<AuthOutcome, ValidationErrors> {
        validation::validate_sign_up(&request)?;
        let account = match directory::create_account(
            self.hasher.as_ref(),
            &request.email,
            &request.password,
            &request.name,
            UserRole::Viewer,
            self.clock.now(),
        ) {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(error = %e, "failed to hash new account password");
                return Ok(self.reject(e));
            }
        };
        let user = account.user.clone();

        let created = self.inner.update(|s| {
            if s.account(&account.user.email).is_some() {
                return None;
            }
            s.accounts.push(account);
            Some(())
        });
        if created.is_none() {
            return Ok(self.reject(AuthError::EmailTaken));
        }

        tracing::info!(email = %user.email, "account created");
        Ok(self.start_session(user, false).await)
    }

    /// End the session in memory and in both storage areas.
    pub async fn sign_out(&self) {
        if let Err(e) = self.volatile.remove(AUTH_SESSION_KEY).await {
            tracing::warn!(error = %e, "failed to clear volatile session");
        }
        if let Err(e) = self.durable.remove(AUTH_SESSION_KEY).await {
            tracing::warn!(error = %e, "failed to clear remembered session");
        }
        self.inner.set_state(|s| {
            s.session = None;
            s.is_authenticated = false;
            s.error = None;
        });
        tracing::info!("signed out");
    }

    /// Pick up a session left in the volatile area, or a remembered one from
    /// the durable area if it has not expired.
    pub async fn restore_session(&self) -> Option<User> {
        let now = self.clock.now();
        let session = match self.read_session(self.volatile.as_ref()).await {
            Some(session) => Some(session),
            None => self.read_session(self.durable.as_ref()).await,
        };
        let session = session?;

        if session.is_expired_at(now) {
            tracing::info!(email = %session.user.email, "remembered session expired");
            if let Err(e) = self.durable.remove(AUTH_SESSION_KEY).await {
                tracing::warn!(error = %e, "failed to remove expired session");
            }
            self.inner.set_state(|s| {
                s.session = None;
                s.is_authenticated = false;
                s.error = Some(AuthError::SessionExpired.to_string());
            });
            return None;
        }

        if let Ok(value) = serde_json::to_value(&session) {
            if let Err(e) = self.volatile.set(AUTH_SESSION_KEY, &value).await {
                tracing::warn!(error = %e, "failed to copy session to volatile area");
            }
        }
        let user = session.user.clone();
        self.inner.set_state(|s| {
            s.session = Some(session);
            s.is_authenticated = true;
            s.error = None;
        });
        Some(user)
    }

    pub fn clear_error(&self) {
        self.inner.update(|s| s.error.take().map(|_| ()));
    }

    pub fn store(&self) -> &PersistedStore<AuthState> {
        &self.inner
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    fn reject(&self, error: AuthError) -> AuthOutcome {
        let message = error.to_string();
        self.inner.set_state(|s| {
            s.is_authenticated = false;
            s.session = None;
            s.error = Some(message);
        });
        AuthOutcome::Rejected(error)
    }

    async fn start_session(&self, user: User, remember_me: bool) -> AuthOutcome {
        let now = self.clock.now();
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user: user.clone(),
            issued_at: now,
            expires_at: remember_me
                .then(|| now + Duration::hours(i64::from(self.policy.remember_me_ttl_hours))),
            remember_me,
        };

        let value = match serde_json::to_value(&session) {
            Ok(value) => value,
            Err(e) => return self.reject(AuthError::Storage(e.to_string())),
        };
        if let Err(e) = self.volatile.set(AUTH_SESSION_KEY, &value).await {
            return self.reject(AuthError::Storage(e.to_string()));
        }

        let mirrored = if remember_me {
            self.durable.set(AUTH_SESSION_KEY, &value).await
        } else {
            self.durable.remove(AUTH_SESSION_KEY).await
        };
        if let Err(e) = mirrored {
            tracing::warn!(error = %e, "failed to update remembered session");
        }

        self.inner.set_state(|s| {
            s.session = Some(session);
            s.is_authenticated = true;
            s.error = None;
        });
        tracing::info!(email = %user.email, role = %user.role, remember_me, "signed in");
        AuthOutcome::Authenticated(user)
    }

    async fn read_session<B: KvBacking>(&self, area: &B) -> Option<Session> {
        match area.get(AUTH_SESSION_KEY).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable session");
                    let _ = area.remove(AUTH_SESSION_KEY).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::directory::tests::PlainHasher;
    use crate::clock::ManualClock;
    use crate::storage::MemoryKvStore;

    struct Harness {
        durable: Arc<MemoryKvStore>,
        clock: Arc<ManualClock>,
        auth: AuthStore<MemoryKvStore, MemoryKvStore>,
    }

    async fn harness_with(durable: Arc<MemoryKvStore>, clock: Arc<ManualClock>) -> Harness {
        let auth = AuthStore::open(
            Arc::clone(&durable),
            Arc::new(MemoryKvStore::new()),
            Arc::new(PlainHasher),
            Arc::clone(&clock) as Arc<dyn Clock>,
            SessionPolicy::default(),
        )
        .await;
        Harness {
            durable,
            clock,
            auth,
        }
    }

    async fn harness() -> Harness {
        harness_with(
            Arc::new(MemoryKvStore::new()),
            Arc::new(ManualClock::default()),
        )
        .await
    }

    #[tokio::test]
    async fn demo_sign_in_and_sign_out() {
        let h = harness().await;

        let outcome = h
            .auth
            .sign_in(Credentials::new("demo@example.com", "demo123"), false)
            .await
            .unwrap();
        match outcome {
            AuthOutcome::Authenticated(user) => assert_eq!(user.role, UserRole::BrandManager),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(h.auth.is_authenticated());
        assert_eq!(h.auth.current_user().unwrap().role, UserRole::BrandManager);

        h.auth.sign_out().await;
        h.auth.flush().await;
        assert!(!h.auth.is_authenticated());
        assert!(h.auth.current_user().is_none());
        assert!(h.durable.get(AUTH_SESSION_KEY).await.unwrap().is_none());

        let persisted = h.durable.get(AUTH_STORAGE).await.unwrap().unwrap();
        assert!(persisted["state"].get("session").is_none());
    }

    #[tokio::test]
    async fn wrong_password_sets_error_until_next_success() {
        let h = harness().await;
        let outcome = h
            .auth
            .sign_in(Credentials::new("demo@example.com", "nope"), false)
            .await
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Rejected(AuthError::InvalidCredentials));
        assert_eq!(h.auth.error().as_deref(), Some("Invalid email or password"));

        h.auth
            .sign_in(Credentials::new("DEMO@example.com", "demo123"), false)
            .await
            .unwrap();
        assert!(h.auth.error().is_none());
    }

    #[tokio::test]
    async fn validation_errors_leave_store_error_alone() {
        let h = harness().await;
        let err = h
            .auth
            .sign_in(Credentials::new("not-an-email", ""), false)
            .await
            .unwrap_err();
        assert!(err.get("email").is_some());
        assert!(err.get("password").is_some());
        assert!(h.auth.error().is_none());
    }

    #[tokio::test]
    async fn clear_error_resets_banner() {
        let h = harness().await;
        h.auth
            .sign_in(Credentials::new("admin@example.com", "wrong"), false)
            .await
            .unwrap();
        assert!(h.auth.error().is_some());
        h.auth.clear_error();
        assert!(h.auth.error().is_none());
    }

    #[tokio::test]
    async fn remembered_session_survives_restart_until_expiry() {
        let durable = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::default());
        {
            let h = harness_with(Arc::clone(&durable), Arc::clone(&clock)).await;
            h.auth
                .sign_in(Credentials::new("analyst@example.com", "analyst123"), true)
                .await
                .unwrap();
            h.auth.flush().await;
        }

        let h = harness_with(Arc::clone(&durable), Arc::clone(&clock)).await;
        let user = h.auth.restore_session().await.unwrap();
        assert_eq!(user.role, UserRole::Analyst);
        assert!(h.auth.is_authenticated());

        h.clock.advance(Duration::hours(25));
        let h = harness_with(Arc::clone(&durable), Arc::clone(&clock)).await;
        assert!(h.auth.restore_session().await.is_none());
        assert_eq!(
            h.auth.error().as_deref(),
            Some(AuthError::SessionExpired.to_string().as_str())
        );
        assert!(durable.get(AUTH_SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_out_forgets_remembered_session() {
        let h = harness().await;
        h.auth
            .sign_in(Credentials::new("admin@example.com", "admin123"), true)
            .await
            .unwrap();
        assert!(h.durable.get(AUTH_SESSION_KEY).await.unwrap().is_some());

        h.auth.sign_out().await;
        h.auth.flush().await;
        assert!(h.durable.get(AUTH_SESSION_KEY).await.unwrap().is_none());

        let reopened = harness_with(Arc::clone(&h.durable), Arc::clone(&h.clock)).await;
        assert!(reopened.auth.restore_session().await.is_none());
        assert!(!reopened.auth.is_authenticated());
        assert!(reopened.auth.error().is_none());
    }

    #[tokio::test]
    async fn demo_accounts_are_seeded_once() {
        let h = harness().await;
        h.auth.flush().await;
        let seeded = h.auth.state().accounts.clone();
        assert_eq!(seeded.len(), DEMO_ACCOUNTS.len());

        let reopened = harness_with(Arc::clone(&h.durable), Arc::clone(&h.clock)).await;
        assert_eq!(reopened.auth.state().accounts, seeded);
    }

    #[tokio::test]
    async fn session_without_remember_me_is_not_durable() {
        let h = harness().await;
        h.auth
            .sign_in(Credentials::new("demo@example.com", "demo123"), false)
            .await
            .unwrap();
        assert!(h.durable.get(AUTH_SESSION_KEY).await.unwrap().is_none());

        let restarted = harness_with(Arc::clone(&h.durable), Arc::clone(&h.clock)).await;
        assert!(restarted.auth.restore_session().await.is_none());
    }

    #[tokio::test]
    async fn sign_up_registers_and_rejects_duplicates() {
        let h = harness().await;
        let request = SignUpRequest {
            name: "New Person".to_string(),
            email: "new@acme.io".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        };

        let outcome = h.auth.sign_up(request.clone()).await.unwrap();
        assert!(matches!(outcome, AuthOutcome::Authenticated(ref u) if u.role == UserRole::Viewer));

        let again = h.auth.sign_up(request).await.unwrap();
        assert_eq!(again, AuthOutcome::Rejected(AuthError::EmailTaken));

        h.auth.flush().await;
        let reopened = harness_with(Arc::clone(&h.durable), Arc::clone(&h.clock)).await;
        let outcome = reopened
            .auth
            .sign_in(Credentials::new("new@acme.io", "secret1"), false)
            .await
            .unwrap();
        assert!(matches!(outcome, AuthOutcome::Authenticated(_)));
    }
}
