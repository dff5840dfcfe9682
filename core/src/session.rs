/*
    spotify-analyzer | Rust client for the Spotify Analyzer backend.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::api::{ApiError, AuthBackend};
use crate::config::Config;
use crate::models::{AuthState, Session};
use crate::navigation::Navigator;
use crate::routes::Route;
use crate::store::{SessionStore, StoreError};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not signed in to Spotify (run `login` first)")]
    NotAuthenticated,
    #[error("Token set expired on arrival")]
    AlreadyExpired,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Could not persist the session: {0}")]
    Store(#[from] StoreError),
}

/// Owns the client-side session: restores it at start, keeps the access
/// token fresh, and signs out.
///
/// Construct one per process and hand out references. Other components read
/// [`AuthState`] snapshots through [`SessionManager::snapshot`] or
/// [`SessionManager::subscribe`]; only the manager writes.
///
/// Every token change is written to the store before the in-memory state is
/// published.
pub struct SessionManager<B, S, N> {
    backend: B,
    store: S,
    navigator: N,
    provider_logout_url: String,
    logout_grace: Duration,
    state: watch::Sender<AuthState>,
}

impl<B, S, N> SessionManager<B, S, N>
where
    B: AuthBackend,
    S: SessionStore,
    N: Navigator,
{
    pub fn new(backend: B, store: S, navigator: N, config: &Config) -> Self {
        let (state, _) = watch::channel(AuthState::restoring());
        Self {
            backend,
            store,
            navigator,
            provider_logout_url: config.provider_logout_url.clone(),
            logout_grace: config.logout_grace,
            state,
        }
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    fn publish(&self, next: AuthState) {
        self.state.send_replace(next);
    }

    /// Loads the persisted session. Call once at start.
    ///
    /// An expired session with a refresh token is refreshed before this
    /// returns; `is_loading` stays set until then. A record that cannot be
    /// read counts as no session.
    pub async fn restore(&self) -> AuthState {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring unreadable session record: {}", e);
                self.discard_record();
                None
            }
        };

        match stored {
            None => {
                debug!("No stored session");
                self.publish(AuthState::signed_out());
            }
            Some(session) if !session.is_expired_at(Utc::now()) => {
                debug!("Restored session valid until {}", session.expires_at);
                self.publish(AuthState::signed_in(&session));
            }
            Some(session) => match session.refresh_token {
                Some(refresh_token) => {
                    info!("Stored access token expired, refreshing");
                    // Failure already signed us out.
                    let _ = self.refresh(&refresh_token).await;
                }
                None => {
                    info!("Stored access token expired and cannot be refreshed");
                    self.discard_record();
                    self.publish(AuthState::signed_out());
                }
            },
        }

        self.snapshot()
    }

    /// Exchanges `refresh_token` for a new access token.
    ///
    /// Any failure signs the user out; nothing is retried.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(), SessionError> {
        match self.try_refresh(refresh_token).await {
            Ok(session) => {
                info!("Access token refreshed, valid until {}", session.expires_at);
                self.publish(AuthState::signed_in(&session));
                Ok(())
            }
            Err(e) => {
                error!("Error refreshing token: {}", e);
                self.logout().await;
                Err(e)
            }
        }
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<Session, SessionError> {
        let refreshed = self.backend.refresh_token(refresh_token).await?;
        if refreshed.access_token.is_empty() {
            return Err(ApiError::Malformed("refresh returned an empty access token".into()).into());
        }

        let session = Session::issued_at(
            refreshed.access_token,
            Some(refresh_token.to_string()),
            refreshed.expires_in,
            Utc::now(),
        );
        self.store.save(&session)?;
        Ok(session)
    }

    /// Adopts a freshly issued token set, replacing any previous session.
    ///
    /// A set that is already expired is refused and leaves the current
    /// session untouched.
    pub fn set_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in: u64,
    ) -> Result<(), SessionError> {
        let session = Session::issued_at(
            access_token,
            Some(refresh_token.to_string()),
            expires_in,
            Utc::now(),
        );
        if session.is_expired_at(Utc::now()) {
            return Err(SessionError::AlreadyExpired);
        }
        self.store.save(&session)?;
        debug!(
            "New session stored (access token {} chars, expires {})",
            access_token.len(),
            session.expires_at
        );
        self.publish(AuthState::signed_in(&session));
        Ok(())
    }

    /// Sends the browser to Spotify's authorization page.
    ///
    /// The session only changes once the redirect comes back through one of
    /// the handshake handlers.
    pub async fn login(&self) -> Result<(), SessionError> {
        match self.backend.login_url().await {
            Ok(url) => {
                self.navigator.redirect(&url);
                Ok(())
            }
            Err(e) => {
                error!("Login error: {}", e);
                Err(e.into())
            }
        }
    }

    /// Forgets the session, signs out at Spotify, and returns to the home page.
    ///
    /// The provider logout redirect is fire-and-forget. With a non-zero
    /// `logout_grace` the navigation home waits that long first.
    pub async fn logout(&self) {
        self.discard_record();
        self.publish(AuthState::signed_out());

        self.navigator.redirect(&self.provider_logout_url);
        if !self.logout_grace.is_zero() {
            tokio::time::sleep(self.logout_grace).await;
        }
        self.navigator.navigate(Route::Home);
    }

    /// Access token for an outbound call, if the session is currently valid.
    pub fn access_token(&self) -> Result<String, SessionError> {
        let state = self.state.borrow();
        match (&state.access_token, state.expires_at) {
            (Some(token), Some(expires_at)) if state.is_authenticated && expires_at > Utc::now() => {
                Ok(token.clone())
            }
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// Asks the backend whether the access token is still accepted and signs
    /// out if it is not. Transport failures are returned without signing out.
    pub async fn validate(&self) -> Result<bool, SessionError> {
        let token = self.access_token()?;
        let valid = self.backend.validate_token(&token).await?;
        if !valid {
            warn!("Backend rejected the access token, signing out");
            self.logout().await;
        }
        Ok(valid)
    }

    fn discard_record(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear stored session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RefreshedToken;
    use crate::navigation::{RecordingNavigator, Visit};
    use crate::store::MemorySessionStore;
    use crate::testing::{manager, manager_with_navigator, FakeBackend, AUTHORIZE_URL};
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn stored(access: &str, refresh: Option<&str>, age: ChronoDuration) -> Session {
        Session {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Utc::now() + age,
        }
    }

    #[tokio::test]
    async fn test_restore_without_record_makes_no_network_call() {
        let backend = Arc::new(FakeBackend::default());
        let manager = manager(backend.clone(), Arc::new(MemorySessionStore::new()));

        let state = manager.restore().await;

        assert_eq!(state, AuthState::signed_out());
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_restore_adopts_unexpired_session() {
        let session = stored("A", Some("R"), ChronoDuration::hours(1));
        let manager = manager(
            Arc::new(FakeBackend::default()),
            Arc::new(MemorySessionStore::with_session(session.clone())),
        );

        let state = manager.restore().await;

        assert_eq!(state, AuthState::signed_in(&session));
        assert_eq!(manager.access_token().unwrap(), "A");
    }

    #[tokio::test]
    async fn test_restore_refreshes_expired_session() {
        let backend = Arc::new(FakeBackend::default().refresh_ok("B", 3600));
        let store = Arc::new(MemorySessionStore::with_session(stored(
            "A",
            Some("R"),
            -ChronoDuration::hours(1),
        )));
        let manager = manager(backend.clone(), store.clone());

        let state = manager.restore().await;

        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(state.is_authenticated);
        assert!(!state.is_loading);
        assert_eq!(state.access_token.as_deref(), Some("B"));
        assert_eq!(state.refresh_token.as_deref(), Some("R"));

        let expected = Utc::now() + ChronoDuration::seconds(3600);
        let expires_at = state.expires_at.unwrap();
        assert!((expected - expires_at).num_seconds().abs() <= 5);

        let persisted = store.peek().unwrap();
        assert_eq!(persisted.access_token, "B");
        assert_eq!(persisted.refresh_token.as_deref(), Some("R"));
        assert_eq!(persisted.expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_restore_stays_loading_until_refresh_resolves() {
        let backend = Arc::new(FakeBackend::default().refresh_ok("B", 3600).gated());
        let store = Arc::new(MemorySessionStore::with_session(stored(
            "A",
            Some("R"),
            -ChronoDuration::minutes(5),
        )));
        let manager = manager(backend.clone(), store);
        let states = manager.subscribe();

        let task = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.restore().await })
        };

        backend.wait_for_call().await;
        let mid = manager.snapshot();
        assert!(mid.is_loading);
        assert!(!mid.is_authenticated);
        assert!(manager.access_token().is_err());

        backend.release();
        let done = task.await.unwrap();
        assert!(done.is_authenticated);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(states.borrow().is_authenticated);
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out_and_clears_store() {
        let backend = Arc::new(FakeBackend::default().refresh_status(500));
        let store = Arc::new(MemorySessionStore::with_session(stored(
            "A",
            Some("R"),
            -ChronoDuration::hours(1),
        )));
        let navigator = Arc::new(RecordingNavigator::new());
        let manager =
            manager_with_navigator(backend.clone(), store.clone(), navigator.clone());

        let state = manager.restore().await;

        assert_eq!(state, AuthState::signed_out());
        assert!(state.access_token.is_none());
        assert!(state.refresh_token.is_none());
        assert!(store.peek().is_none());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            navigator.visits(),
            vec![
                Visit::External(crate::config::DEFAULT_PROVIDER_LOGOUT_URL.to_string()),
                Visit::Page(Route::Home),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_refreshed_token_is_a_failure() {
        let backend = Arc::new(FakeBackend {
            refresh: Ok(RefreshedToken {
                access_token: String::new(),
                expires_in: 3600,
            }),
            ..FakeBackend::default()
        });
        let manager = manager(backend, Arc::new(MemorySessionStore::new()));

        let err = manager.refresh("R").await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Malformed(_))));
        assert!(!manager.snapshot().is_authenticated);
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_is_dropped() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(MemorySessionStore::with_session(stored(
            "A",
            None,
            -ChronoDuration::seconds(1),
        )));
        let manager = manager(backend.clone(), store.clone());

        let state = manager.restore().await;

        assert_eq!(state, AuthState::signed_out());
        assert!(store.peek().is_none());
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_set_tokens_overwrites_and_is_repeatable() {
        let store = Arc::new(MemorySessionStore::with_session(stored(
            "old",
            Some("old-r"),
            ChronoDuration::hours(1),
        )));
        let manager = manager(Arc::new(FakeBackend::default()), store.clone());
        manager.restore().await;

        manager.set_tokens("X", "Y", 100).unwrap();
        let first = store.peek().unwrap();
        manager.set_tokens("X", "Y", 100).unwrap();
        let second = store.peek().unwrap();

        assert_eq!(first.access_token, second.access_token);
        assert_eq!(first.refresh_token, second.refresh_token);
        assert!(second.expires_at >= first.expires_at);

        let state = manager.snapshot();
        assert!(state.is_authenticated);
        assert!(!state.is_loading);
        assert_eq!(state.access_token.as_deref(), Some("X"));
        assert_eq!(state.refresh_token.as_deref(), Some("Y"));
    }

    #[tokio::test]
    async fn test_set_tokens_refuses_zero_lifetime() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager(Arc::new(FakeBackend::default()), store.clone());
        manager.restore().await;

        let err = manager.set_tokens("X", "Y", 0).unwrap_err();

        assert!(matches!(err, SessionError::AlreadyExpired));
        assert!(store.peek().is_none());
        assert_eq!(manager.snapshot(), AuthState::signed_out());
    }

    #[tokio::test]
    async fn test_persisted_session_restores_in_fresh_manager() {
        let store = Arc::new(MemorySessionStore::new());
        let first = manager(Arc::new(FakeBackend::default()), store.clone());
        first.restore().await;
        first.set_tokens("X", "Y", 600).unwrap();
        let before = first.snapshot();

        let backend = Arc::new(FakeBackend::default());
        let second = manager(backend.clone(), store);
        let after = second.restore().await;

        assert_eq!(after, before);
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_redirects_to_authorization_url() {
        let navigator = Arc::new(RecordingNavigator::new());
        let manager = manager_with_navigator(
            Arc::new(FakeBackend::default()),
            Arc::new(MemorySessionStore::new()),
            navigator.clone(),
        );

        manager.login().await.unwrap();

        assert_eq!(
            navigator.last(),
            Some(Visit::External(AUTHORIZE_URL.to_string()))
        );
    }

    #[tokio::test]
    async fn test_login_failure_leaves_page_and_state_alone() {
        let navigator = Arc::new(RecordingNavigator::new());
        let backend = Arc::new(FakeBackend {
            login: Err(502),
            ..FakeBackend::default()
        });
        let manager = manager_with_navigator(
            backend,
            Arc::new(MemorySessionStore::new()),
            navigator.clone(),
        );
        manager.restore().await;

        assert!(manager.login().await.is_err());
        assert!(navigator.visits().is_empty());
        assert_eq!(manager.snapshot(), AuthState::signed_out());
    }

    #[tokio::test]
    async fn test_logout_clears_then_leaves() {
        let store = Arc::new(MemorySessionStore::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let manager = manager_with_navigator(
            Arc::new(FakeBackend::default()),
            store.clone(),
            navigator.clone(),
        );
        manager.set_tokens("X", "Y", 600).unwrap();

        manager.logout().await;

        assert!(store.peek().is_none());
        assert_eq!(manager.snapshot(), AuthState::signed_out());
        assert!(matches!(manager.access_token(), Err(SessionError::NotAuthenticated)));
        assert_eq!(navigator.last(), Some(Visit::Page(Route::Home)));
    }

    #[tokio::test]
    async fn test_validate_signs_out_on_rejected_token() {
        let backend = Arc::new(FakeBackend {
            valid: false,
            ..FakeBackend::default()
        });
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager(backend.clone(), store.clone());
        manager.set_tokens("X", "Y", 600).unwrap();

        assert!(!manager.validate().await.unwrap());
        assert!(!manager.snapshot().is_authenticated);
        assert!(store.peek().is_none());
    }

    #[tokio::test]
    async fn test_validate_requires_session() {
        let backend = Arc::new(FakeBackend::default());
        let manager = manager(backend.clone(), Arc::new(MemorySessionStore::new()));
        manager.restore().await;

        assert!(matches!(manager.validate().await, Err(SessionError::NotAuthenticated)));
        assert_eq!(backend.validate_calls.load(Ordering::SeqCst), 0);
    }
}
