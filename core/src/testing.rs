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

//! Scripted collaborators shared by the unit tests.

use crate::api::{ApiError, AuthBackend};
use crate::config::Config;
use crate::models::{CallbackTokens, RefreshedToken};
use crate::navigation::RecordingNavigator;
use crate::session::SessionManager;
use crate::store::MemorySessionStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize?client_id=test";

pub type TestManager =
    SessionManager<Arc<FakeBackend>, Arc<MemorySessionStore>, Arc<RecordingNavigator>>;

/// Backend with canned replies. Errors are scripted as HTTP status codes.
pub struct FakeBackend {
    pub login: Result<String, u16>,
    pub exchange: Result<CallbackTokens, u16>,
    pub refresh: Result<RefreshedToken, u16>,
    pub valid: bool,
    pub login_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub gate: Option<Notify>,
    pub entered: Notify,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            login: Ok(AUTHORIZE_URL.to_string()),
            exchange: Ok(CallbackTokens {
                access_token: Some("A".to_string()),
                refresh_token: Some("R".to_string()),
                expires_in: Some(3600),
            }),
            refresh: Err(400),
            valid: true,
            login_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            gate: None,
            entered: Notify::new(),
        }
    }
}

impl FakeBackend {
    pub fn refresh_ok(mut self, access_token: &str, expires_in: u64) -> Self {
        self.refresh = Ok(RefreshedToken {
            access_token: access_token.to_string(),
            expires_in,
        });
        self
    }

    pub fn refresh_status(mut self, status: u16) -> Self {
        self.refresh = Err(status);
        self
    }

    /// Makes code exchanges and refreshes block until [`FakeBackend::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Resolves once a refresh or exchange call has started.
    pub async fn wait_for_call(&self) {
        self.entered.notified().await;
    }

    pub fn total_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
            + self.exchange_calls.load(Ordering::SeqCst)
            + self.refresh_calls.load(Ordering::SeqCst)
            + self.validate_calls.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self) {
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

fn scripted(status: u16) -> ApiError {
    ApiError::Status {
        status,
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn login_url(&self) -> Result<String, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login.clone().map_err(scripted)
    }

    async fn exchange_code(&self, _code: &str) -> Result<CallbackTokens, ApiError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.exchange.clone().map_err(scripted)
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.refresh.clone().map_err(scripted)
    }

    async fn validate_token(&self, _access_token: &str) -> Result<bool, ApiError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.valid)
    }
}

pub fn manager(backend: Arc<FakeBackend>, store: Arc<MemorySessionStore>) -> Arc<TestManager> {
    manager_with_navigator(backend, store, Arc::new(RecordingNavigator::new()))
}

pub fn manager_with_navigator(
    backend: Arc<FakeBackend>,
    store: Arc<MemorySessionStore>,
    navigator: Arc<RecordingNavigator>,
) -> Arc<TestManager> {
    Arc::new(SessionManager::new(
        backend,
        store,
        navigator,
        &Config::default(),
    ))
}
