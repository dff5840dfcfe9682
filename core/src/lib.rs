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

pub mod api;
pub mod config;
pub mod guard;
pub mod handshake;
pub mod models;
pub mod navigation;
pub mod playlist;
pub mod routes;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export key items for convenience
pub use api::{ApiError, AuthBackend, BackendClient};
pub use config::Config;
pub use guard::{guard, GuardDecision};
pub use handshake::{complete_auth_success, dispatch_redirect, CallbackHandler, HandshakeOutcome};
pub use models::{AuthState, Session};
pub use navigation::Navigator;
pub use routes::{LoginError, Route};
pub use session::{SessionError, SessionManager};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
