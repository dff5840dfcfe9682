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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The token set persisted between runs.
///
/// Field names match the record the browser front end keeps under
/// `spotify_tokens`, so either client can read what the other wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Builds a session whose access token expires `expires_in` seconds after `now`.
    pub fn issued_at(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let secs = i64::try_from(expires_in).unwrap_or(i64::MAX);
        let expires_at = Duration::try_seconds(secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Snapshot of the session as seen by pages and commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl AuthState {
    /// State before the persisted session has been looked at.
    pub fn restoring() -> Self {
        Self {
            is_loading: true,
            ..Self::signed_out()
        }
    }

    pub fn signed_out() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: None,
            is_authenticated: false,
            is_loading: false,
        }
    }

    pub fn signed_in(session: &Session) -> Self {
        Self {
            access_token: Some(session.access_token.clone()),
            refresh_token: session.refresh_token.clone(),
            expires_at: Some(session.expires_at),
            is_authenticated: true,
            is_loading: false,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::restoring()
    }
}

/// Body of `GET /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginUrl {
    pub url: String,
}

/// Body of the authorization code exchange.
///
/// Every field is optional on the wire; an incomplete body is a distinct
/// failure from a failed request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl CallbackTokens {
    /// Returns the token triple if all three parts are present and non-empty.
    pub fn complete(self) -> Option<(String, String, u64)> {
        let access = self.access_token.filter(|t| !t.is_empty())?;
        let refresh = self.refresh_token.filter(|t| !t.is_empty())?;
        let expires_in = self.expires_in.filter(|secs| *secs > 0)?;
        Some((access, refresh, expires_in))
    }
}

/// Body of `POST /api/auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenValidation {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileImage {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub images: Vec<ProfileImage>,
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasteAnalysis {
    pub analysis: String,
}

/// A candidate track offered by the mood playlist generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    pub uri: String,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artist.is_empty() {
            write!(f, "{} [{}]", self.name, self.uri)
        } else {
            write!(f, "{} - {} [{}]", self.name, self.artist, self.uri)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodPlaylist {
    pub recommendations: String,
    #[serde(default)]
    pub available_tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPlaylist {
    pub playlist_id: String,
    pub external_url: String,
}
