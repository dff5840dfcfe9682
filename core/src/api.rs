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

use crate::config::Config;
use crate::models::{
    CallbackTokens, CreatedPlaylist, LoginUrl, MoodPlaylist, RefreshedToken, TasteAnalysis,
    TokenValidation, UserProfile,
};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response};
use rspotify::model::TrackId;
use rspotify::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Backend unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed backend response: {0}")]
    Malformed(String),
    #[error("Invalid track URI: {0}")]
    InvalidTrackUri(String),
}

/// The backend calls the session lifecycle depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Spotify authorization URL to send the browser to.
    async fn login_url(&self) -> Result<String, ApiError>;
    /// Redeems a one-time authorization code.
    async fn exchange_code(&self, code: &str) -> Result<CallbackTokens, ApiError>;
    /// Mints a new access token from a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError>;
    async fn validate_token(&self, access_token: &str) -> Result<bool, ApiError>;
}

#[async_trait]
impl<T: AuthBackend + ?Sized> AuthBackend for Arc<T> {
    async fn login_url(&self) -> Result<String, ApiError> {
        (**self).login_url().await
    }

    async fn exchange_code(&self, code: &str) -> Result<CallbackTokens, ApiError> {
        (**self).exchange_code(code).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        (**self).refresh_token(refresh_token).await
    }

    async fn validate_token(&self, access_token: &str) -> Result<bool, ApiError> {
        (**self).validate_token(access_token).await
    }
}

/// HTTP client for the Spotify Analyzer backend.
///
/// Holds no session state: every authenticated call takes the access token
/// as an argument.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Self::with_base_url(&config.api_url, config.request_timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        debug!("GET {}", path);
        let response = self.http.get(self.url(path)).query(query).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!("POST {}", path);
        let response = self.http.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }

    /// Fetches the signed-in user's Spotify profile.
    pub async fn user_profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        self.post("/api/user-data/profile", &json!({ "access_token": access_token }))
            .await
    }

    pub async fn top_tracks(
        &self,
        access_token: &str,
        time_range: &str,
        limit: u32,
    ) -> Result<Value, ApiError> {
        self.get(
            "/api/user-data/top-tracks",
            &[
                ("access_token", access_token.to_string()),
                ("time_range", time_range.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub async fn top_artists(
        &self,
        access_token: &str,
        time_range: &str,
        limit: u32,
    ) -> Result<Value, ApiError> {
        self.get(
            "/api/user-data/top-artists",
            &[
                ("access_token", access_token.to_string()),
                ("time_range", time_range.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub async fn recently_played(&self, access_token: &str, limit: u32) -> Result<Value, ApiError> {
        self.get(
            "/api/user-data/recently-played",
            &[
                ("access_token", access_token.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Audio features for a comma-separated list of track IDs.
    pub async fn audio_features(
        &self,
        access_token: &str,
        track_ids: &[String],
    ) -> Result<Value, ApiError> {
        self.get(
            "/api/user-data/audio-features",
            &[
                ("access_token", access_token.to_string()),
                ("track_ids", track_ids.join(",")),
            ],
        )
        .await
    }

    /// AI commentary on the user's listening history.
    pub async fn analyze_taste(&self, access_token: &str) -> Result<TasteAnalysis, ApiError> {
        self.post("/api/llm/analyze-taste", &json!({ "access_token": access_token }))
            .await
    }

    pub async fn generate_mood_playlist(
        &self,
        access_token: &str,
        mood: &str,
        time_range: &str,
    ) -> Result<MoodPlaylist, ApiError> {
        self.post(
            "/api/llm/generate-mood-playlist",
            &json!({
                "access_token": access_token,
                "mood": mood,
                "time_range": time_range,
            }),
        )
        .await
    }

    pub async fn search_tracks(&self, access_token: &str, query: &str) -> Result<Value, ApiError> {
        self.get(
            "/api/llm/search-tracks",
            &[
                ("access_token", access_token.to_string()),
                ("query", query.to_string()),
            ],
        )
        .await
    }

    pub async fn create_playlist(
        &self,
        access_token: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<CreatedPlaylist, ApiError> {
        self.post(
            "/api/playlists/create",
            &json!({
                "access_token": access_token,
                "name": name,
                "description": description,
                "public": public,
            }),
        )
        .await
    }

    /// Adds tracks to a playlist. URIs are checked and normalized to the
    /// `spotify:track:<id>` form before anything is sent.
    pub async fn add_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<(), ApiError> {
        let uris = track_uris
            .iter()
            .map(|uri| normalize_track_uri(uri))
            .collect::<Result<Vec<_>, _>>()?;

        let path = "/api/playlists/add-tracks";
        debug!("POST {}", path);
        let response = self
            .http
            .post(self.url(path))
            .json(&json!({
                "access_token": access_token,
                "playlist_id": playlist_id,
                "track_uris": uris,
            }))
            .send()
            .await?;

        // Any 2xx is an acknowledgment; the body is not inspected.
        success_body(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for BackendClient {
    async fn login_url(&self) -> Result<String, ApiError> {
        let body: LoginUrl = self.get("/api/auth/login", &[]).await?;
        Ok(body.url)
    }

    async fn exchange_code(&self, code: &str) -> Result<CallbackTokens, ApiError> {
        self.get("/api/auth/callback", &[("code", code.to_string())])
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.post("/api/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn validate_token(&self, access_token: &str) -> Result<bool, ApiError> {
        let body: TokenValidation = self
            .get(
                "/api/auth/validate-token",
                &[("access_token", access_token.to_string())],
            )
            .await?;
        Ok(body.valid)
    }
}

/// Accepts `spotify:track:<id>` URIs (and the forms Spotify itself accepts)
/// and returns the canonical URI.
pub fn normalize_track_uri(uri: &str) -> Result<String, ApiError> {
    TrackId::from_uri(uri)
        .map(|id| id.uri())
        .map_err(|_| ApiError::InvalidTrackUri(uri.to_string()))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = success_body(response).await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Body of a 2xx response; any other status becomes [`ApiError::Status`].
async fn success_body(response: Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
        warn!("Backend request failed with HTTP {}", status.as_u16());
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(body)
}

/// Pulls `error` or `message` out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}
