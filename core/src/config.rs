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

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::store::FileSessionStore;

pub const DEFAULT_API_URL: &str = "http://localhost:5001";
pub const DEFAULT_PROVIDER_LOGOUT_URL: &str = "https://accounts.spotify.com/logout";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// Runtime settings for the client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Spotify Analyzer backend.
    pub api_url: String,
    /// Spotify's logout page, opened on sign-out.
    pub provider_logout_url: String,
    /// Upper bound for every backend request.
    pub request_timeout: Duration,
    /// Pause between the provider logout redirect and returning home.
    pub logout_grace: Duration,
    pub session_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            provider_logout_url: DEFAULT_PROVIDER_LOGOUT_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            logout_grace: Duration::ZERO,
            session_file: FileSessionStore::default_path(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Recognized variables:
    /// - `ANALYZER_API_URL` (falls back to `REACT_APP_API_URL`)
    /// - `ANALYZER_PROVIDER_LOGOUT_URL`
    /// - `ANALYZER_REQUEST_TIMEOUT_SECS`
    /// - `ANALYZER_LOGOUT_GRACE_MS`
    /// - `ANALYZER_SESSION_FILE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`] but with a caller-supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = var("ANALYZER_API_URL").or_else(|| var("REACT_APP_API_URL")) {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = var("ANALYZER_PROVIDER_LOGOUT_URL") {
            config.provider_logout_url = url;
        }
        if let Some(raw) = var("ANALYZER_REQUEST_TIMEOUT_SECS") {
            let secs = parse_number("ANALYZER_REQUEST_TIMEOUT_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::Zero {
                    name: "ANALYZER_REQUEST_TIMEOUT_SECS",
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = var("ANALYZER_LOGOUT_GRACE_MS") {
            config.logout_grace =
                Duration::from_millis(parse_number("ANALYZER_LOGOUT_GRACE_MS", &raw)?);
        }
        if let Some(path) = var("ANALYZER_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }

        Ok(config)
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.to_string(),
    })
}
