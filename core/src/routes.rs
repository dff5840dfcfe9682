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

use std::fmt;
use std::str::FromStr;
use url::Url;

/// Reason attached to `/login?error=...` when a handshake fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginError {
    NoCode,
    MissingTokens,
    InvalidResponse,
    AuthenticationFailed,
}

impl LoginError {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginError::NoCode => "no_code",
            LoginError::MissingTokens => "missing_tokens",
            LoginError::InvalidResponse => "invalid_response",
            LoginError::AuthenticationFailed => "authentication_failed",
        }
    }

    /// One-line explanation shown on the login page.
    pub fn describe(&self) -> &'static str {
        match self {
            LoginError::NoCode => "Spotify did not return an authorization code.",
            LoginError::MissingTokens => "The login redirect did not carry a complete token set.",
            LoginError::InvalidResponse => "The backend answered the code exchange without tokens.",
            LoginError::AuthenticationFailed => "The authorization code could not be exchanged.",
        }
    }
}

impl FromStr for LoginError {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_code" => Ok(LoginError::NoCode),
            "missing_tokens" => Ok(LoginError::MissingTokens),
            "invalid_response" => Ok(LoginError::InvalidResponse),
            "authentication_failed" => Ok(LoginError::AuthenticationFailed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pages of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login { error: Option<LoginError> },
    Callback,
    AuthSuccess,
    Dashboard,
    Analysis,
    PlaylistGenerator,
}

impl Route {
    /// Landing page once signed in.
    pub const LANDING: Route = Route::Dashboard;

    pub fn login() -> Self {
        Route::Login { error: None }
    }

    pub fn login_error(error: LoginError) -> Self {
        Route::Login { error: Some(error) }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login { error: None } => "/login".to_string(),
            Route::Login { error: Some(e) } => format!("/login?error={}", e),
            Route::Callback => "/callback".to_string(),
            Route::AuthSuccess => "/auth-success".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Analysis => "/analysis".to_string(),
            Route::PlaylistGenerator => "/playlist-generator".to_string(),
        }
    }

    /// Pages that require a signed-in user.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::Dashboard | Route::Analysis | Route::PlaylistGenerator
        )
    }

    /// Pages a signed-in user is moved away from.
    pub fn is_entry(&self) -> bool {
        matches!(self, Route::Home | Route::Login { .. })
    }

    /// Resolves a path or a full URL to a route. Unknown paths yield `None`;
    /// an unrecognized login error reason is dropped.
    pub fn parse(input: &str) -> Option<Self> {
        let url = parse_location(input)?;
        let route = match url.path().trim_end_matches('/') {
            "" => Route::Home,
            "/login" => Route::Login {
                error: url
                    .query_pairs()
                    .find(|(k, _)| k == "error")
                    .and_then(|(_, v)| v.parse().ok()),
            },
            "/callback" => Route::Callback,
            "/auth-success" => Route::AuthSuccess,
            "/dashboard" => Route::Dashboard,
            "/analysis" => Route::Analysis,
            "/playlist-generator" => Route::PlaylistGenerator,
            _ => return None,
        };
        Some(route)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Parses absolute URLs as-is and anchors relative ones (`/callback?code=x`,
/// `?code=x`) to a placeholder origin.
pub(crate) fn parse_location(input: &str) -> Option<Url> {
    let input = input.trim();
    if let Ok(url) = Url::parse(input) {
        if url.has_host() {
            return Some(url);
        }
    }
    Url::parse("http://localhost/").ok()?.join(input).ok()
}
