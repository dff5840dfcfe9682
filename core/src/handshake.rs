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

use crate::api::AuthBackend;
use crate::navigation::Navigator;
use crate::routes::{parse_location, LoginError, Route};
use crate::session::SessionManager;
use crate::store::SessionStore;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of handling a redirect back from the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The handler navigated to this page.
    Navigate(Route),
    /// Nothing was done.
    NoAction,
}

/// Query parameters of a redirect. Accepts a full URL, a path with a query,
/// or a bare query string. Empty values count as absent; the first
/// occurrence of a name wins.
pub fn query_params(input: &str) -> HashMap<String, String> {
    let input = input.trim();
    let location = if input.contains("://") || input.starts_with('/') || input.starts_with('?') {
        parse_location(input)
    } else {
        parse_location(&format!("?{}", input))
    };

    let mut params = HashMap::new();
    if let Some(url) = location {
        for (key, value) in url.query_pairs() {
            if !value.is_empty() {
                params
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
    }
    params
}

fn go<B, S, N>(manager: &SessionManager<B, S, N>, route: Route) -> HandshakeOutcome
where
    B: AuthBackend,
    S: SessionStore,
    N: Navigator,
{
    manager.navigator().navigate(route);
    HandshakeOutcome::Navigate(route)
}

/// Handles `/auth-success?access_token=..&refresh_token=..&expires_in=..`,
/// where the backend hands the token set over directly.
pub fn complete_auth_success<B, S, N>(
    manager: &SessionManager<B, S, N>,
    query: &str,
) -> HandshakeOutcome
where
    B: AuthBackend,
    S: SessionStore,
    N: Navigator,
{
    let params = query_params(query);
    let access_token = params.get("access_token");
    let refresh_token = params.get("refresh_token");
    let expires_in = params
        .get("expires_in")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0);

    let (Some(access_token), Some(refresh_token), Some(expires_in)) =
        (access_token, refresh_token, expires_in)
    else {
        warn!("Auth redirect is missing tokens");
        return go(manager, Route::login_error(LoginError::MissingTokens));
    };

    match manager.set_tokens(access_token, refresh_token, expires_in) {
        Ok(()) => go(manager, Route::LANDING),
        Err(e) => {
            error!("Could not adopt tokens from auth redirect: {}", e);
            go(manager, Route::login_error(LoginError::AuthenticationFailed))
        }
    }
}

/// Handles `/callback?code=..`, redeeming the authorization code through
/// the backend.
///
/// A code can only be redeemed once, and the host may deliver the same
/// redirect twice. The handler therefore latches on the first exchange and
/// ignores every later invocation, including ones arriving after the
/// exchange finished. Use a new handler for a new login attempt.
pub struct CallbackHandler<B, S, N> {
    manager: Arc<SessionManager<B, S, N>>,
    in_flight: AtomicBool,
}

impl<B, S, N> CallbackHandler<B, S, N>
where
    B: AuthBackend,
    S: SessionStore,
    N: Navigator,
{
    pub fn new(manager: Arc<SessionManager<B, S, N>>) -> Self {
        Self {
            manager,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn handle(&self, query: &str) -> HandshakeOutcome {
        let params = query_params(query);

        if let Some(reason) = params.get("error") {
            info!("Authorization was not granted: {}", reason);
            return HandshakeOutcome::NoAction;
        }
        if self.is_in_flight() {
            debug!("Code exchange already started, ignoring duplicate callback");
            return HandshakeOutcome::NoAction;
        }

        let Some(code) = params.get("code") else {
            return go(&*self.manager, Route::login_error(LoginError::NoCode));
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Code exchange already started, ignoring duplicate callback");
            return HandshakeOutcome::NoAction;
        }

        let route = match self.manager.backend().exchange_code(code).await {
            Ok(tokens) => match tokens.complete() {
                Some((access, refresh, expires_in)) => {
                    match self.manager.set_tokens(&access, &refresh, expires_in) {
                        Ok(()) => Route::LANDING,
                        Err(e) => {
                            error!("Could not adopt exchanged tokens: {}", e);
                            Route::login_error(LoginError::AuthenticationFailed)
                        }
                    }
                }
                None => {
                    warn!("Code exchange answered without a complete token set");
                    Route::login_error(LoginError::InvalidResponse)
                }
            },
            Err(e) => {
                error!("Error in auth callback: {}", e);
                Route::login_error(LoginError::AuthenticationFailed)
            }
        };

        go(&*self.manager, route)
    }
}

/// Sends a redirect URL to the handler for its page. Returns `None` when the
/// URL is not a handshake entry point.
pub async fn dispatch_redirect<B, S, N>(
    callback: &CallbackHandler<B, S, N>,
    url: &str,
) -> Option<HandshakeOutcome>
where
    B: AuthBackend,
    S: SessionStore,
    N: Navigator,
{
    match Route::parse(url)? {
        Route::Callback => Some(callback.handle(url).await),
        Route::AuthSuccess => Some(complete_auth_success(&*callback.manager, url)),
        _ => None,
    }
}
