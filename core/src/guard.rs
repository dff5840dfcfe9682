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

use crate::models::AuthState;
use crate::routes::Route;

/// What a page should do given the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session restoration is still running; show a neutral waiting state.
    Wait,
    Render,
    Redirect(Route),
}

/// Decides whether `route` may be shown for `state`.
pub fn guard(route: Route, state: &AuthState) -> GuardDecision {
    if state.is_loading {
        return GuardDecision::Wait;
    }

    if route.is_protected() && !state.is_authenticated {
        GuardDecision::Redirect(Route::login())
    } else if route.is_entry() && state.is_authenticated {
        GuardDecision::Redirect(Route::LANDING)
    } else {
        GuardDecision::Render
    }
}
