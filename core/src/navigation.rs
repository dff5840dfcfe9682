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

use crate::routes::Route;
use std::sync::{Mutex, PoisonError};

/// Host-side navigation: moving between pages and full-page redirects.
pub trait Navigator: Send + Sync {
    /// In-app navigation to one of the application's pages.
    fn navigate(&self, route: Route);
    /// Leaves the application for an external URL (authorization, provider logout).
    fn redirect(&self, url: &str);
}

/// A navigation the host was asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    Page(Route),
    External(String),
}

/// Remembers every navigation request; used by headless hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Visit>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<Visit> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Visit> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn push(&self, visit: Visit) {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(visit);
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.push(Visit::Page(route));
    }

    fn redirect(&self, url: &str) {
        self.push(Visit::External(url.to_string()));
    }
}

impl<T: Navigator + ?Sized> Navigator for std::sync::Arc<T> {
    fn navigate(&self, route: Route) {
        (**self).navigate(route)
    }

    fn redirect(&self, url: &str) {
        (**self).redirect(url)
    }
}
