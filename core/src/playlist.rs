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

use crate::api::{ApiError, BackendClient};
use crate::models::{CreatedPlaylist, Track};
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How many generated tracks are pre-selected.
pub const DEFAULT_SELECTION: usize = 5;

#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("Please select at least one track for your playlist.")]
    NoTracksSelected,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Listening-history window the backend analyzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" | "short" => Ok(TimeRange::ShortTerm),
            "medium_term" | "medium" => Ok(TimeRange::MediumTerm),
            "long_term" | "long" => Ok(TimeRange::LongTerm),
            other => Err(format!(
                "unknown time range '{}' (expected short_term, medium_term or long_term)",
                other
            )),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Takes the playlist name the model suggested, if any.
///
/// The first line mentioning `Name:` wins; the text between the first and
/// second colon is used, without quotes or markdown emphasis. Falls back to
/// `"<mood> Playlist"`.
pub fn playlist_name_from_recommendations(recommendations: &str, mood: &str) -> String {
    for line in recommendations.lines() {
        if !line.contains("Name:") {
            continue;
        }
        if let Some(part) = line.split(':').nth(1) {
            let part = part.trim();
            if !part.is_empty() {
                let name: String = part
                    .chars()
                    .filter(|c| !matches!(c, '"' | '\'' | '*'))
                    .collect();
                let name = name.trim();
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }
    format!("{} Playlist", mood)
}

pub fn playlist_description(mood: &str) -> String {
    format!("Custom {} playlist generated by Spotify Analyzer", mood)
}

/// Random default selection out of the generated candidates.
pub fn pick_tracks<R: Rng + ?Sized>(tracks: &[Track], count: usize, rng: &mut R) -> Vec<Track> {
    tracks.choose_multiple(rng, count).cloned().collect()
}

/// A playlist created from a mood and filled with the chosen tracks.
#[derive(Debug, Clone, Serialize)]
pub struct SavedPlaylist {
    pub name: String,
    pub playlist_id: String,
    pub external_url: String,
    pub tracks_added: usize,
}

/// Creates a public playlist for `mood` and adds the selected tracks to it.
pub async fn save_mood_playlist(
    client: &BackendClient,
    access_token: &str,
    mood: &str,
    recommendations: &str,
    selected: &[Track],
) -> Result<SavedPlaylist, PlaylistError> {
    if selected.is_empty() {
        return Err(PlaylistError::NoTracksSelected);
    }

    let name = playlist_name_from_recommendations(recommendations, mood);
    info!("Creating playlist: {}", name);

    let CreatedPlaylist {
        playlist_id,
        external_url,
    } = client
        .create_playlist(access_token, &name, &playlist_description(mood), true)
        .await?;

    let uris: Vec<String> = selected.iter().map(|t| t.uri.clone()).collect();
    client.add_tracks(access_token, &playlist_id, &uris).await?;

    Ok(SavedPlaylist {
        name,
        playlist_id,
        external_url,
        tracks_added: uris.len(),
    })
}
