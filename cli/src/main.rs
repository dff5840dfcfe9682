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

use analyzer_core::handshake::dispatch_redirect;
use analyzer_core::navigation::Navigator;
use analyzer_core::playlist::{self, TimeRange, DEFAULT_SELECTION};
use analyzer_core::{
    guard, BackendClient, CallbackHandler, Config, FileSessionStore, GuardDecision,
    HandshakeOutcome, Route, SessionManager,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::{debug, info};
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::process;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Parser)]
#[command(name = "spotify-analyzer")]
#[command(about = "Sign in with Spotify, read AI commentary on your listening, and build mood playlists", long_about = None)]
struct Cli {
    /// Print URLs instead of opening them in the browser
    #[arg(long, global = true)]
    no_browser: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Signs in with Spotify through the browser
    Login,
    /// Completes a sign-in from the URL the browser was redirected to
    Callback {
        /// The full redirect URL (…/callback?code=… or …/auth-success?…)
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Shows whether you are signed in
    Status,
    /// Signs out here and at Spotify
    Logout,
    /// Validates the session and shows your profile
    Dashboard,
    /// AI-generated commentary on your listening history
    Analyze,
    /// Your top tracks
    TopTracks {
        #[arg(long, default_value = "medium_term")]
        time_range: TimeRange,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Your top artists
    TopArtists {
        #[arg(long, default_value = "medium_term")]
        time_range: TimeRange,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Audio features (energy, valence, tempo, ...) for tracks
    AudioFeatures {
        /// Spotify track IDs, space or comma separated
        #[arg(value_name = "TRACK_ID", required = true, value_delimiter = ',')]
        track_ids: Vec<String>,
    },
    /// Recently played tracks
    Recent {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Searches tracks through the backend
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
    },
    /// Generates a playlist for a mood, optionally saving it to your account
    Mood {
        /// How you feel, e.g. "rainy sunday morning"
        #[arg(value_name = "MOOD")]
        mood: String,
        /// Listening-history window to base the picks on
        #[arg(long, default_value = "medium_term")]
        time_range: TimeRange,
        /// Create the playlist in your Spotify account
        #[arg(long)]
        save: bool,
        /// How many of the suggested tracks to keep
        #[arg(long, default_value_t = DEFAULT_SELECTION)]
        count: usize,
        /// Output the generated playlist to a JSON file
        #[arg(long)]
        json: Option<String>,
    },
}

/// Opens external pages in the system browser and keeps track of the
/// current in-app page.
struct BrowserNavigator {
    open_browser: bool,
    current: Mutex<Route>,
}

impl BrowserNavigator {
    fn new(open_browser: bool) -> Self {
        Self {
            open_browser,
            current: Mutex::new(Route::Home),
        }
    }
}

impl Navigator for BrowserNavigator {
    fn navigate(&self, route: Route) {
        debug!("Navigating to {}", route);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = route;
    }

    fn redirect(&self, url: &str) {
        if self.open_browser && open::that(url).is_ok() {
            println!("Opened in your browser: {}", url);
        } else {
            println!("Open this URL in your browser:");
            println!("  {}", url);
        }
    }
}

type Manager = SessionManager<BackendClient, FileSessionStore, BrowserNavigator>;

struct App {
    manager: Arc<Manager>,
    client: BackendClient,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        // Silently ignore
    }

    let cli = Cli::parse();

    let app = match start(cli.no_browser).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error initializing client: {:#}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Login => handle_login(&app).await,
        Commands::Callback { url } => handle_callback(&app, &url).await,
        Commands::Status => handle_status(&app),
        Commands::Logout => handle_logout(&app).await,
        Commands::Dashboard => handle_dashboard(&app).await,
        Commands::Analyze => handle_analyze(&app).await,
        Commands::TopTracks { time_range, limit } => {
            let token = enter(&app, Route::Dashboard);
            print_data(app.client.top_tracks(&token, time_range.as_str(), limit).await);
        }
        Commands::TopArtists { time_range, limit } => {
            let token = enter(&app, Route::Dashboard);
            print_data(app.client.top_artists(&token, time_range.as_str(), limit).await);
        }
        Commands::AudioFeatures { track_ids } => {
            let token = enter(&app, Route::Analysis);
            print_data(app.client.audio_features(&token, &track_ids).await);
        }
        Commands::Recent { limit } => {
            let token = enter(&app, Route::Dashboard);
            print_data(app.client.recently_played(&token, limit).await);
        }
        Commands::Search { query } => {
            let token = enter(&app, Route::PlaylistGenerator);
            print_data(app.client.search_tracks(&token, &query).await);
        }
        Commands::Mood {
            mood,
            time_range,
            save,
            count,
            json,
        } => handle_mood(&app, &mood, time_range, save, count, json.as_deref()).await,
    }
}

async fn start(no_browser: bool) -> anyhow::Result<App> {
    let config = Config::from_env().context("invalid configuration")?;
    let client = BackendClient::new(&config).context("could not build HTTP client")?;
    let store = FileSessionStore::new(&config.session_file);
    info!("Using backend {} and session file {}", config.api_url, store.path().display());

    let manager = Arc::new(SessionManager::new(
        client.clone(),
        store,
        BrowserNavigator::new(!no_browser),
        &config,
    ));
    manager.restore().await;

    Ok(App { manager, client })
}

/// Applies the route guard for a page-like command and returns the access
/// token for it. Exits when the page may not be shown.
fn enter(app: &App, route: Route) -> String {
    match guard(route, &app.manager.snapshot()) {
        GuardDecision::Render => {}
        GuardDecision::Redirect(Route::Login { .. }) => {
            eprintln!("You are not signed in. Run 'spotify-analyzer login' first.");
            process::exit(1);
        }
        GuardDecision::Redirect(other) => {
            eprintln!("Cannot open {} right now (redirected to {}).", route, other);
            process::exit(1);
        }
        GuardDecision::Wait => {
            eprintln!("Session is still being restored, try again.");
            process::exit(1);
        }
    }

    match app.manager.access_token() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

async fn handle_login(app: &App) {
    if let GuardDecision::Redirect(_) = guard(Route::login(), &app.manager.snapshot()) {
        println!("[OK] Already signed in. Run 'spotify-analyzer logout' to switch accounts.");
        return;
    }

    if let Err(e) = app.manager.login().await {
        eprintln!("Could not start the Spotify login: {}", e);
        process::exit(1);
    }

    println!();
    print!("After approving access, paste the URL you were redirected to: ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        eprintln!("[ERROR] Failed to read the redirect URL: {}", e);
        process::exit(1);
    }

    handle_callback(app, line.trim()).await;
}

async fn handle_callback(app: &App, url: &str) {
    let callback = CallbackHandler::new(app.manager.clone());

    match dispatch_redirect(&callback, url).await {
        Some(HandshakeOutcome::Navigate(Route::Login { error })) => {
            let reason = error
                .map(|e| e.describe())
                .unwrap_or("Sign-in did not complete.");
            eprintln!("[ERROR] Login failed: {}", reason);
            process::exit(1);
        }
        Some(HandshakeOutcome::Navigate(_)) => {
            println!("[OK] Signed in with Spotify.");
        }
        Some(HandshakeOutcome::NoAction) => {
            eprintln!("Authorization was not granted; nothing changed.");
            process::exit(1);
        }
        None => {
            eprintln!("[ERROR] '{}' is not a /callback or /auth-success URL.", url);
            process::exit(1);
        }
    }
}

fn handle_status(app: &App) {
    let state = app.manager.snapshot();
    println!("---------------------------------------------------");
    println!("SESSION");
    println!("---------------------------------------------------");
    println!("Signed in:      {}", if state.is_authenticated { "Yes" } else { "No" });
    if let Some(expires_at) = state.expires_at {
        println!("Token expires:  {}", expires_at.to_rfc3339());
    }
    println!(
        "Refreshable:    {}",
        if state.refresh_token.is_some() { "Yes" } else { "No" }
    );
    println!("---------------------------------------------------");
}

async fn handle_logout(app: &App) {
    app.manager.logout().await;
    println!("[OK] Signed out.");
}

async fn handle_dashboard(app: &App) {
    let token = enter(app, Route::Dashboard);

    match app.manager.validate().await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("Your Spotify session has expired. Please log in again.");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("[ERROR] Failed to fetch your profile data: {}", e);
            process::exit(1);
        }
    }

    match app.client.user_profile(&token).await {
        Ok(profile) => {
            println!();
            println!("Hello, {}", profile.display_name.as_deref().unwrap_or(&profile.id));
            println!("---------------------------------------------------");
            println!("Spotify ID:  {}", profile.id);
            if let Some(image) = profile.images.first() {
                println!("Avatar:      {}", image.url);
            }
            println!("---------------------------------------------------");
            println!("Next: 'spotify-analyzer analyze' or 'spotify-analyzer mood <MOOD>'");
        }
        Err(e) => {
            eprintln!("[ERROR] Failed to fetch your profile data: {}", e);
            process::exit(1);
        }
    }
}

async fn handle_analyze(app: &App) {
    let token = enter(app, Route::Analysis);
    println!("Analyzing your music taste...");

    match app.client.analyze_taste(&token).await {
        Ok(result) => {
            println!();
            println!("YOUR MUSIC ANALYSIS");
            println!("---------------------------------------------------");
            println!("{}", result.analysis);
        }
        Err(e) => {
            eprintln!("[ERROR] Failed to analyze your music taste: {}", e);
            process::exit(1);
        }
    }
}

async fn handle_mood(
    app: &App,
    mood: &str,
    time_range: TimeRange,
    save: bool,
    count: usize,
    json_path: Option<&str>,
) {
    let token = enter(app, Route::PlaylistGenerator);
    println!("Generating a '{}' playlist from your {} listening...", mood, time_range);

    let generated = match app
        .client
        .generate_mood_playlist(&token, mood, time_range.as_str())
        .await
    {
        Ok(generated) => generated,
        Err(e) => {
            eprintln!("[ERROR] Failed to generate playlist recommendations: {}", e);
            process::exit(1);
        }
    };

    println!();
    println!("{}", generated.recommendations);

    let selected = playlist::pick_tracks(
        &generated.available_tracks,
        count,
        &mut rand::thread_rng(),
    );

    println!();
    println!("Selected tracks ({} of {}):", selected.len(), generated.available_tracks.len());
    for (i, track) in selected.iter().enumerate() {
        println!("{}. {}", i + 1, track);
    }

    if let Some(path) = json_path {
        match File::create(path) {
            Ok(mut file) => {
                let json_content = serde_json::to_string_pretty(&serde_json::json!({
                    "mood": mood,
                    "time_range": time_range.as_str(),
                    "recommendations": generated.recommendations,
                    "selected_tracks": selected,
                }))
                .unwrap_or_default();
                if let Err(e) = file.write_all(json_content.as_bytes()) {
                    eprintln!();
                    eprintln!("[ERROR] Failed to write playlist to file: {}", e);
                } else {
                    println!();
                    println!("[SAVED] Playlist saved to: {}", path);
                }
            }
            Err(e) => eprintln!("[ERROR] Failed to create file '{}': {}", path, e),
        }
    }

    if !save {
        println!();
        println!("Tip: add --save to create this playlist in your account.");
        return;
    }

    match playlist::save_mood_playlist(
        &app.client,
        &token,
        mood,
        &generated.recommendations,
        &selected,
    )
    .await
    {
        Ok(saved) => {
            println!();
            println!("[OK] Created '{}' with {} tracks", saved.name, saved.tracks_added);
            println!("     {}", saved.external_url);
        }
        Err(e) => {
            eprintln!("[ERROR] Failed to create playlist: {}", e);
            process::exit(1);
        }
    }
}

fn print_data(result: Result<serde_json::Value, analyzer_core::ApiError>) {
    match result {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default()),
        Err(e) => {
            eprintln!("[ERROR] Request failed: {}", e);
            process::exit(1);
        }
    }
}
