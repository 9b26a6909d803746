/// Main entry point for the Spotify Autopause CLI
use anyhow::{Context, Result};
use chrono::TimeZone;
use clap::{Parser, Subcommand};
use spotify_autopause::background::Background;
use spotify_autopause::config::Config;
use spotify_autopause::models::{PlaylistSelection, Settings};
use spotify_autopause::platform::{AuthorizationPrompt, TerminalPrompt};
use spotify_autopause::playback::{PlaybackOutcome, SkipReason};
use spotify_autopause::{storage, AuthState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "spotify-autopause",
    version,
    about = "Pauses Spotify while other tabs play audio and resumes it afterwards",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll tabs and answer JSON control messages on stdin (default)
    Serve,

    /// Authorize with Spotify by pasting the redirect URL
    Login,

    /// Remove the stored access token
    Logout,

    /// Print the stored access token
    Token,

    /// Show login state, preferences and the active device
    Status,

    /// Pause playback now
    Pause,

    /// Start a shuffled queue from the selected playlist
    Resume,

    /// Choose the playlist queued on resume
    Select {
        /// Playlist id, URI or link, or "liked" for liked songs
        playlist: String,
    },

    /// Update the auto-pause and auto-replay preferences
    Settings {
        #[arg(long)]
        auto_pause: Option<bool>,

        #[arg(long)]
        auto_replay: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    let level = args
        .log_level
        .as_deref()
        .unwrap_or(config.general.log_level.as_str());
    init_logging(level)?;

    info!("Starting Spotify Autopause v{}", env!("CARGO_PKG_VERSION"));

    let command = args.command.unwrap_or(Command::Serve);
    // In serve mode stdin carries control messages, so the login prompt reads the terminal
    let prompt: Arc<dyn AuthorizationPrompt> = match command {
        Command::Serve => Arc::new(TerminalPrompt::tty()),
        _ => Arc::new(TerminalPrompt::stdin()),
    };
    let bg = Arc::new(Background::from_config(&config, prompt)?);

    run_command(bg, command).await
}

fn init_logging(level: &str) -> Result<()> {
    let level: filter::LevelFilter = level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", level))?;
    let filter = filter::Targets::new()
        .with_default(filter::LevelFilter::WARN)
        .with_target("spotify_autopause", level)
        .with_target("hyper", filter::LevelFilter::INFO)
        .with_target("reqwest", filter::LevelFilter::INFO);

    // stdout is the control channel in serve mode
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

async fn run_command(bg: Arc<Background>, command: Command) -> Result<()> {
    match command {
        Command::Serve => {
            bg.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
        }
        Command::Login => {
            let credentials = bg.auth().login().await?;
            println!("Logged in, token valid until {}", format_ms(credentials.expires_at_ms));
        }
        Command::Logout => {
            bg.auth().logout().await?;
            println!("Logged out");
        }
        Command::Token => {
            println!("{}", bg.auth().token().await?);
        }
        Command::Status => handle_status_command(&bg).await?,
        Command::Pause => {
            let outcome = bg.playback().pause().await?;
            println!("{}", describe(&outcome));
        }
        Command::Resume => {
            let outcome = bg.playback().resume().await?;
            println!("{}", describe(&outcome));
        }
        Command::Select { playlist } => {
            let selection = PlaylistSelection::from_stored(Some(&playlist));
            storage::save_selection(bg.store(), &selection).await?;
            println!("Selected {}", selection.as_stored());
        }
        Command::Settings {
            auto_pause,
            auto_replay,
        } => {
            let current = storage::load_settings(bg.store()).await?;
            let updated = Settings {
                auto_pause_enabled: auto_pause.unwrap_or(current.auto_pause_enabled),
                auto_replay_enabled: auto_replay.unwrap_or(current.auto_replay_enabled),
            };
            storage::save_settings(bg.store(), &updated).await?;
            print_settings(&updated);
        }
    }
    Ok(())
}

async fn handle_status_command(bg: &Background) -> Result<()> {
    match bg.auth().state().await? {
        AuthState::LoggedIn { expires_at_ms } => {
            println!("Logged in (token valid until {})", format_ms(expires_at_ms))
        }
        AuthState::Authorizing => println!("Authorization in progress"),
        AuthState::LoggedOut => println!("Logged out"),
    }

    print_settings(&storage::load_settings(bg.store()).await?);

    match storage::load_selection(bg.store()).await? {
        PlaylistSelection::Liked => println!("Selected: liked songs"),
        PlaylistSelection::Playlist(id) => println!("Selected: playlist {}", id),
    }

    match bg.playback().active_device().await? {
        Some(device) => println!("Active device: {} ({})", device.name, device.id),
        None => println!("Active device: none"),
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("Auto-pause: {}", on_off(settings.auto_pause_enabled));
    println!("Auto-replay: {}", on_off(settings.auto_replay_enabled));
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn format_ms(ms: i64) -> String {
    chrono::Utc
        .timestamp_millis_opt(ms)
        .single()
        .map(|time| time.with_timezone(&chrono::Local).to_rfc2822())
        .unwrap_or_else(|| ms.to_string())
}

fn describe(outcome: &PlaybackOutcome) -> String {
    match outcome {
        PlaybackOutcome::Paused => "Playback paused".to_string(),
        PlaybackOutcome::Started { device_id, queued } => {
            format!("Queued {} tracks on device {}", queued, device_id)
        }
        PlaybackOutcome::Skipped(reason) => match reason {
            SkipReason::NoToken => "Not logged in".to_string(),
            SkipReason::TokenExpired => "Access token expired, log in again".to_string(),
            SkipReason::NoActiveDevice => "No active Spotify device".to_string(),
            SkipReason::NoTracks => "The selected playlist has no tracks".to_string(),
        },
    }
}
