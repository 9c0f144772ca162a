//! Jukebox - command-line front end to the playback core
//!
//! Each invocation loads the persisted state, runs one command against the
//! live backend and prints the result as JSON. `watch` keeps the controller
//! running and streams events until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jukebox_common::config::{load_toml_config, resolve_data_folder, CONFIG_FILE_ENV, DATA_FOLDER_ENV};
use jukebox_common::events::{BackendKind, RepeatMode};
use jukebox_player::config::{DataPaths, PlayerConfig};
use jukebox_player::{Jukebox, Outcome, QueueEntry};
use serde::Serialize;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Command-line arguments for jukebox
#[derive(Parser, Debug)]
#[command(name = "jukebox")]
#[command(about = "Playback queue and audio backend controller")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = CONFIG_FILE_ENV)]
    config: Option<PathBuf>,

    /// Folder holding queue, playlist and settings documents
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show playback status
    Status,
    /// List the queue
    Queue,
    /// Play a track immediately
    Play {
        path: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Append tracks to the queue
    Enqueue {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Skip to the next entry
    Next,
    /// Go back to the previous entry
    Prev,
    /// Toggle pause (starts playback when stopped)
    Pause,
    Stop,
    /// Seek within the current track
    Seek { seconds: f64 },
    /// Set volume (0.0 - 1.0)
    Volume { level: f32 },
    /// Mute or unmute
    Mute {
        #[arg(long)]
        off: bool,
    },
    /// Set repeat mode (off, one, all)
    Repeat { mode: RepeatMode },
    /// Turn shuffle on or off
    Shuffle {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Remove a queue entry by id
    Remove { entry_id: Uuid },
    /// Move a queue entry
    Move { from: usize, to: usize },
    /// Empty the queue
    Clear,
    /// Switch the live backend (controllable/vlc or daemon/mpd)
    Switch {
        backend: BackendKind,
        /// Restart the interrupted track on the new backend
        #[arg(long)]
        resume: bool,
    },
    /// Re-read the backend preference from settings
    ReloadBackend,
    /// Playlist management
    #[command(subcommand)]
    Playlist(PlaylistCmd),
    /// Keep running and print events until interrupted
    Watch,
}

#[derive(Subcommand, Debug)]
enum PlaylistCmd {
    List,
    Show { id: Uuid },
    Create { name: String },
    Rename { id: Uuid, name: String },
    Delete { id: Uuid },
    Add { id: Uuid, path: String },
    Remove { id: Uuid, track_id: Uuid },
    Reorder { id: Uuid, track_id: Uuid, position: usize },
    /// Append the playlist's tracks to the queue
    Enqueue { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable. Installed before
    // the config loads so its outcome is logged; RUST_LOG wins over the
    // configured level.
    let (initial, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (default_filter("info"), false),
    };
    let (filter, filter_handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config: PlayerConfig =
        load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;
    if !from_env {
        filter_handle
            .reload(default_filter(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    let data_folder = resolve_data_folder(
        args.data_folder.as_deref(),
        DATA_FOLDER_ENV,
        config.data_folder.as_deref(),
    );
    info!("Data folder: {}", data_folder.display());

    let jukebox = Jukebox::start(&config, DataPaths::new(data_folder))
        .await
        .context("Failed to start jukebox core")?;

    run(&jukebox, args.command).await
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "jukebox={level},jukebox_player={level},jukebox_common={level}",
        level = level
    ))
}

async fn run(jukebox: &Jukebox, command: Cmd) -> Result<ExitCode> {
    let controller = &jukebox.controller;
    match command {
        Cmd::Status => print(Ok(controller.get_status())),
        Cmd::Queue => print(Ok(controller.queue().as_ref().clone())),
        Cmd::Play { path, title } => print(controller.play_now(QueueEntry::new(path, title)).await),
        Cmd::Enqueue { paths } => {
            let entries = paths.into_iter().map(|p| QueueEntry::new(p, None)).collect();
            print(controller.enqueue_all(entries).await)
        }
        Cmd::Next => print(controller.skip_next().await),
        Cmd::Prev => print(controller.skip_previous().await),
        Cmd::Pause => print(controller.toggle_pause().await),
        Cmd::Stop => print(controller.stop().await),
        Cmd::Seek { seconds } => print(controller.seek(seconds).await),
        Cmd::Volume { level } => print(controller.set_volume(level).await),
        Cmd::Mute { off } => print(controller.set_muted(!off).await),
        Cmd::Repeat { mode } => print(controller.set_repeat(mode).await),
        Cmd::Shuffle { enabled } => print(controller.set_shuffle(enabled).await),
        Cmd::Remove { entry_id } => print(controller.remove_entry(entry_id).await),
        Cmd::Move { from, to } => print(controller.move_entry(from, to).await),
        Cmd::Clear => print(controller.clear_queue().await),
        Cmd::Switch { backend, resume } => {
            print(controller.switch_audio_player(backend, resume).await)
        }
        Cmd::ReloadBackend => print(controller.reload_audio_player_preference().await),
        Cmd::Playlist(command) => run_playlist(jukebox, command).await,
        Cmd::Watch => {
            watch(jukebox).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_playlist(jukebox: &Jukebox, command: PlaylistCmd) -> Result<ExitCode> {
    let playlists = &jukebox.playlists;
    match command {
        PlaylistCmd::List => print(Ok(playlists.list_playlists().await)),
        PlaylistCmd::Show { id } => print(playlists.get_playlist(id).await),
        PlaylistCmd::Create { name } => print(playlists.create_playlist(&name).await),
        PlaylistCmd::Rename { id, name } => print(playlists.rename_playlist(id, &name).await),
        PlaylistCmd::Delete { id } => print(playlists.delete_playlist(id).await),
        PlaylistCmd::Add { id, path } => print(playlists.add_track(id, &path).await),
        PlaylistCmd::Remove { id, track_id } => print(playlists.remove_track(id, track_id).await),
        PlaylistCmd::Reorder {
            id,
            track_id,
            position,
        } => print(playlists.reorder(id, track_id, position).await),
        PlaylistCmd::Enqueue { id } => print(jukebox.enqueue_playlist(id).await),
    }
}

/// Print a result as a JSON outcome; failures exit non-zero
fn print<T: Serialize>(result: jukebox_player::Result<T>) -> Result<ExitCode> {
    let failed = result.is_err();
    let outcome: Outcome<T> = result.into();
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to encode result")?
    );
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn watch(jukebox: &Jukebox) {
    let mut events = jukebox.controller.subscribe_events();
    info!(backend = %jukebox.controller.live_backend(), "Watching, press Ctrl+C to stop");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!(error = %e, "Could not encode event"),
                },
                Err(RecvError::Lagged(missed)) => warn!(missed, "Event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => break,
        }
    }
    info!("Watch stopped");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
