//! Integration tests for backend hot-switching
//!
//! **Test Coverage:**
//! - Switch without resume leaves playback paused at the captured position
//! - Switch with resume restarts the track on the new backend
//! - Failed switches keep the previous backend and preference
//! - Single-flight: concurrent or mid-command switches are rejected with Busy
//! - Preference reload and startup preference

mod helpers;

use helpers::{
    drain_events, entry, read_settings, test_config, test_timing, track, write_settings, Call,
    Harness,
};
use jukebox_common::events::{BackendKind, PlaybackState};
use jukebox_common::JukeboxEvent;
use jukebox_player::config::{PlayerConfig, TimingConfig};
use jukebox_player::ErrorKind;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Harness playing "a" on the controllable backend at 42s
async fn playing_at_42() -> Harness {
    playing_at_42_with(test_config()).await
}

async fn playing_at_42_with(config: PlayerConfig) -> Harness {
    let h = Harness::start_with(config).await;
    h.jukebox.controller.play_now(entry("a")).await.unwrap();
    h.vlc.set_position(42.0);
    h
}

fn switched_events(events: &[JukeboxEvent]) -> Vec<(BackendKind, BackendKind, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            JukeboxEvent::BackendSwitched {
                from, to, resumed, ..
            } => Some((*from, *to, *resumed)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_switch_without_resume_pauses_at_position() {
    let h = playing_at_42().await;
    let c = &h.jukebox.controller;
    let mut events = c.subscribe_events();

    let status = c
        .switch_audio_player(BackendKind::Daemon, false)
        .await
        .unwrap();

    assert_eq!(status.state, PlaybackState::Paused);
    assert_eq!(status.active_backend, BackendKind::Daemon);
    assert_eq!(status.position_seconds, 42.0);
    assert_eq!(c.live_backend(), BackendKind::Daemon);

    // Outgoing stopped, incoming connected but idle
    assert!(h.vlc.calls().contains(&Call::Stop));
    assert_eq!(h.mpd.count(&Call::Connect), 1);
    assert!(h.mpd.plays().is_empty());

    assert_eq!(read_settings(&h.dir)["audioPlayer"], "daemon");
    assert_eq!(
        switched_events(&drain_events(&mut events)),
        vec![(BackendKind::Controllable, BackendKind::Daemon, false)]
    );
}

#[tokio::test]
async fn test_switch_with_resume_continues_on_new_backend() {
    let h = playing_at_42().await;
    let c = &h.jukebox.controller;
    let mut events = c.subscribe_events();

    let status = c
        .switch_audio_player(BackendKind::Daemon, true)
        .await
        .unwrap();

    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(h.mpd.plays(), vec![track("a")]);
    assert!(h.mpd.calls().contains(&Call::Seek(42.0)));
    assert_eq!(
        switched_events(&drain_events(&mut events)),
        vec![(BackendKind::Controllable, BackendKind::Daemon, true)]
    );
}

fn switch_timeout(millis: u64) -> PlayerConfig {
    PlayerConfig {
        timing: TimingConfig {
            switch_timeout_ms: millis,
            ..test_timing()
        },
        ..Default::default()
    }
}

fn queue_document(h: &Harness) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(h.paths().queue_file()).unwrap()).unwrap()
}

#[tokio::test]
async fn test_slow_resume_still_commits_switch() {
    let h = playing_at_42_with(switch_timeout(400)).await;
    let c = &h.jukebox.controller;
    h.mpd.set_play_delay(Duration::from_millis(800));

    let status = c
        .switch_audio_player(BackendKind::Daemon, true)
        .await
        .unwrap();

    // Committed everywhere, resume abandoned
    assert_eq!(status.state, PlaybackState::Paused);
    assert_eq!(status.active_backend, BackendKind::Daemon);
    assert_eq!(status.position_seconds, 42.0);
    assert_eq!(c.live_backend(), BackendKind::Daemon);
    assert_eq!(read_settings(&h.dir)["audioPlayer"], "daemon");
    assert_eq!(queue_document(&h)["activeBackend"], "daemon");

    h.mpd.set_play_delay(Duration::ZERO);
    h.mpd.clear_calls();
    let status = c.toggle_pause().await.unwrap();
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(h.mpd.plays(), vec![track("a")]);
    assert_eq!(h.mpd.count(&Call::Seek(42.0)), 1);
}

#[tokio::test]
async fn test_slow_connect_times_out_before_commit() {
    // Connect attempt bound (200ms) outlasts the whole switch bound
    let h = playing_at_42_with(switch_timeout(100)).await;
    let c = &h.jukebox.controller;
    h.mpd.set_connect_delay(Duration::from_millis(150));

    let err = c
        .switch_audio_player(BackendKind::Daemon, true)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(c.live_backend(), BackendKind::Controllable);
    assert_eq!(read_settings(&h.dir)["audioPlayer"], "controllable");
    assert_eq!(queue_document(&h)["activeBackend"], "controllable");

    let status = h.status();
    assert_eq!(status.state, PlaybackState::Stopped);
    assert_eq!(status.active_backend, BackendKind::Controllable);
}

#[tokio::test]
async fn test_toggle_after_switch_restarts_at_captured_position() {
    let h = playing_at_42().await;
    let c = &h.jukebox.controller;
    c.switch_audio_player(BackendKind::Daemon, false)
        .await
        .unwrap();
    h.vlc.clear_calls();

    let status = c.toggle_pause().await.unwrap();

    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.position_seconds, 42.0);
    assert_eq!(h.mpd.plays(), vec![track("a")]);
    assert_eq!(h.mpd.count(&Call::Seek(42.0)), 1);
    // Commands no longer reach the old backend
    assert!(h.vlc.calls().is_empty());
}

#[tokio::test]
async fn test_switch_while_stopped_stays_stopped() {
    let h = Harness::start().await;
    let c = &h.jukebox.controller;
    c.enqueue(entry("a")).await.unwrap();

    let status = c
        .switch_audio_player(BackendKind::Daemon, true)
        .await
        .unwrap();

    assert_eq!(status.state, PlaybackState::Stopped);
    assert_eq!(status.active_backend, BackendKind::Daemon);
    assert!(h.mpd.plays().is_empty());
}

#[tokio::test]
async fn test_failed_connect_keeps_previous_backend() {
    let h = playing_at_42().await;
    let c = &h.jukebox.controller;
    h.mpd.set_unreachable(true);

    let err = c
        .switch_audio_player(BackendKind::Daemon, true)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectionError);
    assert_eq!(h.mpd.count(&Call::Connect), 3);
    assert_eq!(c.live_backend(), BackendKind::Controllable);
    assert_eq!(read_settings(&h.dir)["audioPlayer"], "controllable");

    // The outgoing backend was already stopped
    let status = h.status();
    assert_eq!(status.state, PlaybackState::Stopped);
    assert_eq!(status.active_backend, BackendKind::Controllable);

    // Still usable
    h.vlc.clear_calls();
    let status = c.toggle_pause().await.unwrap();
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(h.vlc.plays(), vec![track("a")]);
}

#[tokio::test]
async fn test_concurrent_switch_is_busy() {
    let h = Harness::start().await;
    let c = h.jukebox.controller.clone();
    // Slow, but inside the per-attempt connect bound
    h.mpd.set_connect_delay(Duration::from_millis(150));

    let first = tokio::spawn({
        let c = c.clone();
        async move { c.switch_audio_player(BackendKind::Daemon, false).await }
    });
    sleep(Duration::from_millis(50)).await;

    let err = c
        .switch_audio_player(BackendKind::Daemon, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    let err = c.reload_audio_player_preference().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);

    let status = first.await.unwrap().unwrap();
    assert_eq!(status.active_backend, BackendKind::Daemon);
    assert_eq!(h.mpd.count(&Call::Connect), 1);
}

#[tokio::test]
async fn test_switch_during_playback_command_is_busy() {
    let h = Harness::start().await;
    let c = h.jukebox.controller.clone();
    let mut events = c.subscribe_events();
    h.vlc.set_play_delay(Duration::from_millis(300));

    let play = tokio::spawn({
        let c = c.clone();
        async move { c.play_now(entry("a")).await }
    });
    sleep(Duration::from_millis(50)).await;

    let err = c
        .switch_audio_player(BackendKind::Daemon, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        JukeboxEvent::CommandFailed { command, kind, .. }
            if command == "switchAudioPlayer" && kind == "Busy"
    )));

    play.await.unwrap().unwrap();

    // The rejected attempt released the switch slot
    let status = c
        .switch_audio_player(BackendKind::Daemon, false)
        .await
        .unwrap();
    assert_eq!(status.active_backend, BackendKind::Daemon);
}

#[tokio::test]
async fn test_switch_to_live_backend_is_noop() {
    let h = playing_at_42().await;
    let c = &h.jukebox.controller;
    let mut events = c.subscribe_events();
    h.vlc.clear_calls();

    let status = c
        .switch_audio_player(BackendKind::Controllable, false)
        .await
        .unwrap();

    assert_eq!(status.state, PlaybackState::Playing);
    assert!(!h.vlc.calls().contains(&Call::Stop));
    assert_eq!(h.mpd.count(&Call::Connect), 0);
    assert!(switched_events(&drain_events(&mut events)).is_empty());
}

#[tokio::test]
async fn test_reload_preference_follows_settings() {
    let h = Harness::start().await;
    let c = &h.jukebox.controller;

    h.jukebox
        .settings
        .set_backend_preference(BackendKind::Daemon)
        .await
        .unwrap();
    let status = c.reload_audio_player_preference().await.unwrap();

    assert_eq!(status.active_backend, BackendKind::Daemon);
    assert_eq!(c.live_backend(), BackendKind::Daemon);

    // Unchanged preference: nothing to do
    h.mpd.clear_calls();
    c.reload_audio_player_preference().await.unwrap();
    assert_eq!(h.mpd.count(&Call::Connect), 0);
    assert_eq!(h.mpd.count(&Call::Stop), 0);
}

#[tokio::test]
async fn test_startup_honors_settings_preference() {
    let dir = TempDir::new().unwrap();
    write_settings(&dir, json!({ "audioPlayer": "mpd", "theme": "dark" }));

    let h = Harness::start_in(dir, test_config()).await;

    assert_eq!(h.jukebox.controller.live_backend(), BackendKind::Daemon);
    assert_eq!(h.status().active_backend, BackendKind::Daemon);
    assert_eq!(h.mpd.count(&Call::Connect), 1);
    assert_eq!(h.vlc.count(&Call::Connect), 0);
    assert_eq!(read_settings(&h.dir)["theme"], "dark");
}
