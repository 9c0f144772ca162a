//! Playback controller
//!
//! One task owns the queue store and executes commands strictly one at a time
//! in arrival order. Public methods enqueue a command and await its reply.
//! Status reads go to the published snapshot and never wait.
//!
//! Failure handling per command:
//! - `PlaybackError` on play: retried, then the entry is skipped
//! - `ConnectionError`: one reconnect and one retry of the same call
//! - anything slower than the configured bound: `Timeout`

use super::commands::{deliver, Command, Envelope, Mailbox};
use super::status::{PlaybackStatus, StatusHandle};
use crate::backend::{
    BackendFactory, BackendSwitcher, PlayerBackend, ResumePoint, SwitchPermit, SwitchPolicy,
    SwitchReport, SwitchRequest,
};
use crate::config::{DataPaths, TimingConfig};
use crate::error::{Error, Result};
use crate::queue::{validate_volume, QueueEntry, QueueState, QueueStore};
use crate::settings::SettingsStore;
use jukebox_common::events::{
    BackendKind, PlaybackState, QueueChangeTrigger, RepeatMode,
};
use jukebox_common::time::now;
use jukebox_common::{EventBus, JukeboxEvent};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Handle to the playback controller task
///
/// Cheap to clone. The task exits once every handle is dropped.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

struct Shared {
    tx: mpsc::UnboundedSender<Envelope>,
    status: StatusHandle,
    switcher: Arc<BackendSwitcher>,
    /// Set while a foreground command runs
    executing: Arc<AtomicBool>,
    events: EventBus,
}

impl PlaybackController {
    /// Load the queue, bring up the preferred backend and start the task
    ///
    /// An unreachable backend does not prevent startup; the controller starts
    /// degraded and reconnects on the next command.
    pub async fn start(
        paths: &DataPaths,
        timing: TimingConfig,
        factory: Arc<dyn BackendFactory>,
        settings: Arc<SettingsStore>,
        events: EventBus,
    ) -> Result<Self> {
        let mut store = QueueStore::open(paths.queue_file()).await?;

        let preferred = settings.backend_preference().await?;
        if store.state().active_backend != preferred {
            info!(
                snapshot = %store.state().active_backend,
                preferred = %preferred,
                "Settings preference overrides queue snapshot backend"
            );
            store.set_active_backend(preferred).await?;
        }

        let status = StatusHandle::new(store.state());
        let backend = factory.create(preferred)?;
        let switcher = Arc::new(BackendSwitcher::new(
            Arc::clone(&backend),
            factory,
            settings,
            status.clone(),
            SwitchPolicy::from(&timing),
        ));

        let mut confirmed_playing = None;
        match switcher.connect_with_retry(&backend).await {
            Ok(()) => {
                if let Err(e) = backend.set_volume(store.state().effective_volume()).await {
                    warn!(error = %e, "Could not apply stored volume");
                }
                confirmed_playing = adopt_backend_state(&backend, store.state(), &status).await;
            }
            Err(e) => {
                warn!(error = %e, "Starting without a reachable backend");
                status.update(|s| s.degraded = true);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let executing = Arc::new(AtomicBool::new(false));

        let engine = Engine {
            store,
            switcher: Arc::clone(&switcher),
            status: status.clone(),
            events: events.clone(),
            timing: timing.clone(),
            confirmed_playing,
            resume_point: None,
        };
        tokio::spawn(engine.run(rx, Arc::clone(&executing)));

        if let Some(period) = timing.status_poll_interval() {
            spawn_poller(tx.downgrade(), period);
        }

        info!(backend = %preferred, "Playback controller started");
        Ok(Self {
            shared: Arc::new(Shared {
                tx,
                status,
                switcher,
                executing,
                events,
            }),
        })
    }

    /// Current status; never waits on the command queue
    pub fn get_status(&self) -> PlaybackStatus {
        self.shared.status.snapshot()
    }

    /// Current queue snapshot
    pub fn queue(&self) -> Arc<QueueState> {
        self.shared.status.queue()
    }

    pub fn live_backend(&self) -> BackendKind {
        self.shared.switcher.live_kind()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.shared.events.subscribe()
    }

    /// Insert right after the current entry and start it
    pub async fn play_now(&self, entry: QueueEntry) -> Result<PlaybackStatus> {
        self.submit(Command::PlayNow(entry)).await
    }

    /// Append to the end of the queue; playback is not started
    pub async fn enqueue(&self, entry: QueueEntry) -> Result<PlaybackStatus> {
        self.submit(Command::Enqueue(vec![entry])).await
    }

    pub async fn enqueue_all(&self, entries: Vec<QueueEntry>) -> Result<PlaybackStatus> {
        self.submit(Command::Enqueue(entries)).await
    }

    pub async fn skip_next(&self) -> Result<PlaybackStatus> {
        self.submit(Command::SkipNext).await
    }

    pub async fn skip_previous(&self) -> Result<PlaybackStatus> {
        self.submit(Command::SkipPrevious).await
    }

    /// Pause, resume, or start the current entry when stopped
    pub async fn toggle_pause(&self) -> Result<PlaybackStatus> {
        self.submit(Command::TogglePause).await
    }

    pub async fn stop(&self) -> Result<PlaybackStatus> {
        self.submit(Command::Stop).await
    }

    pub async fn seek(&self, seconds: f64) -> Result<PlaybackStatus> {
        self.submit(Command::Seek(seconds)).await
    }

    /// Volume on a 0.0..=1.0 scale; out-of-range values are clamped
    pub async fn set_volume(&self, volume: f32) -> Result<PlaybackStatus> {
        self.submit(Command::SetVolume(volume)).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<PlaybackStatus> {
        self.submit(Command::SetMuted(muted)).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<PlaybackStatus> {
        self.submit(Command::SetRepeat(mode)).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<PlaybackStatus> {
        self.submit(Command::SetShuffle(enabled)).await
    }

    pub async fn remove_entry(&self, entry_id: Uuid) -> Result<PlaybackStatus> {
        self.submit(Command::RemoveEntry(entry_id)).await
    }

    pub async fn move_entry(&self, from: usize, to: usize) -> Result<PlaybackStatus> {
        self.submit(Command::MoveEntry { from, to }).await
    }

    pub async fn clear_queue(&self) -> Result<PlaybackStatus> {
        self.submit(Command::ClearQueue).await
    }

    /// Hot-switch the live backend
    ///
    /// Rejected with `Busy` while another switch is in flight or a playback
    /// command is executing.
    pub async fn switch_audio_player(
        &self,
        target: BackendKind,
        resume: bool,
    ) -> Result<PlaybackStatus> {
        let name = "switchAudioPlayer";
        let permit = self.claim_switch(name)?;
        if self.shared.executing.load(Ordering::SeqCst) {
            return Err(self.reject(
                name,
                Error::Busy("A playback command is in progress".to_string()),
            ));
        }
        self.submit(Command::SwitchBackend {
            target,
            resume,
            permit,
        })
        .await
    }

    /// Re-read the backend preference and switch to it if it changed
    pub async fn reload_audio_player_preference(&self) -> Result<PlaybackStatus> {
        let permit = self.claim_switch("reloadAudioPlayerPreference")?;
        self.submit(Command::ReloadPreference { permit }).await
    }

    fn claim_switch(&self, name: &str) -> Result<SwitchPermit> {
        self.shared
            .switcher
            .try_begin()
            .map_err(|e| self.reject(name, e))
    }

    fn reject(&self, name: &str, e: Error) -> Error {
        warn!(command = name, error = %e, "Command rejected");
        self.shared.events.emit_lossy(JukeboxEvent::CommandFailed {
            command: name.to_string(),
            kind: e.kind().to_string(),
            message: e.to_string(),
            timestamp: now(),
        });
        e
    }

    async fn submit(&self, command: Command) -> Result<PlaybackStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared
            .tx
            .send(Envelope::new(command, reply_tx))
            .map_err(|_| Error::Internal("Playback controller has shut down".to_string()))?;

        reply_rx
            .await
            .map_err(|_| Error::Internal("Playback controller dropped the command".to_string()))?
    }
}

/// Align the published state with what the backend is already doing
///
/// Returns the current entry id when the backend is actively playing.
async fn adopt_backend_state(
    backend: &Arc<dyn PlayerBackend>,
    queue: &QueueState,
    status: &StatusHandle,
) -> Option<Uuid> {
    let current = queue.current_entry()?;
    let observed = backend.get_status().await;
    if observed.degraded {
        return None;
    }

    match observed.state {
        PlaybackState::Playing | PlaybackState::Paused => {
            debug!(state = %observed.state, "Adopting backend playback state");
            status.update(|s| {
                s.state = observed.state;
                s.position_seconds = observed.position_seconds;
                s.duration_seconds = observed.duration_seconds;
            });
            (observed.state == PlaybackState::Playing).then_some(current.id)
        }
        _ => None,
    }
}

fn spawn_poller(tx: mpsc::WeakUnboundedSender<Envelope>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(tx) = tx.upgrade() else {
                break;
            };
            if tx.send(Envelope::detached(Command::Refresh)).is_err() {
                break;
            }
        }
        debug!("Status poller stopped");
    });
}

/// State owned by the controller task
struct Engine {
    store: QueueStore,
    switcher: Arc<BackendSwitcher>,
    status: StatusHandle,
    events: EventBus,
    timing: TimingConfig,
    /// Entry the backend has been observed playing; completion is only
    /// inferred for this entry
    confirmed_playing: Option<Uuid>,
    /// Position captured by a switch that did not resume
    resume_point: Option<ResumePoint>,
}

impl Engine {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>, executing: Arc<AtomicBool>) {
        let mut mailbox = Mailbox::default();

        loop {
            if mailbox.is_empty() {
                match rx.recv().await {
                    Some(envelope) => mailbox.push(envelope),
                    None => break,
                }
            }
            while let Ok(envelope) = rx.try_recv() {
                mailbox.push(envelope);
            }

            let Some(Envelope { command, replies }) = mailbox.pop() else {
                continue;
            };
            let result = self.execute(command, &executing).await;
            deliver(replies, result);
        }

        info!("Playback controller stopped");
    }

    async fn execute(&mut self, command: Command, executing: &AtomicBool) -> Result<PlaybackStatus> {
        let name = command.name();
        let background = command.is_background();
        // Switches bound their own phases so the commit is never cut short
        let limit = (!command.is_switch()).then(|| self.timing.command_timeout());

        let _transition = (!background).then(|| self.status.begin_transition());
        if !background {
            executing.store(true, Ordering::SeqCst);
        }
        let result = match limit {
            Some(limit) => match tokio::time::timeout(limit, self.dispatch(command)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not complete within {:?}",
                    name, limit
                ))),
            },
            None => self.dispatch(command).await,
        };
        executing.store(false, Ordering::SeqCst);
        self.status.publish_queue(self.store.state());

        match &result {
            Ok(()) => debug!(command = name, "Command complete"),
            Err(e) if background => debug!(command = name, error = %e, "Background command failed"),
            Err(e) => {
                error!(command = name, kind = %e.kind(), error = %e, "Command failed");
                self.emit(JukeboxEvent::CommandFailed {
                    command: name.to_string(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                    timestamp: now(),
                });
            }
        }

        result.map(|()| self.status.stable())
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::PlayNow(entry) => self.play_now(entry).await,
            Command::Enqueue(entries) => self.enqueue(entries).await,
            Command::SkipNext => self.skip(true).await,
            Command::SkipPrevious => self.skip(false).await,
            Command::TogglePause => self.toggle_pause().await,
            Command::Stop => self.stop().await,
            Command::Seek(seconds) => self.seek(seconds).await,
            Command::SetVolume(volume) => self.set_volume(volume).await,
            Command::SetMuted(muted) => self.set_muted(muted).await,
            Command::SetRepeat(mode) => self.store.set_repeat_mode(mode).await,
            Command::SetShuffle(enabled) => self.store.set_shuffle(enabled).await,
            Command::RemoveEntry(id) => self.remove_entry(id).await,
            Command::MoveEntry { from, to } => {
                self.store.move_to(from, to).await?;
                self.queue_changed(QueueChangeTrigger::UserReorder);
                Ok(())
            }
            Command::ClearQueue => self.clear_queue().await,
            Command::SwitchBackend {
                target,
                resume,
                permit,
            } => self.switch_backend(&permit, target, resume).await,
            Command::ReloadPreference { permit } => self.reload_preference(&permit).await,
            Command::Refresh => self.refresh().await,
        }
    }

    fn emit(&self, event: JukeboxEvent) {
        self.events.emit_lossy(event);
    }

    fn queue_changed(&self, trigger: QueueChangeTrigger) {
        let queue = self.store.state();
        self.emit(JukeboxEvent::QueueChanged {
            trigger,
            queue_length: queue.len(),
            current_index: queue.current_index,
            timestamp: now(),
        });
    }

    fn set_state(&self, state: PlaybackState) {
        let old_state = self.status.stable().state;
        self.status.update(|s| s.state = state);
        if old_state != state {
            info!(old_state = %old_state, new_state = %state, "Playback state changed");
            self.emit(JukeboxEvent::PlaybackStateChanged {
                old_state,
                new_state: state,
                timestamp: now(),
            });
        }
    }

    fn volume_changed(&self) {
        let queue = self.store.state();
        self.emit(JukeboxEvent::VolumeChanged {
            volume: queue.volume,
            muted: queue.muted,
            timestamp: now(),
        });
    }

    /// Run `op` on the live backend, reconnecting once on a connection failure
    async fn with_backend<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn PlayerBackend>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let backend = self.switcher.live();
        match op(Arc::clone(&backend)).await {
            Err(Error::Connection(reason)) => {
                warn!(backend = %backend.kind(), error = %reason, "Backend connection lost, reconnecting");
                backend.connect().await?;
                let result = op(backend).await;
                if result.is_ok() {
                    self.status.update(|s| s.degraded = false);
                }
                result
            }
            other => other,
        }
    }

    /// Stop the backend (best effort) and mark playback stopped
    async fn halt(&mut self) -> Result<()> {
        if let Err(e) = self.switcher.live().stop().await {
            warn!(error = %e, "Backend did not stop cleanly");
        }
        self.confirmed_playing = None;
        self.resume_point = None;
        self.status.update(|s| {
            s.position_seconds = 0.0;
            s.duration_seconds = 0.0;
        });
        self.set_state(PlaybackState::Stopped);
        Ok(())
    }

    /// Play the current entry, skipping past entries the backend keeps rejecting
    ///
    /// Fails with `PlaybackError` only when nothing could be started.
    async fn start_current(&mut self) -> Result<()> {
        let attempts = 1 + self.timing.play_retry_limit;
        let mut skipped = 0;

        loop {
            let Some(entry) = self.store.current_entry().cloned() else {
                return self.halt().await;
            };

            let reason = match self.play_with_retries(&entry, attempts).await {
                Ok(()) => return Ok(()),
                Err(Error::Playback(reason)) => reason,
                Err(e) => {
                    self.set_state(PlaybackState::Stopped);
                    return Err(e);
                }
            };

            warn!(
                entry_id = %entry.id,
                track = %entry.track_path,
                attempts,
                reason = %reason,
                "Skipping unplayable entry"
            );
            self.emit(JukeboxEvent::EntrySkipped {
                entry_id: entry.id,
                track_path: entry.track_path.clone(),
                attempts,
                reason: reason.clone(),
                timestamp: now(),
            });

            skipped += 1;
            let next = self.store.skip_past_current().await?;
            self.queue_changed(QueueChangeTrigger::AutoSkip);
            if next.is_none() || skipped >= self.store.state().len() {
                self.halt().await?;
                return Err(Error::Playback(format!(
                    "No playable entry after skipping {}: {}",
                    skipped, reason
                )));
            }
        }
    }

    async fn play_with_retries(&mut self, entry: &QueueEntry, attempts: u32) -> Result<()> {
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            let path = entry.track_path.clone();
            let result = self
                .with_backend(|backend| {
                    let path = path.clone();
                    async move {
                        if let Err(e @ Error::Connection(_)) = backend.stop().await {
                            return Err(e);
                        }
                        backend.play(&path).await
                    }
                })
                .await;

            match result {
                Ok(()) => {
                    self.confirmed_playing = None;
                    self.resume_point = None;
                    self.status.update(|s| {
                        s.position_seconds = 0.0;
                        s.duration_seconds = 0.0;
                        s.degraded = false;
                    });
                    self.set_state(PlaybackState::Playing);
                    info!(entry_id = %entry.id, track = %entry.track_path, "Track started");
                    self.emit(JukeboxEvent::TrackStarted {
                        entry_id: entry.id,
                        track_path: entry.track_path.clone(),
                        backend: self.switcher.live_kind(),
                        timestamp: now(),
                    });
                    return Ok(());
                }
                Err(Error::Playback(reason)) => {
                    warn!(attempt, attempts, track = %entry.track_path, reason = %reason, "Play attempt failed");
                    last_reason = reason;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Playback(last_reason))
    }

    async fn play_now(&mut self, entry: QueueEntry) -> Result<()> {
        let index = self.store.insert_next(entry).await?;
        self.store.set_current_index(Some(index)).await?;
        self.queue_changed(QueueChangeTrigger::PlayNow);
        self.start_current().await
    }

    async fn enqueue(&mut self, entries: Vec<QueueEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.store.append_all(entries).await?;
        self.queue_changed(QueueChangeTrigger::UserEnqueue);
        Ok(())
    }

    async fn skip(&mut self, forward: bool) -> Result<()> {
        let next = if forward {
            self.store.advance().await?
        } else {
            self.store.retreat().await?
        };
        self.queue_changed(QueueChangeTrigger::Skip);

        match next {
            Some(_) => self.start_current().await,
            None => self.halt().await,
        }
    }

    async fn toggle_pause(&mut self) -> Result<()> {
        match self.status.stable().state {
            PlaybackState::Playing => {
                self.with_backend(|backend| async move { backend.pause().await })
                    .await?;
                self.set_state(PlaybackState::Paused);
                Ok(())
            }
            PlaybackState::Paused => match self.resume_point.take() {
                // Paused by a backend switch: the new backend has nothing loaded
                Some(point) => self.restart_at(point).await,
                None => {
                    self.with_backend(|backend| async move { backend.resume().await })
                        .await?;
                    self.set_state(PlaybackState::Playing);
                    Ok(())
                }
            },
            _ => {
                if self.store.current_entry().is_none() {
                    if self.store.advance().await?.is_none() {
                        debug!("Nothing queued to play");
                        return Ok(());
                    }
                    self.queue_changed(QueueChangeTrigger::Skip);
                }
                self.start_current().await
            }
        }
    }

    async fn restart_at(&mut self, point: ResumePoint) -> Result<()> {
        self.start_current().await?;

        let same_track = self
            .store
            .current_entry()
            .is_some_and(|e| e.track_path == point.track_path);
        if same_track && point.position_seconds > 0.0 {
            let position = point.position_seconds;
            match self
                .with_backend(|backend| async move { backend.seek(position).await })
                .await
            {
                Ok(()) => self.status.update(|s| s.position_seconds = position),
                Err(e) => warn!(error = %e, "Could not restore position"),
            }
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.with_backend(|backend| async move { backend.stop().await })
            .await?;
        self.halt().await
    }

    async fn seek(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Seek position must be a non-negative number, got {}",
                seconds
            )));
        }
        if !matches!(
            self.status.stable().state,
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            return Err(Error::InvalidInput("Nothing is playing".to_string()));
        }

        self.with_backend(|backend| async move { backend.seek(seconds).await })
            .await?;
        self.status.update(|s| s.position_seconds = seconds);
        if let Some(point) = self.resume_point.as_mut() {
            point.position_seconds = seconds;
        }
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = validate_volume(volume)?;
        if !self.store.state().muted {
            self.with_backend(|backend| async move { backend.set_volume(volume).await })
                .await?;
        }
        self.store.set_volume(volume).await?;
        self.volume_changed();
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> Result<()> {
        let effective = if muted { 0.0 } else { self.store.state().volume };
        self.with_backend(|backend| async move { backend.set_volume(effective).await })
            .await?;
        self.store.set_muted(muted).await?;
        self.volume_changed();
        Ok(())
    }

    async fn remove_entry(&mut self, id: Uuid) -> Result<()> {
        let was_current = self.store.current_entry().map(|e| e.id) == Some(id);
        self.store.remove_by_id(id).await?;
        self.queue_changed(QueueChangeTrigger::UserDequeue);

        if was_current {
            match self.status.stable().state {
                PlaybackState::Playing => return self.start_current().await,
                PlaybackState::Paused => return self.halt().await,
                _ => {}
            }
        }
        Ok(())
    }

    async fn clear_queue(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.queue_changed(QueueChangeTrigger::UserClear);
        self.halt().await
    }

    fn switch_request(&self, target: BackendKind, resume: bool) -> SwitchRequest {
        SwitchRequest {
            target,
            resume,
            current_track: self.store.current_entry().map(|e| e.track_path.clone()),
            volume: self.store.state().effective_volume(),
        }
    }

    async fn switch_backend(
        &mut self,
        permit: &SwitchPermit,
        target: BackendKind,
        resume: bool,
    ) -> Result<()> {
        let prior = self.status.stable().state;
        let request = self.switch_request(target, resume);
        let result = self.switcher.switch_to(permit, request).await;
        self.after_switch(prior, result.map(Some)).await
    }

    async fn reload_preference(&mut self, permit: &SwitchPermit) -> Result<()> {
        let prior = self.status.stable().state;
        let request = self.switch_request(self.switcher.live_kind(), false);
        let result = self
            .switcher
            .reload_preference(permit, request.current_track, request.volume)
            .await;
        self.after_switch(prior, result).await
    }

    async fn after_switch(
        &mut self,
        prior: PlaybackState,
        result: Result<Option<SwitchReport>>,
    ) -> Result<()> {
        let was_active = matches!(prior, PlaybackState::Playing | PlaybackState::Paused);

        let report = match result {
            Ok(Some(report)) if report.changed => report,
            Ok(_) => return Ok(()),
            Err(e) => {
                // The outgoing backend was stopped before the failure
                if was_active {
                    self.confirmed_playing = None;
                    self.set_state(PlaybackState::Stopped);
                }
                return Err(e);
            }
        };

        self.store.set_active_backend(report.to).await?;
        self.confirmed_playing = None;
        self.status.update(|s| s.degraded = false);

        let position = report
            .captured
            .as_ref()
            .map_or(0.0, |point| point.position_seconds);
        self.status.update(|s| s.position_seconds = position);

        if report.resumed {
            self.resume_point = None;
            self.set_state(PlaybackState::Playing);
        } else if was_active && self.store.current_entry().is_some() {
            self.resume_point = report.captured.clone().or_else(|| {
                self.store.current_entry().map(|e| ResumePoint {
                    track_path: e.track_path.clone(),
                    position_seconds: 0.0,
                })
            });
            self.set_state(PlaybackState::Paused);
        } else {
            self.resume_point = None;
            self.set_state(PlaybackState::Stopped);
        }

        self.emit(JukeboxEvent::BackendSwitched {
            from: report.from,
            to: report.to,
            resumed: report.resumed,
            timestamp: now(),
        });
        Ok(())
    }

    /// Poll the live backend and follow what it reports
    async fn refresh(&mut self) -> Result<()> {
        let believed = self.status.stable().state;
        if !matches!(believed, PlaybackState::Playing | PlaybackState::Paused) {
            return Ok(());
        }

        let observed = self.switcher.live().get_status().await;
        if observed.degraded {
            self.status.update(|s| s.degraded = true);
            return Ok(());
        }

        self.status.update(|s| {
            s.degraded = false;
            if observed.state != PlaybackState::Stopped {
                s.position_seconds = observed.position_seconds;
                s.duration_seconds = observed.duration_seconds;
            }
        });

        let current = self.store.current_entry().map(|e| e.id);
        match (believed, observed.state) {
            (PlaybackState::Playing, PlaybackState::Playing) => {
                self.confirmed_playing = current;
            }
            (PlaybackState::Playing, PlaybackState::Stopped)
                if current.is_some() && self.confirmed_playing == current =>
            {
                debug!(entry_id = ?current, "Track finished");
                self.confirmed_playing = None;
                let next = self.store.advance().await?;
                self.queue_changed(QueueChangeTrigger::TrackCompletion);
                match next {
                    Some(_) => self.start_current().await?,
                    None => self.halt().await?,
                }
            }
            (PlaybackState::Playing, PlaybackState::Paused) => {
                self.set_state(PlaybackState::Paused);
            }
            (PlaybackState::Paused, PlaybackState::Playing) if self.resume_point.is_none() => {
                self.confirmed_playing = current;
                self.set_state(PlaybackState::Playing);
            }
            _ => {}
        }
        Ok(())
    }
}
