//! Backend switching
//!
//! Owns the reference to the live adapter and performs hot switches between
//! backend kinds. At most one switch is in flight; a second request is
//! rejected with `Busy` instead of waiting.

use super::{BackendFactory, PlayerBackend};
use crate::config::TimingConfig;
use crate::error::{Error, Result};
use crate::playback::StatusHandle;
use crate::settings::SettingsStore;
use jukebox_common::events::{BackendKind, PlaybackState};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

/// Connect retry policy used when bringing up a backend
#[derive(Debug, Clone, Copy)]
pub struct SwitchPolicy {
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    pub connect_timeout: Duration,
    /// Bound on everything before the new backend is committed, and on the
    /// resume that follows
    pub switch_timeout: Duration,
}

impl From<&TimingConfig> for SwitchPolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            connect_attempts: timing.connect_attempts.max(1),
            connect_backoff: timing.connect_backoff(),
            connect_timeout: timing.connect_timeout(),
            switch_timeout: timing.switch_timeout(),
        }
    }
}

/// Track and offset captured from the outgoing backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePoint {
    pub track_path: String,
    pub position_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct SwitchRequest {
    pub target: BackendKind,
    /// Restart the interrupted track on the new backend
    pub resume: bool,
    /// Path of the queue's current entry, preferred over the backend's report
    pub current_track: Option<String>,
    /// Volume to apply to the incoming backend
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchReport {
    pub from: BackendKind,
    pub to: BackendKind,
    /// False when the target was already live
    pub changed: bool,
    pub captured: Option<ResumePoint>,
    pub resumed: bool,
}

/// Proof that the caller holds the single switch slot
///
/// Released on drop.
pub struct SwitchPermit {
    flag: Arc<AtomicBool>,
}

impl Drop for SwitchPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct BackendSwitcher {
    live: RwLock<Arc<dyn PlayerBackend>>,
    factory: Arc<dyn BackendFactory>,
    settings: Arc<SettingsStore>,
    status: StatusHandle,
    in_flight: Arc<AtomicBool>,
    policy: SwitchPolicy,
}

impl BackendSwitcher {
    pub fn new(
        initial: Arc<dyn PlayerBackend>,
        factory: Arc<dyn BackendFactory>,
        settings: Arc<SettingsStore>,
        status: StatusHandle,
        policy: SwitchPolicy,
    ) -> Self {
        Self {
            live: RwLock::new(initial),
            factory,
            settings,
            status,
            in_flight: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    /// The adapter commands are currently routed to
    pub fn live(&self) -> Arc<dyn PlayerBackend> {
        match self.live.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn live_kind(&self) -> BackendKind {
        self.live().kind()
    }

    /// Claim the switch slot, or fail with `Busy`
    pub fn try_begin(&self) -> Result<SwitchPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::Busy("A backend switch is already in progress".to_string()))?;
        Ok(SwitchPermit {
            flag: Arc::clone(&self.in_flight),
        })
    }

    fn replace_live(&self, backend: Arc<dyn PlayerBackend>) {
        match self.live.write() {
            Ok(mut guard) => *guard = backend,
            Err(poisoned) => *poisoned.into_inner() = backend,
        }
    }

    /// Connect with bounded retries and exponential backoff
    pub async fn connect_with_retry(&self, backend: &Arc<dyn PlayerBackend>) -> Result<()> {
        let attempts = self.policy.connect_attempts;
        let mut backoff = self.policy.connect_backoff;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.policy.connect_timeout, backend.connect()).await {
                Ok(Ok(())) => {
                    info!(backend = %backend.kind(), attempt, "Backend connected");
                    return Ok(());
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("no answer within {:?}", self.policy.connect_timeout)
                }
            }

            warn!(
                backend = %backend.kind(),
                attempt,
                attempts,
                error = %last_error,
                "Backend connect attempt failed"
            );
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(Error::Connection(format!(
            "{} backend unreachable after {} attempts: {}",
            backend.kind(),
            attempts,
            last_error
        )))
    }

    /// Hot-switch to `request.target`
    ///
    /// Steps: capture the outgoing position, stop the outgoing backend,
    /// connect the incoming one, persist the preference, then optionally
    /// resume. If the incoming backend cannot be brought up in time the
    /// outgoing one stays live (stopped) and the preference is unchanged.
    /// Once committed, running out of time only costs the resume.
    pub async fn switch_to(&self, _permit: &SwitchPermit, request: SwitchRequest) -> Result<SwitchReport> {
        let outgoing = self.live();
        let from = outgoing.kind();
        if from == request.target {
            info!(backend = %from, "Switch target already live");
            return Ok(SwitchReport {
                from,
                to: from,
                changed: false,
                captured: None,
                resumed: false,
            });
        }

        let _transition = self.status.begin_transition();
        info!(from = %from, to = %request.target, resume = request.resume, "Switching backend");
        let deadline = Instant::now() + self.policy.switch_timeout;

        let (incoming, captured) = timeout_at(deadline, self.prepare(&outgoing, &request))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "Switch to {} did not complete within {:?}",
                    request.target, self.policy.switch_timeout
                ))
            })??;

        // Commit: runs to completion once started, never under the deadline
        if let Err(e) = self.settings.set_backend_preference(request.target).await {
            warn!(error = %e, "Backend preference not persisted, keeping {}", from);
            if let Err(stop_err) = incoming.stop().await {
                warn!(error = %stop_err, "Incoming backend did not stop cleanly");
            }
            return Err(e);
        }
        self.replace_live(Arc::clone(&incoming));

        let resumed = match timeout_at(deadline, finish_on(&incoming, &request, captured.as_ref())).await {
            Ok(resumed) => resumed,
            Err(_) => {
                warn!(
                    backend = %request.target,
                    "Resume on new backend ran out of time, leaving playback paused"
                );
                false
            }
        };

        info!(from = %from, to = %request.target, resumed, "Backend switch complete");
        Ok(SwitchReport {
            from,
            to: request.target,
            changed: true,
            captured,
            resumed,
        })
    }

    /// Capture the outgoing position, stop it, and bring up the target
    async fn prepare(
        &self,
        outgoing: &Arc<dyn PlayerBackend>,
        request: &SwitchRequest,
    ) -> Result<(Arc<dyn PlayerBackend>, Option<ResumePoint>)> {
        let outgoing_status = outgoing.get_status().await;
        let captured = match outgoing_status.state {
            PlaybackState::Playing | PlaybackState::Paused => request
                .current_track
                .clone()
                .or(outgoing_status.track)
                .map(|track_path| ResumePoint {
                    track_path,
                    position_seconds: outgoing_status.position_seconds,
                }),
            _ => None,
        };

        if let Err(e) = outgoing.stop().await {
            warn!(backend = %outgoing.kind(), error = %e, "Outgoing backend did not stop cleanly");
        }

        let incoming = self
            .factory
            .create(request.target)
            .map_err(|e| Error::Connection(format!("Cannot create {} backend: {}", request.target, e)))?;
        self.connect_with_retry(&incoming).await?;
        Ok((incoming, captured))
    }

    /// Re-read the persisted preference and switch to it without resuming
    ///
    /// `None` when the preferred backend is already live.
    pub async fn reload_preference(
        &self,
        permit: &SwitchPermit,
        current_track: Option<String>,
        volume: f32,
    ) -> Result<Option<SwitchReport>> {
        let preferred = self.settings.backend_preference().await?;
        if preferred == self.live_kind() {
            return Ok(None);
        }

        self.switch_to(
            permit,
            SwitchRequest {
                target: preferred,
                resume: false,
                current_track,
                volume,
            },
        )
        .await
        .map(Some)
    }
}

/// Apply volume and, when asked, restart the captured track
async fn finish_on(
    incoming: &Arc<dyn PlayerBackend>,
    request: &SwitchRequest,
    captured: Option<&ResumePoint>,
) -> bool {
    if let Err(e) = incoming.set_volume(request.volume).await {
        warn!(backend = %request.target, error = %e, "Could not apply volume to new backend");
    }

    let Some(point) = captured.filter(|_| request.resume) else {
        return false;
    };
    match resume_on(incoming, point).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                track = %point.track_path,
                error = %e,
                "Resume on new backend failed, leaving playback paused"
            );
            false
        }
    }
}

async fn resume_on(backend: &Arc<dyn PlayerBackend>, point: &ResumePoint) -> Result<()> {
    backend.play(&point.track_path).await?;
    if point.position_seconds > 0.0 {
        backend.seek(point.position_seconds).await?;
    }
    Ok(())
}
