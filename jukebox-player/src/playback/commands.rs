//! Serialized playback commands
//!
//! Commands reach the controller task through a FIFO mailbox. Adjacent
//! commands of the same coalescable kind merge into the newest one; every
//! caller of a merged command receives the survivor's result.

use super::status::PlaybackStatus;
use crate::backend::SwitchPermit;
use crate::error::Result;
use crate::queue::QueueEntry;
use jukebox_common::events::{BackendKind, RepeatMode};
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

pub(crate) enum Command {
    PlayNow(QueueEntry),
    Enqueue(Vec<QueueEntry>),
    SkipNext,
    SkipPrevious,
    TogglePause,
    Stop,
    Seek(f64),
    SetVolume(f32),
    SetMuted(bool),
    SetRepeat(RepeatMode),
    SetShuffle(bool),
    RemoveEntry(Uuid),
    MoveEntry { from: usize, to: usize },
    ClearQueue,
    SwitchBackend {
        target: BackendKind,
        resume: bool,
        permit: SwitchPermit,
    },
    ReloadPreference {
        permit: SwitchPermit,
    },
    /// Background status poll
    Refresh,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::PlayNow(_) => "playNow",
            Command::Enqueue(_) => "enqueue",
            Command::SkipNext => "skipNext",
            Command::SkipPrevious => "skipPrevious",
            Command::TogglePause => "togglePause",
            Command::Stop => "stop",
            Command::Seek(_) => "seek",
            Command::SetVolume(_) => "setVolume",
            Command::SetMuted(_) => "setMuted",
            Command::SetRepeat(_) => "setRepeat",
            Command::SetShuffle(_) => "setShuffle",
            Command::RemoveEntry(_) => "removeEntry",
            Command::MoveEntry { .. } => "moveEntry",
            Command::ClearQueue => "clearQueue",
            Command::SwitchBackend { .. } => "switchAudioPlayer",
            Command::ReloadPreference { .. } => "reloadAudioPlayerPreference",
            Command::Refresh => "refresh",
        }
    }

    pub(crate) fn is_switch(&self) -> bool {
        matches!(
            self,
            Command::SwitchBackend { .. } | Command::ReloadPreference { .. }
        )
    }

    /// Background work: no transition marker, no busy flag
    pub(crate) fn is_background(&self) -> bool {
        matches!(self, Command::Refresh)
    }

    /// Whether `newer`, arriving right behind `self`, replaces it
    fn coalesces_with(&self, newer: &Command) -> bool {
        matches!(
            (self, newer),
            (Command::SkipNext, Command::SkipNext)
                | (Command::SkipPrevious, Command::SkipPrevious)
                | (Command::SetVolume(_), Command::SetVolume(_))
                | (Command::Refresh, Command::Refresh)
        )
    }
}

pub(crate) type Reply = oneshot::Sender<Result<PlaybackStatus>>;

/// A command plus everyone waiting on its result
pub(crate) struct Envelope {
    pub(crate) command: Command,
    pub(crate) replies: Vec<Reply>,
}

impl Envelope {
    pub(crate) fn new(command: Command, reply: Reply) -> Self {
        Self {
            command,
            replies: vec![reply],
        }
    }

    /// Fire-and-forget command
    pub(crate) fn detached(command: Command) -> Self {
        Self {
            command,
            replies: Vec::new(),
        }
    }
}

/// Hand one result to every waiting caller
pub(crate) fn deliver(replies: Vec<Reply>, result: Result<PlaybackStatus>) {
    for reply in replies {
        // Caller gave up waiting
        let _ = reply.send(result.clone());
    }
}

/// Pending commands in arrival order
#[derive(Default)]
pub(crate) struct Mailbox {
    pending: VecDeque<Envelope>,
}

impl Mailbox {
    pub(crate) fn push(&mut self, envelope: Envelope) {
        if let Some(last) = self.pending.back_mut() {
            if last.command.coalesces_with(&envelope.command) {
                debug!(command = envelope.command.name(), "Coalescing with pending command");
                last.command = envelope.command;
                last.replies.extend(envelope.replies);
                return;
            }
        }
        self.pending.push_back(envelope);
    }

    pub(crate) fn pop(&mut self) -> Option<Envelope> {
        self.pending.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pending.len()
    }
}
