//! MPD daemon adapter
//!
//! Speaks MPD's line protocol over a persistent TCP session:
//! - server greets with `OK MPD <version>`
//! - each command is one line; the reply is `key: value` lines ending in
//!   `OK`, or a single `ACK [error@index] {command} message` line
//!
//! An I/O failure drops the session; the next `connect()` opens a new one.
//! So does an exchange abandoned before its reply was read, since the unread
//! reply would otherwise be taken as the answer to the next command.

use super::{BackendStatus, PlayerBackend};
use crate::config::MpdConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebox_common::events::{BackendKind, PlaybackState};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const GREETING_PREFIX: &str = "OK MPD ";

/// Reply lines of one successful command
type Reply = Vec<(String, String)>;

struct MpdSession {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Set while a command's reply is still outstanding
    mid_exchange: bool,
}

impl MpdSession {
    async fn open(address: &str, password: Option<&str>) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| Error::Connection(format!("MPD unreachable at {}: {}", address, e)))?;
        let (read_half, writer) = stream.into_split();
        let mut session = Self {
            reader: BufReader::new(read_half),
            writer,
            mid_exchange: false,
        };

        let greeting = session.read_line().await?;
        if !greeting.starts_with(GREETING_PREFIX) {
            return Err(Error::Connection(format!(
                "Unexpected MPD greeting: {:?}",
                greeting
            )));
        }
        debug!(greeting = %greeting, "MPD session opened");

        if let Some(password) = password {
            session
                .exchange(&format!("password {}", quote(password)))
                .await?
                .map_err(|ack| Error::Connection(format!("MPD rejected password: {}", ack)))?;
        }
        Ok(session)
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Connection(format!("MPD read failed: {}", e)))?;
        if read == 0 {
            return Err(Error::Connection("MPD closed the connection".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Send one command and collect its reply
    ///
    /// Outer error: transport failure. Inner error: the daemon's ACK text.
    async fn exchange(&mut self, command: &str) -> Result<std::result::Result<Reply, String>> {
        self.mid_exchange = true;
        self.writer
            .write_all(format!("{}\n", command).as_bytes())
            .await
            .map_err(|e| Error::Connection(format!("MPD write failed: {}", e)))?;

        let mut reply = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "OK" {
                self.mid_exchange = false;
                return Ok(Ok(reply));
            }
            if let Some(ack) = line.strip_prefix("ACK ") {
                self.mid_exchange = false;
                return Ok(Err(ack.to_string()));
            }
            match line.split_once(": ") {
                Some((key, value)) => reply.push((key.to_string(), value.to_string())),
                None => {
                    return Err(Error::Connection(format!(
                        "Malformed MPD reply line: {:?}",
                        line
                    )))
                }
            }
        }
    }
}

/// Adapter for the MPD daemon
pub struct MpdBackend {
    address: String,
    password: Option<String>,
    io_timeout: Duration,
    status_timeout: Duration,
    session: Mutex<Option<MpdSession>>,
}

impl MpdBackend {
    pub fn new(config: &MpdConfig, io_timeout: Duration, status_timeout: Duration) -> Self {
        Self {
            address: config.address(),
            password: config.password.clone(),
            io_timeout,
            status_timeout,
            session: Mutex::new(None),
        }
    }

    /// Run one command on the current session
    ///
    /// ACK replies become `Error::Playback`; transport failures and timeouts
    /// drop the session.
    async fn command(&self, command: &str, timeout: Duration) -> Result<Reply> {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(|session| session.mid_exchange) {
            warn!("Dropping MPD session left mid-exchange by a cancelled command");
            *guard = None;
        }
        let Some(session) = guard.as_mut() else {
            return Err(Error::Connection("MPD session not connected".to_string()));
        };

        debug!(command, "MPD command");
        let outcome = match tokio::time::timeout(timeout, session.exchange(command)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(format!(
                "MPD did not answer {:?} within {:?}",
                command, timeout
            ))),
        };

        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(ack)) => Err(Error::Playback(format!("MPD refused {:?}: {}", command, ack))),
            Err(e) => {
                warn!(error = %e, "Dropping MPD session");
                *guard = None;
                Err(e)
            }
        }
    }

    async fn simple(&self, command: &str) -> Result<()> {
        self.command(command, self.io_timeout).await.map(|_| ())
    }

    async fn read_status(&self) -> Result<BackendStatus> {
        let status = self.command("status", self.status_timeout).await?;
        let song = self.command("currentsong", self.status_timeout).await?;
        Ok(parse_status(&status, &song))
    }
}

#[async_trait]
impl PlayerBackend for MpdBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Daemon
    }

    async fn connect(&self) -> Result<()> {
        let opened = tokio::time::timeout(
            self.io_timeout,
            MpdSession::open(&self.address, self.password.as_deref()),
        )
        .await
        .map_err(|_| {
            Error::Connection(format!(
                "MPD at {} did not answer within {:?}",
                self.address, self.io_timeout
            ))
        })??;

        *self.session.lock().await = Some(opened);
        info!(address = %self.address, "Connected to MPD");
        Ok(())
    }

    async fn play(&self, track_path: &str) -> Result<()> {
        // One command list so a rejected add leaves nothing half-applied
        let list = format!(
            "command_list_begin\nclear\nadd {}\nplay\ncommand_list_end",
            quote(track_path)
        );
        self.command(&list, self.io_timeout).await.map(|_| ())
    }

    async fn pause(&self) -> Result<()> {
        self.simple("pause 1").await
    }

    async fn resume(&self) -> Result<()> {
        self.simple("pause 0").await
    }

    async fn stop(&self) -> Result<()> {
        self.simple("stop").await
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        self.simple(&format!("seekcur {:.3}", seconds.max(0.0))).await
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.simple(&format!("setvol {}", mpd_volume(volume))).await
    }

    async fn get_status(&self) -> BackendStatus {
        match self.read_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "MPD status poll failed");
                BackendStatus::degraded()
            }
        }
    }
}

/// Quote an argument per the MPD protocol
fn quote(arg: &str) -> String {
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Convert a 0.0..=1.0 volume to MPD's 0..=100 scale
fn mpd_volume(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn parse_status(status: &[(String, String)], song: &[(String, String)]) -> BackendStatus {
    let lookup = |pairs: &[(String, String)], key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    let state = match lookup(status, "state").as_deref() {
        Some("play") => PlaybackState::Playing,
        Some("pause") => PlaybackState::Paused,
        _ => PlaybackState::Stopped,
    };

    let mut position_seconds = lookup(status, "elapsed").and_then(|v| v.parse::<f64>().ok());
    let mut duration_seconds = lookup(status, "duration").and_then(|v| v.parse::<f64>().ok());

    // Older daemons only report "time: <elapsed>:<total>"
    if let Some((elapsed, total)) = lookup(status, "time").and_then(|t| {
        t.split_once(':')
            .map(|(e, d)| (e.parse::<f64>().ok(), d.parse::<f64>().ok()))
    }) {
        position_seconds = position_seconds.or(elapsed);
        duration_seconds = duration_seconds.or(total);
    }

    BackendStatus {
        state,
        position_seconds: position_seconds.unwrap_or(0.0),
        duration_seconds: duration_seconds.unwrap_or(0.0),
        track: lookup(song, "file"),
        degraded: false,
    }
}
