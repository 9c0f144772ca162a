//! Loopback MPD server
//!
//! Implements just enough of the line protocol for the adapter: greeting,
//! password, command lists, playback commands, status and currentsong.
//! Any `add` of a path containing "missing" is refused with an ACK.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct FakeMpdOptions {
    pub greeting: String,
    pub password: Option<String>,
    /// Close the connection after this many commands
    pub hang_up_after: Option<usize>,
    /// Hold back the reply to this exact command line
    pub slow_reply: Option<(String, Duration)>,
}

impl Default for FakeMpdOptions {
    fn default() -> Self {
        Self {
            greeting: "OK MPD 0.23.5".to_string(),
            password: None,
            hang_up_after: None,
            slow_reply: None,
        }
    }
}

#[derive(Debug, Default)]
struct Player {
    state: &'static str,
    file: Option<String>,
    pending: Option<String>,
    elapsed: f64,
    volume: u32,
}

pub struct FakeMpd {
    pub addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<usize>>,
}

impl FakeMpd {
    pub async fn spawn() -> Self {
        Self::spawn_with(FakeMpdOptions::default()).await
    }

    pub async fn spawn_with(options: FakeMpdOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(0));
        let player = Arc::new(Mutex::new(Player {
            state: "stop",
            volume: 50,
            ..Default::default()
        }));

        let (log, count) = (Arc::clone(&commands), Arc::clone(&connections));
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                *count.lock().unwrap() += 1;
                tokio::spawn(serve(
                    stream,
                    options.clone(),
                    Arc::clone(&log),
                    Arc::clone(&player),
                ));
            }
        });

        Self {
            addr,
            commands,
            connections,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every command line received, across connections
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        *self.connections.lock().unwrap()
    }
}

async fn serve(
    stream: TcpStream,
    options: FakeMpdOptions,
    log: Arc<Mutex<Vec<String>>>,
    player: Arc<Mutex<Player>>,
) {
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    if writer
        .write_all(format!("{}\n", options.greeting).as_bytes())
        .await
        .is_err()
    {
        return;
    }

    let mut handled = 0;
    let mut list: Option<Vec<String>> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        log.lock().unwrap().push(line.clone());
        handled += 1;
        if options.hang_up_after.is_some_and(|limit| handled > limit) {
            return;
        }

        if line == "command_list_begin" {
            list = Some(Vec::new());
            continue;
        }

        let delay = options
            .slow_reply
            .as_ref()
            .filter(|(command, _)| *command == line)
            .map(|(_, delay)| *delay);

        let reply = if let Some(pending) = list.as_mut() {
            if line != "command_list_end" {
                pending.push(line);
                continue;
            }
            let commands = list.take().unwrap_or_default();
            let mut reply = "OK\n".to_string();
            for (index, command) in commands.iter().enumerate() {
                if let Err(ack) = execute(command, &options, &player) {
                    reply = format!("ACK [50@{}] {}\n", index, ack);
                    break;
                }
            }
            reply
        } else {
            match execute(&line, &options, &player) {
                Ok(body) => format!("{}OK\n", body),
                Err(ack) => format!("ACK [5@0] {}\n", ack),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if writer.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Apply one command; `Ok` carries the reply body
fn execute(command: &str, options: &FakeMpdOptions, player: &Mutex<Player>) -> Result<String, String> {
    let mut player = player.lock().unwrap();
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    let arg = arg.trim_matches('"');

    match name {
        "password" => match &options.password {
            Some(expected) if expected == arg => Ok(String::new()),
            _ => Err("{password} incorrect password".to_string()),
        },
        "clear" => {
            player.state = "stop";
            player.file = None;
            player.pending = None;
            Ok(String::new())
        }
        "add" if arg.contains("missing") => Err("{add} No such directory".to_string()),
        "add" => {
            player.pending = Some(arg.to_string());
            Ok(String::new())
        }
        "play" => match player.pending.take().or_else(|| player.file.clone()) {
            Some(file) => {
                player.file = Some(file);
                player.state = "play";
                player.elapsed = 0.0;
                Ok(String::new())
            }
            None => Err("{play} Bad song index".to_string()),
        },
        "pause" => {
            if player.state != "stop" {
                player.state = if arg == "1" { "pause" } else { "play" };
            }
            Ok(String::new())
        }
        "stop" => {
            player.state = "stop";
            Ok(String::new())
        }
        "seekcur" => {
            if player.state == "stop" {
                return Err("{seekcur} Not playing".to_string());
            }
            player.elapsed = arg.parse().map_err(|_| "{seekcur} bad position".to_string())?;
            Ok(String::new())
        }
        "setvol" => {
            player.volume = arg.parse().map_err(|_| "{setvol} bad volume".to_string())?;
            Ok(String::new())
        }
        "status" => Ok(format!(
            "volume: {}\nstate: {}\nelapsed: {:.3}\nduration: 200.000\n",
            player.volume, player.state, player.elapsed
        )),
        "currentsong" => Ok(player
            .file
            .as_ref()
            .map(|f| format!("file: {}\nTitle: Fake\n", f))
            .unwrap_or_default()),
        _ => Err(format!("{{{}}} unknown command", name)),
    }
}
