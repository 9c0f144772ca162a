//! Loopback VLC web interface
//!
//! Answers `GET /requests/status.json` with a status document, applying the
//! `command` query parameter first. Requests without the expected basic-auth
//! header get 401. Inputs containing "reject" never start playing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// `Basic base64(":secret")`
pub const SECRET_AUTH: &str = "Basic OnNlY3JldA==";

#[derive(Debug)]
struct Player {
    state: &'static str,
    time: u64,
    volume: u32,
    input: Option<String>,
}

pub struct FakeVlc {
    pub addr: SocketAddr,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FakeVlc {
    /// Server expecting password "secret"
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let queries = Arc::new(Mutex::new(Vec::new()));
        let player = Arc::new(Mutex::new(Player {
            state: "stopped",
            time: 0,
            volume: 256,
            input: None,
        }));

        let log = Arc::clone(&queries);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&log), Arc::clone(&player)));
            }
        });

        Self { addr, queries }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Raw query strings of authenticated requests, in arrival order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

async fn serve(mut stream: TcpStream, log: Arc<Mutex<Vec<String>>>, player: Arc<Mutex<Player>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let mut lines = head.lines();
    let target = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let authorized = lines.any(|l| {
        l.split_once(':')
            .is_some_and(|(k, v)| k.eq_ignore_ascii_case("authorization") && v.trim() == SECRET_AUTH)
    });

    let (status_line, body) = if !authorized {
        ("401 Unauthorized", String::new())
    } else if !target.starts_with("/requests/status.json") {
        ("404 Not Found", String::new())
    } else {
        let query = target.split_once('?').map(|(_, q)| q.to_string()).unwrap_or_default();
        log.lock().unwrap().push(query.clone());
        ("200 OK", apply(&query, &player))
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn apply(query: &str, player: &Mutex<Player>) -> String {
    let mut player = player.lock().unwrap();

    match param(query, "command") {
        Some("in_play") => {
            let input = param(query, "input").unwrap_or_default().to_string();
            player.state = if input.contains("reject") { "stopped" } else { "playing" };
            player.time = 0;
            player.input = Some(input);
        }
        Some("pl_forcepause") if player.state == "playing" => player.state = "paused",
        Some("pl_forceresume") if player.state == "paused" => player.state = "playing",
        Some("pl_stop") => player.state = "stopped",
        Some("seek") => player.time = param(query, "val").and_then(|v| v.parse().ok()).unwrap_or(0),
        Some("volume") => {
            player.volume = param(query, "val").and_then(|v| v.parse().ok()).unwrap_or(0)
        }
        _ => {}
    }

    let filename = player
        .input
        .as_deref()
        .and_then(|i| i.rsplit("%2F").next())
        .unwrap_or("");
    format!(
        r#"{{"state":"{}","time":{},"length":200,"volume":{},"information":{{"category":{{"meta":{{"filename":"{}"}}}}}}}}"#,
        player.state, player.time, player.volume, filename
    )
}
