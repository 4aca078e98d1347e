//! Minimal HTTP/1.1 stub of the mod.io API for integration tests.
//!
//! Serves the JSON routes the pipeline hits for one well-known game/mod
//! pair plus a binary download route. The first `fail_downloads` binary
//! GETs answer 500 so retry behavior can be exercised, and every binary
//! GET increments a counter the tests can inspect.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

pub const MOD_ID: u64 = 77;
pub const LATEST_FILE_ID: u64 = 102;
pub const LATEST_FILENAME: &str = "pack.zip";
pub const DEFAULT_PAYLOAD: &[u8] = b"mod archive payload bytes";

pub struct StubOptions {
    /// Bytes served for every binary download.
    pub payload: Vec<u8>,
    /// The first N binary GETs answer 500.
    pub fail_downloads: u32,
    /// When false, every game listing comes back empty.
    pub game_known: bool,
    /// Pause before answering a binary GET, to keep a download in flight
    /// while a test flips state.
    pub download_delay: std::time::Duration,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            payload: DEFAULT_PAYLOAD.to_vec(),
            fail_downloads: 0,
            game_known: true,
            download_delay: std::time::Duration::ZERO,
        }
    }
}

pub struct StubApi {
    pub base_url: String,
    download_hits: Arc<AtomicU32>,
}

impl StubApi {
    /// Number of binary download GETs received so far (including failed ones).
    pub fn download_hits(&self) -> u32 {
        self.download_hits.load(Ordering::SeqCst)
    }
}

struct ServerState {
    base_url: String,
    payload: Vec<u8>,
    game_known: bool,
    download_delay: std::time::Duration,
    download_hits: Arc<AtomicU32>,
    fails_remaining: AtomicU32,
}

/// Starts the stub in a background thread. The server runs until the
/// process exits.
pub fn start(opts: StubOptions) -> StubApi {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{port}");
    let download_hits = Arc::new(AtomicU32::new(0));

    let state = Arc::new(ServerState {
        base_url: base_url.clone(),
        payload: opts.payload,
        game_known: opts.game_known,
        download_delay: opts.download_delay,
        download_hits: Arc::clone(&download_hits),
        fails_remaining: AtomicU32::new(opts.fail_downloads),
    });
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&state);
            thread::spawn(move || handle(stream, &state));
        }
    });

    StubApi {
        base_url,
        download_hits,
    }
}

fn handle(mut stream: TcpStream, state: &ServerState) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let path = match request_path(request) {
        Some(p) => p,
        None => return,
    };

    if path.starts_with("/download/") {
        state.download_hits.fetch_add(1, Ordering::SeqCst);
        if !state.download_delay.is_zero() {
            thread::sleep(state.download_delay);
        }
        let must_fail = state
            .fails_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if must_fail {
            write_status(&mut stream, "500 Internal Server Error");
        } else {
            write_bytes(&mut stream, &state.payload);
        }
        return;
    }

    let size = state.payload.len();
    let base = &state.base_url;
    let body = match path.as_str() {
        "/games" => {
            if state.game_known {
                r#"{"data":[{"id":4,"name_id":"testgame","name":"Test Game"}]}"#.to_string()
            } else {
                r#"{"data":[]}"#.to_string()
            }
        }
        "/games/4/mods" => {
            r#"{"data":[{"id":77,"game_id":4,"name_id":"cool-mod","name":"Cool Mod"}]}"#.to_string()
        }
        "/games/4/mods/77" => {
            r#"{"id":77,"game_id":4,"name_id":"cool-mod","name":"Cool Mod"}"#.to_string()
        }
        "/games/4/mods/77/files" => format!(
            concat!(
                r#"{{"data":["#,
                r#"{{"id":101,"date_added":100,"filename":"pack-old.zip","version":"1.0","#,
                r#""filesize":{size},"download":{{"binary_url":"{base}/download/101","filesize":{size}}}}},"#,
                r#"{{"id":102,"date_added":200,"filename":"pack.zip","version":"1.1","#,
                r#""filesize":{size},"download":{{"binary_url":"{base}/download/102","filesize":{size}}}}}"#,
                r#"]}}"#
            ),
            size = size,
            base = base
        ),
        _ => {
            write_status(&mut stream, "404 Not Found");
            return;
        }
    };
    write_json(&mut stream, &body);
}

/// Path component of the request line, query string stripped.
fn request_path(request: &str) -> Option<String> {
    let line = request.lines().next()?;
    let target = line.split_whitespace().nth(1)?;
    let path = target.split('?').next().unwrap_or(target);
    Some(path.to_string())
}

fn write_json(stream: &mut TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn write_bytes(stream: &mut TcpStream, body: &[u8]) {
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}

fn write_status(stream: &mut TcpStream, status: &str) {
    let _ = stream.write_all(format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\n\r\n").as_bytes());
}
