//! Test utilities and fixtures for flacfetch tests.
//!
//! Provides descriptor factories and small filesystem helpers to reduce
//! boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use flacfetch::test_utils::{track, batch};
//!
//! let ctx = batch(dir.path(), vec![track("1", "Song")]);
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::model::{BatchContext, GroupingMode, LayoutOptions, TrackDescriptor};

/// Creates a descriptor with a fixed artist, album and ISRC.
pub fn track(id: &str, title: &str) -> TrackDescriptor {
    TrackDescriptor {
        id: id.to_string(),
        url: format!("https://open.spotify.com/track/{}", id),
        title: title.to_string(),
        artists: vec!["Test Artist".to_string()],
        album: "Test Album".to_string(),
        album_artist: "Test Artist".to_string(),
        isrc: format!("USTEST{:0>6}", id),
        release_date: "2020-01-01".to_string(),
        ..Default::default()
    }
}

/// Creates a single-mode batch rooted at `dir`.
pub fn batch(dir: &Path, tracks: Vec<TrackDescriptor>) -> BatchContext {
    BatchContext {
        tracks,
        output_dir: dir.to_path_buf(),
        mode: GroupingMode::Single,
        collection_name: String::new(),
        layout: LayoutOptions::default(),
    }
}

/// Writes a small non-empty file, creating parent directories.
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"fLaC-test").unwrap();
}

/// A canned HTTP response served by [`MockServer`].
#[derive(Debug, Clone)]
pub struct Route {
    /// Request target prefix (path plus optional query)
    pub prefix: String,
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    /// Send the body one byte at a time with this pause between bytes
    pub trickle: Option<std::time::Duration>,
}

impl Route {
    pub fn json(prefix: &str, status: u16, body: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            status,
            body: body.as_bytes().to_vec(),
            content_type: "application/json",
            trickle: None,
        }
    }

    pub fn bytes(prefix: &str, status: u16, body: Vec<u8>) -> Self {
        Self {
            prefix: prefix.to_string(),
            status,
            body,
            content_type: "application/octet-stream",
            trickle: None,
        }
    }

    /// Same response, but the body dribbles out byte by byte.
    pub fn trickled(mut self, pause: std::time::Duration) -> Self {
        self.trickle = Some(pause);
        self
    }
}

/// Minimal loopback HTTP/1.1 server for client tests.
///
/// Routes are matched by prefix in declaration order; unmatched requests
/// get a 404. Every request head is recorded.
pub struct MockServer {
    addr: std::net::SocketAddr,
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(Mutex::new(routes));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let table = routes.clone();
        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_connection(socket, table.clone(), log.clone()));
            }
        });

        Self {
            addr,
            routes,
            requests,
        }
    }

    /// Register another route; useful when a body must embed [`url`](Self::url).
    pub fn add(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }

    /// Absolute URL for a path on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Recorded request heads, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve_connection(
    mut socket: tokio::net::TcpStream,
    routes: Arc<Mutex<Vec<Route>>>,
    log: Arc<Mutex<Vec<String>>>,
) {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&head).to_string();
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    log.lock().unwrap().push(head);

    let route = routes
        .lock()
        .unwrap()
        .iter()
        .find(|r| target.starts_with(&r.prefix))
        .cloned();
    let (status, body, content_type, trickle) = match route {
        Some(r) => (r.status, r.body, r.content_type, r.trickle),
        None => (404, b"not found".to_vec(), "text/plain", None),
    };

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        content_type,
        body.len()
    );

    let _ = socket.write_all(header.as_bytes()).await;
    match trickle {
        Some(pause) => {
            for byte in &body {
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
                if socket.write_all(&[*byte]).await.is_err() {
                    return;
                }
            }
        }
        None => {
            let _ = socket.write_all(&body).await;
        }
    }
    let _ = socket.shutdown().await;
}
