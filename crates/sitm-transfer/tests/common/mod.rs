//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sitm_transfer::http::{HttpClient, HttpClientConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the fake server
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Canned reply
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

/// Serve canned HTTP/1.1 replies on a random local port.
///
/// Returns the base URL (`http://127.0.0.1:<port>`) and the log of received
/// requests. Every connection is closed after one exchange.
pub async fn spawn_server<F>(handler: F) -> (String, Arc<Mutex<Vec<Request>>>)
where
    F: Fn(&Request) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let log = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let handler = Arc::clone(&handler);
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                handle(stream, handler.as_ref(), &log).await;
            });
        }
    });

    (format!("http://{}", addr), requests)
}

async fn handle<F>(mut stream: TcpStream, handler: &F, log: &Mutex<Vec<Request>>)
where
    F: Fn(&Request) -> Reply,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request = Request {
        method,
        path,
        body: buf[header_end..].to_vec(),
    };
    let reply = handler(&request);
    log.lock().unwrap().push(request);

    let head = format!(
        concat!(
            "HTTP/1.1 {} Canned\r\n",
            "Content-Length: {}\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Connection: close\r\n\r\n",
        ),
        reply.status,
        reply.body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(&reply.body).await;
    let _ = stream.shutdown().await;
}

/// Serve `chunks` as one 200 response body, pausing `pause` before each chunk.
///
/// The request is read up to the end of its headers and then ignored.
pub async fn spawn_trickle_server(chunks: Vec<Vec<u8>>, pause: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let chunks = Arc::new(chunks);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let chunks = Arc::clone(&chunks);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                while find(&buf, b"\r\n\r\n").is_none() {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let total: usize = chunks.iter().map(Vec::len).sum();
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    total
                );
                if stream.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for piece in chunks.iter() {
                    tokio::time::sleep(pause).await;
                    if stream.write_all(piece).await.is_err() || stream.flush().await.is_err() {
                        return;
                    }
                }
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// HTTP client that never goes through a proxy from the environment
pub fn local_client() -> Arc<HttpClient> {
    Arc::new(HttpClient::with_config(HttpClientConfig::new().with_no_proxy()).unwrap())
}

/// Progress values collected by a closure sink
#[derive(Clone, Default)]
pub struct Recorder(pub Arc<Mutex<Vec<f64>>>);

impl Recorder {
    pub fn sink(&self) -> impl Fn(f64) + Send + Sync + 'static {
        let values = Arc::clone(&self.0);
        move |p| values.lock().unwrap().push(p)
    }

    pub fn values(&self) -> Vec<f64> {
        self.0.lock().unwrap().clone()
    }

    /// Non-decreasing, within [0, 100], ending at exactly 100
    pub fn assert_complete(&self) {
        let values = self.values();
        assert!(!values.is_empty(), "no progress reported");
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {:?}", values);
        assert!(values.iter().all(|p| (0.0..=100.0).contains(p)));
        assert_eq!(values.last().copied(), Some(100.0));
    }
}

/// Write `contents` at `root/relative`, creating parents
pub fn write_file(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}
