//! Minimal stand-in for the inference server's `/completion` endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) struct MockResponse {
    status: u16,
    chunks: Vec<String>,
    delay: Duration,
}

impl MockResponse {
    pub(crate) fn ok<S: Into<String>>(chunks: Vec<S>) -> Self {
        Self {
            status: 200,
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            chunks: vec![body.to_string()],
            delay: Duration::ZERO,
        }
    }

    /// Pause before each chunk
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub(crate) struct MockServer {
    pub(crate) port: u16,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockServer {
    /// Serve every connection with `respond(request_index)`
    pub(crate) async fn start<F>(respond: F) -> Self
    where
        F: Fn(usize) -> MockResponse + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            let mut index = 0;
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = read_request_body(&mut socket).await;
                recorded
                    .lock()
                    .unwrap()
                    .push(serde_json::from_slice(&body).unwrap_or(Value::Null));

                let response = respond(index);
                index += 1;
                write_response(&mut socket, response).await;
            }
        });

        Self { port, requests }
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// A local port with nothing listening on it
pub(crate) async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn read_request_body(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if let Some(header_end) = find_header_end(&buf) {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = header_end + 4;
            if buf.len() >= body_start + content_length {
                return buf[body_start..body_start + content_length].to_vec();
            }
        }

        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return Vec::new(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn write_response(socket: &mut TcpStream, response: MockResponse) {
    let reason = match response.status {
        200 => "OK",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
        response.status, reason
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }

    for chunk in response.chunks {
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        if socket.write_all(chunk.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
    }
    let _ = socket.shutdown().await;
}
