//! In-process fake research backend on a tokio `TcpListener`.
//!
//! Each connection serves exactly one request and is closed afterwards, so
//! the `/stream` body is delimited by connection close just like a backend
//! that dies mid-stream.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Reply to `POST /ask`.
#[derive(Debug, Clone)]
pub enum AskReply {
    Job(String),
    Status(u16, String),
}

/// Reply to `GET /stream/{job_id}`.
#[derive(Debug, Clone)]
pub enum StreamReply {
    /// Send each payload as one `data:` event, then close the connection.
    Frames(Vec<String>),
    /// Send each payload, then keep the connection open.
    FramesThenHang(Vec<String>),
    Status(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

pub type RequestLog = Arc<Mutex<Vec<Recorded>>>;

#[derive(Debug, Clone)]
pub struct FakeBackend {
    pub ask: AskReply,
    pub stream: StreamReply,
    pub status_body: Option<String>,
    pub frame_delay: Duration,
}

impl FakeBackend {
    pub fn new(ask: AskReply, stream: StreamReply) -> Self {
        Self {
            ask,
            stream,
            status_body: None,
            frame_delay: Duration::from_millis(5),
        }
    }

    pub fn with_status_body(mut self, body: impl Into<String>) -> Self {
        self.status_body = Some(body.into());
        self
    }

    /// Bind to an ephemeral port and serve forever. Returns the base URL and
    /// the request log.
    pub async fn spawn(self) -> (String, RequestLog) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let server_log = Arc::clone(&log);
        let backend = Arc::new(self);

        tokio::spawn(async move {
            loop {
                let Ok((conn, _)) = listener.accept().await else {
                    return;
                };
                let backend = Arc::clone(&backend);
                let log = Arc::clone(&server_log);
                tokio::spawn(async move {
                    let _ = backend.handle(conn, log).await;
                });
            }
        });

        (format!("http://{}", addr), log)
    }

    async fn handle(
        &self,
        mut conn: TcpStream,
        log: RequestLog,
    ) -> std::io::Result<()> {
        let Some(request) = read_request(&mut conn).await? else {
            return Ok(());
        };
        log.lock().unwrap().push(request.clone());

        match (request.method.as_str(), request.path.as_str()) {
            ("POST", "/ask") => match &self.ask {
                AskReply::Job(id) => {
                    let body = serde_json::json!({ "job_id": id }).to_string();
                    write_response(&mut conn, 200, "application/json", &body).await
                }
                AskReply::Status(code, body) => {
                    write_response(&mut conn, *code, "application/json", body).await
                }
            },
            ("GET", path) if path.starts_with("/stream/") => self.serve_stream(&mut conn).await,
            ("GET", path) if path.starts_with("/status/") => match &self.status_body {
                Some(body) => write_response(&mut conn, 200, "application/json", body).await,
                None => {
                    write_response(&mut conn, 404, "application/json", r#"{"detail":"No job found"}"#)
                        .await
                }
            },
            _ => write_response(&mut conn, 404, "text/plain", "not found").await,
        }
    }

    async fn serve_stream(&self, conn: &mut TcpStream) -> std::io::Result<()> {
        let (frames, hang) = match &self.stream {
            StreamReply::Status(code) => {
                return write_response(conn, *code, "text/plain", "stream unavailable").await;
            }
            StreamReply::Frames(frames) => (frames, false),
            StreamReply::FramesThenHang(frames) => (frames, true),
        };

        let headers = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
        conn.write_all(headers.as_bytes()).await?;
        conn.flush().await?;

        for frame in frames {
            tokio::time::sleep(self.frame_delay).await;
            conn.write_all(format!("data: {}\n\n", frame).as_bytes()).await?;
            conn.flush().await?;
        }

        if hang {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        conn.shutdown().await
    }
}

async fn read_request(conn: &mut TcpStream) -> std::io::Result<Option<Recorded>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let (method, path, header_len, content_length) = loop {
        let n = conn.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(&buf) {
            Ok(httparse::Status::Complete(len)) => {
                let content_length = req
                    .headers
                    .iter()
                    .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                    .and_then(|h| std::str::from_utf8(h.value).ok())
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break (
                    req.method.unwrap_or("").to_string(),
                    req.path.unwrap_or("").to_string(),
                    len,
                    content_length,
                );
            }
            Ok(httparse::Status::Partial) => continue,
            Err(_) => return Ok(None),
        }
    };

    while buf.len() < header_len + content_length {
        let n = conn.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_len + content_length);
    let body = String::from_utf8_lossy(&buf[header_len..end]).into_owned();

    Ok(Some(Recorded { method, path, body }))
}

async fn write_response(
    conn: &mut TcpStream,
    code: u16,
    content_type: &str,
    body: &str,
) -> std::io::Result<()> {
    let reason = match code {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        reason,
        content_type,
        body.len(),
        body
    );
    conn.write_all(response.as_bytes()).await?;
    conn.shutdown().await
}

/// Serialize a snapshot frame.
pub fn frame(value: serde_json::Value) -> String {
    value.to_string()
}
