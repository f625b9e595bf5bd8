//! Job Stream Client: submits a query, then relays the job's event channel.
//!
//! ## Lifecycle
//! 1. [`JobStreamClient::submit`] POSTs `/ask` and returns the backend job id.
//! 2. [`JobStreamClient::attach`] spawns one reader task on `/stream/{job_id}`
//!    and returns a [`JobStream`] handle.
//! 3. The reader decodes SSE frames and forwards them in arrival order over an
//!    unbounded channel. A terminal status, a backend error frame or a
//!    transport failure ends the task after exactly one closing update.
//! 4. [`JobStream::detach`] aborts the reader; the handle yields nothing
//!    afterwards.
//!
//! Nothing here retries or reconnects.

use std::fmt;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ResearchError;
use crate::events::{AskRequest, AskResponse, JobEvent, JobStatus, StatusResponse, StreamFrame};
use crate::sse::SseDecoder;

/// Backend-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One update relayed from the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// A full snapshot of the job.
    Event(JobEvent),
    /// The job finished. Delivered exactly once, always last.
    Terminal {
        status: JobStatus,
        message: Option<String>,
    },
    /// The channel failed before a terminal status. Delivered at most once,
    /// always last.
    TransportError(String),
}

impl StreamUpdate {
    fn is_closing(&self) -> bool {
        matches!(
            self,
            StreamUpdate::Terminal { .. } | StreamUpdate::TransportError(_)
        )
    }
}

// ---------------------------------------------------------------------------
// JobStreamClient
// ---------------------------------------------------------------------------

/// HTTP client for the research backend.
#[derive(Debug, Clone)]
pub struct JobStreamClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl JobStreamClient {
    pub fn new(config: ClientConfig) -> Result<Self, ResearchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ResearchError::Config(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a backend job for `query`.
    ///
    /// # Returns
    /// - `Ok(JobId)` on a 2xx reply carrying a non-empty `job_id`.
    /// - `Err(ResearchError::Submission)` on connection failure, non-2xx
    ///   status, unparseable body or missing id.
    pub async fn submit(&self, query: &str) -> Result<JobId, ResearchError> {
        let url = self.config.endpoint("/ask");
        info!(%url, "submitting research job");

        let resp = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(&AskRequest { query })
            .send()
            .await
            .map_err(|e| ResearchError::Submission(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ResearchError::Submission(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                body.trim()
            )));
        }

        let reply: AskResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::Submission(format!("invalid /ask reply: {e}")))?;

        match reply.job_id {
            Some(id) if !id.trim().is_empty() => {
                info!(job_id = %id, "job created");
                Ok(JobId(id))
            }
            _ => Err(ResearchError::Submission(
                "backend reply did not contain a job_id".to_string(),
            )),
        }
    }

    /// One-shot lookup of the job's current state via `/status/{job_id}`.
    pub async fn fetch_status(&self, job_id: &JobId) -> Result<StatusResponse, ResearchError> {
        let url = self.config.endpoint(&format!("/status/{}", job_id));
        let status_err = |detail: String| ResearchError::Status {
            job_id: job_id.to_string(),
            detail,
        };

        let resp = self
            .http
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| status_err(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(status_err(format!("HTTP {}", resp.status().as_u16())));
        }
        resp.json().await.map_err(|e| status_err(e.to_string()))
    }

    /// Open the event channel for `job_id`. Must be called inside a tokio
    /// runtime.
    pub fn attach(&self, job_id: &JobId) -> JobStream {
        let url = self.config.endpoint(&format!("/stream/{}", job_id));
        let http = self.http.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = job_id.clone();

        let task = tokio::spawn(async move {
            debug!(%url, "opening event stream");
            let resp = match http
                .get(&url)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(job_id = %id, error = %e, "event stream connect failed");
                    let _ = tx.send(StreamUpdate::TransportError(e.to_string()));
                    return;
                }
            };

            if !resp.status().is_success() {
                let detail = format!("HTTP {} from {}", resp.status().as_u16(), url);
                warn!(job_id = %id, %detail, "event stream rejected");
                let _ = tx.send(StreamUpdate::TransportError(detail));
                return;
            }

            relay_frames(&id, resp.bytes_stream(), &tx).await;
        });

        JobStream::new(job_id.clone(), rx, task)
    }
}

// ---------------------------------------------------------------------------
// JobStream
// ---------------------------------------------------------------------------

/// Handle to one open event channel.
#[derive(Debug)]
pub struct JobStream {
    job_id: JobId,
    rx: mpsc::UnboundedReceiver<StreamUpdate>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl JobStream {
    fn new(job_id: JobId, rx: mpsc::UnboundedReceiver<StreamUpdate>, task: JoinHandle<()>) -> Self {
        Self {
            job_id,
            rx,
            task: Some(task),
            closed: false,
        }
    }

    /// Relay an arbitrary SSE byte stream, e.g. one that did not come from
    /// reqwest. Must be called inside a tokio runtime.
    pub fn from_byte_stream<S, B, E>(job_id: JobId, stream: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = job_id.clone();
        let task = tokio::spawn(async move {
            relay_frames(&id, stream, &tx).await;
        });
        Self::new(job_id, rx, task)
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next update. Returns `None` once the stream is closed,
    /// whether by a closing update or by [`detach`](Self::detach).
    ///
    /// Cancel-safe: dropping the future loses no update.
    pub async fn next(&mut self) -> Option<StreamUpdate> {
        if self.closed {
            return None;
        }
        match self.rx.recv().await {
            Some(update) => {
                if update.is_closing() {
                    self.shutdown();
                }
                Some(update)
            }
            None => {
                self.shutdown();
                None
            }
        }
    }

    /// Caller-initiated cancellation. Idempotent.
    pub fn detach(&mut self) {
        if !self.closed {
            debug!(job_id = %self.job_id, "detaching event stream");
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.closed = true;
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for JobStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Frame relay
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Closed,
}

/// Decode `stream` and forward updates until a closing update is sent or the
/// receiver goes away.
async fn relay_frames<S, B, E>(job_id: &JobId, stream: S, tx: &mpsc::UnboundedSender<StreamUpdate>)
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    relay_with_decoder(job_id, stream, SseDecoder::new(), tx).await;
}

async fn relay_with_decoder<S, B, E>(
    job_id: &JobId,
    mut stream: S,
    mut decoder: SseDecoder,
    tx: &mpsc::UnboundedSender<StreamUpdate>,
) where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
{

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(%job_id, error = %e, "event stream read failed");
                let _ = tx.send(StreamUpdate::TransportError(e.to_string()));
                return;
            }
        };
        let payloads = match decoder.push(chunk.as_ref()) {
            Ok(payloads) => payloads,
            Err(e) => {
                warn!(%job_id, error = %e, "event stream frame rejected");
                let _ = tx.send(StreamUpdate::TransportError(e.to_string()));
                return;
            }
        };
        for payload in payloads {
            if dispatch(job_id, &payload, tx) == Flow::Closed {
                return;
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        if dispatch(job_id, &payload, tx) == Flow::Closed {
            return;
        }
    }

    warn!(%job_id, "event stream ended before the job finished");
    let _ = tx.send(StreamUpdate::TransportError(
        "event stream ended before the job finished".to_string(),
    ));
}

fn dispatch(job_id: &JobId, payload: &str, tx: &mpsc::UnboundedSender<StreamUpdate>) -> Flow {
    let frame = match StreamFrame::decode(payload) {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            debug!(%job_id, "ignoring control frame");
            return Flow::Continue;
        }
        Err(e) => {
            warn!(%job_id, error = %e, "skipping malformed frame");
            return Flow::Continue;
        }
    };

    let updates = match frame {
        StreamFrame::Snapshot(event) => {
            debug!(%job_id, status = %event.status, "snapshot");
            if event.status.is_terminal() {
                let terminal = StreamUpdate::Terminal {
                    status: event.status.clone(),
                    message: event.error.clone(),
                };
                vec![StreamUpdate::Event(event), terminal]
            } else {
                vec![StreamUpdate::Event(event)]
            }
        }
        StreamFrame::Completed => vec![StreamUpdate::Terminal {
            status: JobStatus::Completed,
            message: None,
        }],
        StreamFrame::Error(message) => vec![StreamUpdate::Terminal {
            status: JobStatus::Failed,
            message: Some(message),
        }],
    };

    for update in updates {
        let closing = update.is_closing();
        if let StreamUpdate::Terminal { status, .. } = &update {
            info!(%job_id, %status, "job reached terminal status");
        }
        if tx.send(update).is_err() {
            return Flow::Closed;
        }
        if closing {
            return Flow::Closed;
        }
    }
    Flow::Continue
}
