//! Research session: wires the job-stream client to the transcript store.
//!
//! The session owns the only open [`JobStream`], the turn it is loading and
//! the transient error banner. Skins drive it from a single task:
//!
//! ```rust,ignore
//! let turn = session.ask("What is X?").await?;
//! while let Some(progress) = session.next_update().await {
//!     render(session.store());
//! }
//! ```

use tracing::{info, warn};

use crate::client::{JobId, JobStream, JobStreamClient, StreamUpdate};
use crate::error::ResearchError;
use crate::events::{JobStatus, StatusResponse};
use crate::transcript::{ChatTurn, TranscriptStore, TurnId, JOB_FAILED_MESSAGE};

/// What [`ResearchSession::next_update`] just applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// A snapshot was folded into the turn.
    Event(TurnId),
    /// The job finished with this status; the stream is closed.
    Finished(TurnId, JobStatus),
    /// The connection dropped; the stream is closed and the banner is set.
    ConnectionLost(TurnId),
}

struct ActiveJob {
    turn_id: TurnId,
    stream: JobStream,
}

pub struct ResearchSession {
    client: JobStreamClient,
    store: TranscriptStore,
    active: Option<ActiveJob>,
    /// Turn of the job being loaded, from `ask` until the job finishes, the
    /// connection drops or the user stops it.
    loading_turn: Option<TurnId>,
    banner: Option<String>,
}

impl ResearchSession {
    pub fn new(client: JobStreamClient) -> Self {
        Self {
            client,
            store: TranscriptStore::new(),
            active: None,
            loading_turn: None,
            banner: None,
        }
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// Mutable access for view-state toggles.
    pub fn store_mut(&mut self) -> &mut TranscriptStore {
        &mut self.store
    }

    pub fn is_loading(&self) -> bool {
        self.loading_turn.is_some()
    }

    /// The turn still waiting on the backend, if any. A turn whose stream
    /// was lost stays non-terminal but is no longer loading.
    pub fn loading_turn(&self) -> Option<TurnId> {
        self.loading_turn
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn active_job(&self) -> Option<&JobId> {
        self.active.as_ref().map(|job| job.stream.job_id())
    }

    /// Start a research job for `query`.
    ///
    /// Only precondition failures (`EmptyQuery`, `Busy`) are returned as
    /// errors. A failed submission still yields the turn id: that turn is
    /// marked FAILED and the banner is set.
    pub async fn ask(&mut self, query: &str) -> Result<TurnId, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::EmptyQuery);
        }
        if self.loading_turn.is_some() || self.active.is_some() {
            return Err(ResearchError::Busy);
        }

        self.store.append_user_turn(query);
        let turn_id = self.store.append_pending_assistant_turn();
        self.loading_turn = Some(turn_id);
        self.banner = None;

        match self.client.submit(query).await {
            Ok(job_id) => {
                self.store.attach_job(turn_id, job_id.clone());
                let stream = self.client.attach(&job_id);
                self.active = Some(ActiveJob { turn_id, stream });
            }
            Err(e) => {
                warn!(%turn_id, error = %e, "submission failed");
                self.store.mark_failed(turn_id, e.to_string());
                self.banner = Some(e.banner_text());
                self.loading_turn = None;
            }
        }
        Ok(turn_id)
    }

    /// Wait for and apply the next stream update. `None` when no job is open.
    pub async fn next_update(&mut self) -> Option<Progress> {
        let active = self.active.as_mut()?;
        let turn_id = active.turn_id;
        let update = active.stream.next().await;

        match update {
            Some(StreamUpdate::Event(event)) => {
                self.store.apply_event(turn_id, event);
                Some(Progress::Event(turn_id))
            }
            Some(StreamUpdate::Terminal { status, message }) => {
                match status {
                    JobStatus::Completed => {
                        self.store.mark_completed(turn_id);
                    }
                    JobStatus::Failed => {
                        let message = message.unwrap_or_else(|| JOB_FAILED_MESSAGE.to_string());
                        self.store.mark_failed(turn_id, message);
                    }
                    JobStatus::Stopped => {
                        self.store.mark_stopped(turn_id);
                    }
                    _ => {}
                }
                info!(%turn_id, %status, "research job finished");
                self.finish_job();
                Some(Progress::Finished(turn_id, status))
            }
            Some(StreamUpdate::TransportError(detail)) => {
                let err = ResearchError::Transport(detail);
                warn!(%turn_id, error = %err, "event stream lost");
                self.banner = Some(err.banner_text());
                self.finish_job();
                Some(Progress::ConnectionLost(turn_id))
            }
            None => {
                self.finish_job();
                None
            }
        }
    }

    /// Pump updates until the open job (if any) closes.
    pub async fn run_to_end(&mut self) {
        while self.next_update().await.is_some() {}
    }

    /// User-initiated stop: closes the stream and marks the loading turn
    /// STOPPED. Returns the stopped turn, if there was one. A no-op while
    /// idle, so a turn whose connection dropped keeps its last status.
    pub fn stop(&mut self) -> Option<TurnId> {
        if let Some(mut job) = self.active.take() {
            job.stream.detach();
        }
        // An `ask` dropped mid-submit leaves a loading turn and no stream.
        let turn_id = self.loading_turn.take();
        if let Some(id) = turn_id {
            if self.store.mark_stopped(id) {
                info!(turn_id = %id, "research job stopped by user");
            }
        }
        turn_id
    }

    /// Poll `/status` for the most recent job.
    pub async fn current_job_status(&self) -> Result<Option<StatusResponse>, ResearchError> {
        let Some(job_id) = self.store.last_assistant().and_then(ChatTurn::job_id) else {
            return Ok(None);
        };
        self.client.fetch_status(job_id).await.map(Some)
    }

    fn finish_job(&mut self) {
        if let Some(mut job) = self.active.take() {
            job.stream.detach();
        }
        self.loading_turn = None;
    }
}
