//! Transcript Store: the ordered chat turns of one session and the reducer
//! that folds backend snapshots into them.
//!
//! Turns are append-only. Assistant turns are mutated in place until they
//! reach a terminal status, after which every mutator is a no-op.

use std::fmt;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::client::JobId;
use crate::events::{JobEvent, JobStatus, Source, ThinkingStep};

/// Fallback content for a turn the user stopped before an answer arrived.
pub const STOPPED_MESSAGE: &str = "Search was stopped.";

/// Error text used when the backend reports FAILED without a reason.
pub const JOB_FAILED_MESSAGE: &str = "The research job failed.";

/// Client-assigned turn identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TurnId(Uuid);

impl TurnId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Presentation-only flags. The reducer never touches these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TurnView {
    pub is_expanded: bool,
    pub is_sources_expanded: bool,
    pub is_thinking_expanded: bool,
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    id: TurnId,
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<JobStatus>,
    sub_queries: Vec<String>,
    sources: Vec<Source>,
    thinking_steps: Vec<ThinkingStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
    view: TurnView,
}

impl ChatTurn {
    fn new(role: Role, content: String, status: Option<JobStatus>) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content,
            status,
            sub_queries: Vec::new(),
            sources: Vec::new(),
            thinking_steps: Vec::new(),
            error: None,
            job_id: None,
            view: TurnView::default(),
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// `None` for user turns.
    pub fn status(&self) -> Option<&JobStatus> {
        self.status.as_ref()
    }

    pub fn sub_queries(&self) -> &[String] {
        &self.sub_queries
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn thinking_steps(&self) -> &[ThinkingStep] {
        &self.thinking_steps
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn view(&self) -> TurnView {
        self.view
    }

    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(JobStatus::is_terminal)
    }

    fn set_fallback_content(&mut self, text: String) {
        if self.content.is_empty() {
            self.content = text;
        }
    }
}

/// Ordered, append-only transcript.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TranscriptStore {
    turns: Vec<ChatTurn>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user_turn(&mut self, text: impl Into<String>) -> TurnId {
        let turn = ChatTurn::new(Role::User, text.into(), None);
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    /// Append an empty assistant turn in the PENDING state.
    pub fn append_pending_assistant_turn(&mut self) -> TurnId {
        let turn = ChatTurn::new(Role::Assistant, String::new(), Some(JobStatus::Pending));
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    /// Record the backend job driving `turn_id`.
    pub fn attach_job(&mut self, turn_id: TurnId, job_id: JobId) -> bool {
        match self.live_assistant_mut(turn_id) {
            Some(turn) => {
                turn.job_id = Some(job_id);
                true
            }
            None => false,
        }
    }

    /// Fold one snapshot into `turn_id`.
    ///
    /// Lists carried by the event replace the turn's lists, never merge into
    /// them; lists the event omits are left alone. A non-empty `final_answer`
    /// replaces the content, since the backend resends the whole answer as it
    /// grows. Returns `false` (and changes nothing) when the turn is unknown,
    /// is a user turn, or is already terminal.
    pub fn apply_event(&mut self, turn_id: TurnId, event: JobEvent) -> bool {
        let Some(turn) = self.live_assistant_mut(turn_id) else {
            debug!(%turn_id, status = %event.status, "event ignored");
            return false;
        };

        turn.status = Some(event.status);
        if let Some(sub_queries) = event.sub_queries {
            turn.sub_queries = sub_queries;
        }
        if let Some(sources) = event.sources {
            turn.sources = sources;
        }
        if let Some(steps) = event.thinking_steps {
            turn.thinking_steps = steps;
        }

        if let Some(answer) = event.final_answer.filter(|a| !a.is_empty()) {
            turn.content = answer;
        }

        match turn.status {
            Some(JobStatus::Failed) => {
                let message = event
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| JOB_FAILED_MESSAGE.to_string());
                turn.set_fallback_content(format!("Error: {message}"));
                turn.error = Some(message);
            }
            Some(JobStatus::Stopped) => {
                turn.set_fallback_content(STOPPED_MESSAGE.to_string());
            }
            _ => {}
        }
        true
    }

    /// User cancellation. Idempotent.
    pub fn mark_stopped(&mut self, turn_id: TurnId) -> bool {
        match self.live_assistant_mut(turn_id) {
            Some(turn) => {
                turn.status = Some(JobStatus::Stopped);
                turn.set_fallback_content(STOPPED_MESSAGE.to_string());
                true
            }
            None => false,
        }
    }

    /// Mark the turn FAILED. Existing content is kept.
    pub fn mark_failed(&mut self, turn_id: TurnId, message: impl Into<String>) -> bool {
        match self.live_assistant_mut(turn_id) {
            Some(turn) => {
                let message = message.into();
                turn.status = Some(JobStatus::Failed);
                turn.set_fallback_content(format!("Error: {message}"));
                turn.error = Some(message);
                true
            }
            None => false,
        }
    }

    /// Backend closed with a `completed` frame and no COMPLETED snapshot.
    pub fn mark_completed(&mut self, turn_id: TurnId) -> bool {
        match self.live_assistant_mut(turn_id) {
            Some(turn) => {
                turn.status = Some(JobStatus::Completed);
                true
            }
            None => false,
        }
    }

    pub fn toggle_expanded(&mut self, turn_id: TurnId) -> Option<bool> {
        let view = &mut self.find_mut(turn_id)?.view;
        view.is_expanded = !view.is_expanded;
        Some(view.is_expanded)
    }

    pub fn toggle_sources(&mut self, turn_id: TurnId) -> Option<bool> {
        let view = &mut self.find_mut(turn_id)?.view;
        view.is_sources_expanded = !view.is_sources_expanded;
        Some(view.is_sources_expanded)
    }

    pub fn toggle_thinking(&mut self, turn_id: TurnId) -> Option<bool> {
        let view = &mut self.find_mut(turn_id)?.view;
        view.is_thinking_expanded = !view.is_thinking_expanded;
        Some(view.is_thinking_expanded)
    }

    pub fn get(&self, turn_id: TurnId) -> Option<&ChatTurn> {
        self.turns.iter().rev().find(|t| t.id == turn_id)
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn last_assistant(&self) -> Option<&ChatTurn> {
        self.turns.iter().rev().find(|t| t.role == Role::Assistant)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn find_mut(&mut self, turn_id: TurnId) -> Option<&mut ChatTurn> {
        self.turns.iter_mut().rev().find(|t| t.id == turn_id)
    }

    fn live_assistant_mut(&mut self, turn_id: TurnId) -> Option<&mut ChatTurn> {
        self.find_mut(turn_id)
            .filter(|t| t.role == Role::Assistant && !t.is_terminal())
    }
}
