//! Wire types for the research backend: job statuses, snapshot frames and
//! the records they carry.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Status of a research job as reported by the backend.
///
/// `Stopped` is never sent by the backend; the client synthesizes it when the
/// user cancels. Unknown strings are kept verbatim in `Other` and treated as
/// non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    #[default]
    Pending,
    Decomposing,
    Searching,
    Working,
    Processing,
    Synthesizing,
    Completed,
    Failed,
    Stopped,
    Other(String),
}

impl JobStatus {
    /// Parse a backend status string. Matching ignores case and surrounding
    /// whitespace.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "PENDING" => JobStatus::Pending,
            "DECOMPOSING" => JobStatus::Decomposing,
            "SEARCHING" => JobStatus::Searching,
            "WORKING" => JobStatus::Working,
            "PROCESSING" => JobStatus::Processing,
            "SYNTHESIZING" => JobStatus::Synthesizing,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            "STOPPED" => JobStatus::Stopped,
            _ => JobStatus::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Decomposing => "DECOMPOSING",
            JobStatus::Searching => "SEARCHING",
            JobStatus::Working => "WORKING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Synthesizing => "SYNTHESIZING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stopped => "STOPPED",
            JobStatus::Other(s) => s,
        }
    }

    /// Terminal statuses are absorbing: nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
        )
    }

    /// Human-readable label for status lines.
    pub fn label(&self) -> &str {
        match self {
            JobStatus::Pending => "Starting research...",
            JobStatus::Decomposing => "Breaking the question down...",
            JobStatus::Searching => "Searching the web...",
            JobStatus::Working => "Researching sub-queries...",
            JobStatus::Processing => "Reading sources...",
            JobStatus::Synthesizing => "Writing the answer...",
            JobStatus::Completed => "Research complete!",
            JobStatus::Failed => "Research failed.",
            JobStatus::Stopped => "Search stopped.",
            JobStatus::Other(s) => s,
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        JobStatus::parse(&s)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payload records
// ---------------------------------------------------------------------------

/// A retrieved source document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Tool invocation inside a ReAct step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReActAction {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Structured thought / action / observation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReActStep {
    pub thought: String,
    pub action: ReActAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

/// Free-form agent callback record (`tool_start`, `agent_action`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

/// One reasoning step. Backends disagree on the shape, so anything that is
/// neither a ReAct step nor a tool-call record is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThinkingStep {
    ReAct(ReActStep),
    ToolCall(ToolCallRecord),
    Other(serde_json::Value),
}

impl ThinkingStep {
    /// One-line summary for collapsed views.
    pub fn title(&self) -> String {
        match self {
            ThinkingStep::ReAct(step) => match &step.action.input {
                Some(input) => format!("{}: {}", step.action.tool, input),
                None => step.action.tool.clone(),
            },
            ThinkingStep::ToolCall(rec) => {
                let tool = rec.tool.as_deref().or(rec.tool_name.as_deref());
                match (rec.kind.as_str(), tool) {
                    ("tool_start", Some(t)) => format!("Using tool: {}", t),
                    ("tool_end", _) => "Tool finished".to_string(),
                    ("agent_action", Some(t)) => format!("Action: {}", t),
                    ("agent_finish", _) => "Final answer ready".to_string(),
                    (kind, Some(t)) => format!("{}: {}", kind, t),
                    (kind, None) => kind.to_string(),
                }
            }
            ThinkingStep::Other(_) => "Reasoning step".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot frame
// ---------------------------------------------------------------------------

/// One snapshot pushed by the backend. A list that is present is the
/// complete current list, never a delta. A list that is absent or `null` was
/// not part of this push and leaves the previous one in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_queries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(default, rename = "memory", skip_serializing_if = "Option::is_none")]
    pub thinking_steps: Option<Vec<ThinkingStep>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEvent {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// `/status` emits `null` for lists it has not filled yet.
fn null_as_empty<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

/// A decoded `data:` payload from the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Snapshot(JobEvent),
    /// `{"type":"completed"}` sent after the last snapshot.
    Completed,
    /// `{"type":"error","message":...}` sent when the job blew up server-side.
    Error(String),
}

impl StreamFrame {
    /// Decode one payload. `Ok(None)` marks a well-formed frame this client
    /// has no use for (unknown `type`).
    pub fn decode(data: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(data)?;

        if value.get("status").is_none() {
            if let Some(kind) = value.get("type").and_then(|t| t.as_str()) {
                return Ok(match kind {
                    "completed" | "complete" => Some(StreamFrame::Completed),
                    "error" => {
                        let message = value
                            .get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("unknown backend error")
                            .to_string();
                        Some(StreamFrame::Error(message))
                    }
                    _ => None,
                });
            }
        }

        let event: JobEvent = serde_json::from_value(value)?;
        Ok(Some(StreamFrame::Snapshot(event)))
    }
}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AskRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Reply of `GET /status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub original_query: String,
    #[serde(default)]
    pub final_answer: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sub_queries: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub memory: Vec<ThinkingStep>,
}
