//! Crate-level error type.

use thiserror::Error;

/// Errors surfaced by the job-stream client and the research session.
///
/// Every variant is terminal for the turn it concerns and never for the
/// session as a whole.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Job creation failed: network error, non-2xx reply or no job id.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The event channel failed before a terminal status was seen.
    #[error("connection error during research: {0}")]
    Transport(String),

    /// A one-shot status lookup failed.
    #[error("status lookup failed for job {job_id}: {detail}")]
    Status { job_id: String, detail: String },

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A job is already in flight.
    #[error("a research job is already running")]
    Busy,

    /// The query was empty after trimming.
    #[error("query is empty")]
    EmptyQuery,
}

impl ResearchError {
    /// Short text for the transient banner.
    pub fn banner_text(&self) -> String {
        match self {
            ResearchError::Submission(_) => "Search failed. Please try again.".to_string(),
            ResearchError::Transport(_) => {
                "Connection error during research. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_display_includes_detail() {
        let e = ResearchError::Submission("HTTP 500".into());
        assert_eq!(e.to_string(), "submission failed: HTTP 500");
    }

    #[test]
    fn test_status_display_names_job() {
        let e = ResearchError::Status {
            job_id: "abc".into(),
            detail: "HTTP 404".into(),
        };
        assert!(e.to_string().contains("abc"));
        assert!(e.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_banner_text_hides_transport_detail() {
        let e = ResearchError::Transport("reset by peer".into());
        assert_eq!(
            e.banner_text(),
            "Connection error during research. Please try again."
        );
    }

    #[test]
    fn test_banner_text_busy_uses_display() {
        assert_eq!(
            ResearchError::Busy.banner_text(),
            "a research job is already running"
        );
    }
}
