//! # research-stream
//!
//! Client side of a streaming research assistant: submit a question to the
//! backend, follow the job's server-sent events and fold every snapshot into
//! an append-only chat transcript.
//!
//! - [`client`]: `POST /ask`, `GET /stream/{job_id}`, `GET /status/{job_id}`
//! - [`transcript`]: the reducer over chat turns
//! - [`session`]: loading flag, error banner and the single open stream
//! - [`render`]: incremental terminal output for the `research-chat` binary

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod render;
pub mod session;
pub mod sse;
pub mod transcript;

pub use client::{JobId, JobStream, JobStreamClient, StreamUpdate};
pub use config::ClientConfig;
pub use error::ResearchError;
pub use events::{JobEvent, JobStatus, Source, ThinkingStep};
pub use session::{Progress, ResearchSession};
pub use transcript::{ChatTurn, Role, TranscriptStore, TurnId};
