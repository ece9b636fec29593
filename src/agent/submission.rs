//! Submission types accepted by the agent runtime for one ChatThread.
//!
//! Trimmed from the TUI-era variant set to what the spec's concurrency
//! model actually needs (spec §4.I): a new user message starts a run, an
//! interrupt observes cancellation at the next suspension point, and a
//! resume hands an abandoned thread to a fresh worker.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Submission {
    /// Starts a new run for the thread.
    UserMessage { content: String },

    /// Cancels the thread's active run. Per spec §5, the runtime only
    /// observes this at the next suspension point; partial output
    /// already written is committed, not rolled back.
    Interrupt,

    /// Claims a thread whose previous run's checkpoint heartbeat has
    /// expired, per spec §4.I's concurrency contract.
    Resume,
}

impl Submission {
    pub fn user_message(content: impl Into<String>) -> Self {
        Self::UserMessage { content: content.into() }
    }

    pub fn starts_run(&self) -> bool {
        matches!(self, Self::UserMessage { .. } | Self::Resume)
    }
}

/// Result of submitting to a thread's run.
#[derive(Debug, Clone)]
pub enum SubmissionResult {
    Response { content: String },
    Busy { thread_id: Uuid },
    Interrupted,
    Error { message: String },
}

impl SubmissionResult {
    pub fn response(content: impl Into<String>) -> Self {
        Self::Response { content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_and_resume_start_a_run() {
        assert!(Submission::user_message("hi").starts_run());
        assert!(Submission::Resume.starts_run());
        assert!(!Submission::Interrupt.starts_run());
    }
}
