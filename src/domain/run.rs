//! Lifecycle of a single orchestration run.
//!
//! A run is one-shot and linear: it never resumes, retries or rolls back.

use serde::{Deserialize, Serialize};

/// State of an orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// `execute()` has not been polled yet
    NotStarted,

    /// Executing step `step` (0-indexed) of `total`
    Running { step: usize, total: usize },

    /// All steps completed and `stream_end` was emitted
    Finished,

    /// A step failed; no `stream_end` was emitted
    Failed { step: String, error: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl RunState {
    /// Check if the run is still in progress
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Check if the run has ended (successfully or not)
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed { .. })
    }
}
