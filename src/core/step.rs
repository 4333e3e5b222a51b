//! The workflow step contract.
//!
//! A step reads and writes the run context and pushes pre-formatted records
//! to a [`StepOutput`]. Steps of one run execute strictly one after another,
//! so the context needs no locking: everything step N writes is visible to
//! step N+1.
//!
//! Returning an error aborts the whole run. Faults a step can recover from
//! (a flaky classifier, a search service that is down) should be handled
//! inside the step instead.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{StepStatus, WorkflowStepData};

use super::context::RunContext;
use super::emitter::EventEmitter;

/// The consumer of the record stream went away
#[derive(Debug, Error)]
#[error("record stream closed by consumer")]
pub struct StreamClosed;

/// A unit of work in a workflow
#[async_trait]
pub trait WorkflowStep: Send + Sync {
    /// Name reported in `workflow_step` events
    fn name(&self) -> &str;

    /// Execute the step
    async fn run(
        &self,
        ctx: &mut RunContext,
        emitter: &EventEmitter,
        out: &mut StepOutput,
    ) -> anyhow::Result<()>;
}

/// Where a step sends its records.
///
/// Records are forwarded in order; empty records are dropped.
#[derive(Debug)]
pub struct StepOutput {
    tx: mpsc::Sender<String>,
    sent: usize,
    step: Option<WorkflowStepData>,
}

impl StepOutput {
    pub(crate) fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx,
            sent: 0,
            step: None,
        }
    }

    /// Attach the `started` record of the step this output belongs to
    pub(crate) fn for_step(mut self, started: WorkflowStepData) -> Self {
        self.step = Some(started);
        self
    }

    /// Report progress of the running step as an `in_progress` record
    /// carrying the step's id
    pub async fn progress(
        &mut self,
        emitter: &EventEmitter,
        update: impl Into<String>,
    ) -> Result<(), StreamClosed> {
        let Some(step) = self.step.as_ref() else {
            return Ok(());
        };
        let data = step
            .transition(StepStatus::InProgress)
            .with_update(update.into());
        self.send(emitter.workflow_step(&data)).await
    }

    /// Forward a record. Waits while the consumer is behind.
    pub async fn send(&mut self, record: String) -> Result<(), StreamClosed> {
        if record.trim().is_empty() {
            return Ok(());
        }
        self.tx.send(record).await.map_err(|_| StreamClosed)?;
        self.sent += 1;
        Ok(())
    }

    /// Number of records forwarded so far
    pub fn sent(&self) -> usize {
        self.sent
    }
}
