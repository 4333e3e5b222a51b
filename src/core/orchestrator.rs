//! Main orchestrator for workflow runs.
//!
//! Sequences the steps of one run, brackets each step with `workflow_step`
//! events, passes step records through in order, turns a step failure into a
//! single terminal `error` record, and rebuilds the conversation history
//! from the context once every step has completed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{ConversationMessage, Role, RunState, StepStatus, WorkflowRunRequest, WorkflowStepData};

use super::context::{keys, RunContext};
use super::emitter::EventEmitter;
use super::step::{StepOutput, StreamClosed, WorkflowStep};

/// Lazily produced NDJSON records of one run
pub type RecordStream<'a> = Pin<Box<dyn Stream<Item = String> + Send + 'a>>;

/// Records buffered between the run and a slow consumer
const RECORD_BUFFER: usize = 16;

/// Runs one workflow against one request
pub struct Orchestrator {
    request: WorkflowRunRequest,
    steps: Vec<Arc<dyn WorkflowStep>>,
    emitter: EventEmitter,
    context: RunContext,
    state: RunState,
}

impl Orchestrator {
    /// Create an orchestrator with an empty initial context
    pub fn new(request: WorkflowRunRequest, steps: Vec<Arc<dyn WorkflowStep>>) -> Self {
        Self::with_context(request, steps, RunContext::new())
    }

    /// Create an orchestrator seeded with caller-supplied context entries.
    /// Request fields override initial entries with the same key.
    pub fn with_context(
        request: WorkflowRunRequest,
        steps: Vec<Arc<dyn WorkflowStep>>,
        initial: RunContext,
    ) -> Self {
        let emitter = EventEmitter::new(request.conversation_id.clone());
        let context = RunContext::seeded(initial, &request);

        Self {
            request,
            steps,
            emitter,
            context,
            state: RunState::NotStarted,
        }
    }

    pub fn run_id(&self) -> &str {
        self.emitter.run_id()
    }

    pub fn request(&self) -> &WorkflowRunRequest {
        &self.request
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Execute the run, borrowing the orchestrator.
    ///
    /// Nothing happens until the stream is polled. Dropping the stream
    /// abandons the run at its current suspension point.
    pub fn execute(&mut self) -> RecordStream<'_> {
        let (tx, rx) = mpsc::channel(RECORD_BUFFER);
        let driver = self.drive(tx);
        merge_records(rx, driver)
    }

    /// Execute the run, moving the orchestrator into the stream
    pub fn into_stream(mut self) -> RecordStream<'static> {
        let (tx, rx) = mpsc::channel(RECORD_BUFFER);
        let driver = async move { self.drive(tx).await };
        merge_records(rx, driver)
    }

    #[instrument(
        skip(self, tx),
        fields(run_id = %self.emitter.run_id(), conversation_id = %self.request.conversation_id)
    )]
    async fn drive(&mut self, tx: mpsc::Sender<String>) {
        if self.state != RunState::NotStarted {
            warn!(state = ?self.state, "Run already executed");
            let record = self
                .emitter
                .error("Workflow run has already been executed", Some("already_executed"));
            let _ = tx.send(record).await;
            return;
        }

        if let Err(StreamClosed) = self.run_steps(&tx).await {
            debug!("Record consumer went away, abandoning run");
        }
    }

    async fn run_steps(&mut self, tx: &mpsc::Sender<String>) -> Result<(), StreamClosed> {
        let total = self.steps.len();
        info!(steps = total, "Starting workflow run");

        forward(tx, self.emitter.stream_start(&self.request.conversation_history)).await?;

        for (idx, step) in self.steps.iter().enumerate() {
            self.state = RunState::Running { step: idx, total };

            let started = WorkflowStepData::started(step.name());
            forward(tx, self.emitter.workflow_step(&started)).await?;

            let step_start = Instant::now();
            let mut out = StepOutput::new(tx.clone()).for_step(started.clone());
            let result = step.run(&mut self.context, &self.emitter, &mut out).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    info!(
                        step = %step.name(),
                        records = out.sent(),
                        duration_ms,
                        "Step completed"
                    );
                    let completed = started.transition(StepStatus::Completed);
                    forward(tx, self.emitter.workflow_step(&completed)).await?;
                }
                Err(e) if e.downcast_ref::<StreamClosed>().is_some() => {
                    return Err(StreamClosed);
                }
                Err(e) => {
                    error!(step = %step.name(), duration_ms, error = %format!("{:#}", e), "Step failed");

                    self.state = RunState::Failed {
                        step: step.name().to_string(),
                        error: format!("{:#}", e),
                    };
                    let message = format!("Workflow failed at step '{}': {:#}", step.name(), e);
                    forward(tx, self.emitter.error(message, Some("step_failed"))).await?;
                    return Ok(());
                }
            }
        }

        let history = self.final_history();
        forward(tx, self.emitter.stream_end(&history)).await?;

        self.state = RunState::Finished;
        info!(history_len = history.len(), "Workflow run completed");
        Ok(())
    }

    /// History after a successful run, derived from what the steps left in
    /// the context
    fn final_history(&self) -> Vec<ConversationMessage> {
        let final_response = self.context.get_str(keys::FINAL_RESPONSE).unwrap_or_default();
        let user_turn = self
            .context
            .get_str(keys::USER_MESSAGE_WITH_SOURCES)
            .unwrap_or(&self.request.user_input);
        let system_prompt = self
            .context
            .get_str(keys::SYSTEM_PROMPT)
            .filter(|prompt| !prompt.is_empty());

        rebuild_history(
            &self.request.conversation_history,
            system_prompt,
            user_turn,
            final_response,
        )
    }
}

/// Append one user/assistant exchange to `prior`.
///
/// A system prompt replaces the system message at the head of the history,
/// or is inserted there if the history does not start with one. All other
/// prior turns are kept unchanged.
pub fn rebuild_history(
    prior: &[ConversationMessage],
    system_prompt: Option<&str>,
    user_turn: &str,
    assistant_turn: &str,
) -> Vec<ConversationMessage> {
    let mut history = prior.to_vec();

    if let Some(prompt) = system_prompt {
        match history.first_mut() {
            Some(first) if first.role == Role::System => {
                *first = ConversationMessage::system(prompt);
            }
            _ => history.insert(0, ConversationMessage::system(prompt)),
        }
    }

    history.push(ConversationMessage::user(user_turn));
    history.push(ConversationMessage::assistant(assistant_turn));
    history
}

async fn forward(tx: &mpsc::Sender<String>, record: String) -> Result<(), StreamClosed> {
    tx.send(record).await.map_err(|_| StreamClosed)
}

/// Poll the run driver and the record channel together, so the run makes
/// progress only while someone is reading
fn merge_records<'a, F>(rx: mpsc::Receiver<String>, driver: F) -> RecordStream<'a>
where
    F: Future<Output = ()> + Send + 'a,
{
    let driver = stream::once(driver).filter_map(|()| futures::future::ready(None::<String>));
    Box::pin(stream::select(ReceiverStream::new(rx), driver))
}
