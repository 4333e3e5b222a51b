//! Workflow definitions and lookup.
//!
//! Workflows are registered explicitly at start-up. Each definition pairs an
//! ordered list of steps with static metadata for discovery endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::WorkflowRunRequest;

use super::context::RunContext;
use super::orchestrator::Orchestrator;
use super::step::WorkflowStep;

/// Registry lookup and registration failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Workflow '{workflow_id}' not found. Available workflows: {}", available.join(", "))]
    NotFound {
        workflow_id: String,
        available: Vec<String>,
    },

    #[error("Workflow '{0}' is already registered")]
    Duplicate(String),

    #[error("Invalid workflow '{workflow_id}': {reason}")]
    Invalid { workflow_id: String, reason: String },
}

/// Description of one step for discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetadata {
    pub name: String,
    pub description: String,
    /// Context keys the step reads
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Context keys the step writes
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl StepMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn reads(mut self, keys: &[&str]) -> Self {
        self.inputs = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn writes(mut self, keys: &[&str]) -> Self {
        self.outputs = keys.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// Static description of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub workflow_id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default)]
    pub steps: Vec<StepMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WorkflowMetadata {
    pub fn new(
        workflow_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            description: description.into(),
            input_schema: run_request_schema(),
            steps: Vec::new(),
            author: None,
            version: "1.0.0".to_string(),
            tags: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: StepMetadata) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// JSON schema of a `WorkflowRunRequest`
pub fn run_request_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "user_input": {"type": "string"},
            "conversation_id": {"type": "string"},
            "conversation_history": {"type": "array", "items": {"type": "object"}},
        },
        "required": ["user_input", "conversation_id", "conversation_history"],
    })
}

/// A runnable workflow: metadata plus its ordered steps
#[derive(Clone)]
pub struct WorkflowDefinition {
    pub metadata: WorkflowMetadata,
    steps: Vec<Arc<dyn WorkflowStep>>,
    initial_context: RunContext,
}

impl WorkflowDefinition {
    pub fn new(metadata: WorkflowMetadata, steps: Vec<Arc<dyn WorkflowStep>>) -> Self {
        Self {
            metadata,
            steps,
            initial_context: RunContext::new(),
        }
    }

    /// Entries every run of this workflow starts with
    pub fn with_initial_context(mut self, context: RunContext) -> Self {
        self.initial_context = context;
        self
    }

    pub fn id(&self) -> &str {
        &self.metadata.workflow_id
    }

    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Validate the definition
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::Invalid {
            workflow_id: self.metadata.workflow_id.clone(),
            reason,
        };

        if self.metadata.workflow_id.trim().is_empty() {
            return Err(invalid("workflow id cannot be empty".to_string()));
        }

        if self.steps.is_empty() {
            return Err(invalid("workflow must have at least one step".to_string()));
        }

        for (i, step) in self.steps.iter().enumerate() {
            if step.name().trim().is_empty() {
                return Err(invalid(format!("step {} has an empty name", i)));
            }
        }

        Ok(())
    }

    /// Build a fresh orchestrator for one run
    pub fn orchestrator(&self, request: WorkflowRunRequest) -> Orchestrator {
        Orchestrator::with_context(request, self.steps.clone(), self.initial_context.clone())
    }
}

/// Maps workflow ids to definitions
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    workflows: BTreeMap<String, WorkflowDefinition>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow; ids must be unique
    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), RegistryError> {
        definition.validate()?;

        let id = definition.id().to_string();
        if self.workflows.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }

        self.workflows.insert(id, definition);
        Ok(())
    }

    pub fn get(&self, workflow_id: &str) -> Option<&WorkflowDefinition> {
        self.workflows.get(workflow_id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        self.workflows.keys().cloned().collect()
    }

    pub fn metadata(&self) -> Vec<&WorkflowMetadata> {
        self.workflows.values().map(|w| &w.metadata).collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Resolve a workflow id into an orchestrator for `request`
    pub fn orchestrator(
        &self,
        workflow_id: &str,
        request: WorkflowRunRequest,
    ) -> Result<Orchestrator, RegistryError> {
        self.get(workflow_id)
            .map(|definition| definition.orchestrator(request))
            .ok_or_else(|| RegistryError::NotFound {
                workflow_id: workflow_id.to_string(),
                available: self.ids(),
            })
    }
}
