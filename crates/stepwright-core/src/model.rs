//! Steps, jobs and attempt records

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use stepwright_browser::PageState;
use uuid::Uuid;

/// Opaque, stable step identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Step lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StepStatus {
    /// Not started
    #[default]
    Pending,
    /// The retry loop is working on it
    Executing,
    /// Terminal: an attempt succeeded
    Success,
    /// Terminal: every attempt failed, or no page was available
    Failed,
}

impl StepStatus {
    /// Returns the string representation written to status sinks
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Executing => "Executing",
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Executing, Self::Success)
                | (Self::Executing, Self::Failed)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One natural-language instruction with identity and status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Identifier
    pub id: StepId,
    /// Position within the job
    pub order: u32,
    /// Natural-language description
    pub description: String,
    /// Raw payload; the instruction when the description is empty
    pub data: Option<String>,
    /// Current status
    pub status: StepStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Step {
    /// Create a pending step
    #[must_use]
    pub fn new(id: impl Into<StepId>, order: u32, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            order,
            description: description.into(),
            data: None,
            status: StepStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the raw payload
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// The text handed to synthesis: the description, or the payload when
    /// the description is blank
    pub fn instruction(&self) -> &str {
        let description = self.description.trim();
        if !description.is_empty() {
            return description;
        }
        self.data.as_deref().map(str::trim).unwrap_or("")
    }

    /// Move to `next`, stamping `updated_at`. Terminal states are final.
    pub fn transition(&mut self, next: StepStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// An ordered list of steps executed against one browser session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Job {
    /// Create a job with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            steps,
        }
    }

    /// Build a job from bare instruction strings, numbering steps from 1
    #[must_use]
    pub fn from_prompts<I, S>(name: impl Into<String>, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = prompts
            .into_iter()
            .enumerate()
            .map(|(i, prompt)| Step::new(StepId::generate(), i as u32 + 1, prompt))
            .collect();
        Self::new(name, steps)
    }

    /// Override the id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// How one attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The script ran to completion
    Success,
    /// The script failed with this message
    Failure(String),
}

impl AttemptOutcome {
    /// Whether the attempt succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The failure message, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure(message) => Some(message),
        }
    }
}

/// One synthesize-normalize-run cycle within a step's retry chain
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionAttempt {
    /// Step this attempt belongs to
    pub step_id: StepId,
    /// 0-based, contiguous within a chain
    pub ordinal: u32,
    /// Synthesized text
    pub generated_code: String,
    /// Text after normalization
    pub normalized_code: String,
    /// Result
    pub outcome: AttemptOutcome,
    /// Page state the synthesis was grounded on
    pub snapshot: PageState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_prefers_description() {
        let step = Step::new("s1", 1, "Click on Sign in").with_data("ignored");
        assert_eq!(step.instruction(), "Click on Sign in");

        let step = Step::new("s2", 2, "   ").with_data("Type hello");
        assert_eq!(step.instruction(), "Type hello");

        let step = Step::new("s3", 3, "");
        assert_eq!(step.instruction(), "");
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut step = Step::new("s1", 1, "go");
        let created = step.updated_at;
        step.transition(StepStatus::Executing).unwrap();
        step.transition(StepStatus::Success).unwrap();
        assert_eq!(step.status, StepStatus::Success);
        assert!(step.updated_at >= created);

        let err = step.transition(StepStatus::Failed).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: StepStatus::Success,
                to: StepStatus::Failed
            }
        ));
    }

    #[test]
    fn test_pending_cannot_skip_executing() {
        let mut step = Step::new("s1", 1, "go");
        assert!(step.transition(StepStatus::Success).is_err());
        assert_eq!(step.status, StepStatus::Pending);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(StepStatus::Executing.as_str(), "Executing");
        assert_eq!(StepStatus::Failed.to_string(), "Failed");
        assert!(StepStatus::Success.is_terminal());
        assert!(!StepStatus::Executing.is_terminal());
    }

    #[test]
    fn test_job_from_prompts() {
        let job = Job::from_prompts("legacy", ["Open https://example.com", "Click Login"]);
        assert_eq!(job.steps.len(), 2);
        assert_eq!(job.steps[0].order, 1);
        assert_eq!(job.steps[1].order, 2);
        assert_ne!(job.steps[0].id, job.steps[1].id);
        assert!(job.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_attempt_outcome() {
        assert!(AttemptOutcome::Success.is_success());
        assert_eq!(AttemptOutcome::Failure("x".into()).error(), Some("x"));
    }
}
