//! Job runner
//!
//! Executes a job's steps strictly in order against one page. Each step gets
//! an `Executing` update, then exactly one terminal update. Successful steps
//! get exactly one screenshot after the page settles.

use crate::artifacts::ArtifactStore;
use crate::error::Error;
use crate::executor::RetryExecutor;
use crate::model::{ExecutionAttempt, Job, Step, StepId, StepStatus};
use crate::status::{StatusSink, StatusUpdate};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use stepwright_browser::Page;
use tracing::{error, info, instrument, warn};

/// One line of the execution summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// Instruction text
    pub instruction: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Final failure message
    pub error: Option<String>,
}

impl fmt::Display for SummaryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            return write!(f, "[SUCCESS] {}", self.instruction);
        }
        write!(f, "[FAILED] {}", self.instruction)?;
        if let Some(error) = &self.error {
            write!(f, " (Error: {})", error)?;
        }
        Ok(())
    }
}

/// Ordered `[SUCCESS]` / `[FAILED]` lines, one per step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Entries in step order
    pub entries: Vec<SummaryEntry>,
}

impl ExecutionSummary {
    /// Rendered lines
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Execution Summary:")?;
        for entry in &self.entries {
            write!(f, "\n{}", entry)?;
        }
        Ok(())
    }
}

/// Result of one step
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Step id
    pub step_id: StepId,
    /// Instruction text
    pub instruction: String,
    /// Terminal status
    pub status: StepStatus,
    /// Final failure message
    pub error: Option<String>,
    /// Attempt chain; empty for setup failures
    pub attempts: Vec<ExecutionAttempt>,
    /// Screenshot written on success
    pub screenshot: Option<PathBuf>,
}

/// Result of one job
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Job id
    pub job_id: String,
    /// Job name
    pub job_name: String,
    /// Per-step results in order
    pub steps: Vec<StepReport>,
    /// Summary lines
    pub summary: ExecutionSummary,
}

impl JobReport {
    /// Whether every step succeeded
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Success)
    }
}

/// Runs jobs step by step
pub struct JobRunner {
    executor: RetryExecutor,
    sink: Arc<dyn StatusSink>,
    artifacts: ArtifactStore,
}

impl JobRunner {
    /// Create a runner
    #[must_use]
    pub fn new(executor: RetryExecutor, sink: Arc<dyn StatusSink>, artifacts: ArtifactStore) -> Self {
        Self {
            executor,
            sink,
            artifacts,
        }
    }

    /// Run every step of `job` in order. `page` is `None` when no browser
    /// is available; every step then fails without consuming retries.
    #[instrument(skip(self, page, job), fields(job_id = %job.id, steps = job.steps.len()))]
    pub async fn run(&self, page: Option<&dyn Page>, job: &mut Job) -> JobReport {
        info!(job_name = %job.name, "job started");
        let mut reports = Vec::with_capacity(job.steps.len());
        for step in &mut job.steps {
            reports.push(self.run_step(page, step).await);
        }

        let summary = ExecutionSummary {
            entries: reports
                .iter()
                .map(|r| SummaryEntry {
                    instruction: r.instruction.clone(),
                    success: r.status == StepStatus::Success,
                    error: r.error.clone(),
                })
                .collect(),
        };
        for line in summary.lines() {
            info!("{}", line);
        }

        JobReport {
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            steps: reports,
            summary,
        }
    }

    #[instrument(skip(self, page, step), fields(step_id = %step.id, order = step.order))]
    async fn run_step(&self, page: Option<&dyn Page>, step: &mut Step) -> StepReport {
        let instruction = step.instruction().to_string();
        info!(instruction = %instruction, "executing step");
        self.transition(step, StepStatus::Executing, None).await;

        let Some(page) = page else {
            let message = Error::NoActivePage.to_string();
            error!("cannot execute step: no active page");
            self.transition(step, StepStatus::Failed, Some(&message)).await;
            return StepReport {
                step_id: step.id.clone(),
                instruction,
                status: StepStatus::Failed,
                error: Some(message),
                attempts: Vec::new(),
                screenshot: None,
            };
        };

        let outcome = self.executor.execute(page, &step.id, &instruction).await;
        if outcome.is_success() {
            let screenshot = match self.artifacts.capture(page, None).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "screenshot failed");
                    None
                }
            };
            self.transition(step, StepStatus::Success, None).await;
            return StepReport {
                step_id: step.id.clone(),
                instruction,
                status: StepStatus::Success,
                error: None,
                attempts: outcome.attempts,
                screenshot,
            };
        }

        let message = outcome
            .last_error()
            .unwrap_or("step produced no attempts")
            .to_string();
        self.transition(step, StepStatus::Failed, Some(&message)).await;
        StepReport {
            step_id: step.id.clone(),
            instruction,
            status: StepStatus::Failed,
            error: Some(message),
            attempts: outcome.attempts,
            screenshot: None,
        }
    }

    /// Apply a transition locally and report it to the sink. Sink errors
    /// are logged and dropped.
    async fn transition(&self, step: &mut Step, status: StepStatus, error: Option<&str>) {
        if let Err(e) = step.transition(status) {
            warn!(error = %e, "skipping status update");
            return;
        }
        let mut update = StatusUpdate::new(step.id.clone(), status);
        update.at = step.updated_at;
        if let Some(error) = error {
            update = update.with_error(error);
        }
        if let Err(e) = self.sink.update(&update).await {
            warn!(error = %e, status = %status, "status update failed");
        }
    }
}
