//! Retry Executor
//!
//! Runs one step as an explicit loop over an attempt state: synthesize,
//! normalize, parse, run. On failure the next attempt is grounded on a fresh
//! page capture, the failure message and its analysis. The loop ends at the
//! first success or after `max_retries` additional attempts.

use crate::model::{AttemptOutcome, ExecutionAttempt, StepId};
use crate::synthesizer::{SynthesisRequest, Synthesizer};
use serde::Deserialize;
use std::time::Duration;
use stepwright_browser::{capture, normalize, parse, LoadState, Page, PageState, ScriptRunner};
use tracing::{debug, info, instrument, warn};

/// Retry bound and timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Per-action auto-wait timeout in milliseconds
    pub action_timeout_ms: u64,
    /// Navigation timeout in milliseconds
    pub navigation_timeout_ms: u64,
    /// Settle wait for `domcontentloaded`, milliseconds
    pub dom_content_loaded_timeout_ms: u64,
    /// Settle wait for `load`, milliseconds
    pub load_timeout_ms: u64,
    /// Settle wait for `networkidle`, milliseconds
    pub network_idle_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            action_timeout_ms: 30_000,
            navigation_timeout_ms: 30_000,
            dom_content_loaded_timeout_ms: 30_000,
            load_timeout_ms: 30_000,
            network_idle_timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Set the retry bound
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Settle stages with their timeouts, in order
    pub fn settle_stages(&self) -> [(LoadState, Duration); 3] {
        [
            (
                LoadState::DomContentLoaded,
                Duration::from_millis(self.dom_content_loaded_timeout_ms),
            ),
            (LoadState::Load, Duration::from_millis(self.load_timeout_ms)),
            (
                LoadState::NetworkIdle,
                Duration::from_millis(self.network_idle_timeout_ms),
            ),
        ]
    }
}

/// The attempt chain of one step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Attempts in order; ordinals are 0..len
    pub attempts: Vec<ExecutionAttempt>,
}

impl StepOutcome {
    /// Whether the last attempt succeeded
    pub fn is_success(&self) -> bool {
        self.attempts
            .last()
            .is_some_and(|a| a.outcome.is_success())
    }

    /// Failure message of the last attempt
    pub fn last_error(&self) -> Option<&str> {
        self.attempts.last().and_then(|a| a.outcome.error())
    }
}

/// Mutable state carried from one attempt to the next
struct AttemptState {
    ordinal: u32,
    instruction: String,
    snapshot: PageState,
    error: Option<String>,
}

/// Drives the synthesize-run-repair loop for one step
pub struct RetryExecutor {
    synthesizer: Synthesizer,
    policy: RetryPolicy,
    runner: ScriptRunner,
}

impl RetryExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(synthesizer: Synthesizer, policy: RetryPolicy) -> Self {
        let runner = ScriptRunner::new(
            Duration::from_millis(policy.action_timeout_ms),
            Duration::from_millis(policy.navigation_timeout_ms),
        );
        Self {
            synthesizer,
            policy,
            runner,
        }
    }

    /// The active policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `instruction` against `page` until success or the retry
    /// bound. At most `max_retries + 1` attempts run, one at a time.
    #[instrument(skip(self, page, instruction), fields(step_id = %step_id))]
    pub async fn execute(&self, page: &dyn Page, step_id: &StepId, instruction: &str) -> StepOutcome {
        let mut attempts = Vec::new();
        let mut state = AttemptState {
            ordinal: 0,
            instruction: instruction.to_string(),
            snapshot: capture(page).await,
            error: None,
        };

        loop {
            let mut request = SynthesisRequest::new(&state.instruction).with_page(&state.snapshot);
            if let Some(error) = state.error.as_deref() {
                request = request.with_previous_error(error, state.ordinal);
            }
            let synthesis = self.synthesizer.synthesize(&request).await;
            let normalized = normalize(&synthesis.code);
            info!(attempt = state.ordinal, code = %normalized, "executing action script");

            let result = self.run_script(page, &normalized).await;
            let outcome = match &result {
                Ok(()) => AttemptOutcome::Success,
                Err(message) => AttemptOutcome::Failure(message.clone()),
            };
            attempts.push(ExecutionAttempt {
                step_id: step_id.clone(),
                ordinal: state.ordinal,
                generated_code: synthesis.code,
                normalized_code: normalized,
                outcome,
                snapshot: state.snapshot,
            });

            let message = match result {
                Ok(()) => {
                    self.settle(page).await;
                    info!(attempt = state.ordinal, "step succeeded");
                    return StepOutcome { attempts };
                }
                Err(message) => message,
            };

            if state.ordinal >= self.policy.max_retries {
                warn!(attempt = state.ordinal, error = %message, "retries exhausted");
                return StepOutcome { attempts };
            }

            warn!(attempt = state.ordinal, error = %message, "attempt failed, retrying");
            state = AttemptState {
                ordinal: state.ordinal + 1,
                instruction: enriched_instruction(instruction, &message),
                snapshot: capture(page).await,
                error: Some(message),
            };
        }
    }

    async fn run_script(&self, page: &dyn Page, code: &str) -> Result<(), String> {
        let script = parse(code).map_err(|e| format!("invalid action script: {}", e))?;
        if script.is_empty() {
            return Err("invalid action script: no statements".to_string());
        }
        self.runner
            .run(page, &script)
            .await
            .map_err(|e| e.to_string())
    }

    /// Wait for content-parsed, fully-loaded and network-idle in turn.
    /// Failures are logged only.
    async fn settle(&self, page: &dyn Page) {
        for (state, timeout) in self.policy.settle_stages() {
            match page.wait_for_load_state(state, timeout).await {
                Ok(()) => debug!(state = %state, "page settled"),
                Err(e) => warn!(state = %state, error = %e, "settle wait failed"),
            }
        }
    }
}

/// The instruction sent on retries
pub fn enriched_instruction(original: &str, error: &str) -> String {
    format!(
        "Action failed: {}\n\nError encountered: {}\n\nPlease generate new code that:\n\
         1. Uses alternative selectors if the current one failed\n\
         2. Handles any visibility issues with elements\n\
         3. Checks for iframes if elements might be inside them\n\
         4. Implements appropriate waits for elements or conditions\n\
         5. Uses try/except blocks to attempt multiple strategies",
        original, error
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 4);
        let stages: Vec<LoadState> = policy.settle_stages().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, LoadState::SETTLE_ORDER.to_vec());
    }

    #[test]
    fn test_policy_from_partial_toml_values() {
        let policy: RetryPolicy =
            serde_json::from_value(serde_json::json!({ "max_retries": 2 })).unwrap();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.action_timeout_ms, 30_000);
    }

    #[test]
    fn test_enriched_instruction() {
        let text = enriched_instruction("Click on Sign in", "no element found");
        assert!(text.starts_with("Action failed: Click on Sign in"));
        assert!(text.contains("Error encountered: no element found"));
        assert!(text.contains("1. Uses alternative selectors"));
        assert!(text.contains("5. Uses try/except blocks"));
    }
}
