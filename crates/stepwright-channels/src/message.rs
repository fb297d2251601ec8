//! Job intake messages
//!
//! A message carries either structured `testSteps` (preferred) or a legacy
//! flat `prompts` list. Test-case metadata, when present, names the job.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use stepwright_core::{Job, Step, StepId};
use tracing::{debug, warn};
use uuid::Uuid;

/// `order` arrives as a string or a number
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OrderValue {
    /// Numeric order
    Number(f64),
    /// Textual order
    Text(String),
}

impl OrderValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

/// One element of `testSteps`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestStepPayload {
    /// Step identifier
    pub step_id: Option<String>,
    /// Position
    pub order: Option<OrderValue>,
    /// Natural-language description
    pub description: Option<String>,
    /// Raw step data; strings are used verbatim, other JSON is serialized
    pub step_data: Option<serde_json::Value>,
    /// Status as reported by the producer (informational)
    pub step_status: Option<String>,
    /// Creation time
    pub created_at: Option<String>,
    /// Update time
    pub updated_at: Option<String>,
}

impl TestStepPayload {
    fn data_text(&self) -> Option<String> {
        match &self.step_data {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// A job message as published on the bus
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobMessage {
    /// Test case id, used as job id
    pub test_case_id: Option<String>,
    /// Test case name
    pub test_case_name: Option<String>,
    /// Project id
    pub project_id: Option<String>,
    /// Project name
    pub project_name: Option<String>,
    /// When the producer triggered the execution
    pub execution_date_time: Option<String>,
    /// Structured steps
    pub test_steps: Option<Vec<TestStepPayload>>,
    /// Legacy instruction list
    pub prompts: Option<Vec<String>>,
}

impl JobMessage {
    /// Convert into a job. `testSteps` wins when it yields at least one
    /// step; otherwise `prompts` is used. No steps at all is an error.
    pub fn into_job(self) -> Result<Job> {
        let id = non_empty(self.test_case_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = job_name(
            non_empty(self.project_name.as_deref()),
            non_empty(self.test_case_name.as_deref()),
        );
        debug!(
            job_id = %id,
            project_id = ?self.project_id,
            executed_at = ?self.execution_date_time,
            "converting job message"
        );

        let mut steps = self.test_steps.map(structured_steps).unwrap_or_default();
        if steps.is_empty() {
            steps = self
                .prompts
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .enumerate()
                .map(|(i, p)| Step::new(StepId::generate(), i as u32 + 1, p))
                .collect();
        }
        if steps.is_empty() {
            return Err(Error::Parse("message contains no executable steps".to_string()));
        }

        Ok(Job::new(name, steps).with_id(id))
    }
}

/// Parse a raw payload into a job
pub fn parse_job(payload: &[u8]) -> Result<Job> {
    let message: JobMessage = serde_json::from_slice(payload)?;
    message.into_job()
}

fn structured_steps(payloads: Vec<TestStepPayload>) -> Vec<Step> {
    let mut keyed: Vec<(Option<f64>, Step)> = Vec::with_capacity(payloads.len());
    for (position, payload) in payloads.into_iter().enumerate() {
        let data = payload.data_text();
        let description = payload.description.clone().unwrap_or_default();
        if description.trim().is_empty() && data.as_deref().is_none_or(|d| d.trim().is_empty()) {
            warn!(position, step_id = ?payload.step_id, "skipping step without description or data");
            continue;
        }

        let number = payload.order.as_ref().and_then(OrderValue::as_number);
        let order = number
            .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n as u32)
            .unwrap_or(position as u32 + 1);
        let id = non_empty(payload.step_id.as_deref())
            .map(StepId::new)
            .unwrap_or_else(StepId::generate);

        let mut step = Step::new(id, order, description);
        if let Some(data) = data {
            step = step.with_data(data);
        }
        if let Some(created) = payload.created_at.as_deref().and_then(parse_timestamp) {
            step.created_at = created;
        }
        if let Some(updated) = payload.updated_at.as_deref().and_then(parse_timestamp) {
            step.updated_at = updated;
        }
        keyed.push((number, step));
    }
    sort_numbered(keyed)
}

/// Stable sort of the steps with a numeric order among the slots they
/// occupy; steps without one keep their position
fn sort_numbered(keyed: Vec<(Option<f64>, Step)>) -> Vec<Step> {
    let slots: Vec<usize> = keyed
        .iter()
        .enumerate()
        .filter(|(_, (n, _))| n.is_some())
        .map(|(i, _)| i)
        .collect();
    let mut numbered: Vec<(f64, Step)> = Vec::with_capacity(slots.len());
    let mut result: Vec<Option<Step>> = Vec::with_capacity(keyed.len());
    for (number, step) in keyed {
        match number {
            Some(n) => {
                numbered.push((n, step));
                result.push(None);
            }
            None => result.push(Some(step)),
        }
    }
    numbered.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (slot, (_, step)) in slots.into_iter().zip(numbered) {
        result[slot] = Some(step);
    }
    result.into_iter().flatten().collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn job_name(project: Option<&str>, test_case: Option<&str>) -> String {
    match (project, test_case) {
        (Some(project), Some(case)) => format!("{} / {}", project, case),
        (None, Some(case)) => case.to_string(),
        (Some(project), None) => project.to_string(),
        (None, None) => "untitled job".to_string(),
    }
}
