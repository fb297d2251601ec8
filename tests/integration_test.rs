//! Integration tests for Stepwright
//!
//! These tests verify the crates working together:
//! - stepwright-channels: job message parsing
//! - stepwright-llm: scripted completions
//! - stepwright-browser: normalization, parsing and running against a page
//! - stepwright-core: the retry loop, status updates and the summary

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepwright_browser::{Act, LoadState, Locator, Page};
use stepwright_channels::{parse_job, NatsConfig};
use stepwright_core::{
    ArtifactStore, JobRunner, LogStatusSink, PostgresSinkConfig, RetryExecutor, RetryPolicy,
    StepStatus, Synthesizer,
};
use stepwright_llm::MockProvider;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_default_config_sections() {
    let value: toml::Value = toml::from_str(DEFAULT_CONFIG).unwrap();
    for section in ["browser", "llm", "executor", "artifacts", "intake", "status"] {
        assert!(value.get(section).is_some(), "missing [{}]", section);
    }
    assert_eq!(value["intake"]["queue_capacity"].as_integer(), Some(16));
    assert_eq!(value["status"]["sink"].as_str(), Some("log"));
}

#[test]
fn test_default_config_matches_library_defaults() {
    let value: toml::Value = toml::from_str(DEFAULT_CONFIG).unwrap();

    let policy: RetryPolicy = value["executor"].clone().try_into().unwrap();
    let defaults = RetryPolicy::default();
    assert_eq!(policy.max_retries, defaults.max_retries);
    assert_eq!(policy.action_timeout_ms, defaults.action_timeout_ms);
    assert_eq!(policy.network_idle_timeout_ms, defaults.network_idle_timeout_ms);

    let nats: NatsConfig = value["intake"]["nats"].clone().try_into().unwrap();
    assert_eq!(nats.servers, NatsConfig::default().servers);
    assert_eq!(nats.subject, NatsConfig::default().subject);
    assert_eq!(nats.queue, NatsConfig::default().queue);

    let postgres: PostgresSinkConfig = value["status"]["postgres"].clone().try_into().unwrap();
    assert_eq!(postgres.table, "test_steps");
    assert_eq!(postgres.max_connections, 10);
}

// ============================================================================
// Message to summary
// ============================================================================

/// Page that accepts everything and records what happened
#[derive(Default)]
struct RecordingPage {
    log: Mutex<Vec<String>>,
    url: Mutex<String>,
}

#[async_trait]
impl Page for RecordingPage {
    async fn goto(&self, url: &str, wait_until: LoadState, _: Duration) -> stepwright_browser::Result<()> {
        self.log.lock().unwrap().push(format!("goto {} {}", url, wait_until));
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn perform(&self, locator: &Locator, action: &Act, _: Duration) -> stepwright_browser::Result<()> {
        self.log.lock().unwrap().push(format!("{} {:?}", locator, action));
        Ok(())
    }

    async fn wait_for_locator(&self, _: &Locator, _: Duration) -> stepwright_browser::Result<()> {
        Ok(())
    }

    async fn wait_for_load_state(&self, _: LoadState, _: Duration) -> stepwright_browser::Result<()> {
        Ok(())
    }

    async fn wait_for_timeout(&self, _: Duration) -> stepwright_browser::Result<()> {
        Ok(())
    }

    async fn evaluate(&self, _: &str) -> stepwright_browser::Result<serde_json::Value> {
        Ok(json!({ "url": self.url.lock().unwrap().clone(), "title": "Example" }))
    }

    async fn screenshot(&self, _: &Path, _: bool) -> stepwright_browser::Result<()> {
        Ok(())
    }

    async fn url(&self) -> stepwright_browser::Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }
}

#[tokio::test]
async fn test_message_to_summary() {
    let mut job = parse_job(
        br#"{
            "testCaseId": "tc-7", "testCaseName": "Sign in",
            "testSteps": [
                {"stepId": "s2", "order": "2", "description": "Click on Sign in"},
                {"stepId": "s1", "order": "1", "description": "Open https://example.com"}
            ]
        }"#,
    )
    .unwrap();

    let provider = MockProvider::with_responses(vec![
        // Full driver script in a fence; scaffolding is stripped
        "```python\nfrom playwright.sync_api import sync_playwright\n\nwith sync_playwright() as p:\n    browser = p.chromium.launch()\n    page = browser.new_page()\n    page.goto(\"https://example.com\")\n    browser.close()\n```".to_string(),
        "await page.getByRole('button', { name: 'Sign in' }).click();".to_string(),
    ]);
    let provider = Arc::new(provider);
    let synthesizer = Synthesizer::new(provider.clone());
    let executor = RetryExecutor::new(synthesizer, RetryPolicy::default());
    let shots = tempfile::tempdir().unwrap();
    let runner = JobRunner::new(executor, Arc::new(LogStatusSink), ArtifactStore::new(shots.path()));

    let page = RecordingPage::default();
    let report = runner.run(Some(&page), &mut job).await;

    assert!(report.all_succeeded(), "{}", report.summary);
    assert_eq!(report.job_id, "tc-7");
    assert_eq!(
        report.summary.lines(),
        vec!["[SUCCESS] Open https://example.com", "[SUCCESS] Click on Sign in"]
    );
    assert_eq!(provider.call_count(), 2);
    assert!(job.steps.iter().all(|s| s.status == StepStatus::Success));

    let log = page.log.lock().unwrap().clone();
    assert_eq!(log[0], "goto https://example.com/ load");
    assert!(log[1].starts_with("get_by_role(\"button\", name=\"Sign in\")"), "{:?}", log);

    let shot_names: Vec<String> = report
        .steps
        .iter()
        .filter_map(|s| s.screenshot.as_ref())
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert_eq!(shot_names, vec!["screenshot_1.png", "screenshot_2.png"]);
}
