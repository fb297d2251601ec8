//! Retry loop integration tests
//!
//! Drives `JobRunner` with a scripted page, a queued mock provider and a
//! recording status sink.

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepwright_browser::{Act, LoadState, Locator, Page};
use stepwright_core::{
    ArtifactStore, Error, Job, JobRunner, RetryExecutor, RetryPolicy, StatusSink, StatusUpdate,
    Step, StepStatus, Synthesizer,
};
use stepwright_llm::{Error as LlmError, MockProvider};

/// Scripted page: `perform` pops queued results (success when empty)
#[derive(Default)]
struct FakePage {
    perform_results: Mutex<VecDeque<Result<(), String>>>,
    performed: Mutex<Vec<String>>,
    navigations: Mutex<Vec<String>>,
    load_waits: Mutex<Vec<LoadState>>,
    screenshots: Mutex<Vec<PathBuf>>,
    captures: Mutex<usize>,
    current_url: Mutex<String>,
}

impl FakePage {
    fn failing(messages: &[&str]) -> Self {
        let page = Self::default();
        {
            let mut queue = page.perform_results.lock().unwrap();
            for m in messages {
                queue.push_back(Err(m.to_string()));
            }
        }
        *page.current_url.lock().unwrap() = "https://example.com/".to_string();
        page
    }

    fn always_failing() -> Self {
        let page = Self::failing(&[]);
        page.perform_results.lock().unwrap().push_back(Err("sentinel".into()));
        page
    }

    fn captures(&self) -> usize {
        *self.captures.lock().unwrap()
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, _: LoadState, _: Duration) -> stepwright_browser::Result<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        *self.current_url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn perform(
        &self,
        locator: &Locator,
        _: &Act,
        _: Duration,
    ) -> stepwright_browser::Result<()> {
        self.performed.lock().unwrap().push(locator.to_string());
        let mut queue = self.perform_results.lock().unwrap();
        let next = match queue.front() {
            // a lone sentinel fails forever, naming the locator
            Some(Err(m)) if m == "sentinel" && queue.len() == 1 => Err(format!(
                "Timeout 30000ms exceeded while waiting for {}: no element found",
                locator
            )),
            _ => queue.pop_front().unwrap_or(Ok(())),
        };
        next.map_err(stepwright_browser::Error::Action)
    }

    async fn wait_for_locator(&self, _: &Locator, _: Duration) -> stepwright_browser::Result<()> {
        Ok(())
    }

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        _: Duration,
    ) -> stepwright_browser::Result<()> {
        self.load_waits.lock().unwrap().push(state);
        Ok(())
    }

    async fn evaluate(&self, _: &str) -> stepwright_browser::Result<serde_json::Value> {
        *self.captures.lock().unwrap() += 1;
        Ok(json!({
            "url": self.current_url.lock().unwrap().clone(),
            "title": "Fake",
        }))
    }

    async fn screenshot(&self, path: &Path, _: bool) -> stepwright_browser::Result<()> {
        self.screenshots.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn url(&self) -> stepwright_browser::Result<String> {
        Ok(self.current_url.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct RecordingSink {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingSink {
    fn statuses(&self) -> Vec<(String, StepStatus)> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| (u.step_id.to_string(), u.status))
            .collect()
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn update(&self, update: &StatusUpdate) -> stepwright_core::Result<()> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

mock! {
    Sink {}

    #[async_trait]
    impl StatusSink for Sink {
        async fn update(&self, update: &StatusUpdate) -> stepwright_core::Result<()>;
    }
}

fn runner(mock: &MockProvider, sink: Arc<dyn StatusSink>, max_retries: u32) -> JobRunner {
    let synthesizer = Synthesizer::new(Arc::new(mock.clone()));
    let executor = RetryExecutor::new(
        synthesizer,
        RetryPolicy::default().with_max_retries(max_retries),
    );
    JobRunner::new(executor, sink, ArtifactStore::new("shots"))
}

fn click_responses(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("page.get_by_text(\"Sign in {}\").click()", i))
        .collect()
}

#[tokio::test]
async fn test_exhausted_retries_record_last_error() {
    let mock = MockProvider::with_responses(click_responses(5));
    let sink = Arc::new(RecordingSink::default());
    let page = FakePage::always_failing();
    let mut job = Job::new("sign in", vec![Step::new("step-1", 1, "Click on Sign in")]);

    let report = runner(&mock, sink.clone(), 4)
        .run(Some(&page), &mut job)
        .await;

    // first synthesis plus exactly four repairs
    assert_eq!(mock.call_count(), 5);
    let step = &report.steps[0];
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(
        step.error.as_deref(),
        Some("Timeout 30000ms exceeded while waiting for get_by_text(\"Sign in 4\"): no element found")
    );
    let ordinals: Vec<u32> = step.attempts.iter().map(|a| a.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2, 3, 4]);
    assert!(step.screenshot.is_none());
    assert!(page.screenshots.lock().unwrap().is_empty());

    // a fresh capture seeds every attempt
    assert_eq!(page.captures(), 5);

    // each repair prompt carries the previous attempt's error
    let requests = mock.requests();
    for (i, request) in requests.iter().enumerate().skip(1) {
        let user = &request.messages[1].content;
        let previous = format!("get_by_text(\"Sign in {}\"): no element found", i - 1);
        assert!(user.contains(&previous), "attempt {} prompt lacks prior error", i);
        assert!(user.contains(&format!("Retry attempt: {}", i)));
        assert!(user.contains("Action failed: Click on Sign in"));
    }
    assert!(requests[0].messages[1].content.contains("Retry attempt: First attempt"));

    assert_eq!(
        sink.statuses(),
        vec![
            ("step-1".to_string(), StepStatus::Executing),
            ("step-1".to_string(), StepStatus::Failed),
        ]
    );
    let updates = sink.updates.lock().unwrap();
    assert_eq!(updates[1].error, step.error);
    assert_eq!(job.steps[0].status, StepStatus::Failed);
}

#[tokio::test]
async fn test_success_on_third_attempt_stops_retrying() {
    let mock = MockProvider::with_responses(click_responses(5));
    let sink = Arc::new(RecordingSink::default());
    let page = FakePage::failing(&["no element found", "element is not visible"]);
    let mut job = Job::new("sign in", vec![Step::new("step-1", 1, "Click on Sign in")]);

    let report = runner(&mock, sink.clone(), 4)
        .run(Some(&page), &mut job)
        .await;

    assert_eq!(mock.call_count(), 3);
    let step = &report.steps[0];
    assert_eq!(step.status, StepStatus::Success);
    assert_eq!(step.attempts.len(), 3);
    assert!(step.attempts[2].outcome.is_success());
    assert_eq!(step.attempts[1].outcome.error(), Some("element is not visible"));

    let screenshots = page.screenshots.lock().unwrap().clone();
    assert_eq!(screenshots, vec![PathBuf::from("shots/screenshot_1.png")]);
    assert_eq!(step.screenshot.as_deref(), Some(Path::new("shots/screenshot_1.png")));

    assert_eq!(
        *page.load_waits.lock().unwrap(),
        LoadState::SETTLE_ORDER.to_vec()
    );
    assert_eq!(
        sink.statuses(),
        vec![
            ("step-1".to_string(), StepStatus::Executing),
            ("step-1".to_string(), StepStatus::Success),
        ]
    );
    assert!(report.all_succeeded());
    assert_eq!(report.summary.lines(), vec!["[SUCCESS] Click on Sign in"]);
}

#[tokio::test]
async fn test_missing_page_fails_without_retries() {
    let mock = MockProvider::with_responses(click_responses(5));
    let sink = Arc::new(RecordingSink::default());
    let mut job = Job::new("no browser", vec![Step::new("step-1", 1, "Click on Sign in")]);

    let report = runner(&mock, sink.clone(), 4).run(None, &mut job).await;

    assert_eq!(mock.call_count(), 0);
    assert_eq!(report.steps[0].status, StepStatus::Failed);
    assert_eq!(report.steps[0].error.as_deref(), Some("no active page"));
    assert!(report.steps[0].attempts.is_empty());
    assert_eq!(
        report.summary.lines(),
        vec!["[FAILED] Click on Sign in (Error: no active page)"]
    );
    assert_eq!(sink.statuses().len(), 2);
}

#[tokio::test]
async fn test_generation_failure_navigates_to_instruction_url() {
    let mock = MockProvider::new();
    mock.push_error(LlmError::ServerError("unavailable".to_string()));
    let sink = Arc::new(RecordingSink::default());
    let page = FakePage::failing(&[]);
    let mut job = Job::from_prompts("legacy", ["Open https://example.com"]);

    let report = runner(&mock, sink, 4).run(Some(&page), &mut job).await;

    assert!(report.all_succeeded());
    assert_eq!(*page.navigations.lock().unwrap(), vec!["https://example.com/"]);
    assert_eq!(
        report.steps[0].attempts[0].normalized_code,
        "page.goto(\"https://example.com\", wait_until=\"load\")"
    );
}

#[tokio::test]
async fn test_unparseable_script_counts_as_failed_attempt() {
    let mock = MockProvider::with_responses([
        "import os\nos.system('ls')",
        "```python\npage.get_by_role(\"button\", name=\"Sign in\").click()\n```",
    ]);
    let sink = Arc::new(RecordingSink::default());
    let page = FakePage::failing(&[]);
    let mut job = Job::new("sign in", vec![Step::new("step-1", 1, "Click on Sign in")]);

    let report = runner(&mock, sink, 4).run(Some(&page), &mut job).await;

    let step = &report.steps[0];
    assert_eq!(step.status, StepStatus::Success);
    assert_eq!(step.attempts.len(), 2);
    assert!(step.attempts[0]
        .outcome
        .error()
        .unwrap()
        .starts_with("invalid action script: line 1"));
    assert_eq!(
        *page.performed.lock().unwrap(),
        vec!["get_by_role(\"button\", name=\"Sign in\")"]
    );
    let retry_prompt = &mock.requests()[1].messages[1].content;
    assert!(retry_prompt.contains("allowed vocabulary"));
}

#[tokio::test]
async fn test_steps_run_in_order_and_sink_errors_are_swallowed() {
    let mut sink = MockSink::new();
    sink.expect_update()
        .times(4)
        .returning(|_| Err(Error::Configuration("sink down".to_string())));

    let mock = MockProvider::with_responses([
        "page.goto(\"https://example.com/login\")",
        "page.get_by_label(\"Email\").fill(\"a@b.c\")",
    ]);
    let page = FakePage::failing(&[]);
    let mut job = Job::new(
        "login",
        vec![
            Step::new("a", 1, "Open the login page"),
            Step::new("b", 2, "").with_data("Type a@b.c into Email"),
        ],
    );

    let report = runner(&mock, Arc::new(sink), 0)
        .run(Some(&page), &mut job)
        .await;

    assert!(report.all_succeeded());
    assert_eq!(
        report.summary.lines(),
        vec!["[SUCCESS] Open the login page", "[SUCCESS] Type a@b.c into Email"]
    );
    assert_eq!(
        *page.screenshots.lock().unwrap(),
        vec![
            PathBuf::from("shots/screenshot_1.png"),
            PathBuf::from("shots/screenshot_2.png")
        ]
    );
    assert!(job.steps.iter().all(|s| s.status == StepStatus::Success));
}

#[tokio::test]
async fn test_zero_retries_runs_once() {
    let mock = MockProvider::with_responses(click_responses(3));
    let sink = Arc::new(RecordingSink::default());
    let page = FakePage::always_failing();
    let mut job = Job::new("once", vec![Step::new("s", 1, "Click on Sign in")]);

    let report = runner(&mock, sink, 0).run(Some(&page), &mut job).await;

    assert_eq!(mock.call_count(), 1);
    assert_eq!(report.steps[0].attempts.len(), 1);
    assert_eq!(report.steps[0].status, StepStatus::Failed);
}
