//! One-shot execution

use crate::server::config::AppConfig;
use crate::server::{spawn_signal_handler, Pipeline};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use stepwright_browser::{BrowserSession, LoadState, Page};
use stepwright_channels::{FileJobSource, JobSource};
use stepwright_core::Job;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Where the job comes from
#[derive(Debug)]
pub enum JobInput {
    /// Job message file
    File(PathBuf),
    /// Instructions given on the command line
    Steps(Vec<String>),
}

impl JobInput {
    async fn load(self) -> Result<Job> {
        match self {
            Self::File(path) => {
                let mut source = FileJobSource::open(&path)
                    .await
                    .with_context(|| format!("Failed to load job file {}", path.display()))?;
                source
                    .next_job()
                    .await
                    .context("Job file produced no job")
            }
            Self::Steps(steps) => {
                let steps: Vec<String> = steps
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if steps.is_empty() {
                    bail!("no steps given");
                }
                Ok(Job::from_prompts("command line", steps))
            }
        }
    }
}

/// Execute one job; returns whether every step succeeded
pub async fn run(config: AppConfig, input: JobInput, start_url: Option<String>) -> Result<bool> {
    let mut job = input.load().await?;
    let pipeline = Pipeline::build(&config).await?;
    let mut session = BrowserSession::new(config.browser.clone());

    if let Some(url) = start_url.as_deref() {
        session.launch().await.context("Failed to launch browser")?;
        if let Some(page) = session.page() {
            let timeout = Duration::from_millis(config.executor.navigation_timeout_ms);
            page.goto(url, LoadState::Load, timeout)
                .await
                .with_context(|| format!("Failed to open {}", url))?;
            info!(url = %url, "Start page opened");
        }
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let outcome = tokio::select! {
        report = pipeline.execute(&mut session, &mut job) => {
            println!("{}", report.summary);
            Some(report.all_succeeded())
        }
        _ = shutdown.cancelled() => {
            warn!(job_id = %job.id, "Interrupted");
            None
        }
    };

    session.teardown().await;
    pipeline.shutdown().await;
    Ok(outcome.unwrap_or(false))
}
