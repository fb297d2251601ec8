//! Execution pipeline assembly: provider, synthesizer, executor, sink, artifacts

use super::config::{AppConfig, SinkKind, StatusConfig};
use super::providers::resolve_llm_provider;
use anyhow::{Context, Result};
use std::sync::Arc;
use stepwright_browser::{BrowserSession, Page};
use stepwright_core::{
    ArtifactStore, Job, JobReport, JobRunner, LogStatusSink, PostgresStatusSink, RetryExecutor,
    StatusSink, Synthesizer,
};
use tracing::{error, info, warn};

/// Everything needed to run jobs, minus the browser
pub struct Pipeline {
    runner: JobRunner,
    postgres: Option<Arc<PostgresStatusSink>>,
}

impl Pipeline {
    /// Build from configuration
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let provider = resolve_llm_provider(&config.llm)?;
        let synthesizer = Synthesizer::new(provider).with_config(config.llm.synthesizer());
        let executor = RetryExecutor::new(synthesizer, config.executor.clone());

        let (sink, postgres) = build_status_sink(&config.status).await;

        tokio::fs::create_dir_all(&config.artifacts.dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create screenshot directory {}",
                    config.artifacts.dir.display()
                )
            })?;
        let artifacts =
            ArtifactStore::new(&config.artifacts.dir).with_full_page(config.artifacts.full_page);

        info!(
            max_retries = config.executor.max_retries,
            screenshots = %config.artifacts.dir.display(),
            "Execution pipeline ready"
        );
        Ok(Self {
            runner: JobRunner::new(executor, sink, artifacts),
            postgres,
        })
    }

    /// Run one job on the session's page, launching the browser if needed
    /// and resetting it afterwards. A failed launch still runs the job so
    /// every step is reported as failed.
    pub async fn execute(&self, session: &mut BrowserSession, job: &mut Job) -> JobReport {
        if let Err(e) = session.launch().await {
            error!(error = %e, job_id = %job.id, "Browser launch failed");
        }
        let report = self
            .runner
            .run(session.page().map(|p| p as &dyn Page), job)
            .await;
        if let Err(e) = session.reset().await {
            warn!(error = %e, "Browser reset failed");
        }
        report
    }

    /// Release the status sink
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.postgres {
            pool.close().await;
        }
    }
}

/// A sink that cannot connect degrades to logging; status writes are never
/// allowed to stop execution
async fn build_status_sink(
    config: &StatusConfig,
) -> (Arc<dyn StatusSink>, Option<Arc<PostgresStatusSink>>) {
    match config.sink {
        SinkKind::Log => (Arc::new(LogStatusSink), None),
        SinkKind::Postgres => match PostgresStatusSink::connect(&config.postgres).await {
            Ok(sink) => {
                let sink = Arc::new(sink);
                let shared: Arc<dyn StatusSink> = sink.clone();
                (shared, Some(sink))
            }
            Err(e) => {
                warn!(error = %e, "Postgres status sink unavailable, logging status updates instead");
                (Arc::new(LogStatusSink), None)
            }
        },
    }
}
