//! Long-running service: NATS intake feeding the execution loop

use super::config::AppConfig;
use super::pipeline::Pipeline;
use anyhow::{Context, Result};
use std::time::Duration;
use stepwright_browser::BrowserSession;
use stepwright_channels::{run_intake, NatsJobSource};
use stepwright_core::Job;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run until interrupted
pub async fn run(config: AppConfig) -> Result<()> {
    let pipeline = Pipeline::build(&config).await?;

    let mut source = NatsJobSource::connect(&config.intake.nats)
        .await
        .context("Failed to connect to NATS")?;

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let (tx, rx) = mpsc::channel::<Job>(config.intake.queue_capacity.max(1));
    let intake_shutdown = shutdown.clone();
    let intake = tokio::spawn(async move {
        let forwarded = run_intake(&mut source, tx, intake_shutdown).await;
        if let Err(e) = source.close().await {
            warn!(error = %e, "Failed to close NATS subscription");
        }
        forwarded
    });
    info!(
        subject = %config.intake.nats.subject,
        queue_capacity = config.intake.queue_capacity,
        "Waiting for jobs"
    );

    let mut session = BrowserSession::new(config.browser.clone());
    let executed = execution_loop(&pipeline, &mut session, rx, &shutdown).await;

    // Stop the listener if the loop ended on its own
    shutdown.cancel();
    session.teardown().await;
    pipeline.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(5), intake).await {
        Ok(Ok(forwarded)) => info!(forwarded, executed, "Stepwright shutdown complete"),
        Ok(Err(e)) => warn!(error = %e, "Intake task failed"),
        Err(_) => warn!("Intake shutdown timeout"),
    }
    Ok(())
}

/// Receive and run jobs one at a time until the channel closes or shutdown
/// is requested. An interrupted job is abandoned mid-step.
async fn execution_loop(
    pipeline: &Pipeline,
    session: &mut BrowserSession,
    mut jobs: mpsc::Receiver<Job>,
    shutdown: &CancellationToken,
) -> usize {
    let mut executed = 0;
    loop {
        let job = tokio::select! {
            job = jobs.recv() => job,
            _ = shutdown.cancelled() => break,
        };
        let Some(mut job) = job else {
            info!("Job channel closed");
            break;
        };

        tokio::select! {
            report = pipeline.execute(session, &mut job) => {
                executed += 1;
                info!(
                    job_id = %report.job_id,
                    succeeded = report.all_succeeded(),
                    "Job finished"
                );
            }
            _ = shutdown.cancelled() => {
                warn!(job_id = %job.id, "Shutdown requested, abandoning running job");
                break;
            }
        }
    }
    executed
}

/// Cancel `shutdown` on Ctrl-C
pub(crate) fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
        }
    });
}
