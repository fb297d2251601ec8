//! Job sources and the intake pump
//!
//! A [`JobSource`] yields complete jobs. [`run_intake`] drains a source into
//! a bounded channel consumed by the execution loop; a full channel blocks the
//! source, so jobs queue in arrival order and none is overwritten.

use async_trait::async_trait;
use stepwright_core::Job;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Something that yields jobs
#[async_trait]
pub trait JobSource: Send {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Next job, or `None` once the source is exhausted
    async fn next_job(&mut self) -> Option<Job>;
}

/// Forward jobs from `source` into `jobs` until the source is exhausted,
/// the receiver is dropped, or `shutdown` fires. Returns the number of jobs
/// handed off.
pub async fn run_intake<S>(
    source: &mut S,
    jobs: mpsc::Sender<Job>,
    shutdown: CancellationToken,
) -> usize
where
    S: JobSource + ?Sized,
{
    let name = source.name().to_string();
    info!(source = %name, "job intake started");
    let mut forwarded = 0;

    loop {
        let job = tokio::select! {
            job = source.next_job() => job,
            _ = shutdown.cancelled() => {
                info!(source = %name, "job intake shutting down");
                break;
            }
        };
        let Some(job) = job else {
            info!(source = %name, "job source exhausted");
            break;
        };

        debug!(job_id = %job.id, steps = job.steps.len(), "handing off job");
        tokio::select! {
            sent = jobs.send(job) => {
                if sent.is_err() {
                    warn!(source = %name, "execution loop gone, stopping intake");
                    break;
                }
                forwarded += 1;
            }
            _ = shutdown.cancelled() => {
                info!(source = %name, "job intake shutting down");
                break;
            }
        }
    }

    forwarded
}
