//! One-shot job source reading a JSON job message from disk

use crate::error::Result;
use crate::message::parse_job;
use crate::source::JobSource;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use stepwright_core::Job;
use tracing::info;

/// Yields the job stored in one file, then ends
#[derive(Debug)]
pub struct FileJobSource {
    path: PathBuf,
    job: Option<Job>,
}

impl FileJobSource {
    /// Read and parse `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await?;
        let job = parse_job(&bytes)?;
        info!(path = %path.display(), job_id = %job.id, steps = job.steps.len(), "job file loaded");
        Ok(Self {
            path,
            job: Some(job),
        })
    }

    /// Source file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl JobSource for FileJobSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn next_job(&mut self) -> Option<Job> {
        self.job.take()
    }
}
