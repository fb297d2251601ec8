//! Step status sinks
//!
//! One update per step transition, addressed by step id. Callers log and
//! swallow sink errors; losing a status write never stops execution.

use crate::error::{Error, Result};
use crate::model::{StepId, StepStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, instrument, warn};

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("TABLE_NAME is a compile-time constant")
});

/// One status transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Step being updated
    pub step_id: StepId,
    /// New status
    pub status: StepStatus,
    /// When the transition happened
    pub at: DateTime<Utc>,
    /// Failure message for `Failed`
    pub error: Option<String>,
}

impl StatusUpdate {
    /// An update stamped now
    #[must_use]
    pub fn new(step_id: StepId, status: StepStatus) -> Self {
        Self {
            step_id,
            status,
            at: Utc::now(),
            error: None,
        }
    }

    /// Attach a failure message
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Receives step status transitions
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Record one transition
    async fn update(&self, update: &StatusUpdate) -> Result<()>;
}

/// Writes transitions to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn update(&self, update: &StatusUpdate) -> Result<()> {
        info!(
            step_id = %update.step_id,
            status = %update.status,
            error = ?update.error,
            "step status"
        );
        Ok(())
    }
}

/// Postgres sink settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresSinkConfig {
    /// Connection URL
    pub url: String,
    /// Table holding steps
    pub table: String,
    /// Pool floor
    pub min_connections: u32,
    /// Pool ceiling
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresSinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            table: "test_steps".to_string(),
            min_connections: 1,
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

/// Updates the status column of the step table
#[derive(Debug, Clone)]
pub struct PostgresStatusSink {
    pool: PgPool,
    query: String,
}

impl PostgresStatusSink {
    /// Wrap an existing pool
    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        Ok(Self {
            pool,
            query: update_query(table)?,
        })
    }

    /// Connect a pool from settings
    pub async fn connect(config: &PostgresSinkConfig) -> Result<Self> {
        let query = update_query(&config.table)?;
        if config.url.is_empty() {
            return Err(Error::Configuration("status.postgres.url is empty".to_string()));
        }
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        info!(table = %config.table, "postgres status sink connected");
        Ok(Self { pool, query })
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StatusSink for PostgresStatusSink {
    #[instrument(skip(self, update), fields(step_id = %update.step_id, status = %update.status))]
    async fn update(&self, update: &StatusUpdate) -> Result<()> {
        let result = sqlx::query(&self.query)
            .bind(update.status.as_str())
            .bind(update.at)
            .bind(update.step_id.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            warn!("no step row matched the status update");
        }
        Ok(())
    }
}

/// Build the update statement; the table name is validated because it is
/// interpolated
fn update_query(table: &str) -> Result<String> {
    if !TABLE_NAME.is_match(table) {
        return Err(Error::Configuration(format!("invalid table name '{}'", table)));
    }
    Ok(format!(
        "UPDATE {} SET status = $1, updated_at = $2 WHERE id::text = $3",
        table
    ))
}
