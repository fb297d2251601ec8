//! NATS job intake
//!
//! Subscribes to the executed-test-case subject as a member of a queue
//! group, so several workers share the stream and each message reaches one
//! of them.

use crate::error::{Error, Result};
use crate::message::parse_job;
use crate::source::JobSource;
use async_nats::{Client, ConnectOptions, Subscriber};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stepwright_core::Job;
use tracing::{info, instrument, warn};

/// NATS connection and subscription settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Server URLs
    pub servers: Vec<String>,
    /// Subject carrying job messages
    pub subject: String,
    /// Queue group name
    pub queue: String,
    /// Initial connect timeout
    pub connect_timeout_secs: u64,
    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: usize,
    /// Delay between reconnect attempts
    pub reconnect_delay_secs: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            subject: "testlab.testcase.executed".to_string(),
            queue: "qg_browser_automation".to_string(),
            connect_timeout_secs: 10,
            max_reconnect_attempts: 5,
            reconnect_delay_secs: 2,
        }
    }
}

/// Job source backed by a NATS queue subscription
pub struct NatsJobSource {
    client: Client,
    subscriber: Subscriber,
    subject: String,
}

impl NatsJobSource {
    /// Connect and subscribe
    #[instrument(skip(config), fields(subject = %config.subject, queue = %config.queue))]
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        if config.servers.is_empty() {
            return Err(Error::Nats("no servers configured".to_string()));
        }
        let delay = Duration::from_secs(config.reconnect_delay_secs);
        let client = ConnectOptions::new()
            .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
            .max_reconnects(Some(config.max_reconnect_attempts))
            .reconnect_delay_callback(move |_| delay)
            .connect(config.servers.join(","))
            .await
            .map_err(|e| Error::Nats(e.to_string()))?;

        let subscriber = client
            .queue_subscribe(config.subject.clone(), config.queue.clone())
            .await
            .map_err(|e| Error::Nats(e.to_string()))?;

        info!(servers = ?config.servers, "subscribed to job subject");
        Ok(Self {
            client,
            subscriber,
            subject: config.subject.clone(),
        })
    }

    /// Unsubscribe and flush pending traffic
    pub async fn close(mut self) -> Result<()> {
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| Error::Nats(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| Error::Nats(e.to_string()))?;
        info!(subject = %self.subject, "nats subscription closed");
        Ok(())
    }
}

#[async_trait]
impl JobSource for NatsJobSource {
    fn name(&self) -> &str {
        "nats"
    }

    async fn next_job(&mut self) -> Option<Job> {
        while let Some(message) = self.subscriber.next().await {
            match parse_job(&message.payload) {
                Ok(job) => {
                    info!(job_id = %job.id, steps = job.steps.len(), subject = %message.subject, "job received");
                    return Some(job);
                }
                Err(e) => {
                    warn!(error = %e, bytes = message.payload.len(), "skipping malformed job message");
                }
            }
        }
        warn!(subject = %self.subject, "nats subscription ended");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NatsConfig::default();
        assert_eq!(config.servers, vec!["nats://localhost:4222"]);
        assert_eq!(config.subject, "testlab.testcase.executed");
        assert_eq!(config.queue, "qg_browser_automation");
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay_secs, 2);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: NatsConfig =
            serde_json::from_str(r#"{"servers": ["nats://bus:4222"], "queue": "workers"}"#).unwrap();
        assert_eq!(config.servers, vec!["nats://bus:4222"]);
        assert_eq!(config.queue, "workers");
        assert_eq!(config.subject, "testlab.testcase.executed");
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_servers() {
        let config = NatsConfig {
            servers: Vec::new(),
            ..NatsConfig::default()
        };
        assert!(matches!(NatsJobSource::connect(&config).await, Err(Error::Nats(_))));
    }
}
