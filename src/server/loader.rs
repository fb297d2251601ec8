//! Configuration loading
//!
//! Embedded defaults, then optional files, then environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("STEPWRIGHT_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // STEPWRIGHT_STATUS__SINK=postgres sets status.sink
        .add_source(
            Environment::with_prefix("STEPWRIGHT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("intake.nats.servers")
                .with_list_parse_key("browser.args"),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.intake.nats.subject, "testlab.testcase.executed");
        assert_eq!(config.intake.nats.queue, "qg_browser_automation");
        assert_eq!(config.executor.network_idle_timeout_ms, 10_000);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert!(config.browser.headless);
    }
}
