use super::ast::{ActionScript, Statement, WaitCondition};
use crate::error::{Error, Result};
use crate::page::{LoadState, Page};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Executes parsed scripts against a [`Page`], one statement at a time
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    action_timeout: Duration,
    navigation_timeout: Duration,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(30))
    }
}

impl ScriptRunner {
    /// Runner with the given default timeouts
    pub fn new(action_timeout: Duration, navigation_timeout: Duration) -> Self {
        Self {
            action_timeout,
            navigation_timeout,
        }
    }

    /// Run every statement in order; stops at the first error
    #[instrument(skip_all, fields(statements = script.statements.len()))]
    pub async fn run(&self, page: &dyn Page, script: &ActionScript) -> Result<()> {
        self.run_block(page, &script.statements).await
    }

    fn run_block<'a>(
        &'a self,
        page: &'a dyn Page,
        statements: &'a [Statement],
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            for statement in statements {
                self.run_statement(page, statement).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn run_statement(&self, page: &dyn Page, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Navigate { url, wait_until } => {
                let url = resolve_url(url)?;
                debug!(url = %url, "navigate");
                page.goto(
                    &url,
                    wait_until.unwrap_or(LoadState::Load),
                    self.navigation_timeout,
                )
                .await
            }
            Statement::Act {
                locator,
                action,
                timeout,
            } => {
                debug!(locator = %locator, action = action.method(), "act");
                page.perform(locator, action, timeout.unwrap_or(self.action_timeout))
                    .await
            }
            Statement::WaitFor(WaitCondition::LoadState { state, timeout }) => {
                page.wait_for_load_state(*state, timeout.unwrap_or(self.navigation_timeout))
                    .await
            }
            Statement::WaitFor(WaitCondition::Timeout(duration)) => {
                page.wait_for_timeout(*duration).await
            }
            Statement::WaitFor(WaitCondition::Locator { locator, timeout }) => {
                page.wait_for_locator(locator, timeout.unwrap_or(self.action_timeout))
                    .await
            }
            Statement::Evaluate { script } => {
                debug!("evaluating unsandboxed page script");
                page.evaluate(script).await.map(|_| ())
            }
            Statement::Fallback(alternatives) => {
                let mut last_error = None;
                for (i, block) in alternatives.iter().enumerate() {
                    match self.run_block(page, block).await {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            debug!(alternative = i, error = %e, "fallback alternative failed");
                            last_error = Some(e);
                        }
                    }
                }
                match last_error {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Absolute URL for a navigation target; bare hosts get `https://`
pub fn resolve_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") || trimmed.starts_with("about:") || trimmed.starts_with("data:") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    url::Url::parse(&candidate)
        .map(|u| u.to_string())
        .map_err(|_| Error::InvalidUrl(raw.to_string()))
}
