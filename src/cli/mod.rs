//! CLI module for Stepwright
//!
//! - `serve`: consume jobs from NATS until interrupted
//! - `run`: execute one job from a file or the command line

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

pub mod run;

/// Stepwright browser automation worker
#[derive(Parser, Debug)]
#[command(name = "stepwright")]
#[command(about = "Natural-language browser automation with self-repairing retries")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume jobs from the message bus
    Serve,
    /// Execute one job and exit
    Run {
        /// Job message file (`testSteps` or `prompts`)
        #[arg(long, conflicts_with = "steps", required_unless_present = "steps")]
        job: Option<PathBuf>,
        /// Step instruction; repeat for several steps
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Page to open before the first step
        #[arg(long)]
        url: Option<String>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Some(Commands::Serve) => {
            let config = crate::server::load_config()?;
            crate::server::run(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Run { job, steps, url }) => {
            let config = crate::server::load_config()?;
            let source = match job {
                Some(path) => run::JobInput::File(path),
                None => run::JobInput::Steps(steps),
            };
            let succeeded = run::run(config, source, url).await?;
            Ok(if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_steps() {
        let cli = Cli::try_parse_from([
            "stepwright",
            "run",
            "--step",
            "Open https://example.com",
            "--step",
            "Click on Sign in",
            "--url",
            "https://example.com",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run { job, steps, url }) => {
                assert!(job.is_none());
                assert_eq!(steps.len(), 2);
                assert_eq!(url.as_deref(), Some("https://example.com"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_a_job() {
        assert!(Cli::try_parse_from(["stepwright", "run"]).is_err());
        assert!(Cli::try_parse_from(["stepwright", "run", "--job", "j.json", "--step", "x"]).is_err());
    }

    #[test]
    fn test_global_json_flag() {
        let cli = Cli::try_parse_from(["stepwright", "serve", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }
}
