//! # tether CLI entry point
//!
//! Parses command-line arguments, loads the control-plane configuration
//! from the environment, and dispatches to subcommand handlers.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tether_cli::access::{run_access, AccessArgs};
use tether_cli::action::{run_action, ActionArgs};
use tether_cli::{relay_interrupts, unless_interrupted, WaitArgs, EXIT_ABORTED};
use tether_client::{ControlPlaneConfig, TetherClient};
use tether_core::ActionFailure;
use tether_wait::{CancelReason, WaitError};

/// Drive an eventually-consistent control plane to a declared state.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    wait: WaitArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run remote actions to completion.
    Action(ActionArgs),

    /// Reconcile secret access and SSH keys.
    Access(AccessArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "tether CLI starting");

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = ControlPlaneConfig::from_env().context("loading control plane configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let client = TetherClient::new(config)?;

    match &cli.command {
        Commands::Action(args) => {
            let (abort, cancel) = cli.wait.cancellation();
            tokio::spawn(async move {
                if relay_interrupts(abort, tokio::signal::ctrl_c).await {
                    std::process::exit(i32::from(EXIT_ABORTED));
                }
            });
            run_action(args, &client, &cli.wait, &cancel).await
        }
        Commands::Access(args) => {
            let work = run_access(args, &client);
            match unless_interrupted(work, tokio::signal::ctrl_c()).await {
                Some(result) => result,
                None => {
                    tracing::warn!("interrupted, reconciliation may be partially applied");
                    Ok(EXIT_ABORTED)
                }
            }
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<WaitError<ActionFailure>>() {
        Some(WaitError::Cancelled {
            reason: CancelReason::Aborted,
            ..
        }) => EXIT_ABORTED,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_cli::access::AccessCommand;
    use tether_cli::action::ActionCommand;

    #[test]
    fn cli_parse_action_run() {
        let cli = Cli::try_parse_from([
            "tether",
            "action",
            "run",
            "--model",
            "dev",
            "--receiver",
            "db/0",
            "--name",
            "backup",
            "--param",
            "target=s3",
            "--param",
            "keep=7",
        ])
        .unwrap();
        let Commands::Action(args) = cli.command else {
            panic!("expected action");
        };
        let ActionCommand::Run(run) = args.command;
        assert_eq!(run.model, "dev");
        assert_eq!(run.receiver, "db/0");
        assert_eq!(run.params.len(), 2);
        assert_eq!(run.params[1], ("keep".to_string(), serde_json::json!(7)));
    }

    #[test]
    fn cli_parse_wait_flags_are_global() {
        let cli = Cli::try_parse_from([
            "tether",
            "action",
            "run",
            "--model",
            "dev",
            "--receiver",
            "db/0",
            "--name",
            "backup",
            "--poll-interval-ms",
            "250",
            "--timeout-secs",
            "60",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.wait.poll_interval_ms, 250);
        assert_eq!(cli.wait.timeout_secs, Some(60));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn cli_parse_wait_defaults() {
        let cli = Cli::try_parse_from([
            "tether",
            "access",
            "secret",
            "--model-uuid",
            "6f1c1a7e-3b4d-4c8e-9a51-0e2f3d4c5b6a",
            "--secret-id",
            "s1",
            "--desired",
            "b,c",
        ])
        .unwrap();
        assert_eq!(cli.wait.poll_interval_ms, 1000);
        assert_eq!(cli.wait.timeout_secs, None);
    }

    #[test]
    fn cli_parse_access_secret() {
        let cli = Cli::try_parse_from([
            "tether",
            "access",
            "secret",
            "--model-uuid",
            "6f1c1a7e-3b4d-4c8e-9a51-0e2f3d4c5b6a",
            "--secret-id",
            "coj8mulh8b41e8nv6p90",
            "--previous",
            "a,b",
            "--desired",
            "b,c",
        ])
        .unwrap();
        let Commands::Access(args) = cli.command else {
            panic!("expected access");
        };
        match args.command {
            AccessCommand::Secret {
                previous, desired, ..
            } => {
                assert_eq!(previous.to_vec(), vec!["a", "b"]);
                assert_eq!(desired.to_vec(), vec!["b", "c"]);
            }
            other => panic!("expected secret, got {other:?}"),
        }
    }

    #[test]
    fn cli_parse_access_secret_rejects_bad_uuid() {
        let result = Cli::try_parse_from([
            "tether",
            "access",
            "secret",
            "--model-uuid",
            "not-a-uuid",
            "--secret-id",
            "s1",
            "--desired",
            "b",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_rejects_zero_poll_interval_and_timeout() {
        let run = |flag: &str| {
            Cli::try_parse_from([
                "tether",
                "action",
                "run",
                "--model",
                "dev",
                "--receiver",
                "db/0",
                "--name",
                "backup",
                flag,
                "0",
            ])
        };
        assert!(run("--poll-interval-ms").is_err());
        assert!(run("--timeout-secs").is_err());
    }

    #[test]
    fn cli_parse_access_ssh_keys() {
        let cli = Cli::try_parse_from([
            "tether",
            "access",
            "ssh-keys",
            "--model",
            "dev",
            "--previous",
            "alice@laptop",
            "--key-file",
            "a.pub",
            "--key-file",
            "b.pub",
        ])
        .unwrap();
        let Commands::Access(args) = cli.command else {
            panic!("expected access");
        };
        match args.command {
            AccessCommand::SshKeys {
                model,
                previous,
                desired,
                key_files,
            } => {
                assert_eq!(model, "dev");
                assert_eq!(previous.len(), 1);
                assert!(desired.is_none());
                assert_eq!(key_files.len(), 2);
            }
            other => panic!("expected ssh-keys, got {other:?}"),
        }
    }

    #[test]
    fn aborted_wait_maps_to_exit_130() {
        let err: WaitError<ActionFailure> = WaitError::Cancelled {
            reason: CancelReason::Aborted,
            fetches: 3,
        };
        let err = anyhow::Error::new(err).context("waiting for action dev/42");
        assert_eq!(exit_code(&err), EXIT_ABORTED);

        let err = anyhow::anyhow!("unrelated");
        assert_eq!(exit_code(&err), 1);
    }
}
