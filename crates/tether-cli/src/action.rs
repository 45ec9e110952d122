//! # Action Subcommand
//!
//! `tether action run` enqueues one action on a unit, waits for it to reach
//! a terminal state, and prints the result:
//!
//! ```json
//! {"id": "dev/backup/42", "status": "completed", "output": {"path": "/backups/1.tar"}}
//! ```

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use tether_client::{action_resource_id, EnqueueAction, TetherClient};
use tether_core::ActionHandle;
use tether_wait::{await_completion, Cancellation};

use crate::{parse_param, WaitArgs};

/// Arguments for the `tether action` subcommand.
#[derive(Args, Debug)]
pub struct ActionArgs {
    #[command(subcommand)]
    pub command: ActionCommand,
}

/// Action subcommands.
#[derive(Subcommand, Debug)]
pub enum ActionCommand {
    /// Enqueue an action and wait for it to complete.
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Model the unit belongs to.
    #[arg(long)]
    pub model: String,

    /// Unit to run on, as `application/N` (e.g. "db/0").
    #[arg(long)]
    pub receiver: String,

    /// Action name.
    #[arg(long)]
    pub name: String,

    /// Action parameter as key=value. Repeatable.
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, serde_json::Value)>,
}

impl RunArgs {
    pub fn to_action(&self) -> EnqueueAction {
        EnqueueAction {
            receiver: self.receiver.clone(),
            name: self.name.clone(),
            parameters: self.params.iter().cloned().collect(),
        }
    }
}

/// Execute the action subcommand.
pub async fn run_action(
    args: &ActionArgs,
    client: &TetherClient,
    wait: &WaitArgs,
    cancel: &Cancellation,
) -> Result<u8> {
    match &args.command {
        ActionCommand::Run(run) => run_one(run, client, wait, cancel).await,
    }
}

async fn run_one(
    args: &RunArgs,
    client: &TetherClient,
    wait: &WaitArgs,
    cancel: &Cancellation,
) -> Result<u8> {
    let handle = client
        .actions()
        .enqueue(&args.model, &args.to_action())
        .await
        .with_context(|| format!("enqueueing {} on {}", args.name, args.receiver))?;

    let actions = client.actions().clone();
    let fetch = move |handle: ActionHandle| {
        let actions = actions.clone();
        async move { actions.result(&handle).await }
    };
    let result = await_completion(handle.clone(), fetch, wait.poll_interval(), cancel)
        .await
        .with_context(|| format!("waiting for action {handle}"))?;

    let report = serde_json::json!({
        "id": action_resource_id(&handle.model, &args.name, &handle.id),
        "status": result.status,
        "output": result.output_strings(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}
