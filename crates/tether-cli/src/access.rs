//! # Access Subcommand
//!
//! Reconciles a remote membership from the previously applied set to the
//! desired one. At most one grant call and one revoke call are made, grant
//! first. The result is printed as:
//!
//! ```json
//! {"id": "...", "granted": ["carol"], "revoked": ["alice"]}
//! ```
//!
//! ## Subcommands
//!
//! - `secret` -- Applications allowed to read a secret.
//! - `ssh-keys` -- SSH keys of a model, by key identifier.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use tether_access::{AccessReconciler, ReconcileOutcome};
use tether_client::{secret_resource_id, TetherClient};
use tether_core::MembershipSet;

use crate::parse_members;

/// Arguments for the `tether access` subcommand.
#[derive(Args, Debug)]
pub struct AccessArgs {
    #[command(subcommand)]
    pub command: AccessCommand,
}

/// Access subcommands.
#[derive(Subcommand, Debug)]
pub enum AccessCommand {
    /// Reconcile application access to a secret.
    Secret {
        /// UUID of the model the secret belongs to.
        #[arg(long)]
        model_uuid: Uuid,
        /// Secret identifier (e.g. "coj8mulh8b41e8nv6p90").
        #[arg(long)]
        secret_id: String,
        /// Applications granted by the previous run, comma-separated.
        #[arg(long, value_parser = parse_members, default_value = "")]
        previous: MembershipSet<String>,
        /// Applications that should have access, comma-separated.
        #[arg(long, value_parser = parse_members)]
        desired: MembershipSet<String>,
    },

    /// Reconcile the SSH keys of a model.
    SshKeys {
        /// Model name.
        #[arg(long)]
        model: String,
        /// Key identifiers installed by the previous run, comma-separated.
        #[arg(long, value_parser = parse_members, default_value = "")]
        previous: MembershipSet<String>,
        /// Key identifiers that should be installed. Defaults to every key
        /// read from --key-file.
        #[arg(long, value_parser = parse_members)]
        desired: Option<MembershipSet<String>>,
        /// File of OpenSSH public keys, one per line. Repeatable.
        #[arg(long = "key-file")]
        key_files: Vec<PathBuf>,
    },
}

/// Execute the access subcommand.
pub async fn run_access(args: &AccessArgs, client: &TetherClient) -> Result<u8> {
    match &args.command {
        AccessCommand::Secret {
            model_uuid,
            secret_id,
            previous,
            desired,
        } => {
            let grants = client.secrets().for_secret(*model_uuid, secret_id);
            let reconciler = AccessReconciler::new(grants);
            let outcome = reconciler
                .reconcile(previous, desired)
                .await
                .with_context(|| format!("reconciling access to secret {secret_id}"))?;
            print_outcome(&secret_resource_id(*model_uuid, secret_id), &outcome)?;
            Ok(0)
        }
        AccessCommand::SshKeys {
            model,
            previous,
            desired,
            key_files,
        } => {
            let payloads = read_key_files(key_files)?;
            let keys = client.ssh_keys().for_model(model, payloads);
            let desired = desired.clone().unwrap_or_else(|| keys.identifiers());
            let missing = desired.difference(&keys.identifiers());
            if !previous.is_superset(&missing) {
                bail!(
                    "no public key supplied for: {}",
                    missing.difference(previous).to_vec().join(", ")
                );
            }

            let reconciler = AccessReconciler::new(keys);
            let outcome = reconciler
                .reconcile(previous, &desired)
                .await
                .with_context(|| format!("reconciling ssh keys of model {model}"))?;
            print_outcome(model, &outcome)?;
            Ok(0)
        }
    }
}

/// Public key lines from `paths`, skipping blanks and `#` comments.
pub fn read_key_files(paths: &[PathBuf]) -> Result<Vec<String>> {
    let mut payloads = Vec::new();
    for path in paths {
        payloads.extend(read_key_file(path)?);
    }
    Ok(payloads)
}

fn read_key_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn print_outcome(id: &str, outcome: &ReconcileOutcome<String>) -> Result<()> {
    let report = serde_json::json!({
        "id": id,
        "granted": outcome.granted.to_vec(),
        "revoked": outcome.revoked.to_vec(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::debug!(
        id,
        granted = outcome.granted.len(),
        revoked = outcome.revoked.len(),
        "reconciled"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn key_files_skip_blanks_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# team keys").unwrap();
        writeln!(file, "ssh-ed25519 AAAA alice@laptop").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  ssh-rsa BBBB bob@desk  ").unwrap();

        let payloads = read_key_files(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(
            payloads,
            vec!["ssh-ed25519 AAAA alice@laptop", "ssh-rsa BBBB bob@desk"]
        );
    }

    #[test]
    fn missing_key_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_key_files(&[dir.path().join("absent.pub")]).unwrap_err();
        assert!(err.to_string().contains("absent.pub"));
    }
}
