//! # tether-cli -- Command-Line Driver for tether
//!
//! Provides the `tether` command-line interface.
//!
//! ## Subcommands
//!
//! - `tether action run` -- Enqueue an action and wait for it to complete.
//! - `tether access secret` -- Reconcile application access to a secret.
//! - `tether access ssh-keys` -- Reconcile the SSH keys of a model.
//!
//! ```bash
//! tether action run --model dev --receiver db/0 --name backup --param target=s3
//! tether access secret --model-uuid 6f1c... --secret-id coj8... --previous a,b --desired b,c
//! tether access ssh-keys --model dev --previous alice@laptop --key-file ~/.ssh/id_ed25519.pub
//! ```
//!
//! The control plane is configured through `TETHER_API_URL`,
//! `TETHER_API_TOKEN` and `TETHER_TIMEOUT_SECS`. Results are printed to
//! stdout as JSON; logs go to stderr.

pub mod access;
pub mod action;

use std::future::Future;
use std::time::Duration;

use clap::Args;
use tether_core::MembershipSet;
use tether_wait::{CancelHandle, Cancellation};

/// Exit code for a run stopped by Ctrl-C.
pub const EXIT_ABORTED: u8 = 130;

/// Polling and deadline flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Milliseconds between polls of the control plane.
    #[arg(
        long,
        global = true,
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,

    /// Give up after this many seconds. No deadline when omitted.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,
}

impl WaitArgs {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// A cancellation carrying the deadline, paired with the handle that
    /// aborts it.
    pub fn cancellation(&self) -> (CancelHandle, Cancellation) {
        let (handle, cancel) = Cancellation::new();
        let cancel = match self.timeout_secs {
            Some(secs) => cancel.with_timeout(Duration::from_secs(secs)),
            None => cancel,
        };
        (handle, cancel)
    }
}

/// Turn interrupts into cancellation of a running wait.
///
/// The first interrupt fires `abort`, so the wait stops at its next poll.
/// Returns `true` on the second interrupt; the caller then exits without
/// waiting any longer. Returns `false` if the interrupt source fails.
pub async fn relay_interrupts<F, Fut, E>(abort: CancelHandle, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    tracing::warn!("interrupted, stopping at the next poll (interrupt again to exit now)");
    abort.cancel();
    interrupt().await.is_ok()
}

/// Run `work` unless an interrupt arrives first. `None` means interrupted.
///
/// An interrupt source that fails leaves `work` to finish on its own.
pub async fn unless_interrupted<W, I, E>(work: W, interrupt: I) -> Option<W::Output>
where
    W: Future,
    I: Future<Output = Result<(), E>>,
{
    let interrupted = async {
        if interrupt.await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        output = work => Some(output),
        _ = interrupted => None,
    }
}

/// Parse a comma-separated member list. Blank entries are ignored.
pub fn parse_members(raw: &str) -> Result<MembershipSet<String>, String> {
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parse a `key=value` action parameter. Values that are valid JSON keep
/// their type; anything else is a string.
pub fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in {raw:?}"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
