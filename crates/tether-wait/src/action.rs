//! # Action Convergence
//!
//! Waits for an enqueued remote action to finish.
//!
//! | Status | Outcome |
//! |--------|---------|
//! | `pending`, `running` | retry |
//! | `completed` | accept |
//! | `failed` | fatal, [`ActionFailure::Failed`] |
//! | anything else | fatal, [`ActionFailure::UnknownStatus`] |
//!
//! A result carrying an `error` is fatal whatever its status. A fetch that
//! fails with [`RetryReadError`] (the action is not visible yet) keeps
//! polling.

use std::future::Future;
use std::time::Duration;

use tether_core::{
    ActionFailure, ActionHandle, ActionResult, ActionStatus, AssertOutcome, BoxError,
    ErrorClassifier, RetryReadError,
};

use crate::cancel::Cancellation;
use crate::poll::{wait_for, WaitConfig, WaitError};

/// Classify one fetched action result.
pub fn assert_action_completed(result: &ActionResult) -> AssertOutcome<ActionFailure> {
    if let Some(message) = &result.error {
        return AssertOutcome::Fatal(ActionFailure::Errored {
            id: result.id.clone(),
            message: message.clone(),
        });
    }
    match result.status() {
        status @ (ActionStatus::Pending | ActionStatus::Running) => {
            AssertOutcome::retry(format!("action {} is {status}", result.id))
        }
        ActionStatus::Completed => AssertOutcome::Accept,
        ActionStatus::Failed => AssertOutcome::Fatal(ActionFailure::Failed {
            id: result.id.clone(),
            message: result
                .message
                .clone()
                .unwrap_or_else(|| "no message reported".to_string()),
        }),
        ActionStatus::Unknown(status) => AssertOutcome::Fatal(ActionFailure::UnknownStatus {
            id: result.id.clone(),
            status,
        }),
    }
}

/// Poll `fetch(handle)` every `poll_interval` until the action completes.
pub async fn await_completion<F, Fut, E>(
    handle: ActionHandle,
    fetch: F,
    poll_interval: Duration,
    cancel: &Cancellation,
) -> Result<ActionResult, WaitError<ActionFailure>>
where
    F: FnMut(ActionHandle) -> Fut,
    Fut: Future<Output = Result<ActionResult, E>>,
    E: Into<BoxError>,
{
    tracing::debug!(action = %handle, ?poll_interval, "awaiting action completion");

    let cfg = WaitConfig::new(handle.clone(), fetch)
        .assert(assert_action_completed)
        .retry_on(ErrorClassifier::new().with_marker::<RetryReadError>())
        .poll_interval(poll_interval);

    match wait_for(cfg, cancel).await {
        Ok(result) => {
            tracing::info!(action = %handle, "action completed");
            Ok(result)
        }
        Err(err) => {
            tracing::warn!(action = %handle, error = %err, "action did not complete");
            Err(err)
        }
    }
}
