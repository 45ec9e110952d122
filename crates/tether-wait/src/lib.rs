//! # tether-wait -- Convergence by Polling
//!
//! Turns a one-shot, possibly stale read into a convergence loop:
//!
//! - [`poll`] -- the generic engine. [`wait_for`] calls a fetch function on
//!   a fixed cadence until every assertion accepts the value, a fatal
//!   condition is classified, or the [`Cancellation`] fires.
//! - [`action`] -- the engine specialized to remote actions:
//!   `pending`/`running` keep polling, `completed` accepts, `failed` and
//!   unrecognized statuses stop with an error.
//! - [`cancel`] -- the explicit cancellation value (abort signal plus
//!   optional deadline) consulted before every fetch and during every
//!   inter-poll wait.
//!
//! Nothing here spawns tasks. Every call runs to completion on the
//! caller's task and keeps no state once it returns.

pub mod action;
pub mod cancel;
pub mod poll;

pub use action::{assert_action_completed, await_completion};
pub use cancel::{CancelHandle, CancelReason, Cancellation};
pub use poll::{wait_for, Backoff, WaitConfig, WaitError, DEFAULT_POLL_INTERVAL};
