//! # tether-core -- Foundational Types for tether
//!
//! This crate is the leaf of the tether workspace. It holds the pure pieces
//! that the convergence engines are built from and depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Classification is data.** Whether a failed read is worth another
//!    poll is decided by an [`ErrorClassifier`] table of error markers, not
//!    by ad hoc string matching at each call site.
//!
//! 2. **Assertions return outcomes, not booleans.** An [`AssertOutcome`]
//!    is `Accept`, `Retry(reason)` or `Fatal(cause)`, so a poll loop can
//!    never confuse "not yet" with "never".
//!
//! 3. **Membership is a set.** [`MembershipSet`] has no ordering invariant
//!    and [`diff`] is a pure function of two sets. Iteration is sorted so
//!    batches sent to the control plane are reproducible.
//!
//! 4. **Unknown is not success.** [`ActionStatus::Unknown`] keeps the raw
//!    status string so API drift is reported instead of swallowed.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tether-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod action;
pub mod classify;
pub mod error;
pub mod membership;

// Re-export primary types for ergonomic imports.
pub use action::{ActionFailure, ActionHandle, ActionResult, ActionStatus};
pub use classify::{AssertOutcome, Classification, ErrorClassifier};
pub use error::{is_marker, BoxError, RetryReadError};
pub use membership::{diff, AccessCategory, MembershipSet, Principal, ReconcilePlan};
