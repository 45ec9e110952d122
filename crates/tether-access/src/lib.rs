//! # tether-access -- Access Reconciliation
//!
//! Moves a remote membership (applications allowed to read a secret,
//! principals assigned to a role, SSH keys installed in a model) from the
//! previously applied set to a newly declared one with the fewest
//! control-plane calls:
//!
//! - nothing changed: no calls at all;
//! - otherwise one grant call with every addition, then one revoke call
//!   with every removal.
//!
//! The two legs are not transactional. A failing grant stops before the
//! revoke; a failing revoke leaves the grant in place. See
//! [`ReconcileError`] for how the caller learns which leg failed.

pub mod reconcile;

pub use reconcile::{
    apply, reconcile, AccessMutator, AccessReconciler, Leg, ReconcileError, ReconcileOutcome,
};
