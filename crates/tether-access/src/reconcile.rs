//! # Grant/Revoke Reconciliation
//!
//! ## Sequence
//!
//! 1. `plan = diff(previous, desired)`.
//! 2. Empty plan: return without calling anything.
//! 3. Non-empty `to_add`: `grant(to_add)`, one call, whole batch. On error
//!    return [`ReconcileError::Grant`]; revoke is not attempted.
//! 4. Non-empty `to_remove`: `revoke(to_remove)`, one call, whole batch.
//!    On error return [`ReconcileError::Revoke`], which records whether
//!    the grant leg already changed remote state.
//!
//! Nothing is rolled back. Remote business rules (for example a control
//! plane refusing to remove the last credential) come back as ordinary
//! collaborator errors.

use std::fmt;
use std::future::Future;

use tether_core::{diff, BoxError, MembershipSet, ReconcilePlan};
use thiserror::Error;

/// One of the two mutation legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    Grant,
    Revoke,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grant => write!(f, "grant"),
            Self::Revoke => write!(f, "revoke"),
        }
    }
}

/// A reconciliation leg failed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The grant call failed. Revoke was not attempted.
    #[error("grant of {count} member(s) failed: {source}")]
    Grant {
        count: usize,
        #[source]
        source: BoxError,
    },

    /// The revoke call failed. When `grant_applied` is set the grant leg
    /// already succeeded and remote state is partially updated.
    #[error("revoke of {count} member(s) failed (grant applied: {grant_applied}): {source}")]
    Revoke {
        count: usize,
        grant_applied: bool,
        #[source]
        source: BoxError,
    },
}

impl ReconcileError {
    pub fn leg(&self) -> Leg {
        match self {
            Self::Grant { .. } => Leg::Grant,
            Self::Revoke { .. } => Leg::Revoke,
        }
    }

    /// Whether remote state changed before the failure.
    pub fn partially_applied(&self) -> bool {
        matches!(
            self,
            Self::Revoke {
                grant_applied: true,
                ..
            }
        )
    }
}

/// What a successful reconciliation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome<M> {
    pub granted: MembershipSet<M>,
    pub revoked: MembershipSet<M>,
}

impl<M: Ord> ReconcileOutcome<M> {
    /// True when no collaborator was called.
    pub fn is_noop(&self) -> bool {
        self.granted.is_empty() && self.revoked.is_empty()
    }
}

/// Reconcile `previous` towards `desired` through `grant` and `revoke`.
pub async fn reconcile<M, G, GFut, GErr, R, RFut, RErr>(
    previous: &MembershipSet<M>,
    desired: &MembershipSet<M>,
    grant: G,
    revoke: R,
) -> Result<ReconcileOutcome<M>, ReconcileError>
where
    M: Ord + Clone,
    G: FnOnce(MembershipSet<M>) -> GFut,
    GFut: Future<Output = Result<(), GErr>>,
    GErr: Into<BoxError>,
    R: FnOnce(MembershipSet<M>) -> RFut,
    RFut: Future<Output = Result<(), RErr>>,
    RErr: Into<BoxError>,
{
    apply(diff(previous, desired), grant, revoke).await
}

/// Apply an already computed plan: grant first, then revoke.
pub async fn apply<M, G, GFut, GErr, R, RFut, RErr>(
    plan: ReconcilePlan<M>,
    grant: G,
    revoke: R,
) -> Result<ReconcileOutcome<M>, ReconcileError>
where
    M: Ord + Clone,
    G: FnOnce(MembershipSet<M>) -> GFut,
    GFut: Future<Output = Result<(), GErr>>,
    GErr: Into<BoxError>,
    R: FnOnce(MembershipSet<M>) -> RFut,
    RFut: Future<Output = Result<(), RErr>>,
    RErr: Into<BoxError>,
{
    let ReconcilePlan { to_add, to_remove } = plan;

    if to_add.is_empty() && to_remove.is_empty() {
        tracing::debug!("membership unchanged, nothing to reconcile");
        return Ok(ReconcileOutcome {
            granted: to_add,
            revoked: to_remove,
        });
    }

    tracing::debug!(
        to_add = to_add.len(),
        to_remove = to_remove.len(),
        "reconciling membership"
    );

    let grant_applied = !to_add.is_empty();
    if grant_applied {
        let count = to_add.len();
        if let Err(err) = grant(to_add.clone()).await {
            let source: BoxError = err.into();
            tracing::warn!(count, error = %source, "grant leg failed");
            return Err(ReconcileError::Grant { count, source });
        }
    }

    if !to_remove.is_empty() {
        let count = to_remove.len();
        if let Err(err) = revoke(to_remove.clone()).await {
            let source: BoxError = err.into();
            tracing::warn!(count, grant_applied, error = %source, "revoke leg failed");
            return Err(ReconcileError::Revoke {
                count,
                grant_applied,
                source,
            });
        }
    }

    tracing::info!(
        granted = to_add.len(),
        revoked = to_remove.len(),
        "membership reconciled"
    );
    Ok(ReconcileOutcome {
        granted: to_add,
        revoked: to_remove,
    })
}

/// A grant/revoke collaborator for members of type `M`.
///
/// Each call receives the full batch and must apply all of it or report
/// an error.
pub trait AccessMutator<M> {
    type Error: Into<BoxError>;

    fn grant(&self, members: MembershipSet<M>)
        -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn revoke(
        &self,
        members: MembershipSet<M>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Reconciler bound to one [`AccessMutator`].
#[derive(Debug, Clone)]
pub struct AccessReconciler<A> {
    mutator: A,
}

impl<A> AccessReconciler<A> {
    pub fn new(mutator: A) -> Self {
        Self { mutator }
    }

    pub fn mutator(&self) -> &A {
        &self.mutator
    }

    /// Reconcile `previous` towards `desired` through the bound mutator.
    pub async fn reconcile<M>(
        &self,
        previous: &MembershipSet<M>,
        desired: &MembershipSet<M>,
    ) -> Result<ReconcileOutcome<M>, ReconcileError>
    where
        M: Ord + Clone,
        A: AccessMutator<M>,
    {
        reconcile(
            previous,
            desired,
            |members| self.mutator.grant(members),
            |members| self.mutator.revoke(members),
        )
        .await
    }
}
