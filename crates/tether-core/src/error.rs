//! # Error Types -- Collaborator Error Boundary
//!
//! Errors produced by collaborators (fetch, grant, revoke) cross into the
//! engines as [`BoxError`]. Retryable conditions are recognized by marker
//! types anywhere in the `source()` chain, the same way a wrapped error is
//! matched against a sentinel.

use thiserror::Error;

/// Boxed collaborator error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Marker for a read that raced the control plane.
///
/// Collaborators return (or wrap) this when the object being read is not
/// visible yet, e.g. an action that was enqueued but has not been indexed.
/// Poll loops that list it in their classifier keep polling instead of
/// failing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("retry read: {reason}")]
pub struct RetryReadError {
    /// Why the read should be retried.
    pub reason: String,
}

impl RetryReadError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Whether `err`, or any error in its `source()` chain, is an `M`.
pub fn is_marker<M>(err: &(dyn std::error::Error + 'static)) -> bool
where
    M: std::error::Error + 'static,
{
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<M>() {
            return true;
        }
        current = e.source();
    }
    false
}
