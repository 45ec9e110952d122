//! # Retryable/Fatal Classification
//!
//! Two decisions are made on every poll iteration:
//!
//! - A **fetch error** is looked up in an [`ErrorClassifier`]. Markers the
//!   caller registered make it [`Classification::Retryable`]; everything
//!   else is [`Classification::Fatal`]. An empty classifier makes every
//!   fetch error fatal.
//! - A **fetched value** is judged by assertions returning an
//!   [`AssertOutcome`].

use std::fmt;
use std::sync::Arc;

use crate::error::is_marker;

/// Verdict of one assertion over one fetched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertOutcome<C> {
    /// The awaited condition holds.
    Accept,
    /// The condition has not materialized yet; poll again.
    Retry(String),
    /// The remote side has definitively failed; stop polling.
    Fatal(C),
}

impl<C> AssertOutcome<C> {
    /// Shorthand for [`AssertOutcome::Retry`].
    pub fn retry(reason: impl Into<String>) -> Self {
        Self::Retry(reason.into())
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Result of classifying a fetch error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Transient; keep polling.
    Retryable,
    /// Not whitelisted; surface to the caller.
    Fatal,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable => write!(f, "retryable"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

type Matcher = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// Table of error markers a poll loop treats as "keep polling".
///
/// ```
/// use tether_core::{Classification, ErrorClassifier, RetryReadError};
///
/// let classifier = ErrorClassifier::new().with_marker::<RetryReadError>();
/// let err = RetryReadError::new("action not indexed yet");
/// assert_eq!(classifier.classify(&err), Classification::Retryable);
/// ```
#[derive(Clone, Default)]
pub struct ErrorClassifier {
    matchers: Vec<(&'static str, Matcher)>,
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.matchers.iter().map(|(name, _)| name))
            .finish()
    }
}

impl ErrorClassifier {
    /// An empty classifier: every fetch error is fatal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `M` anywhere in an error's source chain as retryable.
    pub fn with_marker<M>(mut self) -> Self
    where
        M: std::error::Error + 'static,
    {
        let matcher: Matcher = Arc::new(is_marker::<M>);
        self.matchers.push((std::any::type_name::<M>(), matcher));
        self
    }

    /// Treat errors accepted by `predicate` as retryable.
    pub fn with_predicate<F>(mut self, name: &'static str, predicate: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync + 'static,
    {
        let matcher: Matcher = Arc::new(predicate);
        self.matchers.push((name, matcher));
        self
    }

    pub fn classify(&self, err: &(dyn std::error::Error + 'static)) -> Classification {
        if self.matchers.iter().any(|(_, matches)| matches(err)) {
            Classification::Retryable
        } else {
            Classification::Fatal
        }
    }

    pub fn is_retryable(&self, err: &(dyn std::error::Error + 'static)) -> bool {
        self.classify(err) == Classification::Retryable
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
