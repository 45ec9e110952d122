//! Cooperative cancellation for poll loops.
//!
//! A [`Cancellation`] combines an external abort signal (fired through a
//! [`CancelHandle`]) with an optional deadline. Poll loops call
//! [`Cancellation::check`] before each fetch and wait through
//! [`Cancellation::sleep`], which returns early as soon as either source
//! fires.

use std::fmt;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Why a wait stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The abort signal was fired.
    Aborted,
    /// The deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted => write!(f, "aborted"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Fires the abort signal of the [`Cancellation`]s created with it.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] does not
/// cancel anything.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Abort signal plus optional deadline. Cheap to clone; safe to poll
/// repeatedly.
#[derive(Debug, Clone)]
pub struct Cancellation {
    abort: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A cancellation paired with the handle that fires it.
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        let handle = CancelHandle { tx: Arc::new(tx) };
        let cancel = Self {
            abort: Some(rx),
            deadline: None,
        };
        (handle, cancel)
    }

    /// A cancellation that only fires if a deadline is added.
    pub fn never() -> Self {
        Self {
            abort: None,
            deadline: None,
        }
    }

    /// Add a deadline. The earliest deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Add a deadline `timeout` from now. A timeout too large to
    /// represent as an instant adds no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The reason this cancellation has fired, if it has.
    pub fn check(&self) -> Option<CancelReason> {
        if self.abort.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(CancelReason::Aborted);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelReason::DeadlineExceeded);
        }
        None
    }

    pub fn is_cancelled(&self) -> bool {
        self.check().is_some()
    }

    /// Wait for `duration`, returning early with the reason if the abort
    /// signal or the deadline fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CancelReason> {
        if let Some(reason) = self.check() {
            return Err(reason);
        }
        let wake = Instant::now() + duration;
        let mut abort = self.abort.clone();

        tokio::select! {
            biased;
            _ = aborted(&mut abort) => Err(CancelReason::Aborted),
            _ = expired(self.deadline) => Err(CancelReason::DeadlineExceeded),
            _ = sleep_until(wake) => Ok(()),
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::never()
    }
}

async fn aborted(abort: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = abort else {
        return pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // Sender gone without firing: the signal can no longer fire.
        if rx.changed().await.is_err() {
            return pending().await;
        }
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
