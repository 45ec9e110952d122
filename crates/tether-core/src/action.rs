//! # Remote Action Data Model
//!
//! A triggered remote operation ("action") moves through
//!
//! ```text
//! enqueued → PENDING → RUNNING → COMPLETED
//!                            └──→ FAILED
//! ```
//!
//! The control plane reports the status as a string. Anything outside the
//! four known values is kept verbatim in [`ActionStatus::Unknown`] so that
//! drift in the remote API is reported rather than retried forever or
//! mistaken for success.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lookup key for an enqueued action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionHandle {
    /// Action identifier assigned by the control plane.
    pub id: String,
    /// Model the action runs in.
    pub model: String,
}

impl ActionHandle {
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model, self.id)
    }
}

/// Status of a remote action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// A status string this client does not recognize.
    Unknown(String),
}

impl ActionStatus {
    /// Parse the wire representation. Matching is exact.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether the action has stopped changing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub id: String,
    /// Raw status string; see [`ActionResult::status`].
    pub status: String,
    #[serde(default)]
    pub output: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    /// Set when the control plane could not run the action at all.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub enqueued: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,
}

impl ActionResult {
    pub fn status(&self) -> ActionStatus {
        ActionStatus::parse(&self.status)
    }

    /// Output values rendered as strings, the way a declarative model
    /// stores them.
    pub fn output_strings(&self) -> BTreeMap<String, String> {
        self.output
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

/// Why an action will never complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionFailure {
    /// The action reached the `failed` state.
    #[error("action {id} failed: {message}")]
    Failed { id: String, message: String },

    /// The control plane attached an error to the result.
    #[error("action {id} returned an error: {message}")]
    Errored { id: String, message: String },

    /// The status string is not one this client knows.
    #[error("action {id} reported unrecognized status {status:?}")]
    UnknownStatus { id: String, status: String },
}
