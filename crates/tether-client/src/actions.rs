//! Typed client for the control-plane actions API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/api/v1/models/{model}/actions` | Enqueue actions |
//! | GET    | `/api/v1/models/{model}/actions/{id}` | Action result |
//!
//! Actions are addressed to a unit. Callers name the unit the way an
//! operator does (`app/0`); the wire format wants the unit tag
//! (`unit-app-0`), see [`unit_tag`].

use std::collections::BTreeMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tether_core::{ActionHandle, ActionResult, RetryReadError};

use crate::error::ClientError;
use crate::retry::retry_send;

const API_PREFIX: &str = "api/v1/models";

/// An action to enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueueAction {
    /// Unit to run on, as `application/N`.
    pub receiver: String,
    /// Action name as defined by the charm.
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct EnqueueRequest<'a> {
    actions: [&'a EnqueueAction; 1],
}

#[derive(Debug, Deserialize)]
struct EnqueueResponse {
    #[serde(default)]
    actions: Vec<Enqueued>,
}

#[derive(Debug, Deserialize)]
struct Enqueued {
    #[serde(default)]
    action: Option<EnqueuedRef>,
    #[serde(default)]
    error: Option<RemoteMessage>,
}

#[derive(Debug, Deserialize)]
struct EnqueuedRef {
    id: String,
}

/// Error body the control plane attaches to individual items.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteMessage {
    pub(crate) message: String,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    results: Vec<ActionResult>,
}

/// Convert `application/N` into the unit tag `unit-application-N`.
///
/// The application name is one or more hyphen-separated segments of
/// lowercase letters and digits. Every segment contains a letter and the
/// first starts with one, so the unit number is never mistaken for part of
/// the name. The unit number is a decimal without leading zeros.
pub fn unit_tag(receiver: &str) -> Result<String, ClientError> {
    let invalid = || ClientError::InvalidReceiver(receiver.to_string());
    let (app, number) = receiver.split_once('/').ok_or_else(invalid)?;

    let number_ok = !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
        && (number == "0" || !number.starts_with('0'));

    if !valid_application(app) || !number_ok {
        return Err(invalid());
    }
    Ok(format!("unit-{app}-{number}"))
}

fn valid_application(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name.split('-').all(|segment| {
            segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                && segment.chars().any(|c| c.is_ascii_lowercase())
        })
}

/// Client for the control-plane actions API.
#[derive(Debug, Clone)]
pub struct ActionsClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl ActionsClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Enqueue one action in `model` and return its handle.
    ///
    /// Calls `POST {base_url}/api/v1/models/{model}/actions`.
    pub async fn enqueue(
        &self,
        model: &str,
        action: &EnqueueAction,
    ) -> Result<ActionHandle, ClientError> {
        let endpoint = format!("POST /models/{model}/actions");
        let url = format!("{}{}/{model}/actions", self.base_url, API_PREFIX);

        let tagged = EnqueueAction {
            receiver: unit_tag(&action.receiver)?,
            ..action.clone()
        };
        let body = EnqueueRequest { actions: [&tagged] };

        let resp = retry_send(Method::POST, &endpoint, || self.http.post(&url).json(&body).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        let parsed: EnqueueResponse = crate::read_json(&endpoint, resp).await?;

        let [entry] = <[Enqueued; 1]>::try_from(parsed.actions).map_err(|got| {
            ClientError::UnexpectedCount {
                endpoint: endpoint.clone(),
                what: "enqueued action",
                expected: 1,
                got: got.len(),
            }
        })?;
        if let Some(err) = entry.error {
            return Err(ClientError::Remote {
                endpoint,
                messages: vec![err.message],
            });
        }
        let Some(enqueued) = entry.action else {
            return Err(ClientError::Remote {
                endpoint,
                messages: vec!["enqueued action is null".to_string()],
            });
        };

        tracing::info!(
            model,
            action = %tagged.name,
            receiver = %tagged.receiver,
            id = %enqueued.id,
            "action enqueued"
        );
        Ok(ActionHandle::new(model, enqueued.id))
    }

    /// Fetch the current result of an enqueued action.
    ///
    /// Calls `GET {base_url}/api/v1/models/{model}/actions/{id}`. A `404`
    /// means the action is not visible yet and is reported as
    /// [`ClientError::RetryRead`].
    pub async fn result(&self, handle: &ActionHandle) -> Result<ActionResult, ClientError> {
        let endpoint = format!("GET /models/{}/actions/{}", handle.model, handle.id);
        let url = format!(
            "{}{}/{}/actions/{}",
            self.base_url, API_PREFIX, handle.model, handle.id
        );

        let resp = retry_send(Method::GET, &endpoint, || self.http.get(&url).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(action = %handle, "action not visible yet");
            return Err(ClientError::RetryRead {
                endpoint,
                source: RetryReadError::new(format!("action {} not found", handle.id)),
            });
        }

        let parsed: ResultsResponse = crate::read_json(&endpoint, resp).await?;
        let [result] = <[ActionResult; 1]>::try_from(parsed.results).map_err(|got| {
            ClientError::UnexpectedCount {
                endpoint,
                what: "action result",
                expected: 1,
                got: got.len(),
            }
        })?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_tag_normalizes_receiver() {
        assert_eq!(unit_tag("app/0").unwrap(), "unit-app-0");
        assert_eq!(unit_tag("postgresql-k8s/12").unwrap(), "unit-postgresql-k8s-12");
        assert_eq!(unit_tag("web2-a1b/3").unwrap(), "unit-web2-a1b-3");
    }

    #[test]
    fn unit_tag_rejects_malformed_receivers() {
        for bad in [
            "app",
            "app/",
            "/0",
            "App/0",
            "app/01",
            "app/x",
            "9app/0",
            "app-/0",
            "a/b/0",
            "app-1/0",
            "a--b/0",
            "-app/0",
        ] {
            assert!(
                matches!(unit_tag(bad), Err(ClientError::InvalidReceiver(ref r)) if r == bad),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn enqueue_request_wraps_single_action() {
        let action = EnqueueAction {
            receiver: "unit-app-0".into(),
            name: "backup".into(),
            parameters: BTreeMap::from([("target".to_string(), serde_json::json!("s3"))]),
        };
        let body = serde_json::to_value(EnqueueRequest { actions: [&action] }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "actions": [{
                    "receiver": "unit-app-0",
                    "name": "backup",
                    "parameters": {"target": "s3"}
                }]
            })
        );
    }
}
