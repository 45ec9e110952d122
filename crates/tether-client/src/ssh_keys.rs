//! Typed client for the SSH keys installed in a model.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/api/v1/models/{model}/ssh-keys` | Add keys |
//! | GET    | `/api/v1/models/{model}/ssh-keys` | List keys |
//! | POST   | `/api/v1/models/{model}/ssh-keys/delete` | Delete keys by identifier |
//!
//! Keys are addressed by their identifier (see [`key_identifier`]). Add and
//! delete answer with one result per key; every per-key error is joined
//! into a single [`ClientError::Remote`].
//!
//! Deleting the last key of a model is not special-cased. If the control
//! plane refuses, the refusal comes back as an ordinary error.

use std::collections::BTreeMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tether_access::AccessMutator;
use tether_core::MembershipSet;

use crate::error::ClientError;
use crate::retry::retry_send;
use crate::BatchResponse;

const API_PREFIX: &str = "api/v1/models";

/// The identifier of an OpenSSH public key line: its comment, or the key
/// body when there is no comment.
///
/// ```
/// use tether_client::ssh_keys::key_identifier;
///
/// assert_eq!(key_identifier("ssh-ed25519 AAAAC3Nz alice@laptop"), "alice@laptop");
/// assert_eq!(key_identifier("ssh-ed25519 AAAAC3Nz"), "AAAAC3Nz");
/// ```
pub fn key_identifier(payload: &str) -> String {
    let mut fields = payload.split_whitespace();
    let first = fields.next();
    let body = fields.next();
    match (fields.next(), body, first) {
        (Some(comment), _, _) => comment.to_string(),
        (None, Some(body), _) => body.to_string(),
        (None, None, Some(only)) => only.to_string(),
        (None, None, None) => String::new(),
    }
}

#[derive(Debug, Serialize)]
struct AddKeysRequest<'a> {
    keys: &'a [String],
}

#[derive(Debug, Serialize)]
struct DeleteKeysRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ListKeysResponse {
    #[serde(default)]
    keys: Vec<String>,
}

/// Client for the SSH keys API.
#[derive(Debug, Clone)]
pub struct SshKeyClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl SshKeyClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Install every public key in `payloads` in one call.
    pub async fn add(&self, model: &str, payloads: &[String]) -> Result<(), ClientError> {
        let endpoint = format!("POST /models/{model}/ssh-keys");
        let url = format!("{}{}/{model}/ssh-keys", self.base_url, API_PREFIX);
        let body = AddKeysRequest { keys: payloads };

        let resp = retry_send(Method::POST, &endpoint, || self.http.post(&url).json(&body).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        let batch: BatchResponse = crate::read_json(&endpoint, resp).await?;
        batch.into_result(endpoint)?;

        tracing::debug!(model, count = payloads.len(), "ssh keys added");
        Ok(())
    }

    /// Full public key lines installed in `model`.
    pub async fn list(&self, model: &str) -> Result<Vec<String>, ClientError> {
        let endpoint = format!("GET /models/{model}/ssh-keys");
        let url = format!("{}{}/{model}/ssh-keys", self.base_url, API_PREFIX);

        let resp = retry_send(Method::GET, &endpoint, || self.http.get(&url).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        let parsed: ListKeysResponse = crate::read_json(&endpoint, resp).await?;
        Ok(parsed.keys)
    }

    /// The installed key whose identifier is `identifier`, if any.
    pub async fn find(&self, model: &str, identifier: &str) -> Result<Option<String>, ClientError> {
        let keys = self.list(model).await?;
        Ok(keys.into_iter().find(|k| key_identifier(k) == identifier))
    }

    /// Remove every key whose identifier is in `identifiers`, in one call.
    pub async fn delete(
        &self,
        model: &str,
        identifiers: &MembershipSet<String>,
    ) -> Result<(), ClientError> {
        let endpoint = format!("POST /models/{model}/ssh-keys/delete");
        let url = format!("{}{}/{model}/ssh-keys/delete", self.base_url, API_PREFIX);
        let ids = identifiers.to_vec();
        let body = DeleteKeysRequest { ids: &ids };

        let resp = retry_send(Method::POST, &endpoint, || self.http.post(&url).json(&body).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        let batch: BatchResponse = crate::read_json(&endpoint, resp).await?;
        batch.into_result(endpoint)?;

        tracing::debug!(model, count = ids.len(), "ssh keys deleted");
        Ok(())
    }

    /// Bind this client to one model. `payloads` supplies the public key
    /// lines that granted identifiers resolve to.
    pub fn for_model<I>(&self, model: impl Into<String>, payloads: I) -> SshKeys
    where
        I: IntoIterator<Item = String>,
    {
        SshKeys {
            client: self.clone(),
            model: model.into(),
            payloads: payloads
                .into_iter()
                .map(|p| (key_identifier(&p), p))
                .collect(),
        }
    }
}

/// The SSH keys of one model, reconciled by key identifier.
#[derive(Debug, Clone)]
pub struct SshKeys {
    client: SshKeyClient,
    model: String,
    payloads: BTreeMap<String, String>,
}

impl SshKeys {
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Identifiers of every payload this binding knows about.
    pub fn identifiers(&self) -> MembershipSet<String> {
        self.payloads.keys().cloned().collect()
    }

    fn resolve(&self, identifiers: &MembershipSet<String>) -> Result<Vec<String>, ClientError> {
        identifiers
            .iter()
            .map(|id| {
                self.payloads
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ClientError::MissingKeyPayload(id.clone()))
            })
            .collect()
    }
}

impl AccessMutator<String> for SshKeys {
    type Error = ClientError;

    async fn grant(&self, members: MembershipSet<String>) -> Result<(), ClientError> {
        let payloads = self.resolve(&members)?;
        self.client.add(&self.model, &payloads).await
    }

    async fn revoke(&self, members: MembershipSet<String>) -> Result<(), ClientError> {
        self.client.delete(&self.model, &members).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_comment_field() {
        assert_eq!(
            key_identifier("ssh-rsa AAAAB3NzaC1yc2E bob@example.com"),
            "bob@example.com"
        );
    }

    #[test]
    fn identifier_takes_third_field_only() {
        assert_eq!(key_identifier("ssh-rsa AAAA first second"), "first");
    }

    #[test]
    fn identifier_falls_back_to_key_body() {
        assert_eq!(key_identifier("  ssh-ed25519   AAAAC3Nz  "), "AAAAC3Nz");
    }

    #[test]
    fn degenerate_payloads() {
        assert_eq!(key_identifier("AAAA"), "AAAA");
        assert_eq!(key_identifier("   "), "");
    }

    #[test]
    fn resolve_reports_unknown_identifier() {
        let http = reqwest::Client::new();
        let base = url::Url::parse("http://127.0.0.1:1").unwrap();
        let keys = SshKeyClient::new(http, base)
            .for_model("dev", vec!["ssh-ed25519 AAAA alice".to_string()]);

        assert_eq!(keys.identifiers(), MembershipSet::from(["alice".to_string()]));
        assert_eq!(
            keys.resolve(&MembershipSet::from(["alice".to_string()])).unwrap(),
            vec!["ssh-ed25519 AAAA alice".to_string()]
        );
        assert!(matches!(
            keys.resolve(&MembershipSet::from(["bob".to_string()])),
            Err(ClientError::MissingKeyPayload(id)) if id == "bob"
        ));
    }
}
