//! Typed client for application access to secrets.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/api/v1/models/{model_uuid}/secrets/{secret_id}/access` | Grant or revoke |
//! | GET    | `/api/v1/models/{model_uuid}/secrets/{secret_id}/access` | Read access list |
//!
//! Grant and revoke share one endpoint and differ only in `mode`. Each call
//! carries the whole batch of applications.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tether_access::AccessMutator;
use tether_core::{AccessCategory, MembershipSet, Principal};
use uuid::Uuid;

use crate::error::ClientError;
use crate::retry::retry_send;
use crate::BatchResponse;

const API_PREFIX: &str = "api/v1/models";

/// Whether an access update adds or removes applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Grant,
    Revoke,
}

#[derive(Debug, Serialize)]
struct UpdateAccessRequest<'a> {
    mode: AccessMode,
    applications: &'a [String],
}

/// Applications currently allowed to read a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretAccess {
    pub secret_id: String,
    pub applications: MembershipSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretAccessResponse {
    secret_id: String,
    #[serde(default)]
    applications: Vec<String>,
}

/// Client for the secret access API.
#[derive(Debug, Clone)]
pub struct SecretAccessClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl SecretAccessClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    fn access_url(&self, model_uuid: Uuid, secret_id: &str) -> String {
        format!(
            "{}{}/{model_uuid}/secrets/{secret_id}/access",
            self.base_url, API_PREFIX
        )
    }

    /// Allow every application in `applications` to read the secret.
    pub async fn grant(
        &self,
        model_uuid: Uuid,
        secret_id: &str,
        applications: &MembershipSet<String>,
    ) -> Result<(), ClientError> {
        self.update(AccessMode::Grant, model_uuid, secret_id, applications)
            .await
    }

    /// Remove read access for every application in `applications`.
    pub async fn revoke(
        &self,
        model_uuid: Uuid,
        secret_id: &str,
        applications: &MembershipSet<String>,
    ) -> Result<(), ClientError> {
        self.update(AccessMode::Revoke, model_uuid, secret_id, applications)
            .await
    }

    async fn update(
        &self,
        mode: AccessMode,
        model_uuid: Uuid,
        secret_id: &str,
        applications: &MembershipSet<String>,
    ) -> Result<(), ClientError> {
        let endpoint = format!("POST /models/{model_uuid}/secrets/{secret_id}/access");
        let url = self.access_url(model_uuid, secret_id);
        let applications = applications.to_vec();
        let body = UpdateAccessRequest {
            mode,
            applications: &applications,
        };

        let resp = retry_send(Method::POST, &endpoint, || self.http.post(&url).json(&body).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        let batch: BatchResponse = crate::read_json(&endpoint, resp).await?;
        batch.into_result(endpoint)?;

        tracing::debug!(
            %model_uuid,
            secret_id,
            ?mode,
            count = applications.len(),
            "secret access updated"
        );
        Ok(())
    }

    /// Read the applications currently allowed to read the secret.
    pub async fn read(
        &self,
        model_uuid: Uuid,
        secret_id: &str,
    ) -> Result<SecretAccess, ClientError> {
        let endpoint = format!("GET /models/{model_uuid}/secrets/{secret_id}/access");
        let url = self.access_url(model_uuid, secret_id);

        let resp = retry_send(Method::GET, &endpoint, || self.http.get(&url).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        let parsed: SecretAccessResponse = crate::read_json(&endpoint, resp).await?;

        Ok(SecretAccess {
            secret_id: parsed.secret_id,
            applications: parsed.applications.into_iter().collect(),
        })
    }

    /// Bind this client to one secret so it can drive an
    /// [`AccessReconciler`](tether_access::AccessReconciler).
    pub fn for_secret(&self, model_uuid: Uuid, secret_id: impl Into<String>) -> SecretGrants {
        SecretGrants {
            client: self.clone(),
            model_uuid,
            secret_id: secret_id.into(),
        }
    }
}

/// Application access to one secret, as an [`AccessMutator`].
#[derive(Debug, Clone)]
pub struct SecretGrants {
    client: SecretAccessClient,
    model_uuid: Uuid,
    secret_id: String,
}

impl SecretGrants {
    pub fn model_uuid(&self) -> Uuid {
        self.model_uuid
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }
}

impl AccessMutator<String> for SecretGrants {
    type Error = ClientError;

    async fn grant(&self, members: MembershipSet<String>) -> Result<(), ClientError> {
        self.client
            .grant(self.model_uuid, &self.secret_id, &members)
            .await
    }

    async fn revoke(&self, members: MembershipSet<String>) -> Result<(), ClientError> {
        self.client
            .revoke(self.model_uuid, &self.secret_id, &members)
            .await
    }
}

/// Application ids of `members`; any other category is an error.
fn applications(members: &MembershipSet<Principal>) -> Result<MembershipSet<String>, ClientError> {
    if let Some(other) = members.iter().find(|p| p.category != AccessCategory::Application) {
        return Err(ClientError::UnsupportedPrincipal(other.to_string()));
    }
    Ok(members.in_category(AccessCategory::Application))
}

/// Grants addressed by [`Principal`], for callers that reconcile mixed
/// membership. Only [`AccessCategory::Application`] can read a secret.
impl AccessMutator<Principal> for SecretGrants {
    type Error = ClientError;

    async fn grant(&self, members: MembershipSet<Principal>) -> Result<(), ClientError> {
        let apps = applications(&members)?;
        self.client
            .grant(self.model_uuid, &self.secret_id, &apps)
            .await
    }

    async fn revoke(&self, members: MembershipSet<Principal>) -> Result<(), ClientError> {
        let apps = applications(&members)?;
        self.client
            .revoke(self.model_uuid, &self.secret_id, &apps)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_shape() {
        let apps = vec!["mysql".to_string(), "wordpress".to_string()];
        let body = serde_json::to_value(UpdateAccessRequest {
            mode: AccessMode::Revoke,
            applications: &apps,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"mode": "revoke", "applications": ["mysql", "wordpress"]})
        );
    }

    #[test]
    fn principals_map_to_application_ids() {
        let members: MembershipSet<Principal> = [
            Principal::new(AccessCategory::Application, "wordpress"),
            Principal::new(AccessCategory::Application, "mysql"),
        ]
        .into_iter()
        .collect();
        assert_eq!(applications(&members).unwrap().to_vec(), vec!["mysql", "wordpress"]);
    }

    #[test]
    fn non_application_principal_is_rejected() {
        let members: MembershipSet<Principal> = [
            Principal::new(AccessCategory::Application, "mysql"),
            Principal::new(AccessCategory::User, "alice"),
        ]
        .into_iter()
        .collect();
        let err = applications(&members).unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedPrincipal(ref p) if p == "user:alice"));
    }
}
