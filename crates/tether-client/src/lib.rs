//! # tether-client -- Typed Rust client for the tether control plane
//!
//! Provides typed access to the three remote surfaces the convergence
//! engines drive:
//! - **Actions**: enqueue an action on a unit and read its result.
//! - **Secret access**: grant or revoke application access to a secret.
//! - **SSH keys**: add, list and delete the public keys of a model.
//!
//! ## Architecture
//!
//! The client is a collaborator. It performs one remote call per method,
//! retries transport failures (see `retry`), and reports everything else to
//! the caller. It never polls: waiting for an action belongs to
//! `tether-wait`, which recognizes [`ClientError::RetryRead`] through the
//! [`RetryReadError`](tether_core::RetryReadError) in its source chain.
//!
//! Secret access and SSH keys implement
//! [`AccessMutator`](tether_access::AccessMutator) through
//! [`SecretAccessClient::for_secret`] and [`SshKeyClient::for_model`].
//!
//! ## API Path Convention
//!
//! Every endpoint lives under `{api_url}/api/v1/models/{model}/...`.

pub mod actions;
pub mod config;
pub mod error;
pub mod ids;
pub(crate) mod retry;
pub mod secrets;
pub mod ssh_keys;

pub use actions::{ActionsClient, EnqueueAction};
pub use config::ControlPlaneConfig;
pub use error::ClientError;
pub use ids::{action_resource_id, parse_secret_resource_id, secret_resource_id};
pub use secrets::{SecretAccessClient, SecretGrants};
pub use ssh_keys::{SshKeyClient, SshKeys};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Top-level control-plane client. Holds one sub-client per surface.
#[derive(Debug, Clone)]
pub struct TetherClient {
    actions: ActionsClient,
    secrets: SecretAccessClient,
    ssh_keys: SshKeyClient,
}

impl TetherClient {
    /// Create a new client from configuration.
    pub fn new(config: ControlPlaneConfig) -> Result<Self, ClientError> {
        let bearer = zeroize::Zeroizing::new(format!("Bearer {}", config.api_token.as_str()));
        let mut auth = reqwest::header::HeaderValue::from_str(&bearer)
            .map_err(|_| ClientError::Config(config::ConfigError::MissingToken))?;
        auth.set_sensitive(true);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(reqwest::header::AUTHORIZATION, auth);
                headers
            })
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            actions: ActionsClient::new(http.clone(), config.api_url.clone()),
            secrets: SecretAccessClient::new(http.clone(), config.api_url.clone()),
            ssh_keys: SshKeyClient::new(http, config.api_url),
        })
    }

    /// Access the actions client.
    pub fn actions(&self) -> &ActionsClient {
        &self.actions
    }

    /// Access the secret access client.
    pub fn secrets(&self) -> &SecretAccessClient {
        &self.secrets
    }

    /// Access the SSH keys client.
    pub fn ssh_keys(&self) -> &SshKeyClient {
        &self.ssh_keys
    }
}

/// Check the status of `resp` and decode its JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::ApiError {
            endpoint: endpoint.to_string(),
            status,
            body,
        });
    }

    resp.json().await.map_err(|e| ClientError::Deserialization {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

/// One result per item of a batch call.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default)]
    results: Vec<BatchItem>,
}

#[derive(Debug, Deserialize)]
struct BatchItem {
    #[serde(default)]
    error: Option<actions::RemoteMessage>,
}

impl BatchResponse {
    /// Join every per-item error into one [`ClientError::Remote`].
    pub(crate) fn into_result(self, endpoint: String) -> Result<(), ClientError> {
        let messages: Vec<String> = self
            .results
            .into_iter()
            .filter_map(|item| item.error.map(|e| e.message))
            .collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Remote { endpoint, messages })
        }
    }
}
