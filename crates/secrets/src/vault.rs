//! Key Vault REST client

use crate::credentials::AccessToken;
use crate::http::{HttpClient, HttpRequest};
use crate::{SecretError, SecretReference};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// Key Vault data-plane API version
pub const API_VERSION: &str = "7.4";

/// Reads secrets from one vault
pub trait VaultClient: Send + Sync {
    /// Base URL of the vault this client is bound to
    fn vault_url(&self) -> &str;

    /// Read the value of `reference`, authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] on transport failure, non-200 status or an
    /// undecodable body.
    fn get_secret(
        &self,
        reference: &SecretReference,
        token: &AccessToken,
    ) -> Result<String, SecretError>;
}

/// Creates a [`VaultClient`] for a vault base URL
pub trait ClientFactory: Send + Sync {
    /// Build a client bound to `vault_url` (`scheme://host[:port]`).
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidUrl`] if `vault_url` is unusable.
    fn create(&self, vault_url: &str) -> Result<Box<dyn VaultClient>, SecretError>;
}

/// [`VaultClient`] speaking the Key Vault REST protocol over an [`HttpClient`]
pub struct KeyVaultClient {
    vault_url: Url,
    http: Arc<dyn HttpClient>,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

impl KeyVaultClient {
    /// Bind a client to a vault
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidUrl`] if `vault_url` does not parse as a base URL.
    pub fn new(vault_url: &str, http: Arc<dyn HttpClient>) -> Result<Self, SecretError> {
        let parsed = Url::parse(vault_url).map_err(|_| SecretError::InvalidUrl {
            url: vault_url.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(SecretError::InvalidUrl {
                url: vault_url.to_string(),
            });
        }
        Ok(Self {
            vault_url: parsed,
            http,
        })
    }

    /// `<vault>/secrets/<name>[/<version>]?api-version=<API_VERSION>`
    ///
    /// Name and version are already in URL form, so they are joined as-is.
    fn secret_url(&self, reference: &SecretReference) -> Url {
        let mut path = format!("/secrets/{}", reference.name());
        if let Some(version) = reference.version() {
            path.push('/');
            path.push_str(version);
        }
        let mut url = self.vault_url.clone();
        url.set_path(&path);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        url
    }
}

impl std::fmt::Debug for KeyVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultClient")
            .field("vault_url", &self.vault_url.as_str())
            .finish_non_exhaustive()
    }
}

impl VaultClient for KeyVaultClient {
    fn vault_url(&self) -> &str {
        self.vault_url.as_str()
    }

    fn get_secret(
        &self,
        reference: &SecretReference,
        token: &AccessToken,
    ) -> Result<String, SecretError> {
        let url = self.secret_url(reference);
        let request_url = url.to_string();

        let request = HttpRequest::get(url)
            .header("Authorization", token.bearer())
            .header("Accept", "application/json");
        let response = self
            .http
            .send(request)
            .map_err(|e| SecretError::Transport {
                url: request_url.clone(),
                message: e.to_string(),
            })?;

        if response.status != StatusCode::OK {
            return Err(SecretError::Fetch {
                url: request_url,
                status: response.status,
            });
        }

        let bundle: SecretBundle =
            serde_json::from_str(&response.body).map_err(|e| SecretError::Decode {
                url: request_url,
                message: e.to_string(),
            })?;
        Ok(bundle.value)
    }
}

/// Produces [`KeyVaultClient`]s sharing one transport
#[derive(Clone)]
pub struct KeyVaultClientFactory {
    http: Arc<dyn HttpClient>,
}

impl KeyVaultClientFactory {
    /// Create a factory over `http`
    #[must_use]
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

impl std::fmt::Debug for KeyVaultClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultClientFactory").finish_non_exhaustive()
    }
}

impl ClientFactory for KeyVaultClientFactory {
    fn create(&self, vault_url: &str) -> Result<Box<dyn VaultClient>, SecretError> {
        Ok(Box::new(KeyVaultClient::new(vault_url, Arc::clone(&self.http))?))
    }
}
