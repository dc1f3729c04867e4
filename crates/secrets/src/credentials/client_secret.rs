//! OAuth2 client-credentials grant

use super::{AccessToken, CredentialError, KEY_VAULT_RESOURCE, TokenProvider, token_from_response};
use crate::http::{HttpClient, HttpRequest};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use url::Url;

/// Public cloud authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Authenticates a service principal with a client secret.
///
/// Not available when no client id is configured.
pub struct ClientSecretCredential {
    http: Arc<dyn HttpClient>,
    tenant: String,
    client_id: String,
    client_secret: SecretString,
    authority_host: String,
}

impl ClientSecretCredential {
    /// Create a credential against the public cloud authority
    #[must_use]
    pub fn new(
        http: Arc<dyn HttpClient>,
        tenant: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tenant: tenant.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        }
    }

    /// Use a different authority (sovereign clouds, local test servers)
    #[must_use]
    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into();
        self
    }

    /// `<authority>/<tenant>/oauth2/token`
    fn token_endpoint(&self) -> Result<Url, CredentialError> {
        let invalid = |message: String| CredentialError::Request {
            endpoint: self.authority_host.clone(),
            message,
        };

        let mut url = Url::parse(&self.authority_host)
            .map_err(|e| invalid(format!("invalid authority host: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| invalid("authority host cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend([self.tenant.as_str(), "oauth2", "token"]);
        Ok(url)
    }
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .field("authority_host", &self.authority_host)
            .finish_non_exhaustive()
    }
}

impl TokenProvider for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "client-secret"
    }

    fn token(&self) -> Result<AccessToken, CredentialError> {
        if self.client_id.is_empty() {
            return Err(CredentialError::NotAvailable);
        }

        let url = self.token_endpoint()?;
        let endpoint = url.to_string();
        tracing::debug!(endpoint = %endpoint, client_id = %self.client_id, "requesting client credentials token");

        let request = HttpRequest::post_form(
            url,
            &[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("resource", KEY_VAULT_RESOURCE),
            ],
        )
        .header("Accept", "application/json");

        let response = self
            .http
            .send(request)
            .map_err(|e| CredentialError::request(&endpoint, &e))?;
        token_from_response(&endpoint, &response)
    }
}
