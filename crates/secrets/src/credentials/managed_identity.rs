//! Managed identity via the instance metadata service

use super::{AccessToken, CredentialError, KEY_VAULT_RESOURCE, TokenProvider, token_from_response};
use crate::http::{HttpClient, HttpRequest};
use std::sync::Arc;
use url::Url;

/// Link-local instance metadata token endpoint
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";

/// Requests a token for the identity assigned to the hosting VM or container.
///
/// Always considered applicable: an unreachable metadata endpoint is reported
/// as a failure, not as [`CredentialError::NotAvailable`].
pub struct ManagedIdentityCredential {
    http: Arc<dyn HttpClient>,
    endpoint: String,
}

impl ManagedIdentityCredential {
    /// Create a credential against the well-known metadata endpoint
    #[must_use]
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
        }
    }

    fn token_url(&self) -> Result<Url, CredentialError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| CredentialError::Request {
            endpoint: self.endpoint.clone(),
            message: format!("invalid metadata endpoint: {e}"),
        })?;
        url.query_pairs_mut()
            .append_pair("api-version", IMDS_API_VERSION)
            .append_pair("resource", KEY_VAULT_RESOURCE);
        Ok(url)
    }
}

impl std::fmt::Debug for ManagedIdentityCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedIdentityCredential")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TokenProvider for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "managed-identity"
    }

    fn token(&self) -> Result<AccessToken, CredentialError> {
        let url = self.token_url()?;
        tracing::debug!(endpoint = %self.endpoint, "requesting managed identity token");

        let request = HttpRequest::get(url).header("Metadata", "true");
        let response = self
            .http
            .send(request)
            .map_err(|e| CredentialError::request(&self.endpoint, &e))?;
        token_from_response(&self.endpoint, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, Method, TransportError};
    use crate::test_support::StubHttp;
    use reqwest::StatusCode;

    const TOKEN_BODY: &str = r#"{
  "access_token": "TOKEN_WITH_VM_IDENTITY",
  "refresh_token": "",
  "expires_in": "3599",
  "expires_on": "1506484173",
  "not_before": "1506480273",
  "resource": "https://vault.azure.net/",
  "token_type": "Bearer"
}"#;

    #[test]
    fn vm_identity_token() {
        let http = StubHttp::new(|request| {
            if request.url.as_str().starts_with("http://169.254.169.254")
                && request.header_value("Metadata") == Some("true")
            {
                Ok(HttpResponse::ok(TOKEN_BODY))
            } else {
                Ok(HttpResponse::new(StatusCode::BAD_REQUEST, ""))
            }
        });
        let credential = ManagedIdentityCredential::new(http.clone());

        let token = credential.token().unwrap();
        assert_eq!(token.secret(), "TOKEN_WITH_VM_IDENTITY");

        let request = &http.requests()[0];
        assert_eq!(request.method, Method::Get);
        let query: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        assert!(query.contains(&("api-version".to_string(), IMDS_API_VERSION.to_string())));
        assert!(query.contains(&("resource".to_string(), KEY_VAULT_RESOURCE.to_string())));
    }

    #[test]
    fn unreachable_endpoint_is_failure_not_unavailable() {
        let http = StubHttp::new(|request| {
            Err(TransportError::Request {
                url: request.url.to_string(),
                message: "connection refused".to_string(),
            })
        });
        let err = ManagedIdentityCredential::new(http).token().unwrap_err();

        assert!(!err.is_not_available());
        assert!(err.to_string().contains(IMDS_TOKEN_ENDPOINT));
    }

    #[test]
    fn non_200_is_failure() {
        let http = StubHttp::new(|_| Ok(HttpResponse::new(StatusCode::BAD_REQUEST, "")));
        let err = ManagedIdentityCredential::new(http).token().unwrap_err();
        assert!(matches!(err, CredentialError::Status { .. }));
    }
}
