//! Credential providers
//!
//! Each provider produces a bearer token for the Key Vault resource from one
//! authentication mechanism:
//!
//! - [`ClientSecretCredential`] - OAuth2 client-credentials grant
//! - [`AzureCliCredential`] - a pre-authenticated `az` CLI
//! - [`ManagedIdentityCredential`] - the instance metadata endpoint
//! - [`ChainedTokenCredential`] - ordered fallback over the others
//!
//! Providers distinguish "this mechanism does not apply here"
//! ([`CredentialError::NotAvailable`]) from "this mechanism applies but
//! failed" (every other variant). Only the chain recovers from the former.

mod azure_cli;
mod chain;
mod client_secret;
mod managed_identity;

pub use azure_cli::{AzureCliCredential, DEFAULT_AZURE_CLI};
pub use chain::ChainedTokenCredential;
pub use client_secret::{ClientSecretCredential, DEFAULT_AUTHORITY_HOST};
pub use managed_identity::{IMDS_TOKEN_ENDPOINT, ManagedIdentityCredential};

use crate::http::{HttpResponse, TransportError};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Resource identifier tokens are requested for
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Errors produced while acquiring a token
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// The mechanism is not configured or not installed in this environment
    #[error("credential is not available in this environment")]
    NotAvailable,

    /// The token endpoint could not be reached
    #[error("token request to {endpoint} failed: {message}")]
    Request {
        /// Token endpoint
        endpoint: String,
        /// Transport error message
        message: String,
    },

    /// The token endpoint answered with a non-200 status
    #[error("token request to {endpoint} returned {status}")]
    Status {
        /// Token endpoint
        endpoint: String,
        /// Response status
        status: StatusCode,
    },

    /// The token response could not be decoded
    #[error("failed to decode token response from {endpoint}: {message}")]
    Decode {
        /// Token endpoint or helper command
        endpoint: String,
        /// Decode error message
        message: String,
    },

    /// The token response carried an empty token
    #[error("{endpoint} returned an empty access token")]
    EmptyToken {
        /// Token endpoint or helper command
        endpoint: String,
    },

    /// The credential helper could not be started
    #[error("failed to start {command}: {message}")]
    Spawn {
        /// Helper command
        command: String,
        /// Spawn error message
        message: String,
    },

    /// The credential helper exited unsuccessfully
    #[error("failed to run {command}: {stderr}")]
    Command {
        /// Helper command
        command: String,
        /// The helper's stderr, verbatim
        stderr: String,
    },

    /// The credential helper exited cleanly but printed no usable token
    #[error("failed to parse output of {command}: {message}: {stderr}")]
    CommandOutput {
        /// Helper command
        command: String,
        /// Decode error message
        message: String,
        /// The helper's stderr, verbatim
        stderr: String,
    },

    /// A provider inside a chain failed
    #[error("{provider} credential failed: {error}")]
    Provider {
        /// Name of the failing provider
        provider: &'static str,
        /// The provider's error
        error: Box<CredentialError>,
    },
}

impl CredentialError {
    /// Whether the chain may continue past this error
    #[must_use]
    pub const fn is_not_available(&self) -> bool {
        matches!(self, Self::NotAvailable)
    }

    /// Strip [`CredentialError::Provider`] wrappers
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Provider { error, .. } => error.root(),
            other => other,
        }
    }

    pub(crate) fn request(endpoint: &str, err: &TransportError) -> Self {
        Self::Request {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

/// A bearer token, redacted in `Debug` and `Display` output
#[derive(Clone)]
pub struct AccessToken {
    inner: SecretString,
}

impl AccessToken {
    /// Wrap a token string
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(token.into()),
        }
    }

    /// Expose the raw token for use in an `Authorization` header
    #[must_use]
    pub fn secret(&self) -> &str {
        self.inner.expose_secret()
    }

    /// `Bearer <token>`
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.secret())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Something that can produce a bearer token.
///
/// Implementors return [`CredentialError::NotAvailable`] only when the
/// mechanism does not apply to the current environment. Any other error
/// stops a [`ChainedTokenCredential`].
pub trait TokenProvider: Send + Sync {
    /// Short provider identifier used in diagnostics and logs
    fn name(&self) -> &'static str;

    /// Acquire a token.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::NotAvailable`] when the mechanism does not
    /// apply, or another [`CredentialError`] when it applies but failed.
    fn token(&self) -> Result<AccessToken, CredentialError>;
}

/// OAuth2 token response shared by the identity endpoints
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Turn an identity endpoint response into a token
fn token_from_response(
    endpoint: &str,
    response: &HttpResponse,
) -> Result<AccessToken, CredentialError> {
    if response.status != StatusCode::OK {
        return Err(CredentialError::Status {
            endpoint: endpoint.to_string(),
            status: response.status,
        });
    }

    let payload: TokenResponse =
        serde_json::from_str(&response.body).map_err(|e| CredentialError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

    if payload.access_token.is_empty() {
        return Err(CredentialError::EmptyToken {
            endpoint: endpoint.to_string(),
        });
    }
    Ok(AccessToken::new(payload.access_token))
}
