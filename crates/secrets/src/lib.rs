//! Secret resolution for vaultenv
//!
//! Resolves Azure Key Vault secret reference URLs to secret values:
//!
//! - [`credentials`] - token providers and the [`ChainedTokenCredential`]
//! - [`SecretReference`] - parsing and validating reference URLs
//! - [`vault`] - the Key Vault REST client
//! - [`Fetcher`] - ties them together, caching one client per vault and one
//!   token per run
//!
//! All network traffic goes through the [`HttpClient`] trait.
//!
//! ```ignore
//! use std::sync::Arc;
//! use vaultenv_secrets::{Fetcher, ManagedIdentityCredential, ReqwestClient, DEFAULT_TIMEOUT};
//!
//! let http = Arc::new(ReqwestClient::new(DEFAULT_TIMEOUT)?);
//! let credential = ManagedIdentityCredential::new(http.clone());
//! let mut fetcher = Fetcher::new(Box::new(credential), http);
//! let value = fetcher.fetch("https://example.vault.azure.net/secrets/pass")?;
//! ```

pub mod credentials;
mod fetcher;
pub mod http;
mod reference;
pub mod vault;

#[cfg(test)]
mod test_support;

pub use credentials::{
    AccessToken, AzureCliCredential, ChainedTokenCredential, ClientSecretCredential,
    CredentialError, ManagedIdentityCredential, TokenProvider,
};
pub use fetcher::Fetcher;
pub use http::{DEFAULT_TIMEOUT, HttpClient, ReqwestClient, TransportError};
pub use reference::{DEFAULT_VAULT_DOMAIN, SecretReference};
pub use vault::{ClientFactory, KeyVaultClient, KeyVaultClientFactory, VaultClient};

use reqwest::StatusCode;
use thiserror::Error;

/// Error types for secret resolution
#[derive(Debug, Error)]
pub enum SecretError {
    /// The reference is not a URL
    #[error("failed to parse secret URL '{url}': {message}")]
    ParseUrl {
        /// The offending input
        url: String,
        /// Parser error message
        message: String,
    },

    /// The reference points outside the accepted vault domain
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending input
        url: String,
    },

    /// The reference path is not `/secrets/<name>[/<version>]`
    #[error("invalid path {path:?} in secret URL '{url}'")]
    InvalidPath {
        /// The offending input
        url: String,
        /// Its path component
        path: String,
    },

    /// No bearer token could be acquired
    #[error("failed to get token: {0}")]
    Token(CredentialError),

    /// The vault could not be reached
    #[error("failed to fetch {url}: {message}")]
    Transport {
        /// Requested URL
        url: String,
        /// Transport error message
        message: String,
    },

    /// The vault answered with a non-200 status
    #[error("failed to fetch {url}: {status}")]
    Fetch {
        /// Requested URL
        url: String,
        /// Response status
        status: StatusCode,
    },

    /// The vault response had no usable `value`
    #[error("failed to decode secret from {url}: {message}")]
    Decode {
        /// Requested URL
        url: String,
        /// Decode error message
        message: String,
    },
}
