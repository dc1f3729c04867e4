//! Secret fetching with per-vault client and per-run token caching

use crate::credentials::{AccessToken, TokenProvider};
use crate::http::HttpClient;
use crate::reference::DEFAULT_VAULT_DOMAIN;
use crate::vault::{ClientFactory, KeyVaultClientFactory, VaultClient};
use crate::{SecretError, SecretReference};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// Resolves secret reference URLs to their values.
///
/// One `Fetcher` lives for a whole run. It keeps one vault client per vault
/// base URL and a single bearer token acquired on the first lookup. The token
/// is replayed for every later lookup, whatever the vault host, and is never
/// refreshed.
pub struct Fetcher {
    credential: Box<dyn TokenProvider>,
    factory: Box<dyn ClientFactory>,
    vault_domain: String,
    clients: HashMap<String, Box<dyn VaultClient>>,
    token: Option<AccessToken>,
}

impl Fetcher {
    /// Create a fetcher talking to Key Vault over `http`
    #[must_use]
    pub fn new(credential: Box<dyn TokenProvider>, http: Arc<dyn HttpClient>) -> Self {
        Self::with_factory(credential, Box::new(KeyVaultClientFactory::new(http)))
    }

    /// Create a fetcher that builds its vault clients with `factory`
    #[must_use]
    pub fn with_factory(
        credential: Box<dyn TokenProvider>,
        factory: Box<dyn ClientFactory>,
    ) -> Self {
        Self {
            credential,
            factory,
            vault_domain: DEFAULT_VAULT_DOMAIN.to_string(),
            clients: HashMap::new(),
            token: None,
        }
    }

    /// Accept vault hosts under `domain` instead of `vault.azure.net`
    #[must_use]
    pub fn with_vault_domain(mut self, domain: impl Into<String>) -> Self {
        self.vault_domain = domain.into();
        self
    }

    /// Domain suffix vault hosts must belong to
    #[must_use]
    pub fn vault_domain(&self) -> &str {
        &self.vault_domain
    }

    /// Number of cached vault clients
    #[must_use]
    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }

    /// Resolve a secret reference URL to the secret value.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] if the URL is malformed, points outside the
    /// vault domain or has the wrong path shape (all before any network
    /// call), if no token can be acquired, or if the vault read fails.
    pub fn fetch(&mut self, raw_url: &str) -> Result<String, SecretError> {
        let reference = SecretReference::parse(raw_url, &self.vault_domain)?;

        let client = match self.clients.entry(reference.vault_url().to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::debug!(vault = %entry.key(), "creating vault client");
                let client = self.factory.create(entry.key())?;
                entry.insert(client)
            }
        };
        let token = cached_token(&mut self.token, self.credential.as_ref())?;

        tracing::debug!(
            vault = %reference.vault_url(),
            secret = %reference.name(),
            version = ?reference.version(),
            "fetching secret"
        );
        client.get_secret(&reference, token)
    }

    /// The run's bearer token, acquired through the credential on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Token`] if the credential fails; nothing is
    /// cached in that case.
    pub fn get_token(&mut self) -> Result<&AccessToken, SecretError> {
        cached_token(&mut self.token, self.credential.as_ref())
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("credential", &self.credential.name())
            .field("vault_domain", &self.vault_domain)
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("token_cached", &self.token.is_some())
            .finish()
    }
}

fn cached_token<'a>(
    slot: &'a mut Option<AccessToken>,
    credential: &dyn TokenProvider,
) -> Result<&'a AccessToken, SecretError> {
    let token = match slot.take() {
        Some(token) => {
            tracing::trace!("reusing cached access token");
            token
        }
        None => {
            let token = credential.token().map_err(SecretError::Token)?;
            tracing::debug!(credential = credential.name(), "cached access token for this run");
            token
        }
    };
    Ok(slot.insert(token))
}
