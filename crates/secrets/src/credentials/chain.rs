//! Ordered fallback over several credential providers

use super::{AccessToken, CredentialError, TokenProvider};

/// Tries each provider in order until one yields a token or fails.
///
/// - a token stops the chain and is returned;
/// - [`CredentialError::NotAvailable`] moves on to the next provider;
/// - any other error stops the chain and is returned wrapped in
///   [`CredentialError::Provider`] naming the failing provider.
///
/// An exhausted (or empty) chain reports [`CredentialError::NotAvailable`].
#[derive(Default)]
pub struct ChainedTokenCredential {
    providers: Vec<Box<dyn TokenProvider>>,
}

impl ChainedTokenCredential {
    /// Create a chain from an ordered provider list
    #[must_use]
    pub fn new(providers: Vec<Box<dyn TokenProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider at the end of the chain
    #[must_use]
    pub fn with(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Names of the providers in the order they are tried
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain has no providers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ChainedTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedTokenCredential")
            .field("providers", &self.provider_names())
            .finish()
    }
}

impl TokenProvider for ChainedTokenCredential {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn token(&self) -> Result<AccessToken, CredentialError> {
        for provider in &self.providers {
            match provider.token() {
                Ok(token) => {
                    tracing::debug!(provider = provider.name(), "acquired access token");
                    return Ok(token);
                }
                Err(CredentialError::NotAvailable) => {
                    tracing::debug!(
                        provider = provider.name(),
                        "credential not available, trying next provider"
                    );
                }
                Err(err) => {
                    tracing::debug!(provider = provider.name(), error = %err, "credential failed");
                    return Err(CredentialError::Provider {
                        provider: provider.name(),
                        error: Box::new(err),
                    });
                }
            }
        }

        tracing::debug!(
            providers = ?self.provider_names(),
            "no credential provider available"
        );
        Err(CredentialError::NotAvailable)
    }
}
