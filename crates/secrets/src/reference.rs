//! Secret reference URLs
//!
//! `https://<vault>.vault.azure.net/secrets/<name>` or
//! `https://<vault>.vault.azure.net/secrets/<name>/<version>`.

use crate::SecretError;
use url::Url;

/// Domain suffix accepted for vault hosts unless configured otherwise
pub const DEFAULT_VAULT_DOMAIN: &str = "vault.azure.net";

const SECRETS_SEGMENT: &str = "secrets";

/// A parsed secret reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    vault_url: String,
    name: String,
    version: Option<String>,
}

impl SecretReference {
    /// Parse a raw reference, accepting only hosts under `vault_domain`.
    ///
    /// The host check happens before anything else looks at the reference,
    /// so a rejected URL never reaches the network.
    ///
    /// # Errors
    ///
    /// - [`SecretError::ParseUrl`] if `raw` is not a URL
    /// - [`SecretError::InvalidUrl`] if the host is outside `vault_domain`
    /// - [`SecretError::InvalidPath`] if the path is not `/secrets/<name>[/<version>]`
    pub fn parse(raw: &str, vault_domain: &str) -> Result<Self, SecretError> {
        let url = Url::parse(raw).map_err(|e| SecretError::ParseUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })?;

        if !host_in_domain(&url, vault_domain) {
            return Err(SecretError::InvalidUrl {
                url: raw.to_string(),
            });
        }

        let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();
        let (name, version) = match segments.as_slice() {
            [SECRETS_SEGMENT, name] if !name.is_empty() => (*name, None),
            [SECRETS_SEGMENT, name, version] if !name.is_empty() && !version.is_empty() => {
                (*name, Some(*version))
            }
            _ => {
                return Err(SecretError::InvalidPath {
                    url: raw.to_string(),
                    path: url.path().to_string(),
                });
            }
        };

        Ok(Self {
            vault_url: url.origin().ascii_serialization(),
            name: name.to_string(),
            version: version.map(str::to_string),
        })
    }

    /// `scheme://host[:port]` of the vault
    #[must_use]
    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    /// Secret name, percent-encoded as it appeared in the URL
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Secret version, `None` for the latest
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Whether the URL host is a subdomain of `domain`
fn host_in_domain(url: &Url, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    url.host_str()
        .map(|host| host.to_ascii_lowercase())
        .is_some_and(|host| {
            host.len() > domain.len() + 1
                && host.ends_with(&domain)
                && host[..host.len() - domain.len()].ends_with('.')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<SecretReference, SecretError> {
        SecretReference::parse(raw, DEFAULT_VAULT_DOMAIN)
    }

    #[test]
    fn name_only() {
        let reference = parse("https://example.vault.azure.net/secrets/pass").unwrap();
        assert_eq!(reference.vault_url(), "https://example.vault.azure.net");
        assert_eq!(reference.name(), "pass");
        assert_eq!(reference.version(), None);
    }

    #[test]
    fn name_and_version() {
        let reference = parse(
            "https://example.vault.azure.net/secrets/pass/4387e9f3d6e14c459867679a90fd0f79",
        )
        .unwrap();
        assert_eq!(reference.name(), "pass");
        assert_eq!(reference.version(), Some("4387e9f3d6e14c459867679a90fd0f79"));
    }

    #[test]
    fn escaped_segments_are_kept_verbatim() {
        let reference = parse("https://kv.vault.azure.net/secrets/my%2Dsecret/v%31").unwrap();
        assert_eq!(reference.name(), "my%2Dsecret");
        assert_eq!(reference.version(), Some("v%31"));
    }

    #[test]
    fn vault_url_keeps_non_default_port() {
        let reference = parse("https://example.vault.azure.net:8443/secrets/pass").unwrap();
        assert_eq!(reference.vault_url(), "https://example.vault.azure.net:8443");
    }

    #[test]
    fn host_outside_domain_is_invalid() {
        let err = parse("https://invalid.sensyn.net/secrets/pass").unwrap_err();
        assert!(matches!(err, SecretError::InvalidUrl { .. }));
        assert!(err.to_string().contains("https://invalid.sensyn.net/secrets/pass"));
    }

    #[test]
    fn domain_itself_and_lookalikes_are_invalid() {
        for raw in [
            "https://vault.azure.net/secrets/pass",
            "https://evilvault.azure.net/secrets/pass",
            "https://example.vault.azure.net.evil.com/secrets/pass",
        ] {
            assert!(
                matches!(parse(raw), Err(SecretError::InvalidUrl { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn custom_domain() {
        let reference = SecretReference::parse("https://kv.example.com/secrets/pass", "example.com")
            .unwrap();
        assert_eq!(reference.vault_url(), "https://kv.example.com");

        let reference =
            SecretReference::parse("https://KV.Example.COM/secrets/pass", ".example.com").unwrap();
        assert_eq!(reference.vault_url(), "https://kv.example.com");
    }

    #[test]
    fn malformed_url() {
        let err = parse("not a url").unwrap_err();
        assert!(matches!(err, SecretError::ParseUrl { .. }));
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn wrong_path_shapes() {
        for raw in [
            "https://example.vault.azure.net/",
            "https://example.vault.azure.net/secrets",
            "https://example.vault.azure.net/secrets/",
            "https://example.vault.azure.net/secrets/pass/",
            "https://example.vault.azure.net/secrets//v1",
            "https://example.vault.azure.net/secrets/pass/v1/extra",
            "https://example.vault.azure.net/keys/pass",
        ] {
            let err = parse(raw).unwrap_err();
            assert!(
                matches!(err, SecretError::InvalidPath { .. }),
                "{raw} gave {err:?}"
            );
        }
    }
}
