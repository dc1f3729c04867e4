//! Wiring from parsed arguments to a rendered template

use crate::cli::{AzureArgs, Cli, CliError};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use vaultenv_secrets::{
    AzureCliCredential, ChainedTokenCredential, ClientSecretCredential, Fetcher, HttpClient,
    ManagedIdentityCredential, ReqwestClient,
};

/// Build the credential chain: client secret, Azure CLI, managed identity
#[must_use]
pub fn credential_chain(azure: &AzureArgs, http: &Arc<dyn HttpClient>) -> ChainedTokenCredential {
    ChainedTokenCredential::default()
        .with(ClientSecretCredential::new(
            Arc::clone(http),
            azure.tenant.clone(),
            azure.client_id.clone(),
            azure.client_secret.clone(),
        ))
        .with(AzureCliCredential::new(azure.azure_cli.clone()))
        .with(ManagedIdentityCredential::new(Arc::clone(http)))
}

/// Render `input` to `output` using the real HTTP transport
///
/// # Errors
///
/// Returns a [`CliError`] if the transport cannot be built or rendering fails.
pub fn run<R: BufRead, W: Write + ?Sized>(
    cli: &Cli,
    input: R,
    output: &mut W,
) -> Result<(), CliError> {
    let http = ReqwestClient::new(Duration::from_secs(cli.timeout)).map_err(|e| {
        CliError::config_with_help(e.to_string(), "Check the TLS setup of this host")
    })?;
    run_with(cli, Arc::new(http), input, output)
}

/// Render `input` to `output` over the given transport
///
/// # Errors
///
/// Returns a [`CliError`] for the first syntax, lookup or I/O failure.
pub fn run_with<R: BufRead, W: Write + ?Sized>(
    cli: &Cli,
    http: Arc<dyn HttpClient>,
    input: R,
    output: &mut W,
) -> Result<(), CliError> {
    let chain = credential_chain(&cli.azure, &http);
    tracing::debug!(
        providers = ?chain.provider_names(),
        vault_domain = %cli.vault_domain,
        "credential chain ready"
    );

    let mut fetcher = Fetcher::new(Box::new(chain), http).with_vault_domain(&cli.vault_domain);
    let mut lookup = |reference: &str| fetcher.fetch(reference);
    vaultenv_template::filter(&mut lookup, input, output)?;

    tracing::info!(vaults = fetcher.cached_clients(), "template rendered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Cursor;
    use std::sync::Mutex;
    use vaultenv_secrets::TransportError;
    use vaultenv_secrets::http::{HttpRequest, HttpResponse};

    /// Answers managed identity and vault requests, recording every URL
    #[derive(Default)]
    struct StubAzure {
        seen: Mutex<Vec<String>>,
    }

    impl HttpClient for StubAzure {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let url = request.url.to_string();
            self.seen.lock().unwrap().push(url.clone());
            if url.starts_with("http://169.254.169.254") {
                return Ok(HttpResponse::ok(r#"{"access_token": "TOKEN_WITH_VM_IDENTITY"}"#));
            }
            let name = request.url.path().rsplit('/').next().unwrap_or_default();
            Ok(HttpResponse::ok(format!(r#"{{"value": "{name}-value"}}"#)))
        }
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["vaultenv", "--azure-cli", "vaultenv-test-missing-az"];
        argv.extend_from_slice(args);
        temp_env::with_vars_unset(
            ["VAULTENV_AZURE_USER", "VAULTENV_VAULT_DOMAIN", "VAULTENV_AZURE_CLI"],
            || Cli::try_parse_from(argv),
        )
        .unwrap()
    }

    #[test]
    fn test_chain_order() {
        let http: Arc<dyn HttpClient> = Arc::new(StubAzure::default());
        let chain = credential_chain(&cli(&[]).azure, &http);
        assert_eq!(
            chain.provider_names(),
            vec!["client-secret", "azure-cli", "managed-identity"]
        );
    }

    #[test]
    fn test_renders_with_managed_identity() {
        let stub = Arc::new(StubAzure::default());
        let mut out = Vec::new();
        let template = "USER=foo@example.com\n\nPASSWORD={{ kv \"https://example.vault.azure.net/secrets/pass\" }}\n";

        run_with(&cli(&[]), stub.clone(), Cursor::new(template), &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "USER=foo@example.com\n\nPASSWORD=pass-value\n"
        );
        assert_eq!(stub.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_vault_domain_flag_is_applied() {
        let stub = Arc::new(StubAzure::default());
        let mut out = Vec::new();

        run_with(
            &cli(&["--vault-domain", "example.com"]),
            stub,
            Cursor::new("P={{ kv \"https://kv.example.com/secrets/pass\" }}\n"),
            &mut out,
        )
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "P=pass-value\n");
    }

    #[test]
    fn test_invalid_host_fails_without_network() {
        let stub = Arc::new(StubAzure::default());
        let mut out = Vec::new();

        let err = run_with(
            &cli(&[]),
            stub.clone(),
            Cursor::new("A=1\nP={{ kv \"https://invalid.sensyn.net/secrets/pass\" }}\n"),
            &mut out,
        )
        .unwrap_err();

        assert!(matches!(err, CliError::Resolve { line: 2, .. }));
        assert_eq!(String::from_utf8(out).unwrap(), "A=1\n");
        assert!(stub.seen.lock().unwrap().is_empty());
    }
}
