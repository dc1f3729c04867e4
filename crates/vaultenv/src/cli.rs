use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser};
use miette::{Diagnostic, Report, SourceSpan};
use std::io::{self, Write};
use thiserror::Error;
use vaultenv_secrets::credentials::DEFAULT_AZURE_CLI;
use vaultenv_secrets::{CredentialError, DEFAULT_VAULT_DOMAIN, SecretError};
use vaultenv_template::TemplateError;

/// Exit code for a fully rendered template
pub const EXIT_OK: i32 = 0;
/// Exit code for any failure
pub const EXIT_FAILURE: i32 = 1;

/// Render an env-file template from stdin to stdout, resolving secret
/// lookups against Azure Key Vault
#[derive(Parser, Debug)]
#[command(name = "vaultenv")]
#[command(about = "Render env-file templates with secrets from Azure Key Vault")]
#[command(
    long_about = "Reads a template from stdin and writes it to stdout with every \
                  {{ kv \"https://<vault>.vault.azure.net/secrets/<name>[/<version>]\" }} \
                  replaced by the secret value.\n\n\
                  Credentials are tried in order: client secret (when a client id is set), \
                  the Azure CLI, then the instance managed identity."
)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub azure: AzureArgs,

    #[arg(
        long,
        env = "VAULTENV_VAULT_DOMAIN",
        help = "Domain every secret reference host must be a subdomain of",
        default_value = DEFAULT_VAULT_DOMAIN
    )]
    pub vault_domain: String,

    #[arg(
        long,
        env = "VAULTENV_HTTP_TIMEOUT",
        help = "HTTP request timeout in seconds",
        value_name = "SECONDS",
        default_value_t = 30
    )]
    pub timeout: u64,

    #[arg(
        short = 'l',
        long,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(long, help = "Log output format", default_value = "compact", value_enum)]
    pub log_format: TracingFormat,

    #[arg(
        long,
        env = "VAULTENV_LOG",
        help = "Tracing filter directive; overrides --level and RUST_LOG",
        value_name = "DIRECTIVE"
    )]
    pub log_filter: Option<String>,
}

/// Azure identity settings
#[derive(Args, Clone, Default)]
pub struct AzureArgs {
    #[arg(
        long,
        env = "VAULTENV_AZURE_TENANT",
        help = "Azure AD tenant for the client secret credential",
        default_value = ""
    )]
    pub tenant: String,

    #[arg(
        long,
        env = "VAULTENV_AZURE_USER",
        help = "Application (client) id; enables the client secret credential",
        default_value = ""
    )]
    pub client_id: String,

    #[arg(
        long,
        env = "VAULTENV_AZURE_PASSWORD",
        help = "Client secret for the client secret credential",
        hide_env_values = true,
        default_value = ""
    )]
    pub client_secret: String,

    #[arg(
        long,
        env = "VAULTENV_AZURE_CLI",
        help = "Azure CLI executable",
        default_value = DEFAULT_AZURE_CLI
    )]
    pub azure_cli: String,
}

impl std::fmt::Debug for AzureArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureArgs")
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("azure_cli", &self.azure_cli)
            .finish()
    }
}

/// Parse the command line and environment
pub fn parse() -> Cli {
    Cli::parse()
}

/// CLI-level errors with diagnostics
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Invalid configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(vaultenv::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// A template line failed to parse
    #[error("Template error on line {line}: {message}")]
    #[diagnostic(code(vaultenv::template::syntax))]
    Template {
        /// 1-based line number
        line: usize,
        /// The parse failure
        message: String,
        /// The offending line
        #[source_code]
        src: String,
        /// Where in the line it failed
        #[label("{message}")]
        span: SourceSpan,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// A secret lookup failed
    #[error("Failed to resolve secret on line {line}: {message}")]
    #[diagnostic(code(vaultenv::secrets::resolve))]
    Resolve {
        /// 1-based line number
        line: usize,
        /// The reference that failed
        reference: String,
        /// The underlying failure
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// Reading the template or writing the output failed
    #[error("I/O error: {message}")]
    #[diagnostic(code(vaultenv::cli::io))]
    Io {
        /// The error message
        message: String,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Suggest a fix for the common lookup failures
fn resolve_help(error: &(dyn std::error::Error + 'static)) -> Option<String> {
    let error = error.downcast_ref::<SecretError>()?;
    match error {
        SecretError::InvalidUrl { .. } => Some(
            "Secret hosts must be subdomains of the vault domain; see --vault-domain".to_string(),
        ),
        SecretError::InvalidPath { .. } => Some(
            "Secret references look like https://<vault>.vault.azure.net/secrets/<name>[/<version>]"
                .to_string(),
        ),
        SecretError::Token(err) if matches!(err.root(), CredentialError::NotAvailable) => Some(
            "Set VAULTENV_AZURE_TENANT, VAULTENV_AZURE_USER and VAULTENV_AZURE_PASSWORD, \
             log in with 'az login', or run with a managed identity"
                .to_string(),
        ),
        _ => None,
    }
}

impl From<TemplateError> for CliError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::Syntax {
                line,
                source_line,
                error,
                ..
            } => Self::Template {
                line,
                message: error.message,
                src: source_line,
                span: (error.span.offset, error.span.len).into(),
                help: Some(
                    "Lookups look like {{ kv \"https://<vault>.vault.azure.net/secrets/<name>\" }}"
                        .to_string(),
                ),
            },
            TemplateError::Lookup {
                line,
                reference,
                source,
            } => Self::Resolve {
                line,
                help: resolve_help(source.as_ref()),
                message: format!("{reference}: {source}"),
                reference,
            },
            TemplateError::Read { .. } | TemplateError::Write(_) => {
                let message = match std::error::Error::source(&err) {
                    Some(source) => format!("{err}: {source}"),
                    None => err.to_string(),
                };
                Self::Io { message }
            }
        }
    }
}

/// Render an error to stderr with miette
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    let _ = io::stderr().flush();
}
