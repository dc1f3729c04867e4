//! vaultenv - render env-file templates with secrets from Azure Key Vault
//!
//! The binary reads a template from stdin and writes it to stdout with every
//! `{{ kv "https://<vault>.vault.azure.net/secrets/<name>" }}` action replaced
//! by the secret value. This library exposes the pieces the binary is built
//! from so they can be tested and reused:
//!
//! - [`cli`] - arguments, environment configuration and error rendering
//! - [`run`] - the credential chain and the fetch-and-render loop
//! - [`tracing`] - subscriber setup, always on stderr

// Error rendering writes to stderr
#![allow(clippy::print_stderr)]

/// CLI argument parsing, errors and exit codes.
pub mod cli;
pub mod run;
pub mod tracing;

pub use cli::{Cli, CliError, EXIT_FAILURE, EXIT_OK};
