//! Token from a pre-authenticated Azure CLI

use super::{AccessToken, CredentialError, KEY_VAULT_RESOURCE, TokenProvider};
use serde::Deserialize;
use std::io::ErrorKind;
use std::process::Command;

/// Command looked up on `PATH` when no explicit path is configured
pub const DEFAULT_AZURE_CLI: &str = "az";

/// Runs `az account get-access-token` and reads `accessToken` from its JSON output.
///
/// Not available when the executable cannot be found or executed. When it
/// runs but fails, or prints something other than a token, the error carries
/// its stderr verbatim.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    command: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
}

impl AzureCliCredential {
    /// Use the given executable name or path
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The configured executable
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new(DEFAULT_AZURE_CLI)
    }
}

impl TokenProvider for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure-cli"
    }

    fn token(&self) -> Result<AccessToken, CredentialError> {
        tracing::debug!(command = %self.command, "requesting token from Azure CLI");

        let output = match Command::new(&self.command)
            .args([
                "account",
                "get-access-token",
                "--resource",
                KEY_VAULT_RESOURCE,
                "--output",
                "json",
            ])
            .output()
        {
            Ok(output) => output,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                tracing::debug!(command = %self.command, error = %e, "Azure CLI not usable");
                return Err(CredentialError::NotAvailable);
            }
            Err(e) => {
                return Err(CredentialError::Spawn {
                    command: self.command.clone(),
                    message: e.to_string(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        if !output.status.success() {
            return Err(CredentialError::Command {
                command: self.command.clone(),
                stderr,
            });
        }

        let payload: CliToken =
            serde_json::from_slice(&output.stdout).map_err(|e| CredentialError::CommandOutput {
                command: self.command.clone(),
                message: e.to_string(),
                stderr,
            })?;
        if payload.access_token.is_empty() {
            return Err(CredentialError::EmptyToken {
                endpoint: self.command.clone(),
            });
        }
        Ok(AccessToken::new(payload.access_token))
    }
}
