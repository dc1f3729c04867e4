//! Integration tests for the vaultenv binary
//!
//! None of these reach the network: they either contain no lookups or fail
//! before a token is requested.

use assert_cmd::Command;
use predicates::prelude::*;

/// The binary with a clean, network-free configuration
fn vaultenv() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("vaultenv").unwrap();
    cmd.env_remove("VAULTENV_AZURE_TENANT")
        .env_remove("VAULTENV_AZURE_USER")
        .env_remove("VAULTENV_AZURE_PASSWORD")
        .env_remove("VAULTENV_VAULT_DOMAIN")
        .env_remove("VAULTENV_LOG")
        .env_remove("RUST_LOG")
        .env("VAULTENV_AZURE_CLI", "vaultenv-test-missing-az");
    cmd
}

#[test]
fn test_plain_template_passes_through() {
    vaultenv()
        .write_stdin("USER=foo@example.com\n\n# comment\nHOST=localhost")
        .assert()
        .success()
        .stdout("USER=foo@example.com\n\n# comment\nHOST=localhost\n");
}

#[test]
fn test_literal_actions_render_without_credentials() {
    vaultenv()
        .write_stdin("BRACES={{ \"{{\" }}\n{{/* dropped */}}\nA = {{- \"x\" -}} ;\n")
        .assert()
        .success()
        .stdout("BRACES={{\n\nA =x;\n");
}

#[test]
fn test_syntax_error_exits_with_failure() {
    vaultenv()
        .write_stdin("A=1\nB={{ env \"HOME\" }}\nC=3\n")
        .assert()
        .code(1)
        .stdout("A=1\n")
        .stderr(predicate::str::contains("vaultenv::template::syntax"));
}

#[test]
fn test_invalid_host_exits_before_any_request() {
    vaultenv()
        .write_stdin("USER=foo\nPASSWORD={{ kv \"https://invalid.sensyn.net/secrets/pass\" }}\n")
        .assert()
        .code(1)
        .stdout("USER=foo\n")
        .stderr(predicate::str::contains("vaultenv::secrets::resolve"))
        .stderr(predicate::str::contains("invalid.sensyn.net"));
}

#[test]
fn test_invalid_path_exits_with_failure() {
    vaultenv()
        .write_stdin("P={{ kv \"https://example.vault.azure.net/keys/pass\" }}\n")
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("vaultenv::secrets::resolve"));
}

#[test]
fn test_logs_never_reach_stdout() {
    vaultenv()
        .args(["--level", "trace", "--log-format", "json"])
        .write_stdin("A=1\n")
        .assert()
        .success()
        .stdout("A=1\n");
}

#[test]
fn test_invalid_log_filter_is_a_config_error() {
    vaultenv()
        .args(["--log-filter", "vaultenv=notalevel"])
        .write_stdin("A=1\n")
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("vaultenv::cli::config"));
}

#[test]
fn test_help_lists_environment_variables() {
    vaultenv()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("VAULTENV_AZURE_USER"))
        .stdout(predicate::str::contains("--vault-domain"));
}

#[test]
fn test_client_secret_value_is_not_shown_in_help() {
    vaultenv()
        .env("VAULTENV_AZURE_PASSWORD", "hunter2")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2").not());
}
