//! vaultenv binary entry point

#![allow(clippy::print_stderr)]

use std::io::{self, Write};
use vaultenv::cli::{self, CliError, EXIT_FAILURE, EXIT_OK, render_error};
use vaultenv::tracing::{TracingConfig, init_tracing};

fn main() {
    // NOTE: tracing may be unusable during a panic, so report directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    let exit_code = match run_main(&cli) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            render_error(&err);
            EXIT_FAILURE
        }
    };
    std::process::exit(exit_code);
}

fn run_main(cli: &cli::Cli) -> Result<(), CliError> {
    init_tracing(&TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        filter: cli.log_filter.clone(),
    })?;

    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let result = vaultenv::run::run(cli, stdin, &mut stdout);

    // Lines rendered before a failure are still delivered
    let flushed = stdout.flush().map_err(|e| CliError::Io {
        message: format!("failed to flush output: {e}"),
    });
    result.and(flushed)
}
