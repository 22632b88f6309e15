//! CLI mode
//!
//! Runs one client command, prints its output and maps failures to the CLI
//! exit code.

use crate::cli::Commands;
use crate::config::StaticConfig;
use crate::interfaces::cli::{CLI_ERROR_EXIT_CODE, format_cli_error, run_cli_command};

/// Run CLI mode, returning the process exit code
pub fn run_cli(cmd: Commands, config: &StaticConfig) -> i32 {
    match run_cli_command(cmd, config) {
        Ok(output) => {
            println!("{}", output.trim_end());
            0
        }
        Err(e) => {
            eprintln!("{}", format_cli_error(&e));
            CLI_ERROR_EXIT_CODE
        }
    }
}
