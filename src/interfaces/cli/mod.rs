//! CLI interface module
//!
//! Client commands talk to a running server through the admin interface.

pub mod commands;

use crate::cli::{Commands, ConfigCommands};
use crate::client::AdminClient;
use crate::config::StaticConfig;
use crate::errors::{LinkstashError, Result};

/// CLI 命令失败时的进程退出码
pub const CLI_ERROR_EXIT_CODE: i32 = 3;

/// 格式化 CLI 错误输出
pub fn format_cli_error(err: &LinkstashError) -> String {
    use colored::Colorize;
    format!("{} {}", "> ERROR:".red().bold(), err.message())
}

/// Run a CLI command from clap-parsed input
///
/// 返回需要打印到 stdout 的文本。
pub fn run_cli_command(cmd: Commands, config: &StaticConfig) -> Result<String> {
    let client = || AdminClient::from_config(config);

    match cmd {
        Commands::Add { key, url } => commands::add_link(&client(), &key, &url),
        Commands::Delete { key } => commands::delete_link(&client(), &key),
        Commands::List => commands::list_links(&client()),
        Commands::AddBatch { file } => commands::add_batch(&client(), &file),
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => commands::generate_config(output_path, force),
        Commands::Server => Err(LinkstashError::validation(
            "server mode is not a client command",
        )),
    }
}
