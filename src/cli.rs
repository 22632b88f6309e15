//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// linkstash - A small URL shortener backed by a pluggable state store
#[derive(Parser)]
#[command(name = "linkstash")]
#[command(version)]
#[command(about = "A small URL shortener backed by a pluggable state store", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default when no command is given)
    Server,

    /// Add a short link
    Add {
        /// Short key
        key: String,
        /// Target URL
        url: String,
    },

    /// Delete a short link
    Delete {
        /// Short key
        key: String,
    },

    /// List all short links
    List,

    /// Add short links from a file with one `key,url` pair per line
    AddBatch {
        /// Input file path
        file: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// 是否运行服务器模式
    pub fn is_server_mode(&self) -> bool {
        matches!(self.command, None | Some(Commands::Server))
    }
}
