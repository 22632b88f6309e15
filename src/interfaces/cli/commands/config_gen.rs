//! Generate config command

use std::path::Path;

use crate::config::StaticConfig;
use crate::errors::{LinkstashError, Result};

const DEFAULT_OUTPUT_PATH: &str = "config.example.toml";

/// Generate example configuration file
pub fn generate_config(output_path: Option<String>, force: bool) -> Result<String> {
    let path = output_path.unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());

    if Path::new(&path).exists() && !force {
        return Err(LinkstashError::file_operation(format!(
            "{} already exists, use --force to overwrite",
            path
        )));
    }

    StaticConfig::default().save_to_file(&path)?;
    Ok(format!("Configuration file generated: {}", path))
}
