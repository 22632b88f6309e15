//! Link commands

use std::path::Path;

use tracing::debug;

use crate::client::AdminClient;
use crate::errors::{LinkstashError, Result};

pub fn add_link(client: &AdminClient, key: &str, url: &str) -> Result<String> {
    client.add(key, url)
}

pub fn delete_link(client: &AdminClient, key: &str) -> Result<String> {
    client.delete(key)
}

pub fn list_links(client: &AdminClient) -> Result<String> {
    client.list()
}

/// 读取批量文件并整体提交，行格式由服务端校验
pub fn add_batch(client: &AdminClient, file: &str) -> Result<String> {
    let body = read_batch_file(Path::new(file))?;
    debug!("Submitting batch file {} ({} lines)", file, body.lines().count());
    client.add_batch(&body)
}

fn read_batch_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        LinkstashError::file_operation(format!(
            "Could not open file {}: {}",
            path.display(),
            e
        ))
    })
}
