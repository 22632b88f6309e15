use std::borrow::Cow;
use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkstashError {
    /// `save` 时 key 已存在
    KeyAlreadyExists(String),
    /// `load` 时 key 不存在
    KeyNotFound(String),
    /// 原子批量写入中存在冲突的 key，整批未写入
    BatchRejected(Vec<String>),
    StoreOpen(String),
    StoreLocked(String),
    StoreNotReady(String),
    StorageOperation(String),
    Compaction(String),
    ConfigLoad(String),
    FileOperation(String),
    Serialization(String),
    Validation(String),
    ClientRequest(String),
}

impl LinkstashError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkstashError::KeyAlreadyExists(_) => "E001",
            LinkstashError::KeyNotFound(_) => "E002",
            LinkstashError::BatchRejected(_) => "E003",
            LinkstashError::StoreOpen(_) => "E004",
            LinkstashError::StoreLocked(_) => "E005",
            LinkstashError::StoreNotReady(_) => "E006",
            LinkstashError::StorageOperation(_) => "E007",
            LinkstashError::Compaction(_) => "E008",
            LinkstashError::ConfigLoad(_) => "E009",
            LinkstashError::FileOperation(_) => "E010",
            LinkstashError::Serialization(_) => "E011",
            LinkstashError::Validation(_) => "E012",
            LinkstashError::ClientRequest(_) => "E013",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkstashError::KeyAlreadyExists(_) => "Key Already Exists",
            LinkstashError::KeyNotFound(_) => "Key Not Found",
            LinkstashError::BatchRejected(_) => "Batch Rejected",
            LinkstashError::StoreOpen(_) => "Store Open Error",
            LinkstashError::StoreLocked(_) => "Store Locked",
            LinkstashError::StoreNotReady(_) => "Store Not Ready",
            LinkstashError::StorageOperation(_) => "Storage Operation Error",
            LinkstashError::Compaction(_) => "Compaction Error",
            LinkstashError::ConfigLoad(_) => "Configuration Error",
            LinkstashError::FileOperation(_) => "File Operation Error",
            LinkstashError::Serialization(_) => "Serialization Error",
            LinkstashError::Validation(_) => "Validation Error",
            LinkstashError::ClientRequest(_) => "Client Request Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            LinkstashError::BatchRejected(keys) => Cow::Owned(keys.join(", ")),
            LinkstashError::KeyAlreadyExists(msg)
            | LinkstashError::KeyNotFound(msg)
            | LinkstashError::StoreOpen(msg)
            | LinkstashError::StoreLocked(msg)
            | LinkstashError::StoreNotReady(msg)
            | LinkstashError::StorageOperation(msg)
            | LinkstashError::Compaction(msg)
            | LinkstashError::ConfigLoad(msg)
            | LinkstashError::FileOperation(msg)
            | LinkstashError::Serialization(msg)
            | LinkstashError::Validation(msg)
            | LinkstashError::ClientRequest(msg) => Cow::Borrowed(msg),
        }
    }

    /// 是否为正常业务流程中的预期错误（调用方应按结果处理，而非视为故障）
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            LinkstashError::KeyAlreadyExists(_)
                | LinkstashError::KeyNotFound(_)
                | LinkstashError::BatchRejected(_)
        )
    }

    /// 映射为 HTTP 状态码
    pub fn http_status(&self) -> StatusCode {
        match self {
            LinkstashError::KeyAlreadyExists(_) | LinkstashError::BatchRejected(_) => {
                StatusCode::CONFLICT
            }
            LinkstashError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            LinkstashError::Validation(_) => StatusCode::BAD_REQUEST,
            LinkstashError::StoreNotReady(_) | LinkstashError::StoreLocked(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    #[cfg(feature = "server")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().as_ref().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkstashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkstashError {}

// 便捷的构造函数
impl LinkstashError {
    pub fn key_already_exists<T: Into<String>>(key: T) -> Self {
        LinkstashError::KeyAlreadyExists(key.into())
    }

    pub fn key_not_found<T: Into<String>>(key: T) -> Self {
        LinkstashError::KeyNotFound(key.into())
    }

    pub fn batch_rejected(keys: Vec<String>) -> Self {
        LinkstashError::BatchRejected(keys)
    }

    pub fn store_open<T: Into<String>>(msg: T) -> Self {
        LinkstashError::StoreOpen(msg.into())
    }

    pub fn store_locked<T: Into<String>>(msg: T) -> Self {
        LinkstashError::StoreLocked(msg.into())
    }

    pub fn store_not_ready<T: Into<String>>(msg: T) -> Self {
        LinkstashError::StoreNotReady(msg.into())
    }

    pub fn storage_operation<T: Into<String>>(msg: T) -> Self {
        LinkstashError::StorageOperation(msg.into())
    }

    pub fn compaction<T: Into<String>>(msg: T) -> Self {
        LinkstashError::Compaction(msg.into())
    }

    pub fn config_load<T: Into<String>>(msg: T) -> Self {
        LinkstashError::ConfigLoad(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        LinkstashError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkstashError::Serialization(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkstashError::Validation(msg.into())
    }

    pub fn client_request<T: Into<String>>(msg: T) -> Self {
        LinkstashError::ClientRequest(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<std::io::Error> for LinkstashError {
    fn from(err: std::io::Error) -> Self {
        LinkstashError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkstashError {
    fn from(err: serde_json::Error) -> Self {
        LinkstashError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for LinkstashError {
    fn from(err: config::ConfigError) -> Self {
        LinkstashError::ConfigLoad(err.to_string())
    }
}

impl From<redb::TransactionError> for LinkstashError {
    fn from(err: redb::TransactionError) -> Self {
        LinkstashError::StorageOperation(format!("transaction error: {}", err))
    }
}

impl From<redb::CommitError> for LinkstashError {
    fn from(err: redb::CommitError) -> Self {
        LinkstashError::StorageOperation(format!("commit error: {}", err))
    }
}

impl From<redb::TableError> for LinkstashError {
    fn from(err: redb::TableError) -> Self {
        LinkstashError::StorageOperation(format!("table error: {}", err))
    }
}

impl From<redb::StorageError> for LinkstashError {
    fn from(err: redb::StorageError) -> Self {
        LinkstashError::StorageOperation(format!("storage error: {}", err))
    }
}

impl From<redb::CompactionError> for LinkstashError {
    fn from(err: redb::CompactionError) -> Self {
        LinkstashError::Compaction(err.to_string())
    }
}

impl From<tokio::task::JoinError> for LinkstashError {
    fn from(err: tokio::task::JoinError) -> Self {
        LinkstashError::StorageOperation(format!("blocking task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, LinkstashError>;
