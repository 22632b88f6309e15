use std::fmt;

use serde::{Deserialize, Serialize};

/// 短链接 key（URL 非保留字符组成的字符串）
pub type StorageKey = String;

/// 目标 URL
pub type StorageValue = String;

/// 不可变的 (key, value) 存储单元
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub key: StorageKey,
    pub value: StorageValue,
}

impl Item {
    pub fn new(key: impl Into<StorageKey>, value: impl Into<StorageValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 批量写入策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// 全部成功或全部不写入，任一 key 冲突则整批拒绝
    #[default]
    Atomic,
    /// 逐条独立写入，冲突的 key 被跳过并上报
    BestEffort,
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic => write!(f, "atomic"),
            Self::BestEffort => write!(f, "best_effort"),
        }
    }
}

impl std::str::FromStr for BatchMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            _ => Err(format!(
                "Invalid batch mode: '{}'. Valid: atomic, best_effort",
                s
            )),
        }
    }
}

/// 批量写入结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// 实际写入的条目数
    pub saved: usize,
    /// 因 key 已存在（或在同一批次中重复）而被跳过的 key
    pub skipped: Vec<StorageKey>,
}

/// 存储生命周期状态
///
/// `Uninitialized --init--> Ready --close--> Closed`
/// `Uninitialized --init 失败--> Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Ready,
    Closed,
    Failed,
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Closed => write!(f, "closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
