//! 错误类型 (配置加载 / 回放输入解析)
//!
//! 跟踪核心本身没有可恢复错误, 只在文件与 JSON 边界上返回错误.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input at line {line}: {message}")]
    InvalidInput { line: usize, message: String },
}

impl TrackerError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
