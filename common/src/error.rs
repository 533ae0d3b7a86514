//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// IoU > 1 などの幾何不変条件違反（データまたはアルゴリズムのバグ）
    #[error("Geometry invariant violated: {0}")]
    Geometry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 内部不変条件違反かどうか（回復不能として扱う）
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Geometry(_))
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
