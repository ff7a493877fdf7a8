use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// 解码失败 - 仅中止当前视频源
    #[error("source '{source_name}' is unreadable: {reason}")]
    SourceUnreadable { source_name: String, reason: String },
    #[error("dimension mismatch: reference {expected:?}, candidate {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// 写盘失败 - 整个运行中止
    #[error("failed to write frame to {path}: {cause}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        cause: WriteCause,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no video files found in: {0}")]
    NoVideos(PathBuf),
    #[error("not a supported video file: {0}")]
    UnsupportedInput(PathBuf),
    #[error("extraction cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum WriteCause {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),
}

impl ExtractError {
    pub fn unreadable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        ExtractError::SourceUnreadable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failure(path: impl Into<PathBuf>, cause: impl Into<WriteCause>) -> Self {
        ExtractError::WriteFailure {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// 是否需要中止整个批处理
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            ExtractError::WriteFailure { .. } | ExtractError::DimensionMismatch { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 解析失败: {0}")]
    Parse(#[from] json5::Error),
    #[error("{0}")]
    Invalid(String),
}

impl From<ConfigError> for ExtractError {
    fn from(err: ConfigError) -> Self {
        ExtractError::InvalidConfig(err.to_string())
    }
}
