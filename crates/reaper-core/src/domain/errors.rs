//! Errors - エラー型と分類
//!
//! 外部 I/O のエラーは `ErrorKind` を持ち、リトライするかどうかの判断に使います。

use thiserror::Error;

use super::ids::ItemId;

/// ErrorKind は外部呼び出しエラーの分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Infrastructure: ローカル環境の障害（ファイル I/O など）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Errors that know whether retrying can help.
pub trait Classified {
    fn kind(&self) -> ErrorKind;
}

/// Invalid configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown item kind: {0:?} (expected issue or pull-request)")]
    UnknownKind(String),

    #[error("{field} must be a non-negative integer, got {value}")]
    NegativeDays { field: &'static str, value: i64 },

    #[error("{field} is not an integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("item-kinds lists no item kind")]
    NoItemKinds,

    #[error("operations-per-run must be at least 1, got {0}")]
    NoOperations(i64),

    #[error("invalid cron schedule {0:?}: expected 5 fields")]
    InvalidSchedule(String),

    #[error("workflow file has no step configuring days-before-stale")]
    NoReaperStep,

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reading or writing the item store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::Permanent,
            StoreError::Unavailable(_) => ErrorKind::Transient,
            StoreError::Io(_) | StoreError::Malformed(_) => ErrorKind::Infrastructure,
        }
    }
}

impl Classified for StoreError {
    fn kind(&self) -> ErrorKind {
        StoreError::kind(self)
    }
}

/// Failure delivering a side effect (label, comment, close) to the tracker.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transient failure on {item}: {message}")]
    Transient { item: ItemId, message: String },

    #[error("rejected for {item}: {message}")]
    Rejected { item: ItemId, message: String },

    #[error("notifier I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode effect: {0}")]
    Encode(#[from] serde_json::Error),
}

impl NotifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotifyError::Transient { .. } => ErrorKind::Transient,
            NotifyError::Rejected { .. } => ErrorKind::Permanent,
            NotifyError::Io(_) | NotifyError::Encode(_) => ErrorKind::Infrastructure,
        }
    }
}

impl Classified for NotifyError {
    fn kind(&self) -> ErrorKind {
        NotifyError::kind(self)
    }
}

/// Top-level error of the reaper library.
#[derive(Debug, Error)]
pub enum ReaperError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}
