//! App - アプリケーション層
//!
//! ports を組み合わせてバッチ実行を組み立てます。
//!
//! # 主要コンポーネント
//! - **ReaperBuilder**: 構築とワイヤリング（Fail-fast）
//! - **ReaperLoop**: 1 回のバッチ実行（list → evaluate → effects → apply → save）
//! - **RetryPolicy**: 外部呼び出しの指数バックオフ
//! - **RunReport**: 実行結果

pub mod builder;
pub mod effects;
pub mod reaper_loop;
pub mod retry;
pub mod status;

pub use self::builder::{BuildError, DEFAULT_CONCURRENCY, ReaperBuilder};
pub use self::reaper_loop::{Plan, PlannedAction, ReaperLoop, plan};
pub use self::retry::RetryPolicy;
pub use self::status::{FailureRecord, RunCounts, RunReport, TransitionRecord};
