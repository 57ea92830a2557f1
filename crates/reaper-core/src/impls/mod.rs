//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryItemStore / InMemoryNotifier**: テスト用（失敗注入つき）
//! - **JsonFileItemStore**: CLI 用の JSON ファイルストア
//! - **JournalNotifier**: CLI 用、副作用を JSON Lines に追記

pub mod inmem_notifier;
pub mod inmem_store;
pub mod journal_notifier;
pub mod json_store;

pub use self::inmem_notifier::{Failure, InMemoryNotifier};
pub use self::inmem_store::InMemoryItemStore;
pub use self::journal_notifier::JournalNotifier;
pub use self::json_store::JsonFileItemStore;
