//! ItemStore port - 追跡対象アイテムの正本（source of truth）
//!
//! # 実装
//! - **InMemoryItemStore**: テスト用
//! - **JsonFileItemStore**: CLI 用（JSON 配列ファイル）

use async_trait::async_trait;

use crate::domain::{ItemKind, StoreError, TrackableItem};

/// ItemStore はアイテムの読み出しと、遷移後の状態の保存を行う
///
/// # 設計原則
/// - `list_items` は呼び出し時点のスナップショットを返す
/// - `save` は 1 アイテム単位（アイテム間で状態を共有しない）
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// All items of `kind`, in a stable order.
    async fn list_items(&self, kind: ItemKind) -> Result<Vec<TrackableItem>, StoreError>;

    /// Replace the stored item with the same id.
    async fn save(&self, item: &TrackableItem) -> Result<(), StoreError>;
}
