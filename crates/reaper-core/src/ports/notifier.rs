//! Notifier port - 外部トラッカーへの副作用（ラベル・コメント・クローズ）
//!
//! 失敗は `NotifyError::kind()` で Transient / Permanent に分類され、
//! Transient だけがリトライされます。

use async_trait::async_trait;

use crate::domain::{ItemId, NotifyError};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn add_label(&self, item: &ItemId, label: &str) -> Result<(), NotifyError>;

    async fn post_comment(&self, item: &ItemId, body: &str) -> Result<(), NotifyError>;

    async fn close(&self, item: &ItemId) -> Result<(), NotifyError>;
}

/// One side effect as delivered to a notifier. Used by the in-memory and
/// journal implementations to record what was sent.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Label { item: ItemId, label: String },
    Comment { item: ItemId, body: String },
    Close { item: ItemId },
}

impl Effect {
    pub fn item(&self) -> &ItemId {
        match self {
            Effect::Label { item, .. } | Effect::Comment { item, .. } | Effect::Close { item } => {
                item
            }
        }
    }
}
