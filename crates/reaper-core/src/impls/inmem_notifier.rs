//! InMemoryNotifier - テスト用の Notifier
//!
//! 送信した副作用を記録し、アイテムごとに失敗を注入できます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ItemId, NotifyError};
use crate::ports::{Effect, Notifier};

/// Scripted failure for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The next `n` calls fail transiently, then calls succeed.
    Transient(u32),
    /// Every call is rejected.
    Permanent,
}

#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Effect>>,
    failures: Mutex<HashMap<ItemId, Failure>>,
    calls: Mutex<u32>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail(&self, item: impl Into<ItemId>, failure: Failure) {
        self.failures.lock().await.insert(item.into(), failure);
    }

    /// Effects delivered successfully, in order.
    pub async fn sent(&self) -> Vec<Effect> {
        self.sent.lock().await.clone()
    }

    /// Total calls, failed ones included.
    pub async fn calls(&self) -> u32 {
        *self.calls.lock().await
    }

    async fn deliver(&self, effect: Effect) -> Result<(), NotifyError> {
        *self.calls.lock().await += 1;

        let item = effect.item().clone();
        {
            let mut failures = self.failures.lock().await;
            match failures.get_mut(&item) {
                Some(Failure::Permanent) => {
                    return Err(NotifyError::Rejected {
                        item,
                        message: "injected permanent failure".to_string(),
                    });
                }
                Some(Failure::Transient(left)) if *left > 0 => {
                    *left -= 1;
                    return Err(NotifyError::Transient {
                        item,
                        message: "injected transient failure".to_string(),
                    });
                }
                _ => {}
            }
        }

        self.sent.lock().await.push(effect);
        Ok(())
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn add_label(&self, item: &ItemId, label: &str) -> Result<(), NotifyError> {
        self.deliver(Effect::Label {
            item: item.clone(),
            label: label.to_string(),
        })
        .await
    }

    async fn post_comment(&self, item: &ItemId, body: &str) -> Result<(), NotifyError> {
        self.deliver(Effect::Comment {
            item: item.clone(),
            body: body.to_string(),
        })
        .await
    }

    async fn close(&self, item: &ItemId) -> Result<(), NotifyError> {
        self.deliver(Effect::Close { item: item.clone() }).await
    }
}
