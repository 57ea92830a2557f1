//! InMemoryItemStore - テスト用のアイテムストア

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ItemId, ItemKind, StoreError, TrackableItem};
use crate::ports::ItemStore;

/// Items kept in insertion order, plus optional injected save failures.
#[derive(Default)]
pub struct InMemoryItemStore {
    items: Mutex<Vec<TrackableItem>>,
    /// item -> number of saves left that fail with `Unavailable`
    flaky_saves: Mutex<HashMap<ItemId, u32>>,
}

impl InMemoryItemStore {
    pub fn new(items: Vec<TrackableItem>) -> Self {
        Self {
            items: Mutex::new(items),
            flaky_saves: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next `times` saves of `item` fail transiently.
    pub async fn fail_saves(&self, item: impl Into<ItemId>, times: u32) {
        self.flaky_saves.lock().await.insert(item.into(), times);
    }

    pub async fn get(&self, id: &ItemId) -> Option<TrackableItem> {
        self.items.lock().await.iter().find(|i| &i.id == id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<TrackableItem> {
        self.items.lock().await.clone()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn list_items(&self, kind: ItemKind) -> Result<Vec<TrackableItem>, StoreError> {
        let items = self.items.lock().await;
        Ok(items.iter().filter(|i| i.kind == kind).cloned().collect())
    }

    async fn save(&self, item: &TrackableItem) -> Result<(), StoreError> {
        {
            let mut flaky = self.flaky_saves.lock().await;
            if let Some(left) = flaky.get_mut(&item.id)
                && *left > 0
            {
                *left -= 1;
                return Err(StoreError::Unavailable(format!("injected failure for {}", item.id)));
            }
        }

        let mut items = self.items.lock().await;
        let slot = items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| StoreError::NotFound(item.id.clone()))?;
        *slot = item.clone();
        Ok(())
    }
}
