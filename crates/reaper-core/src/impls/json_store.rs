//! JsonFileItemStore - JSON 配列ファイルをバックエンドにしたアイテムストア
//!
//! 起動時に全件を読み込み、`save` のたびにファイル全体を
//! アトミックに書き戻します（tempfile → rename）。
//!
//! 読めない要素（壊れたタイムスタンプなど）は warn ログを出してスキップし、
//! 書き戻すときは元の JSON のまま残します。

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::domain::{ItemKind, StoreError, TrackableItem};
use crate::ports::ItemStore;

/// One element of the items file.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Entry {
    Item(TrackableItem),
    /// Kept verbatim so a rewrite does not drop it.
    Unreadable(Value),
}

pub struct JsonFileItemStore {
    path: PathBuf,
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl JsonFileItemStore {
    /// Read every item from `path`.
    ///
    /// The file must be a JSON array. Elements that do not decode as an item
    /// are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = std::fs::read(&path)?;
        let raw: Vec<Value> = serde_json::from_slice(&data)?;

        let entries = raw
            .into_iter()
            .enumerate()
            .map(|(index, value)| match TrackableItem::deserialize(&value) {
                Ok(item) => Entry::Item(item),
                Err(err) => {
                    let id = value.get("id").map(Value::to_string).unwrap_or_default();
                    tracing::warn!(index, %id, error = %err, "skipping unreadable item");
                    Entry::Unreadable(value)
                }
            })
            .collect();

        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Readable items, in file order.
    pub async fn snapshot(&self) -> Vec<TrackableItem> {
        self.entries
            .lock()
            .await
            .iter()
            .filter_map(|entry| match entry {
                Entry::Item(item) => Some(item.clone()),
                Entry::Unreadable(_) => None,
            })
            .collect()
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ItemStore for JsonFileItemStore {
    async fn list_items(&self, kind: ItemKind) -> Result<Vec<TrackableItem>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Item(item) if item.kind == kind => Some(item.clone()),
                _ => None,
            })
            .collect())
    }

    async fn save(&self, item: &TrackableItem) -> Result<(), StoreError> {
        // ロックを保持したまま書き込み、ファイルへの書き込み順を保つ
        let mut entries = self.entries.lock().await;
        let index = entries
            .iter()
            .position(|entry| matches!(entry, Entry::Item(i) if i.id == item.id))
            .ok_or_else(|| StoreError::NotFound(item.id.clone()))?;

        // メモリ上の状態はファイルへの書き込みが成功してから更新する
        let mut next = entries.clone();
        next[index] = Entry::Item(item.clone());

        let data = serde_json::to_vec_pretty(&next)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &data))
            .await
            .map_err(|e| StoreError::Unavailable(format!("write task failed: {e}")))??;

        *entries = next;
        Ok(())
    }
}
