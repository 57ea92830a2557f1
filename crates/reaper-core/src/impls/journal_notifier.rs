//! JournalNotifier - 副作用を JSON Lines ファイルに追記する Notifier
//!
//! CLI では外部トラッカーの代わりにこれを使います。1 行 = 1 副作用。

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ItemId, NotifyError};
use crate::ports::{Effect, Notifier};

#[derive(Serialize)]
struct JournalLine<'a> {
    at: DateTime<Utc>,
    #[serde(flatten)]
    effect: &'a Effect,
}

pub struct JournalNotifier {
    file: Arc<Mutex<File>>,
}

impl JournalNotifier {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, NotifyError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    async fn append(&self, effect: Effect) -> Result<(), NotifyError> {
        let mut line = serde_json::to_vec(&JournalLine {
            at: Utc::now(),
            effect: &effect,
        })?;
        line.push(b'\n');

        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || {
            let mut file = file
                .lock()
                .map_err(|_| std::io::Error::other("journal lock poisoned"))?;
            file.write_all(&line)?;
            file.flush()
        })
        .await
        .map_err(|e| NotifyError::Transient {
            item: effect.item().clone(),
            message: format!("journal task failed: {e}"),
        })??;
        Ok(())
    }
}

#[async_trait]
impl Notifier for JournalNotifier {
    async fn add_label(&self, item: &ItemId, label: &str) -> Result<(), NotifyError> {
        self.append(Effect::Label {
            item: item.clone(),
            label: label.to_string(),
        })
        .await
    }

    async fn post_comment(&self, item: &ItemId, body: &str) -> Result<(), NotifyError> {
        self.append(Effect::Comment {
            item: item.clone(),
            body: body.to_string(),
        })
        .await
    }

    async fn close(&self, item: &ItemId) -> Result<(), NotifyError> {
        self.append(Effect::Close { item: item.clone() }).await
    }
}
