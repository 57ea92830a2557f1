//! TrackableItem - 追跡対象（issue / pull request）のスナップショット

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ItemId;
use super::state::{ItemKind, ItemState};

/// One issue or pull request as seen by the reaper.
///
/// Timestamps are optional on input: stores fed from external exports may
/// lack them. The batch skips such items instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackableItem {
    pub id: ItemId,
    pub kind: ItemKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub labels: BTreeSet<String>,

    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,

    #[serde(default = "default_state")]
    pub state: ItemState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_marked_at: Option<DateTime<Utc>>,
}

fn default_state() -> ItemState {
    ItemState::Active
}

impl TrackableItem {
    /// A fresh active item.
    pub fn new(id: impl Into<ItemId>, kind: ItemKind, last_activity_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: None,
            labels: BTreeSet::new(),
            last_activity_at: Some(last_activity_at),
            state: ItemState::Active,
            stale_marked_at: None,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// An item already marked stale at `marked_at`.
    pub fn stale_since(mut self, marked_at: DateTime<Utc>) -> Self {
        self.state = ItemState::Stale;
        self.stale_marked_at = Some(marked_at);
        self
    }

    pub fn has_any_label(&self, labels: &BTreeSet<String>) -> bool {
        !self.labels.is_disjoint(labels)
    }

    /// Name of the timestamp the current state needs but lacks, if any.
    pub fn missing_timestamp(&self) -> Option<&'static str> {
        match self.state {
            ItemState::Active if self.last_activity_at.is_none() => Some("last_activity_at"),
            ItemState::Stale if self.stale_marked_at.is_none() => Some("stale_marked_at"),
            _ => None,
        }
    }
}
