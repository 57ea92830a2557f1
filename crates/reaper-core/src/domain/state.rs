//! State - アイテムの種別と状態

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// The two kinds of item the reaper manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    #[serde(alias = "pr", alias = "pull-request")]
    PullRequest,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Issue, ItemKind::PullRequest];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Issue => "issue",
            ItemKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issue" | "issues" => Ok(ItemKind::Issue),
            "pr" | "prs" | "pull-request" | "pull_request" | "pull-requests" | "pulls" => {
                Ok(ItemKind::PullRequest)
            }
            other => Err(ConfigError::UnknownKind(other.to_string())),
        }
    }
}

/// Item state under reaper control.
///
/// State transitions:
/// - Active -> Stale -> Closed
///
/// Never reversed. Anything reopened or refreshed outside the reaper comes
/// back through the store as a new snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Active,
    Stale,
    Closed,
}

impl ItemState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Closed)
    }
}
