//! Config - 設定の読み込みと検証
//!
//! 設定は YAML で、次の 2 つの形を受け付けます。
//! - フラットなマッピング（`days-before-stale: 7` など）
//! - スケジュール実行されるワークフローファイル
//!   （`on.schedule[0].cron` と、`days-before-stale` を持つ step の `with:`）
//!
//! 不正な設定は起動時に `ConfigError` で失敗します（Fail-fast）。

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::domain::{ConfigError, ItemKind};

pub const DEFAULT_DAYS_BEFORE_STALE: u32 = 60;
pub const DEFAULT_DAYS_BEFORE_CLOSE: u32 = 7;
pub const DEFAULT_OPERATIONS_PER_RUN: u32 = 30;
pub const DEFAULT_STALE_LABEL: &str = "Stale";

/// Per-kind policy: which labels are watched and what gets said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindPolicy {
    pub watched_labels: BTreeSet<String>,
    pub exempt_labels: BTreeSet<String>,
    pub stale_label: String,
    pub stale_message: String,
    pub close_message: String,
}

impl Default for KindPolicy {
    fn default() -> Self {
        Self {
            watched_labels: BTreeSet::new(),
            exempt_labels: BTreeSet::new(),
            stale_label: DEFAULT_STALE_LABEL.to_string(),
            stale_message: String::new(),
            close_message: String::new(),
        }
    }
}

/// Validated reaper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaperConfig {
    pub days_before_stale: u32,
    pub days_before_close: u32,
    pub issue: KindPolicy,
    pub pull_request: KindPolicy,
    pub item_kinds: Vec<ItemKind>,
    pub operations_per_run: u32,
    pub debug_only: bool,
    pub schedule: Option<String>,
}

impl ReaperConfig {
    /// Config with the given thresholds and default everything else.
    pub fn new(days_before_stale: u32, days_before_close: u32) -> Self {
        Self {
            days_before_stale,
            days_before_close,
            issue: KindPolicy::default(),
            pull_request: KindPolicy::default(),
            item_kinds: ItemKind::ALL.to_vec(),
            operations_per_run: DEFAULT_OPERATIONS_PER_RUN,
            debug_only: false,
            schedule: None,
        }
    }

    pub fn with_watched_labels<I, S>(mut self, kind: ItemKind, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy_mut(kind)
            .watched_labels
            .extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn policy(&self, kind: ItemKind) -> &KindPolicy {
        match kind {
            ItemKind::Issue => &self.issue,
            ItemKind::PullRequest => &self.pull_request,
        }
    }

    pub fn policy_mut(&mut self, kind: ItemKind) -> &mut KindPolicy {
        match kind {
            ItemKind::Issue => &mut self.issue,
            ItemKind::PullRequest => &mut self.pull_request,
        }
    }

    pub fn watched_labels(&self, kind: ItemKind) -> &BTreeSet<String> {
        &self.policy(kind).watched_labels
    }

    pub fn is_enabled(&self, kind: ItemKind) -> bool {
        self.item_kinds.contains(&kind)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days_before_stale))
    }

    pub fn close_after(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days_before_close))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        let doc: Value = serde_yaml::from_str(data)?;
        let raw = extract_options(&doc)?;
        raw.validate()
    }
}

/// Integers arrive either as YAML numbers or as strings (workflow `with:`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Text(String),
}

impl Number {
    fn to_i64(&self, field: &'static str) -> Result<i64, ConfigError> {
        match self {
            Number::Int(n) => Ok(*n),
            Number::Text(s) => s.trim().parse().map_err(|_| ConfigError::NotAnInteger {
                field,
                value: s.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawOptions {
    days_before_stale: Option<Number>,
    days_before_close: Option<Number>,
    any_of_issue_labels: Option<String>,
    any_of_pr_labels: Option<String>,
    stale_issue_message: Option<String>,
    close_issue_message: Option<String>,
    stale_pr_message: Option<String>,
    close_pr_message: Option<String>,
    stale_issue_label: Option<String>,
    stale_pr_label: Option<String>,
    exempt_issue_labels: Option<String>,
    exempt_pr_labels: Option<String>,
    operations_per_run: Option<Number>,
    debug_only: Option<Flag>,
    item_kinds: Option<String>,
    schedule: Option<String>,

    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

impl RawOptions {
    fn validate(self) -> Result<ReaperConfig, ConfigError> {
        for key in self.other.keys() {
            tracing::debug!(option = %key, "ignoring unrecognized config option");
        }

        let days_before_stale = days(
            "days-before-stale",
            self.days_before_stale.as_ref(),
            DEFAULT_DAYS_BEFORE_STALE,
        )?;
        let days_before_close = days(
            "days-before-close",
            self.days_before_close.as_ref(),
            DEFAULT_DAYS_BEFORE_CLOSE,
        )?;

        let operations_per_run = match &self.operations_per_run {
            None => DEFAULT_OPERATIONS_PER_RUN,
            Some(n) => {
                let n = n.to_i64("operations-per-run")?;
                if n < 1 {
                    return Err(ConfigError::NoOperations(n));
                }
                u32::try_from(n).unwrap_or(u32::MAX)
            }
        };

        let item_kinds = match self.item_kinds.as_deref() {
            None => ItemKind::ALL.to_vec(),
            Some(list) => {
                let mut kinds = Vec::new();
                for token in split_list(list) {
                    let kind: ItemKind = token.parse()?;
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                if kinds.is_empty() {
                    return Err(ConfigError::NoItemKinds);
                }
                kinds
            }
        };

        let schedule = match self.schedule {
            Some(expr) => Some(validate_cron(&expr)?),
            None => None,
        };

        Ok(ReaperConfig {
            days_before_stale,
            days_before_close,
            issue: KindPolicy {
                watched_labels: split_list(self.any_of_issue_labels.as_deref().unwrap_or_default()),
                exempt_labels: split_list(self.exempt_issue_labels.as_deref().unwrap_or_default()),
                stale_label: label_or_default(self.stale_issue_label),
                stale_message: self.stale_issue_message.unwrap_or_default(),
                close_message: self.close_issue_message.unwrap_or_default(),
            },
            pull_request: KindPolicy {
                watched_labels: split_list(self.any_of_pr_labels.as_deref().unwrap_or_default()),
                exempt_labels: split_list(self.exempt_pr_labels.as_deref().unwrap_or_default()),
                stale_label: label_or_default(self.stale_pr_label),
                stale_message: self.stale_pr_message.unwrap_or_default(),
                close_message: self.close_pr_message.unwrap_or_default(),
            },
            item_kinds,
            operations_per_run,
            debug_only: self.debug_only.as_ref().is_some_and(Flag::is_set),
            schedule,
        })
    }
}

fn days(field: &'static str, raw: Option<&Number>, default: u32) -> Result<u32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = raw.to_i64(field)?;
    u32::try_from(value).map_err(|_| ConfigError::NegativeDays { field, value })
}

fn label_or_default(label: Option<String>) -> String {
    match label {
        Some(l) if !l.trim().is_empty() => l.trim().to_string(),
        _ => DEFAULT_STALE_LABEL.to_string(),
    }
}

/// Comma-separated list, also tolerating one entry per line.
fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_cron(expr: &str) -> Result<String, ConfigError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let valid_field = |f: &&str| {
        f.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '*' | ',' | '-' | '/' | '?'))
    };
    if fields.len() != 5 || !fields.iter().all(valid_field) {
        return Err(ConfigError::InvalidSchedule(expr.to_string()));
    }
    Ok(fields.join(" "))
}

/// Pull the options out of either a flat config or a workflow file.
fn extract_options(doc: &Value) -> Result<RawOptions, ConfigError> {
    let Some(jobs) = doc.get("jobs") else {
        return Ok(serde_yaml::from_value(doc.clone())?);
    };

    let cron = doc
        .get("on")
        .and_then(|on| on.get("schedule"))
        .and_then(|s| s.get(0))
        .and_then(|entry| entry.get("cron"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let with = jobs
        .as_mapping()
        .into_iter()
        .flat_map(|m| m.values())
        .filter_map(|job| job.get("steps").and_then(Value::as_sequence))
        .flatten()
        .filter_map(|step| step.get("with"))
        .find(|with| with.get("days-before-stale").is_some())
        .ok_or(ConfigError::NoReaperStep)?;

    let mut raw: RawOptions = serde_yaml::from_value(with.clone())?;
    if raw.schedule.is_none() {
        raw.schedule = cron;
    }
    Ok(raw)
}
