//! ReaperLoop - 1 回のバッチ実行
//!
//! # フロー
//! 1. ItemStore::list_items() で有効な種別のアイテムを取得
//! 2. タイムスタンプ欠損のアイテムはスキップ（warn ログ）
//! 3. evaluate() で Action を決定、operations-per-run を超えた分は次回へ
//! 4. アイテムごとにタスクを起動し、副作用 → apply() → ItemStore::save()
//! 5. 期限（deadline）を過ぎたら残りを打ち切る

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::effects;
use super::retry::RetryPolicy;
use super::status::{FailureRecord, RunReport, TransitionRecord};
use crate::config::ReaperConfig;
use crate::domain::{Action, ItemId, ReaperError, RunId, TrackableItem, apply, evaluate};
use crate::ports::{Clock, IdGenerator, ItemStore, Notifier};

/// An item together with the action chosen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub item: TrackableItem,
    pub action: Action,
}

/// Result of evaluating a batch, before any effect runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Actions to execute this run, in store order.
    pub scheduled: Vec<PlannedAction>,
    /// Actions over the per-run budget.
    pub deferred: Vec<PlannedAction>,
    /// Items missing the timestamp their state needs.
    pub skipped: Vec<ItemId>,
    pub noop: usize,
}

/// Evaluate every item and split the result by the operations budget.
pub fn plan(items: Vec<TrackableItem>, now: DateTime<Utc>, config: &ReaperConfig) -> Plan {
    let budget = config.operations_per_run as usize;
    let mut plan = Plan::default();

    for item in items {
        if let Some(field) = item.missing_timestamp() {
            tracing::warn!(
                item = %item.id,
                kind = %item.kind,
                missing = field,
                "skipping item without timestamp"
            );
            plan.skipped.push(item.id);
            continue;
        }

        let action = evaluate(&item, now, config);
        if action.is_noop() {
            plan.noop += 1;
            continue;
        }

        let planned = PlannedAction { item, action };
        if plan.scheduled.len() < budget {
            plan.scheduled.push(planned);
        } else {
            plan.deferred.push(planned);
        }
    }

    plan
}

enum ItemOutcome {
    Done(TransitionRecord),
    Failed(FailureRecord),
}

/// Everything one item task needs. Cloned per task; nothing mutable is shared.
#[derive(Clone)]
struct ItemWorker {
    config: Arc<ReaperConfig>,
    store: Arc<dyn ItemStore>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
    retry: RetryPolicy,
    now: DateTime<Utc>,
    dry_run: bool,
}

impl ItemWorker {
    async fn process(self, planned: PlannedAction) -> ItemOutcome {
        let PlannedAction { item, action } = planned;
        let policy = self.config.policy(item.kind);
        let mut next = apply(&item, action, self.now);
        if action == Action::MarkStale {
            // the saved item carries the label the notifier adds
            next.labels.insert(policy.stale_label.clone());
        }

        if self.dry_run {
            tracing::info!(to = ?next.state, "dry run, not executing");
            return ItemOutcome::Done(self.record(&item, &next, action));
        }

        if let Err(err) =
            effects::execute(action, &item.id, policy, self.notifier.as_ref(), &self.retry).await
        {
            tracing::error!(error = %err, "effect failed, item left unchanged");
            return ItemOutcome::Failed(FailureRecord {
                item_id: item.id,
                action,
                error: err.to_string(),
            });
        }

        let store = self.store.as_ref();
        let saved = &next;
        if let Err(err) = self.retry.run("save", move || store.save(saved)).await {
            tracing::error!(error = %err, "effects sent but state not saved");
            return ItemOutcome::Failed(FailureRecord {
                item_id: item.id,
                action,
                error: err.to_string(),
            });
        }

        tracing::info!(from = ?item.state, to = ?next.state, "transitioned");
        ItemOutcome::Done(self.record(&item, &next, action))
    }

    fn record(
        &self,
        item: &TrackableItem,
        next: &TrackableItem,
        action: Action,
    ) -> TransitionRecord {
        TransitionRecord {
            transition_id: self.ids.generate_transition_id(),
            item_id: item.id.clone(),
            kind: item.kind,
            action,
            from: item.state,
            to: next.state,
            at: self.now,
            dry_run: self.dry_run,
        }
    }
}

/// ReaperLoop は 1 回のバッチを実行する
///
/// Built by [`ReaperBuilder`](super::ReaperBuilder).
pub struct ReaperLoop {
    pub(crate) config: Arc<ReaperConfig>,
    pub(crate) store: Arc<dyn ItemStore>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) retry: RetryPolicy,
    pub(crate) concurrency: usize,
    pub(crate) deadline: Option<Duration>,
}

impl ReaperLoop {
    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Run one batch.
    ///
    /// Only a store that cannot be listed fails the run. Per-item failures
    /// are logged and reported in the returned [`RunReport`].
    pub async fn run_once(&self) -> Result<RunReport, ReaperError> {
        let run_id = self.ids.generate_run_id();
        let span = tracing::info_span!("run", %run_id, dry_run = self.config.debug_only);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: RunId) -> Result<RunReport, ReaperError> {
        let now = self.clock.now();
        let dry_run = self.config.debug_only;
        let deadline_at = self.deadline.map(|d| tokio::time::Instant::now() + d);
        let mut report = RunReport::new(run_id, now, dry_run);

        let mut items = Vec::new();
        let store = self.store.as_ref();
        for &kind in &self.config.item_kinds {
            let batch = self
                .retry
                .run("list_items", move || store.list_items(kind))
                .await?;
            tracing::debug!(%kind, count = batch.len(), "listed items");
            items.extend(batch);
        }
        report.counts.scanned = items.len();

        let plan = plan(items, now, &self.config);
        report.counts.skipped = plan.skipped.len();
        report.counts.noop = plan.noop;
        report.counts.deferred = plan.deferred.len();
        if !plan.deferred.is_empty() {
            tracing::info!(
                deferred = plan.deferred.len(),
                operations_per_run = self.config.operations_per_run,
                "operations budget reached, deferring the rest"
            );
        }

        let worker = ItemWorker {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            ids: Arc::clone(&self.ids),
            retry: self.retry.clone(),
            now,
            dry_run,
        };
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        for planned in plan.scheduled {
            let worker = worker.clone();
            let permits = Arc::clone(&permits);
            let span = tracing::info_span!(
                "item",
                item = %planned.item.id,
                kind = %planned.item.kind,
                action = %planned.action
            );
            set.spawn(
                async move {
                    let _permit = permits.acquire_owned().await;
                    worker.process(planned).await
                }
                .instrument(span),
            );
        }

        loop {
            let joined = match deadline_at {
                Some(at) => match tokio::time::timeout_at(at, set.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        report.counts.timed_out = set.len();
                        tracing::warn!(unfinished = set.len(), "batch deadline reached, aborting");
                        set.shutdown().await;
                        break;
                    }
                },
                None => set.join_next().await,
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok(ItemOutcome::Done(record)) => report.record_transition(record),
                Ok(ItemOutcome::Failed(record)) => report.record_failure(record),
                Err(err) => {
                    tracing::error!(error = %err, "item task aborted");
                    report.counts.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.counts.scanned,
            marked_stale = report.counts.marked_stale,
            closed = report.counts.closed,
            skipped = report.counts.skipped,
            deferred = report.counts.deferred,
            failed = report.counts.failed,
            timed_out = report.counts.timed_out,
            "run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ReaperBuilder;
    use crate::config::DEFAULT_STALE_LABEL;
    use crate::domain::{ItemKind, ItemState};
    use crate::impls::{Failure, InMemoryItemStore, InMemoryNotifier};
    use crate::ports::{Effect, FixedClock};
    use async_trait::async_trait;
    use chrono::{Duration as Days, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn config() -> ReaperConfig {
        let mut cfg = ReaperConfig::new(7, 3)
            .with_watched_labels(ItemKind::Issue, ["question"])
            .with_watched_labels(ItemKind::PullRequest, ["waiting-for-author"]);
        cfg.issue.stale_message = "This issue is stale.".to_string();
        cfg.issue.close_message = "Closing.".to_string();
        cfg
    }

    fn stale_question(id: &str) -> TrackableItem {
        TrackableItem::new(id, ItemKind::Issue, now() - Days::days(8)).with_labels(["question"])
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(std::time::Duration::from_millis(1), 2.0, 3)
    }

    fn reaper(
        cfg: ReaperConfig,
        store: Arc<InMemoryItemStore>,
        notifier: Arc<InMemoryNotifier>,
    ) -> ReaperLoop {
        ReaperBuilder::new(cfg)
            .store(store)
            .notifier(notifier)
            .clock(FixedClock::new(now()))
            .retry(fast_retry())
            .build()
            .unwrap()
    }

    #[test]
    fn plan_skips_items_without_timestamps() {
        let mut missing = stale_question("1");
        missing.last_activity_at = None;
        let items = vec![missing, stale_question("2")];

        let plan = plan(items, now(), &config());
        assert_eq!(plan.skipped, vec![ItemId::new("1")]);
        assert_eq!(plan.scheduled.len(), 1);
        assert_eq!(plan.scheduled[0].action, Action::MarkStale);
    }

    #[test]
    fn plan_defers_over_budget() {
        let mut cfg = config();
        cfg.operations_per_run = 2;
        let items = (1..=5).map(|i| stale_question(&i.to_string())).collect();

        let plan = plan(items, now(), &cfg);
        assert_eq!(plan.scheduled.len(), 2);
        assert_eq!(plan.deferred.len(), 3);
        assert_eq!(plan.scheduled[0].item.id, ItemId::new("1"));
    }

    #[test]
    fn plan_counts_noops_outside_budget() {
        let mut cfg = config();
        cfg.operations_per_run = 1;
        let fresh = TrackableItem::new("f", ItemKind::Issue, now()).with_labels(["question"]);
        let plan = plan(vec![fresh, stale_question("s")], now(), &cfg);
        assert_eq!(plan.noop, 1);
        assert_eq!(plan.scheduled.len(), 1);
        assert!(plan.deferred.is_empty());
    }

    #[tokio::test]
    async fn run_marks_and_closes() {
        let closing = TrackableItem::new("pr-1", ItemKind::PullRequest, now() - Days::days(30))
            .stale_since(now() - Days::days(3));
        let store = Arc::new(InMemoryItemStore::new(vec![
            stale_question("1"),
            closing,
            TrackableItem::new("2", ItemKind::Issue, now()).with_labels(["question"]),
        ]));
        let notifier = Arc::new(InMemoryNotifier::new());

        let report = reaper(config(), store.clone(), notifier.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.counts.scanned, 3);
        assert_eq!(report.counts.marked_stale, 1);
        assert_eq!(report.counts.closed, 1);
        assert_eq!(report.counts.noop, 1);
        assert!(report.is_clean());

        let marked = store.get(&ItemId::new("1")).await.unwrap();
        assert_eq!(marked.state, ItemState::Stale);
        assert_eq!(marked.stale_marked_at, Some(now()));
        assert!(marked.labels.contains(DEFAULT_STALE_LABEL));
        assert!(marked.labels.contains("question"));

        let closed = store.get(&ItemId::new("pr-1")).await.unwrap();
        assert_eq!(closed.state, ItemState::Closed);

        let sent = notifier.sent().await;
        assert!(sent.contains(&Effect::Comment {
            item: ItemId::new("1"),
            body: "This issue is stale.".to_string()
        }));
        // PR close message is empty: close only
        assert!(sent.contains(&Effect::Close {
            item: ItemId::new("pr-1")
        }));
        assert!(
            !sent
                .iter()
                .any(|e| matches!(e, Effect::Comment { item, .. } if item.as_str() == "pr-1"))
        );
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        let store = Arc::new(InMemoryItemStore::new(vec![stale_question("1")]));
        let notifier = Arc::new(InMemoryNotifier::new());
        notifier.fail("1", Failure::Transient(2)).await;

        let report = reaper(config(), store.clone(), notifier.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.counts.marked_stale, 1);
        assert_eq!(report.counts.failed, 0);
        assert_eq!(
            store.get(&ItemId::new("1")).await.unwrap().state,
            ItemState::Stale
        );
    }

    #[tokio::test]
    async fn permanent_failure_is_reported_and_other_items_continue() {
        let store = Arc::new(InMemoryItemStore::new(vec![
            stale_question("bad"),
            stale_question("good"),
        ]));
        let notifier = Arc::new(InMemoryNotifier::new());
        notifier.fail("bad", Failure::Permanent).await;

        let report = reaper(config(), store.clone(), notifier.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.counts.failed, 1);
        assert_eq!(report.counts.marked_stale, 1);
        assert_eq!(report.failures[0].item_id, ItemId::new("bad"));
        assert_eq!(
            store.get(&ItemId::new("bad")).await.unwrap().state,
            ItemState::Active
        );
        assert_eq!(
            store.get(&ItemId::new("good")).await.unwrap().state,
            ItemState::Stale
        );
    }

    #[tokio::test]
    async fn transient_save_failure_is_retried() {
        let store = Arc::new(InMemoryItemStore::new(vec![stale_question("1")]));
        store.fail_saves("1", 1).await;
        let notifier = Arc::new(InMemoryNotifier::new());

        let report = reaper(config(), store.clone(), notifier)
            .run_once()
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(
            store.get(&ItemId::new("1")).await.unwrap().state,
            ItemState::Stale
        );
    }

    #[tokio::test]
    async fn missing_timestamps_do_not_fail_the_run() {
        let mut broken = TrackableItem::new("x", ItemKind::PullRequest, now())
            .stale_since(now() - Days::days(10));
        broken.stale_marked_at = None;
        let store = Arc::new(InMemoryItemStore::new(vec![broken, stale_question("1")]));
        let notifier = Arc::new(InMemoryNotifier::new());

        let report = reaper(config(), store, notifier).run_once().await.unwrap();
        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.counts.marked_stale, 1);
    }

    #[tokio::test]
    async fn dry_run_sends_nothing_and_saves_nothing() {
        let mut cfg = config();
        cfg.debug_only = true;
        let store = Arc::new(InMemoryItemStore::new(vec![stale_question("1")]));
        let notifier = Arc::new(InMemoryNotifier::new());

        let report = reaper(cfg, store.clone(), notifier.clone())
            .run_once()
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.counts.marked_stale, 1);
        assert!(report.transitions[0].dry_run);
        assert_eq!(report.transitions[0].to, ItemState::Stale);
        assert_eq!(notifier.calls().await, 0);
        assert_eq!(
            store.get(&ItemId::new("1")).await.unwrap().state,
            ItemState::Active
        );
    }

    #[tokio::test]
    async fn second_run_is_a_noop_for_fresh_stale_items() {
        let store = Arc::new(InMemoryItemStore::new(vec![stale_question("1")]));
        let notifier = Arc::new(InMemoryNotifier::new());
        let reaper = reaper(config(), store.clone(), notifier.clone());

        reaper.run_once().await.unwrap();
        let second = reaper.run_once().await.unwrap();

        assert_eq!(second.counts.noop, 1);
        assert!(second.transitions.is_empty());
        assert_eq!(notifier.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn store_listing_failure_fails_the_run() {
        struct DownStore;

        #[async_trait]
        impl ItemStore for DownStore {
            async fn list_items(
                &self,
                _kind: ItemKind,
            ) -> Result<Vec<TrackableItem>, crate::domain::StoreError> {
                Err(crate::domain::StoreError::Unavailable("down".into()))
            }

            async fn save(&self, _item: &TrackableItem) -> Result<(), crate::domain::StoreError> {
                Ok(())
            }
        }

        let reaper = ReaperBuilder::new(config())
            .store(Arc::new(DownStore))
            .notifier(Arc::new(InMemoryNotifier::new()))
            .clock(FixedClock::new(now()))
            .retry(fast_retry())
            .build()
            .unwrap();

        let err = reaper.run_once().await.unwrap_err();
        assert!(matches!(err, ReaperError::Store(_)));
    }

    #[tokio::test]
    async fn deadline_cuts_off_slow_items() {
        struct SlowNotifier;

        #[async_trait]
        impl Notifier for SlowNotifier {
            async fn add_label(
                &self,
                _item: &ItemId,
                _label: &str,
            ) -> Result<(), crate::domain::NotifyError> {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(())
            }

            async fn post_comment(
                &self,
                _item: &ItemId,
                _body: &str,
            ) -> Result<(), crate::domain::NotifyError> {
                Ok(())
            }

            async fn close(&self, _item: &ItemId) -> Result<(), crate::domain::NotifyError> {
                Ok(())
            }
        }

        let store = Arc::new(InMemoryItemStore::new(vec![
            stale_question("1"),
            stale_question("2"),
        ]));
        let reaper = ReaperBuilder::new(config())
            .store(store.clone())
            .notifier(Arc::new(SlowNotifier))
            .clock(FixedClock::new(now()))
            .deadline(std::time::Duration::from_millis(50))
            .build()
            .unwrap();

        let report = reaper.run_once().await.unwrap();
        assert_eq!(report.counts.timed_out, 2);
        assert!(!report.is_clean());
        assert_eq!(
            store.get(&ItemId::new("1")).await.unwrap().state,
            ItemState::Active
        );
    }
}
