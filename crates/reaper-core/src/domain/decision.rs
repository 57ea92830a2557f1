//! Decision model: what the reaper should do with one item.
//!
//! `evaluate` and `apply` are pure functions. Executing the side effects an
//! action implies (labels, comments, closing) is the caller's job, see
//! `app::effects`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::TrackableItem;
use super::state::ItemState;
use crate::config::ReaperConfig;

/// The state transition chosen for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Active -> Stale, with the stale label and stale message.
    MarkStale,

    /// Stale -> Closed, with the close message.
    Close,

    NoOp,
}

impl Action {
    pub fn is_noop(self) -> bool {
        matches!(self, Action::NoOp)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::MarkStale => "mark_stale",
            Action::Close => "close",
            Action::NoOp => "noop",
        })
    }
}

/// Decide the next action for `item` at `now`.
///
/// - Stale items close once `days_before_close` have passed since they were
///   marked.
/// - Active items go stale once `days_before_stale` have passed since their
///   last activity, but only if they carry one of the kind's watched labels
///   and none of its exempt labels.
/// - Items of a kind the config does not enable, closed items, and items
///   missing the relevant timestamp are left alone.
pub fn evaluate(item: &TrackableItem, now: DateTime<Utc>, config: &ReaperConfig) -> Action {
    if !config.is_enabled(item.kind) {
        return Action::NoOp;
    }

    match item.state {
        ItemState::Stale => match item.stale_marked_at {
            Some(marked_at) if now - marked_at >= config.close_after() => Action::Close,
            _ => Action::NoOp,
        },
        ItemState::Active => {
            let policy = config.policy(item.kind);
            let watched = item.has_any_label(&policy.watched_labels);
            if !watched || item.has_any_label(&policy.exempt_labels) {
                return Action::NoOp;
            }
            match item.last_activity_at {
                Some(last) if now - last >= config.stale_after() => Action::MarkStale,
                _ => Action::NoOp,
            }
        }
        ItemState::Closed => Action::NoOp,
    }
}

/// Apply `action` to a copy of `item`.
///
/// Transitions only move forward (Active -> Stale -> Closed). An action that
/// does not fit the current state returns the item unchanged, so applying
/// `Close` twice is the same as applying it once.
pub fn apply(item: &TrackableItem, action: Action, now: DateTime<Utc>) -> TrackableItem {
    let mut next = item.clone();
    match (action, item.state) {
        (Action::MarkStale, ItemState::Active) => {
            next.state = ItemState::Stale;
            next.stale_marked_at = Some(now);
        }
        (Action::Close, ItemState::Stale) => {
            next.state = ItemState::Closed;
        }
        _ => {}
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemKind;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn config() -> ReaperConfig {
        ReaperConfig::new(7, 3)
            .with_watched_labels(ItemKind::Issue, ["question"])
            .with_watched_labels(ItemKind::PullRequest, ["waiting-for-author"])
    }

    #[test]
    fn active_question_issue_past_threshold_goes_stale() {
        let item = TrackableItem::new("1", ItemKind::Issue, now() - Duration::days(8))
            .with_labels(["question"]);
        assert_eq!(evaluate(&item, now(), &config()), Action::MarkStale);
    }

    #[test]
    fn stale_pr_at_close_threshold_closes() {
        let item = TrackableItem::new("2", ItemKind::PullRequest, now() - Duration::days(30))
            .stale_since(now() - Duration::days(3));
        assert_eq!(evaluate(&item, now(), &config()), Action::Close);
    }

    #[rstest]
    #[case::fresh(1)]
    #[case::at_threshold(7)]
    #[case::ancient(3650)]
    fn unwatched_active_items_are_never_touched(#[case] age_days: i64) {
        let item = TrackableItem::new("3", ItemKind::Issue, now() - Duration::days(age_days))
            .with_labels(["bug"]);
        assert_eq!(evaluate(&item, now(), &config()), Action::NoOp);

        let unlabeled =
            TrackableItem::new("4", ItemKind::PullRequest, now() - Duration::days(age_days));
        assert_eq!(evaluate(&unlabeled, now(), &config()), Action::NoOp);
    }

    #[test]
    fn watched_labels_are_per_kind() {
        // "question" is watched for issues only
        let pr = TrackableItem::new("5", ItemKind::PullRequest, now() - Duration::days(100))
            .with_labels(["question"]);
        assert_eq!(evaluate(&pr, now(), &config()), Action::NoOp);
    }

    #[rstest]
    #[case::just_marked(0, Action::NoOp)]
    #[case::one_day(1, Action::NoOp)]
    #[case::exactly_three(3, Action::Close)]
    #[case::long_ago(40, Action::Close)]
    fn stale_items_close_iff_threshold_elapsed(#[case] days_ago: i64, #[case] expected: Action) {
        let item = TrackableItem::new("6", ItemKind::Issue, now() - Duration::days(60))
            .stale_since(now() - Duration::days(days_ago));
        assert_eq!(evaluate(&item, now(), &config()), expected);
    }

    #[test]
    fn stale_close_ignores_labels() {
        let item = TrackableItem::new("7", ItemKind::Issue, now() - Duration::days(60))
            .with_labels(["bug"])
            .stale_since(now() - Duration::days(5));
        assert_eq!(evaluate(&item, now(), &config()), Action::Close);
    }

    #[test]
    fn just_under_threshold_stays_active() {
        let item = TrackableItem::new(
            "8",
            ItemKind::Issue,
            now() - Duration::days(7) + Duration::seconds(1),
        )
        .with_labels(["question"]);
        assert_eq!(evaluate(&item, now(), &config()), Action::NoOp);
    }

    #[test]
    fn exempt_label_blocks_mark_stale_only() {
        let mut cfg = config();
        cfg.issue.exempt_labels.insert("pinned".to_string());

        let active = TrackableItem::new("9", ItemKind::Issue, now() - Duration::days(30))
            .with_labels(["question", "pinned"]);
        assert_eq!(evaluate(&active, now(), &cfg), Action::NoOp);

        let stale = active.clone().stale_since(now() - Duration::days(4));
        assert_eq!(evaluate(&stale, now(), &cfg), Action::Close);
    }

    #[test]
    fn disabled_kind_is_left_alone() {
        let mut cfg = config();
        cfg.item_kinds = vec![ItemKind::Issue];
        let pr = TrackableItem::new("10", ItemKind::PullRequest, now() - Duration::days(30))
            .with_labels(["waiting-for-author"]);
        assert_eq!(evaluate(&pr, now(), &cfg), Action::NoOp);
    }

    #[test]
    fn closed_and_timestampless_items_are_noop() {
        let mut closed = TrackableItem::new("11", ItemKind::Issue, now() - Duration::days(90))
            .with_labels(["question"]);
        closed.state = ItemState::Closed;
        assert_eq!(evaluate(&closed, now(), &config()), Action::NoOp);

        let mut no_activity = TrackableItem::new("12", ItemKind::Issue, now())
            .with_labels(["question"]);
        no_activity.last_activity_at = None;
        assert_eq!(evaluate(&no_activity, now(), &config()), Action::NoOp);
    }

    #[test]
    fn apply_mark_stale_records_timestamp_once() {
        let item = TrackableItem::new("13", ItemKind::Issue, now() - Duration::days(8));
        let stale = apply(&item, Action::MarkStale, now());
        assert_eq!(stale.state, ItemState::Stale);
        assert_eq!(stale.stale_marked_at, Some(now()));

        let again = apply(&stale, Action::MarkStale, now() + Duration::days(1));
        assert_eq!(again, stale);

        // input untouched
        assert_eq!(item.state, ItemState::Active);
    }

    #[test]
    fn apply_close_is_idempotent() {
        let item = TrackableItem::new("14", ItemKind::PullRequest, now() - Duration::days(20))
            .stale_since(now() - Duration::days(3));
        let closed = apply(&item, Action::Close, now());
        assert_eq!(closed.state, ItemState::Closed);
        assert_eq!(closed.stale_marked_at, item.stale_marked_at);

        let closed_again = apply(&closed, Action::Close, now());
        assert_eq!(closed_again, closed);
    }

    #[rstest]
    #[case::close_active(ItemState::Active, Action::Close)]
    #[case::mark_closed(ItemState::Closed, Action::MarkStale)]
    #[case::noop_active(ItemState::Active, Action::NoOp)]
    #[case::noop_stale(ItemState::Stale, Action::NoOp)]
    fn apply_never_moves_backwards_or_skips(#[case] state: ItemState, #[case] action: Action) {
        let mut item = TrackableItem::new("15", ItemKind::Issue, now() - Duration::days(20));
        if state != ItemState::Active {
            item = item.stale_since(now() - Duration::days(2));
            item.state = state;
        }
        assert_eq!(apply(&item, action, now()), item);
    }
}
