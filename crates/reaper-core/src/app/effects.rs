//! Effects - Action を外部トラッカーへの副作用に展開して実行する
//!
//! - MarkStale: stale ラベル付与 → stale メッセージ投稿
//! - Close: close メッセージ投稿 → クローズ
//!
//! 空のメッセージは投稿しません。各呼び出しは個別にリトライされます。

use crate::config::KindPolicy;
use crate::domain::{Action, ItemId, NotifyError};
use crate::ports::Notifier;

use super::retry::RetryPolicy;

pub async fn execute(
    action: Action,
    item: &ItemId,
    policy: &KindPolicy,
    notifier: &dyn Notifier,
    retry: &RetryPolicy,
) -> Result<(), NotifyError> {
    match action {
        Action::MarkStale => {
            retry
                .run("add_label", move || notifier.add_label(item, &policy.stale_label))
                .await?;
            if !policy.stale_message.is_empty() {
                retry
                    .run("post_comment", move || {
                        notifier.post_comment(item, &policy.stale_message)
                    })
                    .await?;
            }
        }
        Action::Close => {
            if !policy.close_message.is_empty() {
                retry
                    .run("post_comment", move || {
                        notifier.post_comment(item, &policy.close_message)
                    })
                    .await?;
            }
            retry.run("close", move || notifier.close(item)).await?;
        }
        Action::NoOp => {}
    }
    Ok(())
}
