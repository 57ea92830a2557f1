//! ReaperBuilder - ReaperLoop の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - store / notifier が未設定なら build() が BuildError を返す
//! - concurrency = 0 も起動時に弾く

use std::sync::Arc;
use std::time::Duration;

use super::reaper_loop::ReaperLoop;
use super::retry::RetryPolicy;
use crate::config::ReaperConfig;
use crate::ports::{Clock, IdGenerator, ItemStore, Notifier, SystemClock, UlidGenerator};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// ReaperBuilder は ReaperLoop を構築
///
/// # 使用例
/// ```ignore
/// let reaper = ReaperBuilder::new(config)
///     .store(Arc::new(store))
///     .notifier(Arc::new(notifier))
///     .deadline(Duration::from_secs(600))
///     .build()?;
/// let report = reaper.run_once().await?;
/// ```
pub struct ReaperBuilder {
    config: ReaperConfig,
    store: Option<Arc<dyn ItemStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    retry: RetryPolicy,
    concurrency: usize,
    deadline: Option<Duration>,
}

/// BuildError は ReaperLoop 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no item store configured")]
    MissingStore,

    #[error("no notifier configured")]
    MissingNotifier,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

impl ReaperBuilder {
    pub fn new(config: ReaperConfig) -> Self {
        Self {
            config,
            store: None,
            notifier: None,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn ItemStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Abort item work still running this long after the run starts.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn build(self) -> Result<ReaperLoop, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let notifier = self.notifier.ok_or(BuildError::MissingNotifier)?;
        if self.concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }
        Ok(ReaperLoop {
            config: Arc::new(self.config),
            store,
            notifier,
            clock: self.clock,
            ids: self.ids,
            retry: self.retry,
            concurrency: self.concurrency,
            deadline: self.deadline,
        })
    }
}
