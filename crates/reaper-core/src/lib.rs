//! reaper-core
//!
//! Core building blocks for the stale-item reaper.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, item, decision, errors）
//! - **config**: 設定の読み込みと検証
//! - **ports**: 抽象化レイヤー（ItemStore, Notifier, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, reaper_loop, effects, retry, status）
//! - **impls**: 実装（InMemory はテスト用、JSON ファイル / ジャーナルは CLI 用）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{ReaperBuilder, ReaperLoop, RunReport};
pub use config::ReaperConfig;
pub use domain::{Action, ItemKind, ItemState, TrackableItem, apply, evaluate};
