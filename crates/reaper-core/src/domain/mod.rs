//! Domain model (IDs, items, states, decisions, errors).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod item;
pub mod state;

pub use decision::{Action, apply, evaluate};
pub use errors::{Classified, ConfigError, ErrorKind, NotifyError, ReaperError, StoreError};
pub use ids::{ItemId, RunId, TransitionId};
pub use item::TrackableItem;
pub use state::{ItemKind, ItemState};
