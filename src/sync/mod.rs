mod confirm;
mod engine;

pub use confirm::{Confirm, FixedAnswer};
pub use engine::{SyncEngine, SyncStage};
