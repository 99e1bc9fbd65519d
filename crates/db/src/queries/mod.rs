// crates/db/src/queries/mod.rs
// Store operations, one module per table.

mod messages;
mod sessions;
mod sync_state;
mod windows;

pub use sync_state::{SyncDecision, SyncProgress, SyncStateEntry};
