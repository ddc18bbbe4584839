//! Saving groups at quit and rebuilding them from the live window list.

pub mod matcher;
pub mod snapshot;
pub mod store;

pub use matcher::{IdentityCache, LiveWindowIndex, RestoreMode, RestoredGroup, match_group, restore_pass};
pub use snapshot::{GroupSnapshot, WindowSnapshot, order_for_save};
pub use store::{StoreError, load_session, save_session};
