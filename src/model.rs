pub mod group;
pub mod mru;
pub mod registry;
pub mod segment;
pub mod window;

pub use group::{Group, GroupId};
pub use mru::{MruEntry, MruTracker};
pub use registry::{GroupRegistry, NewGroup, Release};
pub use segment::{SplitOptions, focused_segment_window_ids, segments, segments_of};
pub use window::{PinTier, Rect, WindowId, WindowRef, pid_t};
