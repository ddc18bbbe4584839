//! Work that happens off the control thread: window discovery and waiting
//! for launched windows.

pub mod capture;
pub mod inventory;

pub use capture::{CaptureDeps, CaptureRequest, CaptureTarget, baseline_window_ids, wait_for_captured_window};
pub use inventory::{ClockFn, DiscoverFn, WindowInventory};
