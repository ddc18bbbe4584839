//! Partitioning of a group's tab order into contiguous segments.
//!
//! Segments scope the switcher (one item per segment) and MRU tab cycling
//! (cycling stays inside the segment the user is in).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::group::Group;
use super::window::{PinTier, WindowId, WindowRef};

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SplitOptions: u8 {
        const SUPER_PINNED = 1 << 0;
        const PINNED = 1 << 1;
        const SEPARATORS = 1 << 2;
    }
}

impl SplitOptions {
    pub fn splits_pins(self) -> bool { self.intersects(Self::SUPER_PINNED | Self::PINNED) }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Partition {
    All,
    SuperPinned,
    Pinned,
    Unpinned,
}

fn partition_for(window: &WindowRef, options: SplitOptions) -> Partition {
    if options.contains(SplitOptions::SUPER_PINNED) && window.is_super_pinned() {
        return Partition::SuperPinned;
    }
    if options.contains(SplitOptions::PINNED) {
        // Super-pinned tabs only get their own partition when that split is on.
        return if window.pin_tier == PinTier::Normal {
            Partition::Pinned
        } else {
            Partition::Unpinned
        };
    }
    Partition::All
}

/// Splits `windows` into runs of ids sharing a partition.
///
/// Separators never belong to a segment. With `SEPARATORS` set they also
/// close the current run.
pub fn segments_of(windows: &[WindowRef], options: SplitOptions) -> Vec<Vec<WindowId>> {
    if options.is_empty() {
        let all: Vec<WindowId> =
            windows.iter().filter(|w| !w.is_separator).map(|w| w.id).collect();
        return if all.is_empty() { Vec::new() } else { vec![all] };
    }

    let mut segments = Vec::new();
    let mut current: Vec<WindowId> = Vec::new();
    let mut current_partition: Option<Partition> = None;

    for window in windows {
        if window.is_separator {
            if options.contains(SplitOptions::SEPARATORS) && !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_partition = None;
            }
            continue;
        }

        let partition = partition_for(window, options);
        if current_partition.is_some_and(|p| p != partition) && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        current_partition = Some(partition);
        current.push(window.id);
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

pub fn segments(group: &Group, options: SplitOptions) -> Vec<Vec<WindowId>> {
    segments_of(group.windows(), options)
}

/// The segment containing `focused`, else the one containing the group's
/// active window, else the first segment.
pub fn focused_segment_window_ids(
    group: &Group,
    focused: Option<WindowId>,
    options: SplitOptions,
) -> Vec<WindowId> {
    let mut all = segments(group, options);
    if all.is_empty() {
        return Vec::new();
    }

    let target = focused.or_else(|| group.active_window().map(|w| w.id));
    let pos = target
        .and_then(|id| all.iter().position(|segment| segment.contains(&id)))
        .unwrap_or(0);
    all.swap_remove(pos)
}
