use serde::{Deserialize, Serialize};

use super::group::GroupId;
use super::window::WindowId;
use crate::common::collections::HashSet;

pub const MAX_ENTRIES: usize = 1024;

/// Something the user activated, as remembered by the global switcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MruEntry {
    /// A whole group, without a specific window.
    Group { group_id: GroupId },
    GroupWindow { group_id: GroupId, window_id: WindowId },
    /// A window that is not in any group.
    Window { window_id: WindowId },
}

impl MruEntry {
    pub fn group_id(&self) -> Option<GroupId> {
        match *self {
            MruEntry::Group { group_id } | MruEntry::GroupWindow { group_id, .. } => Some(group_id),
            MruEntry::Window { .. } => None,
        }
    }

    pub fn window_id(&self) -> Option<WindowId> {
        match *self {
            MruEntry::GroupWindow { window_id, .. } | MruEntry::Window { window_id } => Some(window_id),
            MruEntry::Group { .. } => None,
        }
    }
}

/// Process-wide recency list, most recent first, capped at [`MAX_ENTRIES`].
#[derive(Debug, Default, Clone)]
pub struct MruTracker {
    entries: Vec<MruEntry>,
}

impl MruTracker {
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn entries(&self) -> &[MruEntry] { &self.entries }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn record_activation(&mut self, entry: MruEntry) {
        self.remove(entry);
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_ENTRIES);
    }

    /// Adds `entry` as least recent unless it is already tracked.
    pub fn append_if_missing(&mut self, entry: MruEntry) {
        if self.entries.contains(&entry) {
            return;
        }
        self.entries.push(entry);
        self.entries.truncate(MAX_ENTRIES);
    }

    pub fn remove(&mut self, entry: MruEntry) { self.entries.retain(|e| *e != entry); }

    /// Forgets a window, standalone or inside any group.
    pub fn remove_window(&mut self, window: WindowId) {
        self.entries.retain(|e| e.window_id() != Some(window));
    }

    pub fn remove_group(&mut self, group: GroupId) {
        self.entries.retain(|e| e.group_id() != Some(group));
    }

    /// Distinct group ids in recency order.
    pub fn mru_group_order(&self) -> Vec<GroupId> {
        let mut seen = HashSet::default();
        self.entries
            .iter()
            .filter_map(MruEntry::group_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
