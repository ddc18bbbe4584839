use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use tracing::trace;

use super::window::{Rect, WindowId, WindowRef};
use crate::common::collections::HashSet;

new_key_type! {
    pub struct GroupId;
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dbg = format!("{:?}", self);
        let digits: String = dbg.chars().filter(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse::<u64>() {
            write!(f, "{:08}", n)
        } else {
            write!(f, "{}", dbg)
        }
    }
}

/// Frozen MRU order plus a cursor, alive only while a tab cycle is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CycleState {
    snapshot: Vec<WindowId>,
    cursor: usize,
}

/// One tab group.
///
/// Groups are created and dissolved by [`GroupRegistry`](super::GroupRegistry);
/// the structural mutators here are crate-private so membership bookkeeping
/// can never be skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    windows: Vec<WindowRef>,
    active_index: usize,
    /// Most recent first. Holds exactly the non-separator ids in `windows`.
    focus_history: Vec<WindowId>,
    #[serde(skip)]
    cycle: Option<CycleState>,
    pub frame: Rect,
    pub space_id: u64,
    pub tab_bar_squeeze_delta: f64,
    pub name: Option<String>,
}

impl Group {
    pub(crate) fn new(id: GroupId, windows: Vec<WindowRef>, frame: Rect) -> Self {
        let focus_history = windows.iter().filter(|w| !w.is_separator).map(|w| w.id).collect();
        let active_index = windows.iter().position(|w| !w.is_separator).unwrap_or(0);
        Self {
            id,
            windows,
            active_index,
            focus_history,
            cycle: None,
            frame,
            space_id: 0,
            tab_bar_squeeze_delta: 0.0,
            name: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(windows: Vec<WindowRef>) -> Self {
        Self::new(GroupId::default(), windows, Rect::ZERO)
    }

    #[inline]
    pub fn id(&self) -> GroupId { self.id }

    #[inline]
    pub fn windows(&self) -> &[WindowRef] { &self.windows }

    pub fn managed_windows(&self) -> impl Iterator<Item = &WindowRef> + '_ {
        self.windows.iter().filter(|w| !w.is_separator)
    }

    pub fn managed_window_count(&self) -> usize { self.managed_windows().count() }

    #[inline]
    pub fn focus_history(&self) -> &[WindowId] { &self.focus_history }

    pub fn active_index(&self) -> Option<usize> {
        (self.active_index < self.windows.len()).then_some(self.active_index)
    }

    pub fn active_window(&self) -> Option<&WindowRef> { self.windows.get(self.active_index) }

    pub fn contains(&self, id: WindowId) -> bool { self.windows.iter().any(|w| w.id == id) }

    pub fn index_of(&self, id: WindowId) -> Option<usize> {
        self.windows.iter().position(|w| w.id == id)
    }

    pub fn window(&self, id: WindowId) -> Option<&WindowRef> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub(crate) fn window_mut(&mut self, id: WindowId) -> Option<&mut WindowRef> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    pub fn is_cycling(&self) -> bool { self.cycle.is_some() }

    /// Moves `id` to the front of the focus history.
    ///
    /// Returns false for unknown ids or when `id` is already most recent.
    pub fn record_focus(&mut self, id: WindowId) -> bool {
        let Some(pos) = self.focus_history.iter().position(|&h| h == id) else {
            return false;
        };
        if pos == 0 {
            return false;
        }
        self.focus_history.remove(pos);
        self.focus_history.insert(0, id);
        true
    }

    pub fn switch_to(&mut self, index: usize) -> bool {
        match self.windows.get(index) {
            Some(w) if !w.is_separator => {
                self.active_index = index;
                true
            }
            _ => false,
        }
    }

    pub fn switch_to_window(&mut self, id: WindowId) -> bool {
        match self.index_of(id) {
            Some(index) => self.switch_to(index),
            None => false,
        }
    }

    /// Inserts `window` at `at` (clamped) or at the end. New ids join the
    /// focus history as least recent.
    pub(crate) fn add_window(&mut self, window: WindowRef, at: Option<usize>) -> bool {
        if self.contains(window.id) {
            return false;
        }
        let active_id = self.active_window().map(|w| w.id);
        if !window.is_separator {
            self.focus_history.push(window.id);
        }
        let index = at.unwrap_or(self.windows.len()).min(self.windows.len());
        self.windows.insert(index, window);
        if let Some(active_id) = active_id {
            self.repoint_active(active_id);
        }
        true
    }

    pub(crate) fn remove_window(&mut self, id: WindowId) -> Option<WindowRef> {
        let index = self.index_of(id)?;
        self.remove_window_at(index)
    }

    pub(crate) fn remove_window_at(&mut self, index: usize) -> Option<WindowRef> {
        if index >= self.windows.len() {
            return None;
        }
        let active_id = self.active_window().map(|w| w.id);
        let removed = self.windows.remove(index);
        self.focus_history.retain(|&h| h != removed.id);
        self.reselect_after_removal(active_id);
        Some(removed)
    }

    /// Removes every window whose id is in `ids`, in tab order.
    pub(crate) fn remove_windows(&mut self, ids: &HashSet<WindowId>) -> Vec<WindowRef> {
        if !self.windows.iter().any(|w| ids.contains(&w.id)) {
            return Vec::new();
        }
        let active_id = self.active_window().map(|w| w.id);
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.windows).into_iter().partition(|w| ids.contains(&w.id));
        self.windows = kept;
        self.focus_history.retain(|h| !ids.contains(h));
        self.reselect_after_removal(active_id);
        removed
    }

    fn reselect_after_removal(&mut self, previous_active: Option<WindowId>) {
        if let Some(id) = previous_active {
            if self.repoint_active(id) {
                return;
            }
        }
        // The active window went away: fall back to the most recent survivor.
        let fallback = self.focus_history.iter().find_map(|&h| self.index_of(h));
        self.active_index = fallback.unwrap_or(0);
        trace!(group = %self.id, active = self.active_index, "active window removed");
    }

    fn repoint_active(&mut self, id: WindowId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.active_index = index;
                true
            }
            None => false,
        }
    }

    /// Reorders the tab list. `to` is an insertion point in `0..=len`,
    /// measured before removal.
    pub fn move_tab(&mut self, from: usize, to: usize) -> bool {
        let len = self.windows.len();
        if from >= len || to > len {
            return false;
        }
        let active_id = self.active_window().map(|w| w.id);
        let window = self.windows.remove(from);
        let adjusted = if to > from { to - 1 } else { to };
        self.windows.insert(adjusted, window);
        if let Some(active_id) = active_id {
            self.repoint_active(active_id);
        }
        true
    }

    /// Moves a pinned tab to position `to_pinned_index` among the pinned tabs.
    pub fn move_pinned_tab(&mut self, id: WindowId, to_pinned_index: usize) -> bool {
        let pinned_positions: Vec<usize> = self
            .windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_pinned() && !w.is_separator)
            .map(|(i, _)| i)
            .collect();
        let Some(from) = self.index_of(id).filter(|i| pinned_positions.contains(i)) else {
            return false;
        };
        let target = pinned_positions[to_pinned_index.min(pinned_positions.len() - 1)];
        if target == from {
            return false;
        }
        let to = if target > from { target + 1 } else { target };
        self.move_tab(from, to)
    }

    /// Places the listed ids into the slots they currently occupy, in the
    /// given order. Ids not in the group are ignored.
    pub(crate) fn reorder_subset(&mut self, ordered: &[WindowId]) -> bool {
        let wanted: Vec<WindowId> = ordered.iter().copied().filter(|&id| self.contains(id)).collect();
        let slots: Vec<usize> = self
            .windows
            .iter()
            .enumerate()
            .filter(|(_, w)| wanted.contains(&w.id))
            .map(|(i, _)| i)
            .collect();
        let current: Vec<WindowId> = slots.iter().map(|&i| self.windows[i].id).collect();
        if current == wanted {
            return false;
        }
        let active_id = self.active_window().map(|w| w.id);
        let mut taken: Vec<Option<WindowRef>> =
            slots.iter().map(|&i| Some(self.windows[i].clone())).collect();
        for (&slot, id) in slots.iter().zip(&wanted) {
            if let Some(window) =
                taken.iter_mut().find(|w| w.as_ref().is_some_and(|w| w.id == *id)).and_then(Option::take)
            {
                self.windows[slot] = window;
            }
        }
        if let Some(active_id) = active_id {
            self.repoint_active(active_id);
        }
        true
    }

    /// Freezes the current focus order for a cycle if one is not running.
    pub fn begin_cycle(&mut self) {
        if self.cycle.is_none() {
            self.cycle = Some(CycleState {
                snapshot: self.focus_history.clone(),
                cursor: 0,
            });
        }
    }

    /// Steps the MRU cycle and returns the tab index it lands on.
    ///
    /// The first call freezes the focus order and returns the entry one step
    /// away from the current window. Later calls walk the frozen order,
    /// wrapping, and skip windows that have left the group since.
    pub fn next_in_mru_cycle(&mut self) -> Option<usize> {
        if self.managed_window_count() < 2 {
            return None;
        }
        self.begin_cycle();
        let cycle = self.cycle.as_ref()?;
        let len = cycle.snapshot.len();
        let mut cursor = cycle.cursor;
        for _ in 0..len {
            cursor = (cursor + 1) % len;
            let id = cycle.snapshot[cursor];
            if let Some(index) = self.index_of(id) {
                if let Some(cycle) = self.cycle.as_mut() {
                    cycle.cursor = cursor;
                }
                return Some(index);
            }
        }
        None
    }

    /// Leaves the cycle and commits the landed window to the live focus
    /// history. Without `landed`, the window under the cursor is committed.
    pub fn end_cycle(&mut self, landed: Option<WindowId>) -> bool {
        let Some(cycle) = self.cycle.take() else {
            return false;
        };
        let target = landed.or_else(|| cycle.snapshot.get(cycle.cursor).copied());
        if let Some(id) = target {
            self.record_focus(id);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn w(id: u32) -> WindowRef { WindowRef::new(id, 1, "com.test", format!("Window {id}"), "Test") }

    fn group(ids: &[u32]) -> Group { Group::new_for_test(ids.iter().map(|&i| w(i)).collect()) }

    fn wid(raw: u32) -> WindowId { WindowId::new(raw) }

    fn history(g: &Group) -> Vec<u32> { g.focus_history().iter().map(|id| id.as_u32()).collect() }

    fn order(g: &Group) -> Vec<u32> { g.windows().iter().map(|w| w.id.as_u32()).collect() }

    #[test]
    fn new_group_seeds_focus_history_with_tab_order() {
        let g = group(&[1, 2, 3]);
        assert_eq!(history(&g), vec![1, 2, 3]);
        assert_eq!(g.active_index(), Some(0));
    }

    #[test]
    fn record_focus_moves_to_front() {
        let mut g = group(&[1, 2, 3]);
        assert!(g.record_focus(wid(3)));
        assert_eq!(history(&g), vec![3, 1, 2]);
        assert!(g.record_focus(wid(2)));
        assert_eq!(history(&g), vec![2, 3, 1]);
    }

    #[test]
    fn record_focus_is_idempotent() {
        let mut g = group(&[1, 2]);
        g.record_focus(wid(2));
        let after_first = history(&g);
        assert!(!g.record_focus(wid(2)));
        assert!(!g.record_focus(wid(2)));
        assert_eq!(history(&g), after_first);
        assert!(!g.record_focus(wid(42)));
    }

    #[test]
    fn add_window_appends_to_focus_history() {
        let mut g = group(&[1]);
        assert!(g.add_window(w(2), None));
        assert_eq!(history(&g), vec![1, 2]);
        assert!(!g.add_window(w(2), None));
        assert_eq!(g.windows().len(), 2);
    }

    #[test]
    fn add_window_before_active_keeps_active_target() {
        let mut g = group(&[1, 2]);
        g.switch_to(1);
        assert!(g.add_window(w(3), Some(0)));
        assert_eq!(order(&g), vec![3, 1, 2]);
        assert_eq!(g.active_window().map(|w| w.id), Some(wid(2)));
    }

    #[test]
    fn removing_active_window_falls_back_to_mru() {
        let mut g = group(&[1, 2, 3, 4]);
        g.record_focus(wid(3));
        g.record_focus(wid(1));
        g.record_focus(wid(2));
        assert_eq!(history(&g), vec![2, 1, 3, 4]);

        g.switch_to(1);
        let removed = g.remove_window_at(1);
        assert_eq!(removed.map(|w| w.id), Some(wid(2)));
        assert_eq!(g.active_window().map(|w| w.id), Some(wid(1)));
    }

    #[test]
    fn removing_active_window_does_not_pick_positional_neighbor() {
        let mut g = group(&[1, 2, 3]);
        g.record_focus(wid(3));
        g.record_focus(wid(2));
        g.switch_to(1);
        g.remove_window_at(1);
        assert_eq!(g.active_window().map(|w| w.id), Some(wid(3)));
    }

    #[test]
    fn removing_non_active_window_keeps_active_target() {
        let mut g = group(&[1, 2, 3]);
        g.switch_to(2);
        g.remove_window_at(0);
        assert_eq!(g.active_index(), Some(1));
        assert_eq!(g.active_window().map(|w| w.id), Some(wid(3)));
        assert!(!g.focus_history().contains(&wid(1)));
    }

    #[test]
    fn batch_removal_falls_back_to_mru() {
        let mut g = group(&[1, 2, 3, 4]);
        g.record_focus(wid(2));
        g.record_focus(wid(4));
        g.switch_to(3);
        let ids: HashSet<WindowId> = [wid(4), wid(1)].into_iter().collect();
        let removed = g.remove_windows(&ids);
        assert_eq!(removed.len(), 2);
        assert_eq!(g.active_window().map(|w| w.id), Some(wid(2)));
        assert_eq!(history(&g), vec![2, 3]);
    }

    #[test]
    fn switch_to_rejects_invalid_and_separator_indices() {
        let mut g = Group::new_for_test(vec![w(1), WindowRef::separator(9), w(2)]);
        assert!(!g.switch_to(5));
        assert!(!g.switch_to(1));
        assert_eq!(g.active_index(), Some(0));
        assert!(g.switch_to_window(wid(2)));
        assert_eq!(g.active_index(), Some(2));
    }

    #[test]
    fn move_tab_reorders_and_tracks_active() {
        let mut g = group(&[1, 2, 3]);
        assert!(g.move_tab(0, 2));
        assert_eq!(order(&g), vec![2, 1, 3]);
        assert_eq!(g.active_index(), Some(1));
        assert_eq!(g.active_window().map(|w| w.id), Some(wid(1)));

        g.switch_to(2);
        assert!(g.move_tab(0, 3));
        assert_eq!(order(&g), vec![1, 3, 2]);
        assert_eq!(g.active_window().map(|w| w.id), Some(wid(3)));
        assert!(!g.move_tab(7, 0));
    }

    #[test]
    fn move_pinned_tab_stays_within_pins() {
        let mut g = Group::new_for_test(vec![
            w(1).with_pin_tier(crate::model::PinTier::Normal),
            w(2).with_pin_tier(crate::model::PinTier::Normal),
            w(3),
        ]);
        assert!(g.move_pinned_tab(wid(2), 0));
        assert_eq!(order(&g), vec![2, 1, 3]);
        assert!(!g.move_pinned_tab(wid(3), 0));
    }

    #[test]
    fn reorder_subset_uses_existing_slots() {
        let mut g = group(&[1, 2, 3, 4]);
        assert!(g.reorder_subset(&[wid(4), wid(2)]));
        assert_eq!(order(&g), vec![1, 4, 3, 2]);
        assert!(!g.reorder_subset(&[wid(4), wid(2)]));
    }

    #[test]
    fn mru_cycle_needs_two_windows() {
        let mut g = group(&[1]);
        assert_eq!(g.next_in_mru_cycle(), None);
        assert!(!g.is_cycling());
    }

    #[test]
    fn mru_cycle_walks_focus_history_and_wraps() {
        let mut g = group(&[1, 2, 3]);
        g.record_focus(wid(3));
        g.record_focus(wid(1));
        assert_eq!(history(&g), vec![1, 3, 2]);

        assert_eq!(g.next_in_mru_cycle(), Some(2));
        assert!(g.is_cycling());
        assert_eq!(g.next_in_mru_cycle(), Some(1));
        assert_eq!(g.next_in_mru_cycle(), Some(0));
    }

    #[test]
    fn mru_cycle_snapshot_is_frozen() {
        let mut g = group(&[1, 2, 3]);
        assert_eq!(g.next_in_mru_cycle(), Some(1));
        g.record_focus(wid(3));
        g.record_focus(wid(1));
        // Still walking [1, 2, 3]: after 2 comes 3.
        assert_eq!(g.next_in_mru_cycle(), Some(2));
        assert_eq!(g.next_in_mru_cycle(), Some(0));
    }

    #[test]
    fn mru_cycle_skips_removed_windows() {
        let mut g = group(&[1, 2, 3]);
        assert_eq!(g.next_in_mru_cycle(), Some(1));
        g.remove_window_at(2);
        assert_eq!(g.next_in_mru_cycle(), Some(0));
    }

    #[test]
    fn end_cycle_commits_cursor_window() {
        let mut g = group(&[1, 2, 3]);
        assert_eq!(g.next_in_mru_cycle(), Some(1));
        assert!(g.end_cycle(None));
        assert!(!g.is_cycling());
        assert_eq!(g.focus_history()[0], wid(2));
    }

    #[test]
    fn end_cycle_commits_explicit_landed_window() {
        let mut g = group(&[1, 2, 3]);
        g.next_in_mru_cycle();
        g.end_cycle(Some(wid(3)));
        assert_eq!(g.focus_history().first(), Some(&wid(3)));
        assert!(!g.end_cycle(None));
    }

    #[test]
    fn cycle_sessions_are_independent() {
        let mut g = group(&[1, 2]);
        g.next_in_mru_cycle();
        g.end_cycle(None);
        assert_eq!(history(&g), vec![2, 1]);
        assert_eq!(g.next_in_mru_cycle(), Some(0));
        assert!(g.is_cycling());
    }
}
