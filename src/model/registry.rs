use slotmap::SlotMap;
use tracing::{debug, trace, warn};

use super::group::{Group, GroupId};
use super::window::{PinTier, Rect, WindowId, WindowRef, normalize_custom_tab_name};
use crate::actor::broadcast::{BroadcastEvent, BroadcastSender};
use crate::common::collections::{HashMap, HashSet};
use crate::common::log::fmt_ids;

/// Parameters for [`GroupRegistry::create_group`].
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub windows: Vec<WindowRef>,
    pub frame: Rect,
    pub space_id: u64,
    pub name: Option<String>,
    pub active_index: Option<usize>,
    pub tab_bar_squeeze_delta: f64,
    pub allow_shared_membership: bool,
}

impl NewGroup {
    pub fn new(windows: Vec<WindowRef>) -> Self {
        Self {
            windows,
            frame: Rect::ZERO,
            space_id: 0,
            name: None,
            active_index: None,
            tab_bar_squeeze_delta: 0.0,
            allow_shared_membership: false,
        }
    }

    pub fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = frame;
        self
    }

    pub fn on_space(mut self, space_id: u64) -> Self {
        self.space_id = space_id;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn active(mut self, index: usize) -> Self {
        self.active_index = Some(index);
        self
    }

    pub fn shared(mut self) -> Self {
        self.allow_shared_membership = true;
        self
    }
}

/// Result of releasing windows from a group.
///
/// When the release emptied the group, `dissolved` holds the group as it was
/// when it left the registry so the caller can still walk its windows.
#[derive(Debug)]
pub struct Release<T> {
    pub removed: T,
    pub dissolved: Option<Group>,
}

/// Owns every live group and the window -> group membership index.
#[derive(Default)]
pub struct GroupRegistry {
    groups: SlotMap<GroupId, Group>,
    order: Vec<GroupId>,
    memberships: HashMap<WindowId, Vec<GroupId>>,
    primary: HashMap<WindowId, GroupId>,
    events: Option<BroadcastSender>,
}

impl GroupRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn with_events(events: BroadcastSender) -> Self {
        Self { events: Some(events), ..Self::default() }
    }

    pub fn set_event_sender(&mut self, events: Option<BroadcastSender>) { self.events = events; }

    // Queries.

    /// Live groups in registration order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.order.iter().filter_map(|id| self.groups.get(*id))
    }

    #[inline]
    pub fn group_ids(&self) -> &[GroupId] { &self.order }

    pub fn group(&self, id: GroupId) -> Option<&Group> { self.groups.get(id) }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Position of `id` in registration order.
    pub fn registration_rank(&self, id: GroupId) -> Option<usize> {
        self.order.iter().position(|g| *g == id)
    }

    pub fn membership_count(&self, window: WindowId) -> usize {
        self.memberships.get(&window).map_or(0, Vec::len)
    }

    pub fn is_window_grouped(&self, window: WindowId) -> bool { self.membership_count(window) > 0 }

    pub fn grouped_window_ids(&self) -> HashSet<WindowId> { self.memberships.keys().copied().collect() }

    pub fn primary_group_id(&self, window: WindowId) -> Option<GroupId> {
        self.primary
            .get(&window)
            .copied()
            .or_else(|| self.memberships.get(&window).and_then(|ids| ids.first().copied()))
    }

    /// The group whose copy of `window` is authoritative.
    pub fn group_for(&self, window: WindowId) -> Option<&Group> {
        self.primary_group_id(window).and_then(|id| self.groups.get(id))
    }

    /// Every group containing `window`, in registration order.
    pub fn groups_for(&self, window: WindowId) -> Vec<&Group> {
        self.memberships
            .get(&window)
            .map(|ids| ids.iter().filter_map(|id| self.groups.get(*id)).collect())
            .unwrap_or_default()
    }

    // Structural mutations.

    pub fn create_group(&mut self, new: NewGroup) -> Option<GroupId> {
        if !new.windows.iter().any(|w| !w.is_separator) {
            warn!("refusing to create a group without managed windows");
            return None;
        }
        let mut seen = HashSet::default();
        if !new.windows.iter().all(|w| seen.insert(w.id)) {
            warn!("refusing to create a group with duplicate window ids");
            return None;
        }
        for window in &new.windows {
            if self.is_window_grouped(window.id)
                && (!new.allow_shared_membership || window.is_separator)
            {
                warn!(window = %window.id, "window is already grouped");
                return None;
            }
        }

        let ids: Vec<WindowId> = new.windows.iter().map(|w| w.id).collect();
        let id = self.groups.insert_with_key(|key| {
            let mut group = Group::new(key, new.windows, new.frame);
            group.space_id = new.space_id;
            group.name = new.name;
            group.tab_bar_squeeze_delta = new.tab_bar_squeeze_delta;
            if let Some(index) = new.active_index {
                group.switch_to(index);
                if let Some(active) = group.active_window().map(|w| w.id) {
                    group.record_focus(active);
                }
            }
            group
        });
        self.order.push(id);
        self.rebuild_membership_index();
        debug!(group = %id, windows = %fmt_ids(&ids), "created group");
        self.emit(BroadcastEvent::GroupCreated { group_id: id, windows: ids });
        Some(id)
    }

    pub fn add_window(
        &mut self,
        window: WindowRef,
        group_id: GroupId,
        at: Option<usize>,
        allow_shared_membership: bool,
    ) -> bool {
        if !self.groups.contains_key(group_id) {
            return false;
        }
        let grouped = self.is_window_grouped(window.id);
        if grouped && (window.is_separator || !allow_shared_membership) {
            trace!(window = %window.id, "add rejected: already grouped");
            return false;
        }
        let Some(group) = self.groups.get_mut(group_id) else {
            return false;
        };
        if !group.add_window(window, at) {
            return false;
        }
        self.rebuild_membership_index();
        self.emit_changed(group_id);
        true
    }

    pub fn release_window(&mut self, window: WindowId, group_id: GroupId) -> Option<Release<WindowRef>> {
        let removed = self.groups.get_mut(group_id)?.remove_window(window)?;
        let dissolved = self.settle_after_release(group_id);
        Some(Release { removed, dissolved })
    }

    /// Batch form of [`release_window`](Self::release_window). Ids not in the
    /// group are skipped.
    pub fn release_windows(&mut self, ids: &HashSet<WindowId>, group_id: GroupId) -> Release<Vec<WindowRef>> {
        let removed = match self.groups.get_mut(group_id) {
            Some(group) => group.remove_windows(ids),
            None => Vec::new(),
        };
        if removed.is_empty() {
            return Release { removed, dissolved: None };
        }
        let dissolved = self.settle_after_release(group_id);
        Release { removed, dissolved }
    }

    fn settle_after_release(&mut self, group_id: GroupId) -> Option<Group> {
        let empty = self.groups.get(group_id).is_some_and(|g| g.managed_window_count() == 0);
        if empty {
            return self.dissolve_group(group_id);
        }
        self.rebuild_membership_index();
        self.emit_changed(group_id);
        None
    }

    /// Removes the group from the registry. Its window list is left as is.
    pub fn dissolve_group(&mut self, group_id: GroupId) -> Option<Group> {
        let group = self.groups.remove(group_id)?;
        self.order.retain(|id| *id != group_id);
        self.rebuild_membership_index();
        debug!(group = %group_id, "dissolved group");
        self.emit(BroadcastEvent::GroupDissolved {
            group_id,
            remaining: group.windows().iter().map(|w| w.id).collect(),
        });
        Some(group)
    }

    pub fn dissolve_all(&mut self) -> Vec<Group> {
        let order = std::mem::take(&mut self.order);
        let dissolved: Vec<Group> = order.into_iter().filter_map(|id| self.groups.remove(id)).collect();
        self.groups.clear();
        self.memberships.clear();
        self.primary.clear();
        for group in &dissolved {
            self.emit(BroadcastEvent::GroupDissolved {
                group_id: group.id(),
                remaining: group.windows().iter().map(|w| w.id).collect(),
            });
        }
        dissolved
    }

    pub fn promote_primary_group(&mut self, window: WindowId, group_id: GroupId) -> bool {
        let is_member = self.memberships.get(&window).is_some_and(|ids| ids.contains(&group_id));
        if !is_member || self.primary.get(&window) == Some(&group_id) {
            return false;
        }
        self.primary.insert(window, group_id);
        self.emit(BroadcastEvent::PrimaryChanged { window_id: window, group_id });
        true
    }

    /// Recomputes window -> groups from scratch. A window keeps its primary
    /// group while that group still contains it.
    fn rebuild_membership_index(&mut self) {
        let mut memberships: HashMap<WindowId, Vec<GroupId>> = HashMap::default();
        for &group_id in &self.order {
            let Some(group) = self.groups.get(group_id) else { continue };
            for window in group.windows() {
                memberships.entry(window.id).or_default().push(group_id);
            }
        }

        let mut primary = HashMap::default();
        for (window, group_ids) in &memberships {
            let Some(&first) = group_ids.first() else { continue };
            let kept = self.primary.get(window).copied().filter(|p| group_ids.contains(p));
            primary.insert(*window, kept.unwrap_or(first));
        }
        self.memberships = memberships;
        self.primary = primary;
    }

    // Attribute edits.

    pub fn update_window_title(&mut self, window: WindowId, group_id: GroupId, title: &str) -> bool {
        let Some(target) = self.groups.get_mut(group_id).and_then(|g| g.window_mut(window)) else {
            return false;
        };
        if target.is_separator || target.title == title {
            return false;
        }
        target.title = title.to_string();
        self.emit_changed(group_id);
        true
    }

    /// Sets the user tab name. Blank input clears it.
    pub fn update_custom_tab_name(
        &mut self,
        window: WindowId,
        group_id: GroupId,
        raw: Option<&str>,
    ) -> bool {
        let Some(target) = self.groups.get_mut(group_id).and_then(|g| g.window_mut(window)) else {
            return false;
        };
        if target.is_separator {
            return false;
        }
        let normalized = normalize_custom_tab_name(raw);
        if normalize_custom_tab_name(target.custom_tab_name.as_deref()) == normalized {
            return false;
        }
        target.custom_tab_name = normalized;
        self.emit_changed(group_id);
        true
    }

    pub fn set_frame(&mut self, group_id: GroupId, frame: Rect) -> bool {
        let Some(group) = self.groups.get_mut(group_id) else {
            return false;
        };
        if group.frame == frame {
            return false;
        }
        group.frame = frame;
        self.emit_changed(group_id);
        true
    }

    pub fn rename_group(&mut self, group_id: GroupId, name: Option<&str>) -> bool {
        let Some(group) = self.groups.get_mut(group_id) else {
            return false;
        };
        let normalized = normalize_custom_tab_name(name);
        if group.name == normalized {
            return false;
        }
        group.name = normalized;
        self.emit_changed(group_id);
        true
    }

    // Group operations routed through the registry so each one notifies once.

    pub fn record_focus(&mut self, group_id: GroupId, window: WindowId) -> bool {
        self.with_group(group_id, |g| g.record_focus(window))
    }

    pub fn switch_to(&mut self, group_id: GroupId, index: usize) -> bool {
        self.with_group(group_id, |g| g.switch_to(index))
    }

    pub fn switch_to_window(&mut self, group_id: GroupId, window: WindowId) -> bool {
        self.with_group(group_id, |g| g.switch_to_window(window))
    }

    pub fn move_tab(&mut self, group_id: GroupId, from: usize, to: usize) -> bool {
        self.with_group(group_id, |g| g.move_tab(from, to))
    }

    pub fn move_pinned_tab(&mut self, group_id: GroupId, window: WindowId, to_pinned_index: usize) -> bool {
        self.with_group(group_id, |g| g.move_pinned_tab(window, to_pinned_index))
    }

    pub fn next_in_mru_cycle(&mut self, group_id: GroupId) -> Option<usize> {
        let index = self.groups.get_mut(group_id)?.next_in_mru_cycle()?;
        self.emit_changed(group_id);
        Some(index)
    }

    pub fn end_cycle(&mut self, group_id: GroupId, landed: Option<WindowId>) -> bool {
        self.with_group(group_id, |g| g.end_cycle(landed))
    }

    fn with_group(&mut self, group_id: GroupId, f: impl FnOnce(&mut Group) -> bool) -> bool {
        let Some(group) = self.groups.get_mut(group_id) else {
            return false;
        };
        if !f(group) {
            return false;
        }
        self.emit_changed(group_id);
        true
    }

    // Mirroring.

    /// Adds a copy of a super-pinned window into another group, after that
    /// group's own super-pinned tabs.
    pub fn mirror_window(&mut self, window: WindowId, into: GroupId) -> bool {
        let Some(source) = self.group_for(window).and_then(|g| g.window(window)).cloned() else {
            return false;
        };
        if !source.is_super_pinned() {
            return false;
        }
        let Some(target) = self.groups.get(into) else {
            return false;
        };
        let at = target.windows().iter().take_while(|w| w.is_super_pinned()).count();
        self.add_window(source, into, Some(at), true)
    }

    /// Sets the pin tier of `window` in every group that holds a copy.
    ///
    /// Leaving the super tier drops the mirror copies: the window stays only
    /// in `group_id`, which becomes its primary.
    pub fn set_pin_tier(&mut self, window: WindowId, group_id: GroupId, tier: PinTier) -> bool {
        let holders: Vec<GroupId> = self.memberships.get(&window).cloned().unwrap_or_default();
        if !holders.contains(&group_id) {
            return false;
        }
        let unchanged = holders.iter().all(|id| {
            self.groups.get(*id).and_then(|g| g.window(window)).is_some_and(|w| w.pin_tier == tier)
        });
        if unchanged {
            return false;
        }

        for id in &holders {
            if let Some(copy) = self.groups.get_mut(*id).and_then(|g| g.window_mut(window)) {
                copy.pin_tier = tier;
            }
        }

        let mirrors = holders.iter().copied().filter(|id| *id != group_id);
        if tier != PinTier::Super && holders.len() > 1 {
            let mut emptied = Vec::new();
            let mut trimmed = Vec::new();
            for id in mirrors {
                let Some(group) = self.groups.get_mut(id) else { continue };
                group.remove_window(window);
                if group.managed_window_count() == 0 {
                    emptied.push(id);
                } else {
                    trimmed.push(id);
                }
            }
            self.primary.insert(window, group_id);
            self.rebuild_membership_index();
            debug!(%window, group = %group_id, "dropped super-pin mirrors");
            for id in emptied {
                self.dissolve_group(id);
            }
            for id in trimmed {
                self.emit_changed(id);
            }
        } else {
            for id in mirrors {
                self.emit_changed(id);
            }
        }

        self.emit_changed(group_id);
        true
    }

    /// Reorders super-pinned mirrors in every other group to follow the tab
    /// order in `from`.
    pub fn sync_super_pinned_order(&mut self, from: GroupId) -> bool {
        let Some(source) = self.groups.get(from) else {
            return false;
        };
        let order: Vec<WindowId> =
            source.windows().iter().filter(|w| w.is_super_pinned()).map(|w| w.id).collect();
        if order.is_empty() {
            return false;
        }

        let targets: Vec<GroupId> = self.order.iter().copied().filter(|id| *id != from).collect();
        let mut changed = false;
        for id in targets {
            let Some(group) = self.groups.get_mut(id) else { continue };
            if group.reorder_subset(&order) {
                self.emit_changed(id);
                changed = true;
            }
        }
        changed
    }

    /// Drops ids that are no longer in the group from a multi-selection.
    /// Returns the set only while it still selects at least two windows.
    pub fn prune_selection(&self, group_id: GroupId, ids: &HashSet<WindowId>) -> Option<HashSet<WindowId>> {
        let group = self.groups.get(group_id)?;
        let kept: HashSet<WindowId> = ids.iter().copied().filter(|id| group.contains(*id)).collect();
        (kept.len() >= 2).then_some(kept)
    }

    fn emit_changed(&self, group_id: GroupId) {
        let Some(group) = self.groups.get(group_id) else { return };
        self.emit(BroadcastEvent::GroupChanged {
            group_id,
            windows: group.windows().iter().map(|w| w.id).collect(),
            active_window: group.active_window().map(|w| w.id),
        });
    }

    fn emit(&self, event: BroadcastEvent) {
        if let Some(events) = &self.events {
            events.send(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        for group in self.groups() {
            assert!(group.managed_window_count() > 0, "empty group {} still registered", group.id());
            for window in group.windows() {
                let ids = self.memberships.get(&window.id).expect("window missing from index");
                assert!(ids.contains(&group.id()));
                let primary = self.primary.get(&window.id).expect("window without primary");
                assert!(ids.contains(primary));
            }
            let mut history = group.focus_history().to_vec();
            history.sort();
            let mut managed: Vec<WindowId> = group.managed_windows().map(|w| w.id).collect();
            managed.sort();
            assert_eq!(history, managed);
        }
        assert_eq!(self.order.len(), self.groups.len());
    }
}
