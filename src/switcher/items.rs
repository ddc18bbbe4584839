//! Switcher item model and the MRU/z-order item assembly.

use serde::{Deserialize, Serialize};

use crate::common::collections::{HashMap, HashSet};
use crate::model::segment::{focused_segment_window_ids, segments};
use crate::model::window::IsWithin;
use crate::model::{Group, GroupId, GroupRegistry, MruEntry, MruTracker, SplitOptions, WindowId, WindowRef};

/// Ungrouped windows whose bounds sit this close to a group frame are the
/// group's own placeholder and never get an item.
const GROUP_FRAME_TOLERANCE: f64 = 2.0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NamedGroupLabelMode {
    GroupNameOnly,
    #[default]
    GroupAppWindow,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SwitcherItem {
    SingleWindow(WindowRef),
    /// A whole group. Used when no split option is on.
    Group { group_id: GroupId, window_ids: Vec<WindowId> },
    /// One segment of a group.
    GroupSegment { group_id: GroupId, segment_index: usize, window_ids: Vec<WindowId> },
}

impl SwitcherItem {
    pub fn window_ids(&self) -> &[WindowId] {
        match self {
            SwitcherItem::SingleWindow(window) => std::slice::from_ref(&window.id),
            SwitcherItem::Group { window_ids, .. } | SwitcherItem::GroupSegment { window_ids, .. } => {
                window_ids
            }
        }
    }

    pub fn window_count(&self) -> usize { self.window_ids().len() }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            SwitcherItem::SingleWindow(_) => None,
            SwitcherItem::Group { group_id, .. } | SwitcherItem::GroupSegment { group_id, .. } => {
                Some(*group_id)
            }
        }
    }

    pub fn is_group(&self) -> bool { self.group_id().is_some() }

    pub fn is_segment(&self) -> bool { matches!(self, SwitcherItem::GroupSegment { .. }) }

    /// Text shown for the item.
    pub fn label(&self, registry: &GroupRegistry, mode: NamedGroupLabelMode) -> String {
        let group = match self {
            SwitcherItem::SingleWindow(window) => return window.display_title().to_string(),
            _ => self.group_id().and_then(|id| registry.group(id)),
        };
        let Some(group) = group else {
            return String::new();
        };
        let lead = mru_order_within(group, self.window_ids())
            .first()
            .and_then(|id| group.window(*id))
            .map(|w| format!("{} - {}", w.app_name, w.display_title()))
            .unwrap_or_default();
        match (group.display_name(), mode) {
            (Some(name), NamedGroupLabelMode::GroupNameOnly) => name.to_string(),
            (Some(name), NamedGroupLabelMode::GroupAppWindow) => format!("{name}: {lead}"),
            (None, _) => lead,
        }
    }
}

/// `ids` ordered by the group's focus history, then any ids the history does
/// not mention in their given order.
pub fn mru_order_within(group: &Group, ids: &[WindowId]) -> Vec<WindowId> {
    let wanted: HashSet<WindowId> = ids.iter().copied().collect();
    let mut ordered: Vec<WindowId> =
        group.focus_history().iter().copied().filter(|id| wanted.contains(id)).collect();
    let recent: HashSet<WindowId> = ordered.iter().copied().collect();
    ordered.extend(ids.iter().copied().filter(|id| !recent.contains(id)));
    ordered
}

/// Single-window items for the segment around `focused`, most recent first.
pub fn tab_cycle_items(group: &Group, focused: Option<WindowId>, options: SplitOptions) -> Vec<SwitcherItem> {
    let segment = focused_segment_window_ids(group, focused, options);
    mru_order_within(group, &segment)
        .into_iter()
        .filter_map(|id| group.window(id))
        .filter(|w| !w.is_separator)
        .map(|w| SwitcherItem::SingleWindow(w.clone()))
        .collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct SegmentKey {
    group_id: GroupId,
    index: usize,
}

/// Orders the global switcher: MRU entries first, then whatever else is
/// visible in z-order, then groups that are not visible at all.
///
/// Output depends only on the inputs. A super-pinned window shared by
/// several groups is listed under exactly one of them.
pub fn build_switcher_items(
    mru: &MruTracker,
    registry: &GroupRegistry,
    z_ordered: &[WindowRef],
    options: SplitOptions,
    preferred_group_for_super_pins: Option<GroupId>,
) -> Vec<SwitcherItem> {
    let mut builder = ItemBuilder::new(mru, registry, z_ordered, options, preferred_group_for_super_pins);
    builder.place_mru_entries();
    builder.place_z_ordered();
    builder.place_hidden_groups();
    builder.items
}

struct ItemBuilder<'a> {
    mru: &'a MruTracker,
    registry: &'a GroupRegistry,
    z_ordered: &'a [WindowRef],
    split: bool,
    dedupe_super_pins: bool,
    preferred_group_for_super_pins: Option<GroupId>,

    segments: HashMap<SegmentKey, Vec<WindowId>>,
    keys_by_window: HashMap<WindowId, Vec<SegmentKey>>,
    keys_by_group: HashMap<GroupId, Vec<SegmentKey>>,
    super_pin_owners: HashMap<WindowId, Vec<GroupId>>,
    mru_rank: HashMap<GroupId, usize>,
    windows_by_id: HashMap<WindowId, &'a WindowRef>,

    items: Vec<SwitcherItem>,
    seen_segments: HashSet<SegmentKey>,
    seen_windows: HashSet<WindowId>,
    seen_super_pins: HashSet<WindowId>,
}

impl<'a> ItemBuilder<'a> {
    fn new(
        mru: &'a MruTracker,
        registry: &'a GroupRegistry,
        z_ordered: &'a [WindowRef],
        options: SplitOptions,
        preferred_group_for_super_pins: Option<GroupId>,
    ) -> Self {
        let mut segments_by_key = HashMap::default();
        let mut keys_by_window: HashMap<WindowId, Vec<SegmentKey>> = HashMap::default();
        let mut keys_by_group = HashMap::default();
        let mut super_pin_owners: HashMap<WindowId, Vec<GroupId>> = HashMap::default();

        for group in registry.groups() {
            for window in group.managed_windows().filter(|w| w.is_super_pinned()) {
                super_pin_owners.entry(window.id).or_default().push(group.id());
            }
            let mut group_keys = Vec::new();
            for (index, ids) in segments(group, options).into_iter().enumerate() {
                let key = SegmentKey { group_id: group.id(), index };
                for id in &ids {
                    keys_by_window.entry(*id).or_default().push(key);
                }
                segments_by_key.insert(key, ids);
                group_keys.push(key);
            }
            keys_by_group.insert(group.id(), group_keys);
        }

        let mru_rank = mru.mru_group_order().into_iter().enumerate().map(|(rank, id)| (id, rank)).collect();

        let mut windows_by_id = HashMap::default();
        for window in z_ordered {
            windows_by_id.entry(window.id).or_insert(window);
        }

        Self {
            mru,
            registry,
            z_ordered,
            split: !options.is_empty(),
            dedupe_super_pins: options.splits_pins(),
            preferred_group_for_super_pins,
            segments: segments_by_key,
            keys_by_window,
            keys_by_group,
            super_pin_owners,
            mru_rank,
            windows_by_id,
            items: Vec::new(),
            seen_segments: HashSet::default(),
            seen_windows: HashSet::default(),
            seen_super_pins: HashSet::default(),
        }
    }

    /// Caller preference, then MRU rank, then registration order, then id.
    fn preferred_super_pin_owner(&self, window: WindowId) -> Option<GroupId> {
        let candidates = self.super_pin_owners.get(&window).filter(|c| !c.is_empty())?;
        if let Some(preferred) = self.preferred_group_for_super_pins {
            if candidates.contains(&preferred) {
                return Some(preferred);
            }
        }
        candidates.iter().copied().min_by_key(|id| {
            (
                self.mru_rank.get(id).copied().unwrap_or(usize::MAX),
                self.registry.registration_rank(*id).unwrap_or(usize::MAX),
                *id,
            )
        })
    }

    fn append_segment(&mut self, key: SegmentKey) {
        if !self.seen_segments.insert(key) {
            return;
        }
        let registry = self.registry;
        let Some(group) = registry.group(key.group_id) else { return };
        let Some(ids) = self.segments.get(&key).filter(|ids| !ids.is_empty()) else { return };

        let ids: Vec<WindowId> = if self.dedupe_super_pins {
            let mut kept = Vec::with_capacity(ids.len());
            for &id in ids {
                let super_pinned = group.window(id).is_some_and(|w| w.is_super_pinned());
                if !super_pinned {
                    kept.push(id);
                    continue;
                }
                if self.preferred_super_pin_owner(id).is_some_and(|owner| owner != key.group_id) {
                    continue;
                }
                if self.seen_super_pins.insert(id) {
                    kept.push(id);
                }
            }
            kept
        } else {
            ids.clone()
        };
        if ids.is_empty() {
            return;
        }

        self.seen_windows.extend(ids.iter().copied());
        self.items.push(if self.split {
            SwitcherItem::GroupSegment { group_id: key.group_id, segment_index: key.index, window_ids: ids }
        } else {
            SwitcherItem::Group { group_id: key.group_id, window_ids: ids }
        });
    }

    fn append_all_segments(&mut self, group_id: GroupId) {
        let keys = self.keys_by_group.get(&group_id).cloned().unwrap_or_default();
        for key in keys {
            self.append_segment(key);
        }
    }

    fn segment_of(&self, window: WindowId, group_id: GroupId) -> Option<SegmentKey> {
        self.keys_by_window.get(&window)?.iter().copied().find(|k| k.group_id == group_id)
    }

    /// Referenced window, then the active window, then the most recent
    /// window, then the first segment.
    fn preferred_segment(&self, group_id: GroupId, window: Option<WindowId>) -> Option<SegmentKey> {
        let first = *self.keys_by_group.get(&group_id)?.first()?;
        if let Some(key) = window.and_then(|w| self.segment_of(w, group_id)) {
            return Some(key);
        }
        let group = self.registry.group(group_id)?;
        if let Some(key) = group.active_window().and_then(|w| self.segment_of(w.id, group_id)) {
            return Some(key);
        }
        if let Some(key) = group.focus_history().iter().find_map(|id| self.segment_of(*id, group_id)) {
            return Some(key);
        }
        Some(first)
    }

    fn place_group_entry(&mut self, group_id: GroupId, window: Option<WindowId>) {
        if self.split {
            if let Some(key) = self.preferred_segment(group_id, window) {
                self.append_segment(key);
            }
        } else {
            self.append_all_segments(group_id);
        }
    }

    fn place_mru_entries(&mut self) {
        let mru = self.mru;
        for entry in mru.entries() {
            match *entry {
                MruEntry::Group { group_id } => self.place_group_entry(group_id, None),
                MruEntry::GroupWindow { group_id, window_id } => {
                    self.place_group_entry(group_id, Some(window_id))
                }
                MruEntry::Window { window_id } => {
                    let Some(window) = self.windows_by_id.get(&window_id).copied() else { continue };
                    if self.seen_windows.contains(&window_id) || self.keys_by_window.contains_key(&window_id) {
                        continue;
                    }
                    self.items.push(SwitcherItem::SingleWindow(window.clone()));
                    self.seen_windows.insert(window_id);
                }
            }
        }
    }

    fn place_z_ordered(&mut self) {
        let (registry, z_ordered) = (self.registry, self.z_ordered);
        for window in z_ordered {
            if self.seen_windows.contains(&window.id) {
                continue;
            }
            if let Some(keys) = self.keys_by_window.get(&window.id) {
                let key = keys.iter().copied().find(|k| !self.seen_segments.contains(k)).or(keys.first().copied());
                if let Some(key) = key {
                    self.append_segment(key);
                }
                continue;
            }
            let placeholder = window.bounds.is_some_and(|bounds| {
                registry.groups().any(|g| g.frame.is_within(GROUP_FRAME_TOLERANCE, bounds))
            });
            if placeholder {
                continue;
            }
            self.items.push(SwitcherItem::SingleWindow(window.clone()));
            self.seen_windows.insert(window.id);
        }
    }

    fn place_hidden_groups(&mut self) {
        let unplaced: Vec<GroupId> = self
            .registry
            .group_ids()
            .iter()
            .copied()
            .filter(|id| {
                self.keys_by_group
                    .get(id)
                    .is_some_and(|keys| !keys.iter().all(|k| self.seen_segments.contains(k)))
            })
            .collect();
        for group_id in unplaced {
            self.append_all_segments(group_id);
        }
    }
}
