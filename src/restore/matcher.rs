//! Reconciles saved groups against the windows that are running now.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::snapshot::{GroupSnapshot, WindowSnapshot};
use crate::common::collections::{HashMap, HashSet};
use crate::model::{GroupId, GroupRegistry, NewGroup, Rect, WindowId, WindowRef};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RestoreMode {
    /// Every saved window must be found or the group is skipped.
    #[default]
    Smart,
    /// Nothing is restored at launch. Matching a single group directly is
    /// as permissive as `Always`.
    Off,
    /// Restore whatever can be found.
    Always,
}

/// Lookup tables over the live window list.
pub struct LiveWindowIndex<'a> {
    by_id: HashMap<WindowId, &'a WindowRef>,
    by_bundle_and_title: HashMap<(&'a str, &'a str), Vec<&'a WindowRef>>,
}

impl<'a> LiveWindowIndex<'a> {
    pub fn new(live: &'a [WindowRef]) -> Self {
        let mut by_id = HashMap::default();
        let mut by_bundle_and_title: HashMap<(&str, &str), Vec<&WindowRef>> = HashMap::default();
        for window in live {
            by_id.insert(window.id, window);
            by_bundle_and_title
                .entry((window.bundle_id.as_str(), window.title.as_str()))
                .or_default()
                .push(window);
        }
        Self { by_id, by_bundle_and_title }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SnapshotIdentity {
    window_id: WindowId,
    bundle_id: String,
    title: String,
}

impl SnapshotIdentity {
    fn of(snap: &WindowSnapshot) -> Self {
        Self {
            window_id: snap.window_id,
            bundle_id: snap.bundle_id.clone(),
            title: snap.title.clone(),
        }
    }
}

/// Saved identity -> live window resolved earlier in the same pass.
#[derive(Default)]
pub struct IdentityCache {
    resolved: HashMap<SnapshotIdentity, WindowRef>,
}

impl IdentityCache {
    pub fn new() -> Self { Self::default() }
}

/// The live window with user customizations from the snapshot applied.
fn adopt(live: &WindowRef, snap: &WindowSnapshot) -> WindowRef {
    WindowRef {
        pin_tier: snap.pin_tier,
        custom_tab_name: snap.custom_tab_name.clone(),
        ..live.clone()
    }
}

/// Matches one saved group. Ids claimed here are added to `claimed`, but only
/// when the group is accepted.
///
/// Returns the matched windows in snapshot order, or `None` when the group
/// cannot be restored under `mode`.
pub fn match_group(
    snapshot: &GroupSnapshot,
    live: &LiveWindowIndex<'_>,
    claimed: &mut HashSet<WindowId>,
    cache: &mut IdentityCache,
    mode: RestoreMode,
) -> Option<Vec<WindowRef>> {
    let mut local_claims: Vec<WindowId> = Vec::new();
    let mut fresh: Vec<(SnapshotIdentity, WindowRef)> = Vec::new();
    let is_claimed = |id: WindowId, local: &[WindowId]| claimed.contains(&id) || local.contains(&id);
    let mut matched = Vec::with_capacity(snapshot.windows.len());

    for snap in &snapshot.windows {
        if snap.is_separator {
            matched.push(WindowRef::separator(snap.window_id));
            continue;
        }
        let identity = SnapshotIdentity::of(snap);

        let reused = cache
            .resolved
            .get(&identity)
            .or_else(|| fresh.iter().find(|(k, _)| *k == identity).map(|(_, w)| w));
        if let Some(reused) = reused {
            debug!(app = %snap.app_name, saved = %snap.window_id, live = %reused.id, "reused match");
            matched.push(adopt(reused, snap));
            continue;
        }

        if let Some(by_id) = live.by_id.get(&snap.window_id).filter(|w| !is_claimed(w.id, &local_claims)) {
            debug!(app = %snap.app_name, saved = %snap.window_id, "id match");
            matched.push(adopt(by_id, snap));
            local_claims.push(by_id.id);
            fresh.push((identity, (*by_id).clone()));
            continue;
        }

        let by_title = live
            .by_bundle_and_title
            .get(&(snap.bundle_id.as_str(), snap.title.as_str()))
            .and_then(|candidates| candidates.iter().find(|w| !is_claimed(w.id, &local_claims)));
        if let Some(by_title) = by_title {
            debug!(app = %snap.app_name, saved = %snap.window_id, live = %by_title.id, "title match");
            matched.push(adopt(by_title, snap));
            local_claims.push(by_title.id);
            fresh.push((identity, (*by_title).clone()));
            continue;
        }

        debug!(
            app = %snap.app_name,
            saved = %snap.window_id,
            title = %snap.title,
            bundle = %snap.bundle_id,
            id_live = live.by_id.contains_key(&snap.window_id),
            id_claimed = is_claimed(snap.window_id, &local_claims),
            "no match"
        );
        if mode == RestoreMode::Smart {
            debug!("smart mode: rejecting entire group");
            return None;
        }
    }

    if !matched.iter().any(|w| !w.is_separator) {
        return None;
    }
    claimed.extend(local_claims);
    cache.resolved.extend(fresh);
    Some(matched)
}

/// A saved group reconciled with live windows, ready to be registered.
#[derive(Clone, Debug, PartialEq)]
pub struct RestoredGroup {
    pub windows: Vec<WindowRef>,
    pub active_index: usize,
    pub frame: Rect,
    pub tab_bar_squeeze_delta: f64,
    pub name: Option<String>,
}

impl RestoredGroup {
    /// Registers the group. A window that is already grouped may only join
    /// as a mirrored super pin; any other overlap rejects the group.
    pub fn install(self, registry: &mut GroupRegistry) -> Option<GroupId> {
        let mut overlapping = self.windows.iter().filter(|w| registry.is_window_grouped(w.id)).peekable();
        let shared = overlapping.peek().is_some()
            && overlapping.all(|w| {
                w.is_super_pinned()
                    && registry.group_for(w.id).and_then(|g| g.window(w.id)).is_some_and(WindowRef::is_super_pinned)
            });
        let mut new = NewGroup::new(self.windows).with_frame(self.frame).active(self.active_index);
        new.tab_bar_squeeze_delta = self.tab_bar_squeeze_delta;
        new.name = self.name;
        new.allow_shared_membership = shared;
        registry.create_group(new)
    }
}

/// Runs [`match_group`] over `snapshots` in saved order with one claim set
/// and one identity cache. `live` is front-to-back z-order.
///
/// `already_claimed` seeds the claim set, normally with the windows the
/// registry holds already, so a pass never pulls a grouped window into a
/// second group. Each restored group activates whichever matched window is
/// frontmost.
pub fn restore_pass(
    snapshots: &[GroupSnapshot],
    live: &[WindowRef],
    already_claimed: &HashSet<WindowId>,
    mode: RestoreMode,
) -> Vec<RestoredGroup> {
    if mode == RestoreMode::Off {
        return Vec::new();
    }
    let index = LiveWindowIndex::new(live);
    let mut claimed = already_claimed.clone();
    let mut cache = IdentityCache::new();
    let z_rank: HashMap<WindowId, usize> = live.iter().enumerate().rev().map(|(i, w)| (w.id, i)).collect();

    let mut restored = Vec::new();
    for snapshot in snapshots {
        let Some(windows) = match_group(snapshot, &index, &mut claimed, &mut cache, mode) else {
            continue;
        };
        let active_index = windows
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.is_separator)
            .min_by_key(|(_, w)| z_rank.get(&w.id).copied().unwrap_or(usize::MAX))
            .map_or(0, |(i, _)| i);
        restored.push(RestoredGroup {
            windows,
            active_index,
            frame: snapshot.frame,
            tab_bar_squeeze_delta: snapshot.tab_bar_squeeze_delta,
            name: snapshot.name.clone(),
        });
    }
    debug!(saved = snapshots.len(), restored = restored.len(), %mode, "restore pass finished");
    restored
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::model::PinTier;

    fn live(id: u32, bundle: &str, title: &str) -> WindowRef { WindowRef::new(id, 1, bundle, title, "App") }

    fn saved(id: u32, bundle: &str, title: &str) -> WindowSnapshot {
        WindowSnapshot {
            window_id: WindowId::new(id),
            bundle_id: bundle.into(),
            title: title.into(),
            app_name: "App".into(),
            pin_tier: PinTier::None,
            custom_tab_name: None,
            is_separator: false,
        }
    }

    fn separator(id: u32) -> WindowSnapshot {
        WindowSnapshot { is_separator: true, ..saved(id, "dev.tabgroups.separator", "") }
    }

    fn group(windows: Vec<WindowSnapshot>) -> GroupSnapshot {
        GroupSnapshot {
            windows,
            active_index: 0,
            frame: Rect::new(0.0, 0.0, 800.0, 600.0),
            tab_bar_squeeze_delta: 0.0,
            name: None,
        }
    }

    fn run(snapshot: &GroupSnapshot, live_windows: &[WindowRef], mode: RestoreMode) -> Option<Vec<WindowRef>> {
        let index = LiveWindowIndex::new(live_windows);
        match_group(snapshot, &index, &mut HashSet::default(), &mut IdentityCache::new(), mode)
    }

    fn ids(windows: &[WindowRef]) -> Vec<u32> { windows.iter().map(|w| w.id.as_u32()).collect() }

    #[test]
    fn smart_mode_rejects_partial_group() {
        let snap = group(vec![saved(1, "com.a", "A"), saved(2, "com.b", "B")]);
        let live_windows = vec![live(1, "com.a", "A")];
        assert_eq!(run(&snap, &live_windows, RestoreMode::Smart), None);
        assert_eq!(run(&snap, &live_windows, RestoreMode::Always).map(|w| ids(&w)), Some(vec![1]));
    }

    #[test]
    fn off_mode_matching_is_permissive() {
        let snap = group(vec![saved(1, "com.a", "A"), saved(2, "com.b", "B")]);
        let live_windows = vec![live(1, "com.a", "A")];
        assert_eq!(run(&snap, &live_windows, RestoreMode::Off).map(|w| ids(&w)), Some(vec![1]));
    }

    #[test]
    fn falls_back_to_bundle_and_title() {
        let snap = group(vec![saved(1, "com.a", "Inbox"), saved(2, "com.b", "Notes")]);
        let live_windows = vec![live(50, "com.b", "Notes"), live(60, "com.a", "Inbox")];
        assert_eq!(run(&snap, &live_windows, RestoreMode::Smart).map(|w| ids(&w)), Some(vec![60, 50]));
    }

    #[test]
    fn bundle_alone_is_not_enough() {
        let snap = group(vec![saved(1, "com.a", "Inbox")]);
        let live_windows = vec![live(60, "com.a", "Drafts")];
        assert_eq!(run(&snap, &live_windows, RestoreMode::Always), None);
    }

    #[test]
    fn separators_pass_through_but_do_not_count() {
        let snap = group(vec![saved(1, "com.a", "A"), separator(900), saved(2, "com.b", "B")]);
        let live_windows = vec![live(1, "com.a", "A")];
        let matched = run(&snap, &live_windows, RestoreMode::Always).unwrap();
        assert_eq!(ids(&matched), vec![1, 900]);
        assert!(matched[1].is_separator);

        let only_separator = group(vec![separator(900), saved(5, "com.x", "X")]);
        assert_eq!(run(&only_separator, &live_windows, RestoreMode::Always), None);
    }

    #[test]
    fn snapshot_customizations_override_live_window() {
        let mut entry = saved(1, "com.a", "A");
        entry.pin_tier = PinTier::Normal;
        entry.custom_tab_name = Some("Mail".into());
        let live_windows = vec![live(1, "com.a", "A (3 unread)").with_pin_tier(PinTier::None)];
        let matched = run(&group(vec![entry]), &live_windows, RestoreMode::Smart).unwrap();
        assert_eq!(matched[0].pin_tier, PinTier::Normal);
        assert_eq!(matched[0].custom_tab_name.as_deref(), Some("Mail"));
        assert_eq!(matched[0].title, "A (3 unread)");
    }

    #[test]
    fn duplicate_titles_claim_distinct_windows() {
        let snap = group(vec![saved(1, "com.term", "zsh"), saved(2, "com.term", "zsh")]);
        let live_windows = vec![live(10, "com.term", "zsh"), live(11, "com.term", "zsh")];
        assert_eq!(run(&snap, &live_windows, RestoreMode::Smart).map(|w| ids(&w)), Some(vec![10, 11]));
    }

    #[test]
    fn claims_are_not_kept_for_rejected_groups() {
        let index_windows = vec![live(1, "com.a", "A")];
        let index = LiveWindowIndex::new(&index_windows);
        let mut claimed = HashSet::default();
        let mut cache = IdentityCache::new();
        let rejected = group(vec![saved(1, "com.a", "A"), saved(2, "com.b", "B")]);
        assert!(match_group(&rejected, &index, &mut claimed, &mut cache, RestoreMode::Smart).is_none());
        assert!(claimed.is_empty());
        let accepted = group(vec![saved(1, "com.a", "A")]);
        assert!(match_group(&accepted, &index, &mut claimed, &mut cache, RestoreMode::Smart).is_some());
        assert!(claimed.contains(&WindowId::new(1)));
    }

    #[test]
    fn restore_pass_never_assigns_a_window_twice() {
        let snapshots = vec![
            group(vec![saved(1, "com.a", "A"), saved(2, "com.b", "B")]),
            group(vec![saved(3, "com.a", "A"), saved(4, "com.c", "C")]),
        ];
        let live_windows = vec![live(1, "com.a", "A"), live(2, "com.b", "B"), live(4, "com.c", "C")];
        let restored = restore_pass(&snapshots, &live_windows, &HashSet::default(), RestoreMode::Always);
        let all: Vec<u32> = restored.iter().flat_map(|g| ids(&g.windows)).collect();
        assert_eq!(all, vec![1, 2, 4]);
    }

    #[test]
    fn restore_pass_respects_saved_order_for_contested_windows() {
        let snapshots = vec![
            group(vec![saved(7, "com.a", "A")]),
            group(vec![saved(8, "com.a", "A"), saved(9, "com.b", "B")]),
        ];
        let live_windows = vec![live(20, "com.a", "A"), live(9, "com.b", "B")];
        let restored = restore_pass(&snapshots, &live_windows, &HashSet::default(), RestoreMode::Smart);
        assert_eq!(restored.len(), 1);
        assert_eq!(ids(&restored[0].windows), vec![20]);
    }

    #[test]
    fn mirrored_super_pins_resolve_to_the_same_window() {
        let mut pin = saved(1, "com.a", "A");
        pin.pin_tier = PinTier::Super;
        let snapshots = vec![
            group(vec![pin.clone(), saved(2, "com.b", "B")]),
            group(vec![pin, saved(3, "com.c", "C")]),
        ];
        let live_windows = vec![live(1, "com.a", "A"), live(2, "com.b", "B"), live(3, "com.c", "C")];
        let restored = restore_pass(&snapshots, &live_windows, &HashSet::default(), RestoreMode::Smart);
        assert_eq!(ids(&restored[0].windows), vec![1, 2]);
        assert_eq!(ids(&restored[1].windows), vec![1, 3]);

        let mut registry = GroupRegistry::new();
        for group in restored {
            assert!(group.install(&mut registry).is_some());
        }
        assert_eq!(registry.membership_count(WindowId::new(1)), 2);
    }

    #[test]
    fn restore_pass_activates_frontmost_window() {
        let snapshots = vec![group(vec![saved(1, "com.a", "A"), separator(50), saved(2, "com.b", "B")])];
        let live_windows = vec![live(2, "com.b", "B"), live(1, "com.a", "A")];
        let restored = restore_pass(&snapshots, &live_windows, &HashSet::default(), RestoreMode::Smart);
        assert_eq!(restored[0].active_index, 2);

        let mut registry = GroupRegistry::new();
        let id = restored[0].clone().install(&mut registry).unwrap();
        assert_eq!(registry.group(id).unwrap().active_window().map(|w| w.id), Some(WindowId::new(2)));
    }

    #[test]
    fn off_mode_restores_nothing() {
        let snapshots = vec![group(vec![saved(1, "com.a", "A")])];
        assert!(restore_pass(&snapshots, &[live(1, "com.a", "A")], &HashSet::default(), RestoreMode::Off).is_empty());
    }

    #[test]
    fn restore_pass_skips_windows_the_registry_already_holds() {
        let mut registry = GroupRegistry::new();
        registry.create_group(NewGroup::new(vec![live(1, "com.a", "A"), live(5, "com.e", "E")])).unwrap();

        let snapshots = vec![group(vec![saved(1, "com.a", "A"), saved(2, "com.b", "B")])];
        let live_windows = vec![live(1, "com.a", "A"), live(2, "com.b", "B")];
        let restored = restore_pass(&snapshots, &live_windows, &registry.grouped_window_ids(), RestoreMode::Smart);
        assert!(restored.is_empty());

        let always = restore_pass(&snapshots, &live_windows, &registry.grouped_window_ids(), RestoreMode::Always);
        assert_eq!(ids(&always[0].windows), vec![2]);
        assert!(always[0].clone().install(&mut registry).is_some());
        assert_eq!(registry.membership_count(WindowId::new(1)), 1);
        registry.check_invariants();
    }

    #[test]
    fn install_rejects_overlap_that_is_not_a_super_pin() {
        let mut registry = GroupRegistry::new();
        registry.create_group(NewGroup::new(vec![live(1, "com.a", "A"), live(5, "com.e", "E")])).unwrap();

        let snapshots = vec![group(vec![saved(1, "com.a", "A"), saved(2, "com.b", "B")])];
        let live_windows = vec![live(1, "com.a", "A"), live(2, "com.b", "B")];
        let restored = restore_pass(&snapshots, &live_windows, &HashSet::default(), RestoreMode::Smart);
        assert_eq!(restored.len(), 1);
        assert!(restored[0].clone().install(&mut registry).is_none());
        assert_eq!(registry.membership_count(WindowId::new(1)), 1);
        assert_eq!(registry.len(), 1);
    }
}
