//! Persisted form of a group.
//!
//! Field names follow the session file that older releases wrote, so files
//! written before pin tiers existed (only `isPinned`) still load.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{Group, GroupId, GroupRegistry, PinTier, Rect, WindowId, WindowRef};

#[derive(Clone, Debug, PartialEq)]
pub struct WindowSnapshot {
    pub window_id: WindowId,
    pub bundle_id: String,
    pub title: String,
    pub app_name: String,
    pub pin_tier: PinTier,
    pub custom_tab_name: Option<String>,
    pub is_separator: bool,
}

/// Wire shape of [`WindowSnapshot`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindowSnapshotRepr {
    #[serde(rename = "windowID")]
    window_id: WindowId,
    #[serde(rename = "bundleID")]
    bundle_id: String,
    title: String,
    app_name: String,
    #[serde(default)]
    pin_state: Option<PinTier>,
    #[serde(default)]
    is_pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_tab_name: Option<String>,
    #[serde(default)]
    is_separator: bool,
}

impl Serialize for WindowSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WindowSnapshotRepr {
            window_id: self.window_id,
            bundle_id: self.bundle_id.clone(),
            title: self.title.clone(),
            app_name: self.app_name.clone(),
            pin_state: Some(self.pin_tier),
            is_pinned: Some(self.pin_tier.is_pinned()),
            custom_tab_name: self.custom_tab_name.clone(),
            is_separator: self.is_separator,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WindowSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = WindowSnapshotRepr::deserialize(deserializer)?;
        let pin_tier = repr
            .pin_state
            .unwrap_or_else(|| PinTier::from_legacy_pinned(repr.is_pinned.unwrap_or(false)));
        Ok(WindowSnapshot {
            window_id: repr.window_id,
            bundle_id: repr.bundle_id,
            title: repr.title,
            app_name: repr.app_name,
            pin_tier,
            custom_tab_name: repr.custom_tab_name,
            is_separator: repr.is_separator,
        })
    }
}

impl WindowSnapshot {
    pub fn capture(window: &WindowRef) -> Self {
        Self {
            window_id: window.id,
            bundle_id: window.bundle_id.clone(),
            title: window.title.clone(),
            app_name: window.app_name.clone(),
            pin_tier: window.pin_tier,
            custom_tab_name: window.custom_tab_name.clone(),
            is_separator: window.is_separator,
        }
    }

    #[inline]
    pub fn is_pinned(&self) -> bool { self.pin_tier.is_pinned() }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    pub windows: Vec<WindowSnapshot>,
    pub active_index: usize,
    pub frame: Rect,
    #[serde(default)]
    pub tab_bar_squeeze_delta: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl GroupSnapshot {
    pub fn capture(group: &Group) -> Self {
        Self {
            windows: group.windows().iter().map(WindowSnapshot::capture).collect(),
            active_index: group.active_index().unwrap_or(0),
            frame: group.frame,
            tab_bar_squeeze_delta: group.tab_bar_squeeze_delta,
            name: group.display_name().map(str::to_string),
        }
    }

    pub fn managed_window_count(&self) -> usize { self.windows.iter().filter(|w| !w.is_separator).count() }
}

/// Snapshots for every live group: groups in `mru_group_order` first, then
/// the rest in registration order.
pub fn order_for_save(registry: &GroupRegistry, mru_group_order: &[GroupId]) -> Vec<GroupSnapshot> {
    let mut ordered: Vec<GroupId> = Vec::with_capacity(registry.len());
    for id in mru_group_order.iter().chain(registry.group_ids()) {
        if registry.group(*id).is_some() && !ordered.contains(id) {
            ordered.push(*id);
        }
    }
    ordered
        .into_iter()
        .filter_map(|id| registry.group(id))
        .map(GroupSnapshot::capture)
        .collect()
}
