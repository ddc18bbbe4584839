use serde::{Deserialize, Serialize};

/// Identifier of one OS window.
///
/// Assigned by the window server and stable for the lifetime of the window.
/// After the owning process restarts the same logical window comes back with
/// a different id, which is why restore matching falls back to bundle/title.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(u32);

impl WindowId {
    pub const fn new(raw: u32) -> Self { Self(raw) }

    pub const fn as_u32(self) -> u32 { self.0 }
}

impl From<u32> for WindowId {
    fn from(raw: u32) -> Self { Self(raw) }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

#[allow(non_camel_case_types)]
pub type pid_t = i32;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PinTier {
    #[default]
    None,
    Normal,
    Super,
}

impl PinTier {
    pub fn from_legacy_pinned(pinned: bool) -> Self { if pinned { Self::Normal } else { Self::None } }

    #[inline]
    pub fn is_pinned(self) -> bool { self != PinTier::None }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

pub trait IsWithin {
    fn is_within(&self, how_much: f64, other: Self) -> bool;
}

impl IsWithin for Rect {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.x.is_within(how_much, other.x)
            && self.y.is_within(how_much, other.y)
            && self.width.is_within(how_much, other.width)
            && self.height.is_within(how_much, other.height)
    }
}

impl IsWithin for f64 {
    fn is_within(&self, how_much: f64, other: Self) -> bool { (self - other).abs() < how_much }
}

const SEPARATOR_BUNDLE_ID: &str = "dev.tabgroups.separator";

/// A window as handed to the core by window discovery.
///
/// Identity and appearance come from the live window. `pin_tier` and
/// `custom_tab_name` are user customizations owned by the group that holds
/// this copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRef {
    pub id: WindowId,
    #[serde(default)]
    pub owner_pid: pid_t,
    #[serde(rename = "bundleID")]
    pub bundle_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_tab_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    #[serde(default)]
    pub is_fullscreened: bool,
    #[serde(default, rename = "pinState")]
    pub pin_tier: PinTier,
    #[serde(default)]
    pub is_separator: bool,
}

impl WindowRef {
    pub fn new(
        id: impl Into<WindowId>,
        owner_pid: pid_t,
        bundle_id: impl Into<String>,
        title: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_pid,
            bundle_id: bundle_id.into(),
            title: title.into(),
            app_name: app_name.into(),
            custom_tab_name: None,
            bounds: None,
            is_fullscreened: false,
            pin_tier: PinTier::None,
            is_separator: false,
        }
    }

    /// A placeholder tab that only partitions tab order.
    pub fn separator(id: impl Into<WindowId>) -> Self {
        Self {
            is_separator: true,
            ..Self::new(id, 0, SEPARATOR_BUNDLE_ID, "Separator", "Separator")
        }
    }

    pub fn with_pin_tier(mut self, tier: PinTier) -> Self {
        self.pin_tier = tier;
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[inline]
    pub fn is_pinned(&self) -> bool { self.pin_tier.is_pinned() }

    #[inline]
    pub fn is_super_pinned(&self) -> bool { self.pin_tier == PinTier::Super }

    pub fn displayed_custom_tab_name(&self) -> Option<&str> {
        self.custom_tab_name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }

    pub fn display_title(&self) -> &str {
        if self.is_separator {
            return "";
        }
        if let Some(custom) = self.displayed_custom_tab_name() {
            return custom;
        }
        if self.title.is_empty() { &self.app_name } else { &self.title }
    }
}

/// Trims a user-entered tab name; blank input clears it.
pub fn normalize_custom_tab_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|name| !name.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_prefers_custom_name_then_title_then_app() {
        let mut window = WindowRef::new(1, 10, "com.test", "", "Test App");
        assert_eq!(window.display_title(), "Test App");

        window.title = "Inbox".into();
        assert_eq!(window.display_title(), "Inbox");

        window.custom_tab_name = Some("  Mail  ".into());
        assert_eq!(window.display_title(), "Mail");

        window.custom_tab_name = Some("   ".into());
        assert_eq!(window.display_title(), "Inbox");
    }

    #[test]
    fn separator_has_empty_title() {
        let sep = WindowRef::separator(99);
        assert!(sep.is_separator);
        assert_eq!(sep.display_title(), "");
    }

    #[test]
    fn pin_tier_parses_from_strings() {
        assert_eq!("super".parse::<PinTier>().unwrap(), PinTier::Super);
        assert_eq!(PinTier::Normal.to_string(), "normal");
        assert!(!PinTier::None.is_pinned());
        assert_eq!(PinTier::from_legacy_pinned(true), PinTier::Normal);
    }

    #[test]
    fn rects_within_tolerance() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(1.5, 0.5, 101.0, 99.0);
        assert!(a.is_within(2.0, b));
        assert!(!a.is_within(1.0, b));
    }

    #[test]
    fn normalizes_custom_names() {
        assert_eq!(normalize_custom_tab_name(Some(" x ")), Some("x".to_string()));
        assert_eq!(normalize_custom_tab_name(Some("  ")), None);
        assert_eq!(normalize_custom_tab_name(None), None);
    }
}
