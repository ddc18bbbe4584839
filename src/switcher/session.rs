//! One quick-switcher invocation: show, navigate, then commit or dismiss.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::items::{SwitcherItem, mru_order_within};
use crate::model::segment::focused_segment_window_ids;
use crate::model::{GroupRegistry, SplitOptions, WindowId};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SwitcherStyle {
    /// Horizontal strip of icons.
    #[default]
    AppIcons,
    /// Vertical list of titles.
    Titles,
}

impl SwitcherStyle {
    fn is_primary_axis(self, direction: ArrowDirection) -> bool {
        match self {
            SwitcherStyle::AppIcons => matches!(direction, ArrowDirection::Left | ArrowDirection::Right),
            SwitcherStyle::Titles => matches!(direction, ArrowDirection::Up | ArrowDirection::Down),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    WithinGroup,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArrowDirection {
    Left,
    Right,
    Up,
    Down,
}

impl ArrowDirection {
    fn is_forward(self) -> bool { matches!(self, ArrowDirection::Right | ArrowDirection::Down) }
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq)]
pub enum SwitcherAction {
    Commit {
        item: SwitcherItem,
        sub_selected_index: Option<usize>,
    },
    Dismiss,
}

/// The slice of items that fits on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VisibleWindow {
    pub start: usize,
    pub end: usize,
    /// Selection index relative to `start`.
    pub selected: usize,
    pub leading_overflow: bool,
    pub trailing_overflow: bool,
}

#[derive(Debug)]
struct Active {
    items: Vec<SwitcherItem>,
    selected: usize,
    sub_selected: Option<WindowId>,
    style: SwitcherStyle,
    scope: Scope,
    split: SplitOptions,
}

impl Active {
    fn selected_item(&self) -> Option<&SwitcherItem> { self.items.get(self.selected) }
}

pub type ActionHandler = Box<dyn FnMut(SwitcherAction)>;

#[derive(Default)]
pub struct SwitcherSession {
    active: Option<Active>,
    handler: Option<ActionHandler>,
}

impl std::fmt::Debug for SwitcherSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitcherSession").field("active", &self.active).finish_non_exhaustive()
    }
}

impl SwitcherSession {
    pub fn new() -> Self { Self::default() }

    pub fn set_action_handler(&mut self, handler: ActionHandler) { self.handler = Some(handler); }

    pub fn clear_action_handler(&mut self) { self.handler = None; }

    pub fn is_active(&self) -> bool { self.active.is_some() }

    pub fn scope(&self) -> Option<Scope> { self.active.as_ref().map(|a| a.scope) }

    pub fn style(&self) -> Option<SwitcherStyle> { self.active.as_ref().map(|a| a.style) }

    pub fn items(&self) -> &[SwitcherItem] {
        match &self.active {
            Some(active) => &active.items,
            None => &[],
        }
    }

    pub fn selected_index(&self) -> Option<usize> { self.active.as_ref().map(|a| a.selected) }

    pub fn selected_item(&self) -> Option<&SwitcherItem> { self.active.as_ref()?.selected_item() }

    pub fn sub_selected_window(&self) -> Option<WindowId> { self.active.as_ref()?.sub_selected }

    /// Starts a session with the first item selected. Empty lists are
    /// ignored.
    pub fn show(&mut self, items: Vec<SwitcherItem>, style: SwitcherStyle, scope: Scope, split: SplitOptions) -> bool {
        if items.is_empty() {
            return false;
        }
        debug!(items = items.len(), ?scope, %style, "switcher shown");
        self.active = Some(Active {
            items,
            selected: 0,
            sub_selected: None,
            style,
            scope,
            split,
        });
        true
    }

    pub fn advance(&mut self) { self.step(1) }

    pub fn retreat(&mut self) { self.step(-1) }

    fn step(&mut self, delta: isize) {
        let Some(active) = self.active.as_mut() else { return };
        let len = active.items.len();
        if len == 0 {
            return;
        }
        active.selected = (active.selected as isize + delta).rem_euclid(len as isize) as usize;
        active.sub_selected = None;
        trace!(selected = active.selected, "switcher moved");
    }

    pub fn cycle_within_group(&mut self, registry: &GroupRegistry) -> bool { self.cycle_sub_selection(registry, 1) }

    pub fn cycle_within_group_backward(&mut self, registry: &GroupRegistry) -> bool {
        self.cycle_sub_selection(registry, -1)
    }

    /// Moves the sub-selection across the selected multi-window item in MRU
    /// order. The first step starts from the head of that order.
    fn cycle_sub_selection(&mut self, registry: &GroupRegistry, delta: isize) -> bool {
        let Some(active) = self.active.as_mut() else { return false };
        if active.scope != Scope::Global {
            return false;
        }
        let Some(item) = active.items.get(active.selected) else { return false };
        if item.window_count() < 2 {
            return false;
        }
        let Some(group) = item.group_id().and_then(|id| registry.group(id)) else {
            return false;
        };

        let scope_ids = if item.is_segment() {
            item.window_ids().to_vec()
        } else {
            let focused = active.sub_selected.or_else(|| group.active_window().map(|w| w.id));
            focused_segment_window_ids(group, focused, active.split)
        };
        let order: Vec<WindowId> = mru_order_within(group, &scope_ids)
            .into_iter()
            .filter(|id| group.managed_windows().any(|w| w.id == *id))
            .collect();
        if order.is_empty() {
            return false;
        }

        let current = active.sub_selected.and_then(|id| order.iter().position(|o| *o == id)).unwrap_or(0);
        let next = (current as isize + delta).rem_euclid(order.len() as isize) as usize;
        active.sub_selected = Some(order[next]);
        trace!(window = %order[next], "switcher sub-selection moved");
        true
    }

    /// Arrows along the style's main axis move between items, the other
    /// axis moves inside the selected item.
    pub fn handle_arrow_key(&mut self, direction: ArrowDirection, registry: &GroupRegistry) {
        let Some(style) = self.style() else { return };
        match (style.is_primary_axis(direction), direction.is_forward()) {
            (true, true) => self.advance(),
            (true, false) => self.retreat(),
            (false, true) => {
                self.cycle_within_group(registry);
            }
            (false, false) => {
                self.cycle_within_group_backward(registry);
            }
        }
    }

    /// Index of the sub-selected window: into the group's managed windows for
    /// whole-group items, into the segment for segment items.
    pub fn sub_selected_window_index(&self, registry: &GroupRegistry) -> Option<usize> {
        let active = self.active.as_ref()?;
        Self::sub_index_for(active.selected_item()?, active.sub_selected?, registry)
    }

    fn sub_index_for(item: &SwitcherItem, sub: WindowId, registry: &GroupRegistry) -> Option<usize> {
        match item {
            SwitcherItem::SingleWindow(_) => None,
            SwitcherItem::Group { group_id, .. } => {
                registry.group(*group_id)?.managed_windows().position(|w| w.id == sub)
            }
            SwitcherItem::GroupSegment { window_ids, .. } => window_ids.iter().position(|id| *id == sub),
        }
    }

    /// Ends the session on the selected item. Without a selection this is a
    /// dismissal.
    pub fn commit(&mut self, registry: &GroupRegistry) -> Option<SwitcherAction> {
        let active = self.active.take()?;
        let action = match active.selected_item() {
            Some(item) => SwitcherAction::Commit {
                item: item.clone(),
                sub_selected_index: active
                    .sub_selected
                    .and_then(|sub| Self::sub_index_for(item, sub, registry)),
            },
            None => SwitcherAction::Dismiss,
        };
        debug!(?action, "switcher finished");
        self.notify(action.clone());
        Some(action)
    }

    pub fn select_and_commit(&mut self, index: usize, registry: &GroupRegistry) -> Option<SwitcherAction> {
        let active = self.active.as_mut()?;
        if index >= active.items.len() {
            return None;
        }
        if active.selected != index {
            active.selected = index;
            active.sub_selected = None;
        }
        self.commit(registry)
    }

    pub fn dismiss(&mut self) -> Option<SwitcherAction> {
        self.active.take()?;
        debug!("switcher dismissed");
        self.notify(SwitcherAction::Dismiss);
        Some(SwitcherAction::Dismiss)
    }

    fn notify(&mut self, action: SwitcherAction) {
        if let Some(handler) = self.handler.as_mut() {
            handler(action);
        }
    }

    /// Sliding window of at most `max_items` items centered on the selection.
    pub fn visible_window(&self, max_items: usize) -> Option<VisibleWindow> {
        let active = self.active.as_ref()?;
        let len = active.items.len();
        let selected = active.selected;
        if len <= max_items {
            return Some(VisibleWindow {
                start: 0,
                end: len,
                selected,
                leading_overflow: false,
                trailing_overflow: false,
            });
        }

        let mut start = selected.saturating_sub(max_items / 2);
        let mut end = start + max_items;
        if end > len {
            end = len;
            start = end.saturating_sub(max_items);
        }
        Some(VisibleWindow {
            start,
            end,
            selected: selected - start,
            leading_overflow: start > 0,
            trailing_overflow: end < len,
        })
    }
}
