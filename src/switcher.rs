pub mod items;
pub mod session;

pub use items::{NamedGroupLabelMode, SwitcherItem, build_switcher_items, tab_cycle_items};
pub use session::{ArrowDirection, Scope, SwitcherAction, SwitcherSession, SwitcherStyle, VisibleWindow};
