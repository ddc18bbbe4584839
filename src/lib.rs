pub mod actor;
pub mod common;
pub mod model;
pub mod restore;
pub mod switcher;
pub mod sys;
