//! Terminal user interface using Ratatui.
//!
//! The event loop owns the widget state; a backend task owns the live
//! queries and runs service calls.

mod app;
mod backend;
mod compose;
mod messages;
mod picker;
mod sidebar;
mod ui;

pub use app::run;
