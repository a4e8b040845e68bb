//! fitline - Workout calendar timeline
//!
//! A gap-free day sequence that grows backwards on demand, grouped into
//! month blocks and shown inside a two-stop draggable sheet.

pub mod calendar;
pub mod config;
pub mod db;
pub mod sheet;
pub mod stats;
pub mod timeline;
pub mod tui;

pub use db::Database;
pub use timeline::CalendarTimelineController;
