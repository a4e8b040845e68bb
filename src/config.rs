//! Calendar configuration - window sizes and panel geometry

use serde::{Deserialize, Serialize};

use crate::calendar::FetchPolicy;

pub const DEFAULT_ROW_HEIGHT: f32 = 56.0;
pub const DEFAULT_HANDLE_HEIGHT: f32 = 36.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Weeks of history loaded on mount
    #[serde(default = "default_initial_window_weeks")]
    pub initial_window_weeks: u32,
    /// Weeks prepended per lazy load
    #[serde(default = "default_lazy_load_window_weeks")]
    pub lazy_load_window_weeks: u32,
    /// Prefetch when the top visible row is this close to the oldest day
    #[serde(default = "default_lazy_load_threshold_days")]
    pub lazy_load_threshold_days: usize,
    #[serde(default = "default_row_height")]
    pub row_height: f32,
    #[serde(default = "default_handle_height")]
    pub handle_height: f32,
    /// Top safe-area inset, supplied by the host
    #[serde(default)]
    pub top_inset: f32,
    #[serde(default)]
    pub fetch: FetchPolicy,
}

fn default_initial_window_weeks() -> u32 {
    13
}
fn default_lazy_load_window_weeks() -> u32 {
    4
}
fn default_lazy_load_threshold_days() -> usize {
    7
}
fn default_row_height() -> f32 {
    DEFAULT_ROW_HEIGHT
}
fn default_handle_height() -> f32 {
    DEFAULT_HANDLE_HEIGHT
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            initial_window_weeks: default_initial_window_weeks(),
            lazy_load_window_weeks: default_lazy_load_window_weeks(),
            lazy_load_threshold_days: default_lazy_load_threshold_days(),
            row_height: default_row_height(),
            handle_height: default_handle_height(),
            top_inset: 0.0,
            fetch: FetchPolicy::default(),
        }
    }
}

impl CalendarConfig {
    /// Clamp values the panel cannot work with
    pub fn normalized(mut self) -> Self {
        self.initial_window_weeks = self.initial_window_weeks.max(1);
        self.lazy_load_window_weeks = self.lazy_load_window_weeks.max(1);
        if !(self.row_height.is_finite() && self.row_height > 0.0) {
            self.row_height = DEFAULT_ROW_HEIGHT;
        }
        if !(self.handle_height.is_finite() && self.handle_height >= 0.0) {
            self.handle_height = DEFAULT_HANDLE_HEIGHT;
        }
        if !(self.top_inset.is_finite() && self.top_inset >= 0.0) {
            self.top_inset = 0.0;
        }
        self
    }
}
