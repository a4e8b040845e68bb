//! Panel geometry and scroll targeting

use chrono::NaiveDate;

use crate::calendar::DateEntry;
use crate::config::CalendarConfig;
use crate::sheet::SheetLayout;

/// Rows visible when the panel is open (a full week)
pub const OPEN_ROWS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelMetrics {
    pub row_height: f32,
    pub handle_height: f32,
    pub top_inset: f32,
}

impl PanelMetrics {
    pub fn from_config(config: &CalendarConfig) -> Self {
        Self {
            row_height: config.row_height,
            handle_height: config.handle_height,
            top_inset: config.top_inset,
        }
    }

    fn height_for_rows(&self, rows: usize) -> f32 {
        self.top_inset + rows as f32 * self.row_height + self.handle_height
    }

    pub fn collapsed_height(&self) -> f32 {
        self.height_for_rows(1)
    }

    pub fn open_height(&self) -> f32 {
        self.height_for_rows(OPEN_ROWS)
    }

    pub fn snap_points(&self) -> Vec<f32> {
        vec![self.collapsed_height(), self.open_height()]
    }

    pub fn sheet_layout(&self) -> SheetLayout {
        SheetLayout {
            top_inset: self.top_inset,
            handle_height: self.handle_height,
        }
    }

    /// Whole rows that fit in a panel of `panel_height`
    pub fn visible_rows(&self, panel_height: f32) -> usize {
        let usable = panel_height - self.top_inset - self.handle_height;
        if usable <= 0.0 || self.row_height <= 0.0 {
            return 0;
        }
        (usable / self.row_height).floor() as usize
    }

    /// Row index under a content offset
    pub fn row_at(&self, offset: f32) -> usize {
        if offset <= 0.0 || self.row_height <= 0.0 {
            return 0;
        }
        (offset / self.row_height).floor() as usize
    }

    pub fn content_height(&self, rows: usize) -> f32 {
        rows as f32 * self.row_height
    }
}

/// Top row that leaves `focus_index` as the last fully visible row
pub fn target_row_for_focus(focus_index: usize, visible_rows: usize) -> usize {
    (focus_index + 1).saturating_sub(visible_rows.max(1))
}

/// Scroll offset that bottom-anchors `focus` in a panel of `panel_height`.
///
/// Empty sequences and dates outside the loaded range resolve to 0.
pub fn scroll_target_for_focus(
    dates: &[DateEntry],
    focus: NaiveDate,
    panel_height: f32,
    metrics: &PanelMetrics,
) -> f32 {
    let Some(index) = dates.iter().position(|e| e.date == focus) else {
        return 0.0;
    };
    let row = target_row_for_focus(index, metrics.visible_rows(panel_height));
    row as f32 * metrics.row_height
}

/// Bottom-most (partially) visible row for a scroll position
pub fn bottom_row_index(scroll_offset: f32, visible_height: f32, row_height: f32) -> usize {
    if row_height <= 0.0 {
        return 0;
    }
    ((scroll_offset + visible_height) / row_height).floor().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::entry::build_entries;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn metrics() -> PanelMetrics {
        PanelMetrics::from_config(&CalendarConfig::default())
    }

    #[test]
    fn test_snap_heights() {
        let m = PanelMetrics {
            top_inset: 48.0,
            ..metrics()
        };
        assert_eq!(m.collapsed_height(), 48.0 + 56.0 + 36.0);
        assert_eq!(m.open_height(), 48.0 + 7.0 * 56.0 + 36.0);
        assert_eq!(m.visible_rows(m.collapsed_height()), 1);
        assert_eq!(m.visible_rows(m.open_height()), 7);
        assert_eq!(m.visible_rows(10.0), 0);
    }

    #[test]
    fn test_focus_at_index_50_with_7_rows() {
        let start = date(2024, 1, 1);
        let end = start + chrono::Duration::days(99);
        let dates = build_entries(start, end, &[], end);
        assert_eq!(dates.len(), 100);

        let m = metrics();
        let focus = start + chrono::Duration::days(50);
        assert_eq!(target_row_for_focus(50, 7), 44);
        assert_eq!(scroll_target_for_focus(&dates, focus, m.open_height(), &m), 2464.0);
    }

    #[test]
    fn test_focus_near_top_clamps_to_zero() {
        assert_eq!(target_row_for_focus(3, 7), 0);
        assert_eq!(target_row_for_focus(6, 7), 0);
        assert_eq!(target_row_for_focus(7, 7), 1);
    }

    #[test]
    fn test_collapsed_focus_is_top_row() {
        assert_eq!(target_row_for_focus(42, 1), 42);
        assert_eq!(target_row_for_focus(42, 0), 42);
    }

    #[test]
    fn test_focus_missing_or_empty_is_zero() {
        let m = metrics();
        assert_eq!(scroll_target_for_focus(&[], date(2024, 1, 1), m.open_height(), &m), 0.0);

        let dates = build_entries(date(2024, 1, 1), date(2024, 1, 31), &[], date(2024, 1, 31));
        assert_eq!(
            scroll_target_for_focus(&dates, date(2023, 12, 1), m.open_height(), &m),
            0.0
        );
    }

    #[test]
    fn test_bottom_row_index() {
        assert_eq!(bottom_row_index(0.0, 392.0, 56.0), 7);
        assert_eq!(bottom_row_index(100.0, 392.0, 56.0), 8);
        assert_eq!(bottom_row_index(0.0, 0.0, 56.0), 0);
        assert_eq!(bottom_row_index(10.0, 10.0, 0.0), 0);
    }

    #[test]
    fn test_row_at() {
        let m = metrics();
        assert_eq!(m.row_at(-5.0), 0);
        assert_eq!(m.row_at(55.9), 0);
        assert_eq!(m.row_at(56.0), 1);
        assert_eq!(m.content_height(10), 560.0);
    }
}
