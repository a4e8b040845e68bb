//! Calendar timeline controller - the date sequence riding in a snap sheet
//!
//! One update cycle per input: mutate the store or sheet, recompute month
//! blocks and the active month, then re-position the content. Host-facing
//! results (date taps, navigation intents, range fetches) queue up and are
//! drained by the host.

pub mod layout;

use std::collections::VecDeque;

use chrono::NaiveDate;
use tracing::debug;

use crate::calendar::{
    DateEntry, DateSequenceStore, FetchRequest, MonthBlock, MonthKey, WorkoutRef, WorkoutSource,
    block_containing, compute_month_blocks, entry::month_label, fetch_or_empty,
};
use crate::config::CalendarConfig;
use crate::sheet::{DragOrigin, DraggableSnapSheet, SheetEvent, SheetHandle};

pub use layout::{
    OPEN_ROWS, PanelMetrics, bottom_row_index, scroll_target_for_focus, target_row_for_focus,
};

/// Month shown in the fixed overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMonth {
    pub key: MonthKey,
    pub label: String,
}

impl ActiveMonth {
    fn of_date(date: NaiveDate) -> Self {
        Self {
            key: MonthKey::of(date),
            label: month_label(date),
        }
    }

    fn of_block(block: &MonthBlock) -> Self {
        Self {
            key: block.key,
            label: block.label.clone(),
        }
    }
}

/// Notifications for the host screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    DateSelected(NaiveDate),
    /// Tapped a workout that is not completed yet; the host decides how to open it
    OpenWorkout { workout_id: i64, date: NaiveDate },
}

/// Row view model for renderers
#[derive(Debug, Clone)]
pub struct TimelineRow<'a> {
    pub index: usize,
    pub entry: &'a DateEntry,
    pub is_focus: bool,
    /// Inline label on the first day of a month
    pub top_label: Option<&'a str>,
    /// Inline label on the last day of a month
    pub bottom_label: Option<&'a str>,
}

impl TimelineRow<'_> {
    pub fn has_workout(&self) -> bool {
        self.entry.workout.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.entry.workout.as_ref().is_some_and(WorkoutRef::is_completed)
    }
}

pub struct CalendarTimelineController {
    store: DateSequenceStore,
    sheet: DraggableSnapSheet,
    metrics: PanelMetrics,
    month_blocks: Vec<MonthBlock>,
    focus_date: NaiveDate,
    active_month: Option<ActiveMonth>,
    has_initial_scrolled: bool,
    pending_fetches: Vec<FetchRequest>,
    events: VecDeque<TimelineEvent>,
}

impl CalendarTimelineController {
    pub fn new(store: DateSequenceStore, config: &CalendarConfig, focus_date: NaiveDate) -> Self {
        let metrics = PanelMetrics::from_config(config);
        let sheet = DraggableSnapSheet::new(metrics.snap_points(), 0, metrics.sheet_layout());
        let mut controller = Self {
            store,
            sheet,
            metrics,
            month_blocks: Vec::new(),
            focus_date,
            active_month: None,
            has_initial_scrolled: false,
            pending_fetches: Vec::new(),
            events: VecDeque::new(),
        };
        controller.update_active_month();
        controller
    }

    // --- accessors ---

    pub fn dates(&self) -> &[DateEntry] {
        self.store.dates()
    }

    pub fn store(&self) -> &DateSequenceStore {
        &self.store
    }

    pub fn sheet(&self) -> &DraggableSnapSheet {
        &self.sheet
    }

    pub fn metrics(&self) -> &PanelMetrics {
        &self.metrics
    }

    pub fn month_blocks(&self) -> &[MonthBlock] {
        &self.month_blocks
    }

    pub fn focus_date(&self) -> NaiveDate {
        self.focus_date
    }

    pub fn active_month(&self) -> Option<&ActiveMonth> {
        self.active_month.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn is_loading_more(&self) -> bool {
        self.store.is_loading_more()
    }

    /// Terminator shows only when the active month is the last loaded month
    pub fn show_terminator(&self) -> bool {
        match (&self.active_month, self.month_blocks.last()) {
            (Some(active), Some(last)) => active.key == last.key,
            _ => false,
        }
    }

    // --- data ---

    /// Queue the initial load
    pub fn start(&mut self) {
        let request = self.store.begin_initial();
        self.pending_fetches.push(request);
    }

    /// Queue a refresh of the loaded window (after the host edits a workout)
    pub fn refresh(&mut self) {
        if let Some(request) = self.store.begin_refresh() {
            self.pending_fetches.push(request);
        }
    }

    pub fn take_fetch_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.pending_fetches)
    }

    pub fn has_pending_fetches(&self) -> bool {
        !self.pending_fetches.is_empty()
    }

    /// Feed a finished fetch back in
    pub fn apply_fetch(&mut self, request: &FetchRequest, workouts: &[WorkoutRef]) {
        let prepended = self.store.apply(request, workouts);
        self.month_blocks = compute_month_blocks(self.store.dates());
        self.sheet
            .set_content_height(self.metrics.content_height(self.store.dates().len()));

        if prepended > 0 {
            // Keep the rows the user is looking at in place
            let shift = prepended as f32 * self.metrics.row_height;
            self.sheet.shift_scroll(shift);
            debug!("Shifted scroll by {:.0} for {} prepended days", shift, prepended);
        }

        if !self.has_initial_scrolled && !self.store.is_loading() && !self.store.dates().is_empty()
        {
            self.has_initial_scrolled = true;
            self.scroll_to_focus(false);
        }

        self.process_sheet_events();
        self.update_active_month();
    }

    /// Run every queued fetch once against `source`
    pub async fn run_pending_fetches<S: WorkoutSource>(&mut self, source: &S) {
        for request in self.take_fetch_requests() {
            let workouts = fetch_or_empty(source, self.store.fetch_policy(), &request).await;
            self.apply_fetch(&request, &workouts);
        }
    }

    pub fn drain_events(&mut self) -> Vec<TimelineEvent> {
        self.events.drain(..).collect()
    }

    // --- focus ---

    pub fn set_focus_date(&mut self, date: NaiveDate) {
        if date == self.focus_date {
            return;
        }
        self.focus_date = date;
        let animated = !self.sheet.is_collapsed();
        self.scroll_to_focus(animated);
        self.process_sheet_events();
        self.update_active_month();
    }

    fn scroll_to_focus(&mut self, animated: bool) {
        let index = self.sheet.current_index();
        let panel_height = self.sheet.snap_state().snap_points()[index];
        let target =
            scroll_target_for_focus(self.store.dates(), self.focus_date, panel_height, &self.metrics);
        self.sheet.scroll_to(target, animated);
    }

    // --- selection ---

    /// Tap on the row at `index`
    pub fn select_index(&mut self, index: usize) {
        let Some(entry) = self.store.dates().get(index).cloned() else {
            return;
        };

        self.sheet.snap_to_index(0);
        self.set_focus_date(entry.date);
        self.events.push_back(TimelineEvent::DateSelected(entry.date));

        // Completed workouts are shown inline by the host
        if let Some(workout) = entry.workout.filter(|w| !w.is_completed()) {
            self.events.push_back(TimelineEvent::OpenWorkout {
                workout_id: workout.id,
                date: entry.date,
            });
        }
        self.update_active_month();
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        if let Some(index) = self.store.index_of(date) {
            self.select_index(index);
        }
    }

    // --- sheet input ---

    pub fn snap_to_index(&mut self, index: usize) {
        self.sheet.snap_to_index(index);
        self.process_sheet_events();
        self.update_active_month();
    }

    pub fn begin_drag(&mut self, origin: DragOrigin) -> bool {
        self.sheet.begin_drag(origin)
    }

    pub fn drag_to(&mut self, delta_y: f32) {
        self.sheet.drag_to(delta_y);
        self.update_active_month();
    }

    pub fn release_drag(&mut self, velocity: f32) -> usize {
        let index = self.sheet.release_drag(velocity);
        self.process_sheet_events();
        self.update_active_month();
        index
    }

    /// User scroll of the content; ignored while collapsed
    pub fn scroll_by(&mut self, delta_y: f32) -> bool {
        let scrolled = self.sheet.scroll_by(delta_y);
        self.process_sheet_events();
        scrolled
    }

    pub fn end_content_drag(&mut self, velocity: f32) -> bool {
        let collapsed = self.sheet.end_content_drag(velocity);
        self.process_sheet_events();
        self.update_active_month();
        collapsed
    }

    /// Advance animations by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.sheet.tick(dt);
        self.process_sheet_events();
        self.update_active_month();
    }

    pub fn is_animating(&self) -> bool {
        self.sheet.is_animating()
    }

    // --- derived state ---

    fn process_sheet_events(&mut self) {
        loop {
            let events = self.sheet.drain_events();
            if events.is_empty() {
                break;
            }
            let mut scrolled = false;
            for event in events {
                match event {
                    SheetEvent::SnapChanged { index } => {
                        debug!("Timeline snapped to {}", index);
                        // Visible rows depend on the panel height
                        self.scroll_to_focus(false);
                    }
                    SheetEvent::Scrolled => scrolled = true,
                }
            }
            if scrolled {
                self.handle_scroll();
            }
        }
    }

    fn handle_scroll(&mut self) {
        let top_row = self.metrics.row_at(self.sheet.scroll_offset());
        if let Some(request) = self.store.check_lazy_load_trigger(top_row) {
            debug!("Top row {} near history edge, loading {}..{}", top_row, request.start, request.end);
            self.pending_fetches.push(request);
        }
        self.update_active_month();
    }

    fn update_active_month(&mut self) {
        let next = if self.sheet.is_collapsed() {
            // One row is visible and it is the focus date, whatever the old offset
            Some(ActiveMonth::of_date(self.focus_date))
        } else {
            self.scrolled_month()
        };

        if let Some(next) = next
            && self.active_month.as_ref() != Some(&next)
        {
            debug!("Active month -> {}", next.label);
            self.active_month = Some(next);
        }
    }

    fn scrolled_month(&self) -> Option<ActiveMonth> {
        let last = self.store.dates().len().checked_sub(1)?;
        let bottom = bottom_row_index(
            self.sheet.scroll_offset(),
            self.sheet.viewport_height(),
            self.metrics.row_height,
        )
        .min(last);
        block_containing(&self.month_blocks, bottom).map(ActiveMonth::of_block)
    }

    /// Rows intersecting the viewport, top to bottom
    pub fn rows_in_view(&self) -> Vec<TimelineRow<'_>> {
        let dates = self.store.dates();
        if dates.is_empty() {
            return Vec::new();
        }

        let first = self.metrics.row_at(self.sheet.scroll_offset()).min(dates.len());
        let span = (self.sheet.viewport_height() / self.metrics.row_height).ceil() as usize + 1;
        let last = (first + span).min(dates.len());
        let collapsed = self.sheet.is_collapsed();
        let active_label = self.active_month.as_ref().map(|m| m.label.as_str());

        (first..last)
            .map(|index| {
                let entry = &dates[index];
                let block = block_containing(&self.month_blocks, index);
                let label = block
                    .map(|b| b.label.as_str())
                    .filter(|l| !collapsed && Some(*l) != active_label);
                TimelineRow {
                    index,
                    entry,
                    is_focus: entry.date == self.focus_date,
                    top_label: label.filter(|_| block.is_some_and(|b| b.start_index == index)),
                    bottom_label: label.filter(|_| block.is_some_and(|b| b.end_index == index)),
                }
            })
            .collect()
    }
}
