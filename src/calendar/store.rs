//! Date sequence store - the gap-free run of days behind the timeline
//!
//! Every load comes in two halves: `begin_*` hands out a [`FetchRequest`]
//! and flips the loading flags, `finish_*` applies the fetched workouts.
//! The `async` helpers run both halves back to back.

use chrono::{Days, Local, NaiveDate};
use tracing::{debug, info};

use super::entry::{DateEntry, WorkoutRef, assign_month_labels, build_entries};
use super::source::{FetchKind, FetchPolicy, FetchRequest, WorkoutSource, fetch_or_empty};
use crate::config::CalendarConfig;

pub struct DateSequenceStore {
    user_id: Option<String>,
    initial_weeks: u32,
    lazy_load_weeks: u32,
    threshold_days: usize,
    policy: FetchPolicy,
    today: NaiveDate,
    dates: Vec<DateEntry>,
    oldest: Option<NaiveDate>,
    is_loading: bool,
    is_loading_more: bool,
}

fn weeks_before(date: NaiveDate, weeks: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(weeks) * 7))
        .unwrap_or(NaiveDate::MIN)
}

impl DateSequenceStore {
    pub fn new(user_id: Option<String>, config: &CalendarConfig) -> Self {
        Self {
            user_id,
            initial_weeks: config.initial_window_weeks.max(1),
            lazy_load_weeks: config.lazy_load_window_weeks.max(1),
            threshold_days: config.lazy_load_threshold_days,
            policy: config.fetch.clone(),
            today: Local::now().date_naive(),
            dates: Vec::new(),
            oldest: None,
            is_loading: false,
            is_loading_more: false,
        }
    }

    /// Pin "today" (tests, or a host that tracks its own clock)
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn dates(&self) -> &[DateEntry] {
        &self.dates
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn oldest_loaded(&self) -> Option<NaiveDate> {
        self.oldest
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    pub fn fetch_policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Index of `date` in the sequence
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let first = self.dates.first()?.date;
        if date < first {
            return None;
        }
        let index = usize::try_from((date - first).num_days()).ok()?;
        self.dates.get(index).filter(|e| e.date == date).map(|_| index)
    }

    fn request(&self, kind: FetchKind, start: NaiveDate, end: NaiveDate) -> FetchRequest {
        FetchRequest {
            kind,
            user_id: self.user_id.clone(),
            start,
            end,
        }
    }

    // --- initial load ---

    pub fn begin_initial(&mut self) -> FetchRequest {
        self.is_loading = true;
        let start = weeks_before(self.today, self.initial_weeks);
        self.request(FetchKind::Initial, start, self.today)
    }

    pub fn finish_initial(&mut self, request: &FetchRequest, workouts: &[WorkoutRef]) {
        self.dates = build_entries(request.start, request.end, workouts, self.today);
        self.oldest = Some(request.start);
        self.is_loading = false;
        self.is_loading_more = false;
        info!(
            "Calendar loaded {} days ({} workouts) from {}",
            self.dates.len(),
            workouts.len(),
            request.start
        );
    }

    pub async fn load_initial<S: WorkoutSource>(&mut self, source: &S) {
        let request = self.begin_initial();
        let workouts = fetch_or_empty(source, &self.policy, &request).await;
        self.finish_initial(&request, &workouts);
    }

    // --- history (prepend) ---

    /// Start a history load; `None` if one is in flight or nothing is loaded yet
    pub fn begin_load_more(&mut self) -> Option<FetchRequest> {
        if self.is_loading_more {
            debug!("History load already in flight, dropping trigger");
            return None;
        }
        let oldest = self.oldest?;
        let end = oldest.pred_opt()?;
        let start = weeks_before(oldest, self.lazy_load_weeks);

        self.is_loading_more = true;
        Some(self.request(FetchKind::History, start, end))
    }

    /// Prepend the fetched range, returning how many days were added
    pub fn finish_load_more(&mut self, request: &FetchRequest, workouts: &[WorkoutRef]) -> usize {
        self.is_loading_more = false;

        if request.end.succ_opt() != self.oldest {
            debug!(
                "Dropping stale history {}..{} (oldest loaded is {:?})",
                request.start, request.end, self.oldest
            );
            return 0;
        }

        let mut combined = build_entries(request.start, request.end, workouts, self.today);
        let count = combined.len();
        combined.append(&mut self.dates);
        self.dates = combined;
        // The old first entry may lose its label if its month continues above it
        assign_month_labels(&mut self.dates);
        self.oldest = Some(request.start);

        debug!("Prepended {} days, history now starts {}", count, request.start);
        count
    }

    pub async fn load_more_history<S: WorkoutSource>(&mut self, source: &S) -> usize {
        let Some(request) = self.begin_load_more() else {
            return 0;
        };
        let workouts = fetch_or_empty(source, &self.policy, &request).await;
        self.finish_load_more(&request, &workouts)
    }

    /// Prefetch history while the top row is within the threshold of the oldest day
    pub fn check_lazy_load_trigger(&mut self, top_visible_row: usize) -> Option<FetchRequest> {
        if top_visible_row <= self.threshold_days && !self.is_loading_more {
            self.begin_load_more()
        } else {
            None
        }
    }

    // --- refresh ---

    /// Re-fetch `[oldest, today]`; `None` before the initial load
    pub fn begin_refresh(&mut self) -> Option<FetchRequest> {
        let oldest = self.oldest?;
        self.is_loading = true;
        Some(self.request(FetchKind::Refresh, oldest, self.today))
    }

    pub fn finish_refresh(&mut self, request: &FetchRequest, workouts: &[WorkoutRef]) {
        // Keep anything prepended while the refresh was in flight
        let mut rebuilt: Vec<DateEntry> = self
            .dates
            .drain(..)
            .take_while(|e| e.date < request.start)
            .collect();
        rebuilt.extend(build_entries(request.start, request.end, workouts, self.today));
        assign_month_labels(&mut rebuilt);

        self.dates = rebuilt;
        if self.oldest.is_none_or(|oldest| request.start < oldest) {
            self.oldest = Some(request.start);
        }
        self.is_loading = false;
        info!("Calendar refreshed: {} days, {} workouts", self.dates.len(), workouts.len());
    }

    pub async fn refresh<S: WorkoutSource>(&mut self, source: &S) {
        let Some(request) = self.begin_refresh() else {
            return;
        };
        let workouts = fetch_or_empty(source, &self.policy, &request).await;
        self.finish_refresh(&request, &workouts);
    }

    /// Apply any finished request; returns the prepended day count (0 unless history)
    pub fn apply(&mut self, request: &FetchRequest, workouts: &[WorkoutRef]) -> usize {
        match request.kind {
            FetchKind::Initial => {
                self.finish_initial(request, workouts);
                0
            }
            FetchKind::History => self.finish_load_more(request, workouts),
            FetchKind::Refresh => {
                self.finish_refresh(request, workouts);
                0
            }
        }
    }
}
