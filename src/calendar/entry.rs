//! Calendar day entries - one row per day, oldest first

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Lifecycle of a scheduled workout sheet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutStatus {
    Pending,
    Active,
    Completed,
}

impl WorkoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutStatus::Pending => "pending",
            WorkoutStatus::Active => "active",
            WorkoutStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for WorkoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(WorkoutStatus::Pending),
            "active" => Ok(WorkoutStatus::Active),
            "completed" => Ok(WorkoutStatus::Completed),
            other => Err(anyhow!("unknown workout status: {other}")),
        }
    }
}

/// Workout record as seen by the calendar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutRef {
    pub id: i64,
    pub date: NaiveDate,
    pub name: String,
    pub status: WorkoutStatus,
}

impl WorkoutRef {
    pub fn is_completed(&self) -> bool {
        self.status == WorkoutStatus::Completed
    }
}

/// One calendar day in the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct DateEntry {
    pub date: NaiveDate,
    pub workout: Option<WorkoutRef>,
    pub is_today: bool,
    /// Set only on the first entry of each month run
    pub month_label: Option<String>,
}

/// Short month name used for labels ("Jan", "Feb", ...)
pub fn month_label(date: NaiveDate) -> String {
    date.format("%b").to_string()
}

/// Day number with English ordinal suffix ("1st", "12th", "23rd")
pub fn ordinal_day(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

/// Build one entry per day in `[start, end]`, attaching the first matching workout.
///
/// `workouts` is expected ascending by date. Empty when `start > end`.
pub fn build_entries(
    start: NaiveDate,
    end: NaiveDate,
    workouts: &[WorkoutRef],
    today: NaiveDate,
) -> Vec<DateEntry> {
    let mut entries = Vec::new();
    if start > end {
        return entries;
    }

    let mut pending = workouts.iter().peekable();
    let mut current = start;
    loop {
        while pending.next_if(|w| w.date < current).is_some() {}
        let workout = pending.peek().filter(|w| w.date == current).map(|w| (*w).clone());

        entries.push(DateEntry {
            date: current,
            workout,
            is_today: current == today,
            month_label: None,
        });

        if current >= end {
            break;
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    assign_month_labels(&mut entries);
    entries
}

/// Recompute `month_label` over the whole sequence
pub fn assign_month_labels(entries: &mut [DateEntry]) {
    let mut last_month: Option<(i32, u32)> = None;
    for entry in entries.iter_mut() {
        let key = (entry.date.year(), entry.date.month());
        if last_month == Some(key) {
            entry.month_label = None;
        } else {
            entry.month_label = Some(month_label(entry.date));
            last_month = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn workout(id: i64, d: NaiveDate, status: WorkoutStatus) -> WorkoutRef {
        WorkoutRef {
            id,
            date: d,
            name: format!("Workout {id}"),
            status,
        }
    }

    #[test]
    fn test_build_entries_consecutive_days() {
        let entries = build_entries(date(2024, 2, 20), date(2024, 3, 5), &[], date(2024, 3, 5));
        assert_eq!(entries.len(), 15); // leap year: Feb has 29 days
        for pair in entries.windows(2) {
            assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date));
        }
        assert!(entries.last().unwrap().is_today);
        assert!(!entries[0].is_today);
    }

    #[test]
    fn test_build_entries_empty_range() {
        let entries = build_entries(date(2024, 3, 5), date(2024, 3, 4), &[], date(2024, 3, 5));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_build_entries_single_day() {
        let entries = build_entries(date(2024, 3, 5), date(2024, 3, 5), &[], date(2024, 1, 1));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].month_label.as_deref(), Some("Mar"));
    }

    #[test]
    fn test_build_entries_attaches_workouts() {
        let workouts = vec![
            workout(1, date(2024, 1, 2), WorkoutStatus::Completed),
            workout(2, date(2024, 1, 4), WorkoutStatus::Pending),
            workout(3, date(2024, 1, 4), WorkoutStatus::Active),
        ];
        let entries = build_entries(date(2024, 1, 1), date(2024, 1, 5), &workouts, date(2024, 1, 5));

        assert!(entries[0].workout.is_none());
        assert_eq!(entries[1].workout.as_ref().map(|w| w.id), Some(1));
        assert!(entries[2].workout.is_none());
        // First match wins on duplicate dates
        assert_eq!(entries[3].workout.as_ref().map(|w| w.id), Some(2));
        assert!(entries[4].workout.is_none());
    }

    #[test]
    fn test_build_entries_ignores_out_of_range_workouts() {
        let workouts = vec![
            workout(1, date(2023, 12, 31), WorkoutStatus::Completed),
            workout(2, date(2024, 1, 9), WorkoutStatus::Completed),
        ];
        let entries = build_entries(date(2024, 1, 1), date(2024, 1, 3), &workouts, date(2024, 1, 3));
        assert!(entries.iter().all(|e| e.workout.is_none()));
    }

    #[test]
    fn test_month_labels_once_per_month() {
        let entries = build_entries(date(2023, 11, 28), date(2024, 1, 2), &[], date(2024, 1, 2));
        let labelled: Vec<_> = entries
            .iter()
            .filter_map(|e| e.month_label.as_deref().map(|l| (e.date, l)))
            .collect();
        assert_eq!(
            labelled,
            vec![
                (date(2023, 11, 28), "Nov"),
                (date(2023, 12, 1), "Dec"),
                (date(2024, 1, 1), "Jan"),
            ]
        );
    }

    #[test]
    fn test_assign_month_labels_same_name_different_year() {
        let mut entries = build_entries(date(2023, 1, 31), date(2023, 1, 31), &[], date(2024, 1, 1));
        entries.extend(build_entries(date(2024, 1, 1), date(2024, 1, 2), &[], date(2024, 1, 1)));
        assign_month_labels(&mut entries);
        assert_eq!(entries[0].month_label.as_deref(), Some("Jan"));
        assert_eq!(entries[1].month_label.as_deref(), Some("Jan"));
        assert_eq!(entries[2].month_label, None);
    }

    #[test]
    fn test_ordinal_day() {
        assert_eq!(ordinal_day(1), "1st");
        assert_eq!(ordinal_day(2), "2nd");
        assert_eq!(ordinal_day(3), "3rd");
        assert_eq!(ordinal_day(4), "4th");
        assert_eq!(ordinal_day(11), "11th");
        assert_eq!(ordinal_day(12), "12th");
        assert_eq!(ordinal_day(13), "13th");
        assert_eq!(ordinal_day(21), "21st");
        assert_eq!(ordinal_day(22), "22nd");
        assert_eq!(ordinal_day(23), "23rd");
        assert_eq!(ordinal_day(30), "30th");
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [WorkoutStatus::Pending, WorkoutStatus::Active, WorkoutStatus::Completed] {
            assert_eq!(status.as_str().parse::<WorkoutStatus>().unwrap(), status);
        }
        assert!("skipped".parse::<WorkoutStatus>().is_err());
        assert_eq!("Completed".parse::<WorkoutStatus>().unwrap(), WorkoutStatus::Completed);
    }
}
