//! Workout source - the persistence collaborator behind the calendar

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::entry::WorkoutRef;

/// Anything that can list a user's workouts for an inclusive date range
pub trait WorkoutSource {
    /// Workouts with `start <= date <= end`, ascending by date
    fn fetch_workouts(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<WorkoutRef>>> + Send;
}

/// Retry policy for a single range fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_attempt_timeout_ms() -> u64 {
    10_000
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl FetchPolicy {
    /// Single attempt, no waiting
    pub fn immediate() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): base * 2^(attempt-1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// What a pending fetch is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    History,
    Refresh,
}

/// A range fetch handed out by the store and returned with its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: FetchKind,
    pub user_id: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchRequest {
    /// Number of calendar days covered
    pub fn day_count(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }
}

/// Run `request` against `source`, retrying per `policy`.
///
/// Never fails: after the last attempt the range is treated as having no workouts.
pub async fn fetch_or_empty<S: WorkoutSource>(
    source: &S,
    policy: &FetchPolicy,
    request: &FetchRequest,
) -> Vec<WorkoutRef> {
    let Some(user_id) = request.user_id.as_deref() else {
        debug!("No user for {:?} fetch, skipping", request.kind);
        return Vec::new();
    };

    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let fetch = source.fetch_workouts(user_id, request.start, request.end);
        match timeout(policy.attempt_timeout(), fetch).await {
            Ok(Ok(mut workouts)) => {
                workouts.sort_by_key(|w| w.date);
                return workouts;
            }
            Ok(Err(e)) => warn!(
                "Error fetching workouts {}..{} (attempt {}/{}): {}",
                request.start, request.end, attempt, attempts, e
            ),
            Err(_) => warn!(
                "Fetching workouts {}..{} timed out (attempt {}/{})",
                request.start, request.end, attempt, attempts
            ),
        }

        if attempt < attempts {
            sleep(policy.backoff(attempt)).await;
        }
    }

    warn!(
        "Giving up on workouts {}..{}, showing empty days",
        request.start, request.end
    );
    Vec::new()
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::testing::FakeSource;
    use super::*;
    use crate::calendar::entry::WorkoutStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(user: Option<&str>) -> FetchRequest {
        FetchRequest {
            kind: FetchKind::Initial,
            user_id: user.map(str::to_string),
            start: date(2024, 1, 1),
            end: date(2024, 1, 31),
        }
    }

    fn no_wait(max_attempts: u32) -> FetchPolicy {
        FetchPolicy {
            max_attempts,
            base_delay_ms: 0,
            attempt_timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_day_count() {
        assert_eq!(request(None).day_count(), 31);
        let mut reversed = request(None);
        reversed.start = date(2024, 2, 1);
        assert_eq!(reversed.day_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_filters_range() {
        let source = FakeSource::with_workouts(vec![
            WorkoutRef {
                id: 1,
                date: date(2024, 1, 10),
                name: "Push".into(),
                status: WorkoutStatus::Completed,
            },
            WorkoutRef {
                id: 2,
                date: date(2024, 2, 10),
                name: "Pull".into(),
                status: WorkoutStatus::Pending,
            },
        ]);
        let workouts = fetch_or_empty(&source, &no_wait(3), &request(Some("u1"))).await;
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0].id, 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_without_user_skips_source() {
        let source = FakeSource::default();
        let workouts = fetch_or_empty(&source, &no_wait(3), &request(None)).await;
        assert!(workouts.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_retries_then_succeeds() {
        let source = FakeSource {
            workouts: vec![WorkoutRef {
                id: 9,
                date: date(2024, 1, 20),
                name: "Legs".into(),
                status: WorkoutStatus::Active,
            }],
            ..FakeSource::failing(2)
        };
        let workouts = fetch_or_empty(&source, &no_wait(3), &request(Some("u1"))).await;
        assert_eq!(source.calls(), 3);
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0].id, 9);
    }

    /// Never answers
    #[derive(Default)]
    struct StalledSource {
        calls: AtomicUsize,
    }

    impl WorkoutSource for StalledSource {
        async fn fetch_workouts(
            &self,
            _user_id: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<WorkoutRef>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_attempts_time_out_then_give_up() {
        let source = StalledSource::default();
        let policy = FetchPolicy {
            max_attempts: 3,
            base_delay_ms: 100,
            attempt_timeout_ms: 2_000,
        };
        let started = tokio::time::Instant::now();

        let workouts = fetch_or_empty(&source, &policy, &request(Some("u1"))).await;

        assert!(workouts.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        // Three timeouts plus backoffs of 100 and 200 ms
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(6_300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(6_400), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_fetch_gives_up_as_empty() {
        let source = FakeSource::failing(10);
        let workouts = fetch_or_empty(&source, &no_wait(2), &request(Some("u1"))).await;
        assert!(workouts.is_empty());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let source = FakeSource::default();
        fetch_or_empty(&source, &no_wait(0), &request(Some("u1"))).await;
        assert_eq!(source.calls(), 1);
    }
}
