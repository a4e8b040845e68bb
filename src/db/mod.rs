//! Database module - SQLite storage for workout sheets

use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::calendar::{WorkoutRef, WorkoutSource, WorkoutStatus};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// New workout sheet scheduled on a date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkout {
    pub user_id: String,
    pub date: NaiveDate,
    pub name: String,
    pub status: WorkoutStatus,
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS workouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                workout_date TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_workouts_user_date ON workouts (user_id, workout_date)",
            [],
        )?;
        Ok(())
    }

    /// Add new workout sheet
    pub fn add_workout(&self, workout: &NewWorkout) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO workouts (user_id, workout_date, name, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                workout.user_id,
                workout.date.format(DATE_FORMAT).to_string(),
                workout.name,
                workout.status.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Change a workout's status; errors if no such workout
    pub fn set_status(&self, id: i64, status: WorkoutStatus) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE workouts SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(anyhow!("workout {id} not found"));
        }
        Ok(())
    }

    /// Workouts for `user_id` with `start <= date <= end`, ascending by date
    pub fn get_workouts_between(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkoutRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workout_date, name, status FROM workouts
             WHERE user_id = ?1 AND workout_date >= ?2 AND workout_date <= ?3
             ORDER BY workout_date ASC, id ASC",
        )?;

        let rows = stmt
            .query_map(
                params![
                    user_id,
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string(),
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, date, name, status)| {
                Ok(WorkoutRef {
                    id,
                    date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
                        .map_err(|e| anyhow!("workout {id} has bad date {date:?}: {e}"))?,
                    name,
                    status: status.parse()?,
                })
            })
            .collect()
    }

    /// Most recent workouts for `user_id`, newest first
    pub fn get_recent_workouts(&self, user_id: &str, limit: usize) -> Result<Vec<WorkoutRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workout_date, name, status FROM workouts
             WHERE user_id = ?1 ORDER BY workout_date DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, date, name, status)| {
                Ok(WorkoutRef {
                    id,
                    date: NaiveDate::parse_from_str(&date, DATE_FORMAT)?,
                    name,
                    status: status.parse()?,
                })
            })
            .collect()
    }
}

/// Shared handle to the database usable as a calendar workout source
#[derive(Clone)]
pub struct WorkoutStore {
    db: Arc<Mutex<Database>>,
}

impl WorkoutStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn database(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }
}

impl WorkoutSource for WorkoutStore {
    async fn fetch_workouts(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkoutRef>> {
        let db = self.db.lock().await;
        db.get_workouts_between(user_id, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_workout(user: &str, d: NaiveDate, name: &str) -> NewWorkout {
        NewWorkout {
            user_id: user.to_string(),
            date: d,
            name: name.to_string(),
            status: WorkoutStatus::Pending,
        }
    }

    #[test]
    fn test_range_is_inclusive_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        db.add_workout(&new_workout("u1", date(2024, 3, 10), "Legs")).unwrap();
        db.add_workout(&new_workout("u1", date(2024, 3, 1), "Push")).unwrap();
        db.add_workout(&new_workout("u1", date(2024, 2, 29), "Pull")).unwrap();
        db.add_workout(&new_workout("u1", date(2024, 3, 11), "Too late")).unwrap();

        let workouts = db
            .get_workouts_between("u1", date(2024, 2, 29), date(2024, 3, 10))
            .unwrap();
        let names: Vec<_> = workouts.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Pull", "Push", "Legs"]);
    }

    #[test]
    fn test_range_filters_user() {
        let db = Database::open_in_memory().unwrap();
        db.add_workout(&new_workout("u1", date(2024, 3, 1), "Mine")).unwrap();
        db.add_workout(&new_workout("u2", date(2024, 3, 1), "Theirs")).unwrap();

        let workouts = db
            .get_workouts_between("u1", date(2024, 1, 1), date(2024, 12, 31))
            .unwrap();
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0].name, "Mine");
    }

    #[test]
    fn test_set_status() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_workout(&new_workout("u1", date(2024, 3, 1), "Push")).unwrap();
        db.set_status(id, WorkoutStatus::Completed).unwrap();

        let workouts = db
            .get_workouts_between("u1", date(2024, 3, 1), date(2024, 3, 1))
            .unwrap();
        assert_eq!(workouts[0].status, WorkoutStatus::Completed);
        assert!(db.set_status(999, WorkoutStatus::Active).is_err());
    }

    #[test]
    fn test_recent_workouts() {
        let db = Database::open_in_memory().unwrap();
        for day in 1..=5 {
            db.add_workout(&new_workout("u1", date(2024, 3, day), &format!("Day {day}"))).unwrap();
        }
        let recent = db.get_recent_workouts("u1", 2).unwrap();
        let names: Vec<_> = recent.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Day 5", "Day 4"]);
    }

    #[tokio::test]
    async fn test_store_as_workout_source() {
        let db = Database::open_in_memory().unwrap();
        db.add_workout(&new_workout("u1", date(2024, 3, 1), "Push")).unwrap();
        let store = WorkoutStore::new(db);

        let workouts = store
            .fetch_workouts("u1", date(2024, 3, 1), date(2024, 3, 31))
            .await
            .unwrap();
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0].date, date(2024, 3, 1));
    }
}
