//! SQLite-based workout history and statistics.
//!
//! One row per ended session: the plan it ran with and what it amounted to.
//! A live session is never stored here.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::timer::{IntervalPlan, WorkoutSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub id: i64,
    pub work_secs: u64,
    pub rest_secs: u64,
    pub total_rounds: u32,
    pub rounds_completed: u32,
    pub work_elapsed_secs: u64,
    pub rest_elapsed_secs: u64,
    pub finished: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorkoutStats {
    pub total_workouts: u64,
    pub finished_workouts: u64,
    pub total_rounds: u64,
    pub total_work_secs: u64,
    pub total_rest_secs: u64,
    pub today_workouts: u64,
    pub today_work_secs: u64,
}

/// SQLite database for workout history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/fitround/fitround.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("fitround.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS workouts (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                work_secs         INTEGER NOT NULL,
                rest_secs         INTEGER NOT NULL,
                total_rounds      INTEGER NOT NULL,
                rounds_completed  INTEGER NOT NULL,
                work_elapsed_secs INTEGER NOT NULL,
                rest_elapsed_secs INTEGER NOT NULL,
                finished          INTEGER NOT NULL,
                started_at        TEXT NOT NULL,
                ended_at          TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_workouts_ended_at ON workouts(ended_at);",
        )?;
        Ok(())
    }

    /// Record an ended session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_workout(
        &self,
        plan: &IntervalPlan,
        summary: &WorkoutSummary,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO workouts (work_secs, rest_secs, total_rounds, rounds_completed,
                                   work_elapsed_secs, rest_elapsed_secs, finished,
                                   started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                plan.work_secs(),
                plan.rest_secs(),
                summary.total_rounds,
                summary.rounds_completed,
                summary.work_elapsed_secs,
                summary.rest_elapsed_secs,
                summary.finished,
                started_at.to_rfc3339(),
                ended_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent workouts first.
    pub fn recent_workouts(&self, limit: usize) -> Result<Vec<WorkoutRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, work_secs, rest_secs, total_rounds, rounds_completed,
                    work_elapsed_secs, rest_elapsed_secs, finished, started_at, ended_at
             FROM workouts
             ORDER BY ended_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(WorkoutRecord {
                id: row.get(0)?,
                work_secs: row.get(1)?,
                rest_secs: row.get(2)?,
                total_rounds: row.get(3)?,
                rounds_completed: row.get(4)?,
                work_elapsed_secs: row.get(5)?,
                rest_elapsed_secs: row.get(6)?,
                finished: row.get(7)?,
                started_at: parse_timestamp(8, row.get::<_, String>(8)?)?,
                ended_at: parse_timestamp(9, row.get::<_, String>(9)?)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats_today(&self) -> Result<WorkoutStats> {
        self.stats_since(Some(start_of_today()))
    }

    pub fn stats_all(&self) -> Result<WorkoutStats> {
        self.stats_since(None)
    }

    fn stats_since(&self, since: Option<String>) -> Result<WorkoutStats> {
        let lower = since.clone().unwrap_or_default();
        let (total_workouts, finished_workouts, total_rounds, total_work_secs, total_rest_secs) =
            self.conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(finished), 0),
                        COALESCE(SUM(rounds_completed), 0),
                        COALESCE(SUM(work_elapsed_secs), 0),
                        COALESCE(SUM(rest_elapsed_secs), 0)
                 FROM workouts
                 WHERE ended_at >= ?1",
                params![lower],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, u64>(1)?,
                        row.get::<_, u64>(2)?,
                        row.get::<_, u64>(3)?,
                        row.get::<_, u64>(4)?,
                    ))
                },
            )?;

        let (today_workouts, today_work_secs) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(work_elapsed_secs), 0)
             FROM workouts
             WHERE ended_at >= ?1",
            params![since.unwrap_or_else(start_of_today)],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;

        Ok(WorkoutStats {
            total_workouts,
            finished_workouts,
            total_rounds,
            total_work_secs,
            total_rest_secs,
            today_workouts,
            today_work_secs,
        })
    }
}

fn start_of_today() -> String {
    format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"))
}

fn parse_timestamp(idx: usize, raw: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summary(rounds_completed: u32, finished: bool) -> WorkoutSummary {
        WorkoutSummary {
            rounds_completed,
            total_rounds: 5,
            work_elapsed_secs: rounds_completed as u64 * 150,
            rest_elapsed_secs: rounds_completed as u64 * 30,
            finished,
        }
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let plan = IntervalPlan::default();
        let now = Utc::now();
        db.record_workout(&plan, &summary(5, true), now - Duration::minutes(15), now)
            .unwrap();
        db.record_workout(&plan, &summary(2, false), now - Duration::minutes(6), now)
            .unwrap();

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_workouts, 2);
        assert_eq!(stats.finished_workouts, 1);
        assert_eq!(stats.total_rounds, 7);
        assert_eq!(stats.total_work_secs, 7 * 150);
        assert_eq!(stats.total_rest_secs, 7 * 30);
        assert_eq!(stats.today_workouts, 2);
    }

    #[test]
    fn today_excludes_older_workouts() {
        let db = Database::open_memory().unwrap();
        let plan = IntervalPlan::default();
        let old = Utc::now() - Duration::days(3);
        db.record_workout(&plan, &summary(5, true), old, old).unwrap();

        assert_eq!(db.stats_today().unwrap(), WorkoutStats::default());
        let all = db.stats_all().unwrap();
        assert_eq!(all.total_workouts, 1);
        assert_eq!(all.today_workouts, 0);
    }

    #[test]
    fn recent_workouts_newest_first() {
        let db = Database::open_memory().unwrap();
        let plan = IntervalPlan::new(30, 10, 3).unwrap();
        let now = Utc::now();
        db.record_workout(&plan, &summary(1, false), now, now - Duration::hours(1))
            .unwrap();
        let newest = db.record_workout(&plan, &summary(3, true), now, now).unwrap();

        let records = db.recent_workouts(10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, newest);
        assert!(records[0].finished);
        assert_eq!(records[0].work_secs, 30);
        assert_eq!(db.recent_workouts(1).unwrap().len(), 1);
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        Database::open_at(&path).unwrap();
        assert!(path.exists());
    }
}
