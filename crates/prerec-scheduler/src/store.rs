use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, OptionalExtension, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    types::{to_db_timestamp, DeleteOutcome, JobStatus, NewJob, ScheduledJob},
};

const JOB_COLUMNS: &str =
    "id, name, trigger_at, start_at, file_path, stop_after_secs, status, created_at";

/// Durable job table shared by the HTTP handlers and the engine.
///
/// Cloning is cheap; all clones share one connection, so every mutation is
/// serialized. No lock is held while a job is playing.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    /// Wrap an open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open (or create) the database file at `path`.
    ///
    /// `synchronous=FULL` makes every committed write durable before the call
    /// returns.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::new(conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist a validated job. Returns the stored record with its new id.
    pub fn create(&self, job: NewJob) -> Result<ScheduledJob> {
        let conn = self.lock();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let stop_after = job.stop_after_secs.map(|s| s as i64);

        conn.execute(
            "INSERT INTO jobs
             (id, name, trigger_at, start_at, file_path, stop_after_secs, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
            rusqlite::params![
                id,
                job.name,
                to_db_timestamp(job.trigger_at),
                to_db_timestamp(job.start_at),
                job.file_path,
                stop_after,
                to_db_timestamp(now),
            ],
        )?;

        info!(job_id = %id, name = %job.name, trigger_at = %job.trigger_at, "job created");

        Ok(ScheduledJob {
            id,
            name: job.name,
            trigger_at: job.trigger_at,
            start_at: job.start_at,
            file_path: job.file_path,
            stop_after_secs: job.stop_after_secs,
            status: JobStatus::Pending,
            created_at: now,
        })
    }

    /// Look up a single job.
    pub fn get(&self, id: &str) -> Result<ScheduledJob> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [id],
            row_to_job,
        )
        .optional()?
        .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })
    }

    /// All jobs still in the table, ordered by trigger time then creation.
    ///
    /// Unreadable rows are logged and skipped so one bad row never hides the
    /// rest of the schedule.
    pub fn get_all(&self) -> Result<Vec<ScheduledJob>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY trigger_at, created_at, id"
        ))?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .filter_map(|r| match r {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!("skipping unreadable job row: {e}");
                    None
                }
            })
            .collect();
        Ok(jobs)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Delete a job by id.
    ///
    /// A pending job is removed and will never fire. A firing job is left
    /// alone and `AlreadyFiring` is returned; the engine removes it when the
    /// player returns. Unknown ids are `JobNotFound`.
    pub fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let conn = self.lock();
        let n = conn.execute(
            "DELETE FROM jobs WHERE id = ?1 AND status = 'pending'",
            [id],
        )?;
        if n > 0 {
            info!(job_id = %id, "job deleted");
            return Ok(DeleteOutcome::Removed);
        }

        let status: Option<String> = conn
            .query_row("SELECT status FROM jobs WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        match status {
            Some(_) => {
                info!(job_id = %id, "delete ignored: job is already firing");
                Ok(DeleteOutcome::AlreadyFiring)
            }
            None => Err(SchedulerError::JobNotFound { id: id.to_string() }),
        }
    }

    /// Atomically move every pending job due at `now` to `firing`.
    ///
    /// Returned jobs are in trigger order. A job is returned by at most one
    /// call, however many engines or ticks race for it. A due row that cannot
    /// be decoded can never fire, so it is deleted in the same transaction.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        // Collect eagerly so `stmt` is dropped before the UPDATEs below.
        let due: Vec<(String, rusqlite::Result<ScheduledJob>)> = {
            let mut stmt = tx.prepare_cached(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE status = 'pending' AND trigger_at <= ?1
                 ORDER BY trigger_at, created_at, id"
            ))?;
            let rows = stmt
                .query_map([to_db_timestamp(now)], |row| {
                    Ok((row.get::<_, String>(0)?, row_to_job(row)))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut claimed = Vec::with_capacity(due.len());
        for (id, decoded) in due {
            let mut job = match decoded {
                Ok(job) => job,
                Err(e) => {
                    tx.execute("DELETE FROM jobs WHERE id = ?1", [&id])?;
                    error!(job_id = %id, "deleted unreadable due job: {e}");
                    continue;
                }
            };
            let n = tx.execute(
                "UPDATE jobs SET status = 'firing' WHERE id = ?1 AND status = 'pending'",
                [&job.id],
            )?;
            if n == 1 {
                job.status = JobStatus::Firing;
                claimed.push(job);
            }
        }
        tx.commit()?;
        Ok(claimed)
    }

    /// Drop a job after its invocation returned.
    pub fn remove_fired(&self, id: &str) -> Result<()> {
        let conn = self.lock();
        let n = conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Remove jobs left `firing` by a previous process.
    ///
    /// Their playback already started, so they count as fired and are never
    /// replayed. Returns the discarded jobs; unreadable rows are removed too
    /// but not returned.
    pub fn discard_interrupted(&self) -> Result<Vec<ScheduledJob>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let interrupted: Vec<ScheduledJob> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'firing'
                 ORDER BY trigger_at, created_at, id"
            ))?;
            let rows = stmt
                .query_map([], row_to_job)?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };
        tx.execute("DELETE FROM jobs WHERE status = 'firing'", [])?;
        tx.commit()?;
        Ok(interrupted)
    }

    /// Number of pending jobs whose trigger time is at or before `now`.
    pub fn count_overdue(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = 'pending' AND trigger_at <= ?1",
            [to_db_timestamp(now)],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<ScheduledJob> {
    let stop_after: Option<i64> = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(ScheduledJob {
        id: row.get(0)?,
        name: row.get(1)?,
        trigger_at: parse_timestamp(row, 2)?,
        start_at: parse_timestamp(row, 3)?,
        file_path: row.get(4)?,
        stop_after_secs: stop_after
            .map(|s| u64::try_from(s).map_err(|e| conversion_error(5, Type::Integer, e)))
            .transpose()?,
        status: status
            .parse::<JobStatus>()
            .map_err(|e: String| conversion_error(6, Type::Text, e))?,
        created_at: parse_timestamp(row, 7)?,
    })
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> JobStore {
        JobStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn job(name: &str, trigger: DateTime<Utc>) -> NewJob {
        NewJob {
            name: name.to_string(),
            file_path: format!("/media/{name}.mp3"),
            start_at: trigger + chrono::Duration::seconds(15),
            trigger_at: trigger,
            stop_after_secs: None,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn corrupt_row_is_skipped_in_listing() {
        let store = store();
        store.create(job("good", at(8, 0))).unwrap();
        store
            .lock()
            .execute(
                "INSERT INTO jobs VALUES ('bad', 'bad', 'yesterday', 'yesterday', '/x', NULL, 'pending', 'now')",
                [],
            )
            .unwrap();

        let jobs = store.get_all().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "good");
        assert!(matches!(store.get("bad"), Err(SchedulerError::Database(_))));
    }

    #[test]
    fn unreadable_due_row_is_deleted_once() {
        let store = store();
        store
            .lock()
            .execute(
                "INSERT INTO jobs VALUES ('bad', 'bad', '2024-06-01T06:00:00.000Z', 'garbage', '/x', NULL, 'pending', 'now')",
                [],
            )
            .unwrap();
        let good = store.create(job("good", at(7, 0))).unwrap();

        let claimed = store.claim_due(at(9, 0)).unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, good.id);
        assert!(matches!(store.get("bad"), Err(SchedulerError::JobNotFound { .. })));
        assert!(store.claim_due(at(9, 0)).unwrap().is_empty());
    }

    #[test]
    fn claim_skips_jobs_deleted_concurrently() {
        let store = store();
        let a = store.create(job("a", at(8, 0))).unwrap();
        store.delete(&a.id).unwrap();
        assert!(store.claim_due(at(9, 0)).unwrap().is_empty());
    }

    #[test]
    fn negative_stop_bound_in_db_is_a_conversion_error() {
        let store = store();
        let j = store.create(job("neg", at(8, 0))).unwrap();
        store
            .lock()
            .execute("UPDATE jobs SET stop_after_secs = -5 WHERE id = ?1", [&j.id])
            .unwrap();
        assert!(store.get(&j.id).is_err());
    }
}
