use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `jobs` table (idempotent) and an index on `(status, trigger_at)`
/// so the due-job poll stays cheap. Timestamps are RFC 3339 UTC with a fixed
/// width, so text comparison orders them correctly.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id               TEXT    NOT NULL PRIMARY KEY,
            name             TEXT    NOT NULL,
            trigger_at       TEXT    NOT NULL,   -- start minus setup lead
            start_at         TEXT    NOT NULL,   -- start as requested
            file_path        TEXT    NOT NULL,
            stop_after_secs  INTEGER,            -- NULL means play to the end
            status           TEXT    NOT NULL DEFAULT 'pending',
            created_at       TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs (status, trigger_at);
        ",
    )?;
    Ok(())
}
