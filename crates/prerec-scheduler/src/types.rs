use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a stored job.
///
/// A job is `Pending` until the engine claims it, `Firing` while the player
/// runs, and then its row is deleted. There is no terminal status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its trigger time.
    Pending,
    /// Claimed by the engine; playback in progress.
    Firing,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Firing => "firing",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "firing" => Ok(JobStatus::Firing),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A validated job that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub name: String,
    pub file_path: String,
    /// Requested start as submitted, resolved to an instant.
    pub start_at: DateTime<Utc>,
    /// `start_at` minus the setup lead.
    pub trigger_at: DateTime<Utc>,
    /// Seconds between requested start and requested stop.
    pub stop_after_secs: Option<u64>,
}

/// A persisted job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// UUID v4 string, primary key.
    pub id: String,
    /// Human-readable label, not unique.
    pub name: String,
    /// Instant the engine fires the job.
    pub trigger_at: DateTime<Utc>,
    /// Requested start the trigger was derived from.
    pub start_at: DateTime<Utc>,
    /// Media reference handed to the player, never checked for existence.
    pub file_path: String,
    /// Hard playback bound, measured from invocation start.
    pub stop_after_secs: Option<u64>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn stop_after(&self) -> Option<Duration> {
        self.stop_after_secs.map(Duration::from_secs)
    }

    /// Positional invocation arguments: `[file_path, stop_after_secs]`.
    pub fn args(&self) -> serde_json::Value {
        serde_json::json!([self.file_path, self.stop_after_secs])
    }
}

/// Result of deleting a job that exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The job was pending and will never fire.
    Removed,
    /// The job is already playing; the delete was accepted and ignored.
    AlreadyFiring,
}

/// Fixed-width RFC 3339 UTC string, safe to compare lexically in SQL.
pub(crate) fn to_db_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
