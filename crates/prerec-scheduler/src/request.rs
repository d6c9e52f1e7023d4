//! Create-request validation: local datetimes in, a [`NewJob`] out.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::types::NewJob;

/// Wire format of submitted start/stop times (HTML `datetime-local`).
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// Browsers emit seconds when the input's `step` is below a minute.
const DATETIME_FORMAT_SECS: &str = "%Y-%m-%dT%H:%M:%S";

/// A job-creation request as received from the API layer.
///
/// Every field is optional at the wire level so a missing field is reported
/// by name instead of as a generic deserialisation failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub stop_time: Option<String>,
}

impl CreateJobRequest {
    /// Validate the request and compute the trigger instant.
    ///
    /// `trigger_at = start − setup_lead`; `stop_after_secs = stop − start`.
    /// The stop bound is measured from the requested start, not from the
    /// lead-adjusted trigger.
    pub fn validate(&self, tz: Tz, setup_lead_secs: u64) -> Result<NewJob> {
        let name = required(&self.name, "name")?;
        let file_path = required(&self.file_path, "file_path")?;
        let start_raw = required(&self.start_time, "start_time")?;

        let start_at = parse_local(start_raw, "start_time", tz)?;

        let stop_after_secs = match self.stop_time.as_deref().map(str::trim) {
            Some(stop_raw) if !stop_raw.is_empty() => {
                let stop_at = parse_local(stop_raw, "stop_time", tz)?;
                if stop_at <= start_at {
                    return Err(SchedulerError::Validation(
                        "Stop time must be after start time".to_string(),
                    ));
                }
                Some((stop_at - start_at).num_seconds().unsigned_abs())
            }
            _ => None,
        };

        let lead = i64::try_from(setup_lead_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                SchedulerError::Validation(format!("setup lead too large: {setup_lead_secs}s"))
            })?;

        let trigger_at = start_at.checked_sub_signed(lead).ok_or_else(|| {
            SchedulerError::Validation(format!(
                "start_time {start_raw} minus a {setup_lead_secs}s setup lead is out of range"
            ))
        })?;

        Ok(NewJob {
            name: name.to_string(),
            file_path: file_path.to_string(),
            start_at,
            trigger_at,
            stop_after_secs,
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SchedulerError::Validation(format!("{field} not supplied"))),
    }
}

/// Parse a `YYYY-MM-DDTHH:MM` wall-clock time in `tz` into an instant.
///
/// On a DST fold the earlier instant is used; a time inside a DST gap does
/// not exist and is rejected.
pub fn parse_local(value: &str, field: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, DATETIME_FORMAT_SECS))
        .map_err(|_| {
            SchedulerError::Validation(format!(
                "{field} must be formatted as YYYY-MM-DDTHH:MM, got {value:?}"
            ))
        })?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(SchedulerError::Validation(format!(
            "{field} {value} does not exist in {tz} (daylight-saving gap)"
        ))),
    }
}

/// Render an instant as a `YYYY-MM-DDTHH:MM` wall-clock time in `tz`.
pub fn format_local(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format(DATETIME_FORMAT).to_string()
}
