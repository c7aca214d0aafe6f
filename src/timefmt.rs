//! Timestamp formats spoken by the platform.
//!
//! Job creation takes a compact `yyyyMMddHHmmss` start time; analytics queries
//! take `YYYY-MM-DD HH:mm:ss`. Both are wall-clock local time.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use crate::errors::{IngestError, Result};
use crate::models::PlatformTimestamp;

const JOB_START_FORMAT: &str = "%Y%m%d%H%M%S";
const QUERY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset-less layouts, read as local wall-clock time.
const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Compact job start time, e.g. `20240305080209`.
pub fn job_start_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(JOB_START_FORMAT).to_string()
}

/// Job start time for "now".
pub fn job_start_time_now() -> String {
    job_start_time(&Local::now())
}

/// Render a platform timestamp in query-window form.
pub fn query_time(ts: &PlatformTimestamp) -> Result<String> {
    Ok(to_local(ts)?.format(QUERY_FORMAT).to_string())
}

/// Interpret a platform timestamp as local wall-clock time.
///
/// Offset-less strings are already local and are taken as-is; strings with
/// an offset and epoch milliseconds are converted into the local zone.
pub fn to_local(ts: &PlatformTimestamp) -> Result<NaiveDateTime> {
    match ts {
        PlatformTimestamp::Millis(ms) => millis_to_local(*ms),
        PlatformTimestamp::Text(raw) => {
            let raw = raw.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Ok(dt.with_timezone(&Local).naive_local());
            }
            for layout in NAIVE_LAYOUTS {
                if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
                    return Ok(naive);
                }
            }
            if let Ok(ms) = raw.parse::<i64>() {
                return millis_to_local(ms);
            }
            Err(IngestError::InvalidTimestamp(raw.to_string()))
        }
    }
}

fn millis_to_local(ms: i64) -> Result<NaiveDateTime> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|utc| utc.with_timezone(&Local).naive_local())
        .ok_or_else(|| IngestError::InvalidTimestamp(ms.to_string()))
}
