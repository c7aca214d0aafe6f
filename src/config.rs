//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{IngestError, Result};
use crate::jobs::{JobTemplate, PollPolicy};
use crate::models::Credentials;
use crate::orchestrator::FailurePolicy;

/// Longest accepted base interval between job status polls.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Everything one ingestion run needs.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub api_base: String,
    pub credentials: Credentials,
    /// Substring looked for in existing camera names.
    pub camera_identifier: String,
    /// Directory scanned recursively for videos.
    pub asset_root: PathBuf,
    /// Delete the resolved camera when the run ends.
    pub camera_delete: bool,
    /// Still delete the camera if some asset failed. Only read when
    /// `camera_delete` is set.
    pub release_after_failure: bool,
    pub failure_policy: FailurePolicy,
    pub poll: PollPolicy,
    pub job: JobTemplate,
    /// When set, face matches in these categories are fetched per asset.
    pub face_categories: Option<String>,
    pub request_timeout: Duration,
}

impl IngestConfig {
    /// Reject configurations that cannot possibly run.
    pub fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(IngestError::Config("API base URL must not be empty".into()));
        }
        if self.credentials.username.is_empty() {
            return Err(IngestError::Config("username must not be empty".into()));
        }
        if self.camera_identifier.is_empty() {
            return Err(IngestError::Config(
                "camera identifier must not be empty (it would match every camera)".into(),
            ));
        }
        if !self.asset_root.is_dir() {
            return Err(IngestError::Config(format!(
                "asset path {} is not a directory",
                self.asset_root.display()
            )));
        }
        if self.poll.interval.is_zero() {
            return Err(IngestError::Config("poll interval must be positive".into()));
        }
        if self.poll.interval > MAX_POLL_INTERVAL {
            return Err(IngestError::Config(format!(
                "poll interval {:?} exceeds the {:?} ceiling",
                self.poll.interval, MAX_POLL_INTERVAL
            )));
        }
        if self.poll.max_attempts == Some(0) {
            return Err(IngestError::Config("poll max attempts must be at least 1".into()));
        }
        if matches!(self.face_categories.as_deref(), Some(c) if c.trim().is_empty()) {
            return Err(IngestError::Config("face categories must not be blank".into()));
        }
        Ok(())
    }
}

/// Lenient boolean for environment toggles: `true` in any letter case or
/// `1` is on, everything else is off.
pub fn parse_toggle(raw: &str) -> std::result::Result<bool, std::convert::Infallible> {
    let raw = raw.trim();
    Ok(raw.eq_ignore_ascii_case("true") || raw.parse::<i64>().is_ok_and(|n| n == 1))
}
