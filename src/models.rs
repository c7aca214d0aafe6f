use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::Result;

/// Account credentials, exchanged once per run for a session token.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Platform identifier for a camera or footage.
///
/// The platform is inconsistent about sending ids as JSON numbers or strings,
/// so both are accepted and kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => ResourceId(n.to_string()),
            RawId::Text(s) => ResourceId(s),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Camera {
    #[serde(rename = "cameraId")]
    pub camera_id: ResourceId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Remaining platform fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Lifecycle status of a platform job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum JobStatus {
    Waiting,
    Running,
    Completed,
    Failed,
    Canceled,
    Suspended,
    FailedRetry,
    Unknown,
    /// A status string this client does not know about.
    #[serde(other)]
    Unrecognized,
}

impl JobStatus {
    /// Terminal = the platform will not move the job any further.
    ///
    /// `Canceled` and `Suspended` are not terminal; polling continues through them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Unknown | JobStatus::FailedRetry
        )
    }

    pub fn is_completed(self) -> bool {
        self == JobStatus::Completed
    }

    /// Waiting or Running.
    pub fn is_in_progress(self) -> bool {
        matches!(self, JobStatus::Waiting | JobStatus::Running)
    }
}

/// Snapshot returned by `GET /jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobState {
    pub status: JobStatus,

    /// Populated once the job has produced footage.
    #[serde(default, rename = "footageId")]
    pub footage_id: Option<ResourceId>,
}

/// A timestamp as the platform sends it: either epoch milliseconds or a
/// date-time string. See [`crate::timefmt`] for conversion.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PlatformTimestamp {
    Millis(i64),
    Text(String),
}

/// A processed video segment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Footage {
    #[serde(default, rename = "footageId")]
    pub footage_id: Option<ResourceId>,

    #[serde(rename = "startTime")]
    pub start_time: PlatformTimestamp,

    #[serde(rename = "endTime")]
    pub end_time: PlatformTimestamp,

    /// Platform-specific metadata, not interpreted here.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Footage {
    /// The `start`/`end` query window spanned by this footage.
    pub fn query_window(&self) -> Result<QueryWindow> {
        Ok(QueryWindow {
            start: crate::timefmt::query_time(&self.start_time)?,
            end: crate::timefmt::query_time(&self.end_time)?,
        })
    }
}

/// Time bounds for analytics queries, already in `YYYY-MM-DD HH:mm:ss` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryWindow {
    pub start: String,
    pub end: String,
}

/// License-plate detections for a footage window. Opaque; passed through.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PlateRecords(pub serde_json::Value);

/// Face-match records for a footage window. Opaque; passed through.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FaceMatches(pub serde_json::Value);

// ---------------------------------------------------------------------------
// Internal deserialization helpers (not part of the public API surface)
// ---------------------------------------------------------------------------

/// POST /auth response.
#[derive(Deserialize)]
pub(crate) struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /cameras response.
#[derive(Deserialize)]
pub(crate) struct CameraPage {
    #[serde(default)]
    pub content: Vec<Camera>,
}

/// POST /cameras/pseudo request body.
#[derive(Serialize)]
pub(crate) struct NewCamera<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

/// POST /jobs response.
#[derive(Debug, Default, Deserialize)]
pub struct CreateJobResponse {
    #[serde(default, rename = "jobId")]
    pub job_id: Option<u64>,

    #[serde(default)]
    pub message: Option<String>,
}
