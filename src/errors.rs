use std::time::Duration;

use thiserror::Error;

use crate::models::JobStatus;

/// All errors that can occur while ingesting footage.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Credentials were rejected, or the auth response carried no token (HTTP 401).
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The session does not have access to the requested resource (HTTP 403).
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// The requested resource was not found (HTTP 404).
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A non-specific API error with the HTTP status code and response body.
    #[error("API error {status_code}: {message}")]
    Api {
        status_code: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// A transport-level HTTP error from reqwest.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error, typically from reading a local asset.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response body was not the JSON shape we expected.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A successful response came back with an empty or `null` body.
    #[error("response carried no {0}")]
    MissingPayload(&'static str),

    /// Creating a pseudo camera returned nothing.
    #[error("no camera available for identifier {identifier:?}")]
    NoCameraAvailable { identifier: String },

    /// The platform answered in a shape we have no way to interpret.
    #[error("platform contract violation: {0}")]
    ContractViolation(String),

    /// Polling gave up before the job reached a terminal status.
    #[error("job {job_id} still not terminal after {attempts} polls ({elapsed:?})")]
    PollTimeout {
        job_id: u64,
        attempts: u32,
        elapsed: Duration,
    },

    /// The job reached a terminal status other than `Completed`.
    #[error("job {job_id} ended with status {status:?}")]
    JobFailed { job_id: u64, status: JobStatus },

    /// A footage timestamp could not be interpreted.
    #[error("invalid platform timestamp: {0}")]
    InvalidTimestamp(String),

    /// The run configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Walking the asset root failed.
    #[error("asset discovery failed: {0}")]
    Discovery(#[from] walkdir::Error),
}

impl IngestError {
    /// `true` for failures of the HTTP exchange itself, as opposed to
    /// failures in what the platform said.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            IngestError::Http(_)
                | IngestError::Api { .. }
                | IngestError::NotFound { .. }
                | IngestError::PermissionDenied { .. }
        )
    }
}

/// A convenience alias for `Result<T, IngestError>`.
pub type Result<T> = std::result::Result<T, IngestError>;
