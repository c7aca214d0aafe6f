//! # lpr-ingest
//!
//! Pushes local video files through a video-analytics platform: log in,
//! find or create a camera to attach uploads to, upload each video as a
//! processing job, wait for the job to finish, then pull the resulting
//! footage record and the license plates detected within it.
//!
//! Assets are handled strictly one at a time, and every call is issued only
//! after the previous one has returned.
//!
//! ## Quick start
//!
//! ```no_run
//! use lpr_ingest::{Client, Credentials, JobTemplate, PollPolicy};
//!
//! # async fn example() -> lpr_ingest::Result<()> {
//! let client = Client::new("https://vms.example.com/api")?;
//! let session = client.authenticate(&Credentials::new("ops", "secret")).await?;
//!
//! let camera = lpr_ingest::resolve_camera(&client, &session, "gate-7").await?;
//! let footage_id = lpr_ingest::submit_and_wait(
//!     &client,
//!     &session,
//!     &camera.camera_id,
//!     "lot.mp4".as_ref(),
//!     &JobTemplate::default(),
//!     &PollPolicy::default(),
//! )
//! .await?
//! .into_footage_id()?;
//!
//! let footage = client.get_footage(&session, &footage_id).await?;
//! let plates = client
//!     .get_plates(&session, &footage_id, &footage.query_window()?)
//!     .await?;
//! println!("{}", plates.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Whole runs
//!
//! [`Ingestor`] wires the steps together for every video under a directory
//! and reports per-asset results; see [`FailurePolicy`] for what happens
//! after an asset fails.

mod camera;
mod client;
mod config;
mod discovery;
mod errors;
mod jobs;
mod models;
mod orchestrator;
pub mod timefmt;

pub use camera::{
    find_camera, pseudo_camera_name, release_camera, resolve_camera, PSEUDO_CAMERA_DESCRIPTION,
};
pub use client::{Client, ClientBuilder, Session, AUTH_HEADER};
pub use config::{parse_toggle, IngestConfig, MAX_POLL_INTERVAL};
pub use discovery::{discover_assets, is_video_asset, VIDEO_EXTENSIONS};
pub use errors::{IngestError, Result};
pub use jobs::{
    extract_job_id, parse_job_created, poll_until_terminal, submit_and_wait, submit_job,
    upload_file_name, wait_for_job, Backoff, JobOutcome, JobTemplate, PollPolicy,
    UPLOAD_JOB_TYPE,
};
pub use models::{
    Camera, CreateJobResponse, Credentials, FaceMatches, Footage, JobState, JobStatus,
    PlateRecords, PlatformTimestamp, QueryWindow, ResourceId,
};
pub use orchestrator::{
    AssetOutcome, AssetReport, FailurePolicy, Ingestor, RunReport, Stage,
};
