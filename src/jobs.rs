//! Upload jobs: creation, job-id extraction and status polling.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{Client, Session};
use crate::errors::{IngestError, Result};
use crate::models::{CreateJobResponse, JobState, JobStatus, ResourceId};
use crate::timefmt;

/// The only job type this tool submits.
pub const UPLOAD_JOB_TYPE: &str = "UploadJob";

static JOB_CREATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Job created\s*:\s*(\d+)").expect("job-created pattern is valid"));

/// Fixed parameters sent with every upload job.
#[derive(Debug, Clone)]
pub struct JobTemplate {
    /// Default: 7.
    pub engine_profile_id: u32,
    /// Default: "LPR Test".
    pub description: String,
    /// Comma-separated analytics plugins to run.
    pub plugins: String,
    /// Default: true.
    pub transcode: bool,
}

impl Default for JobTemplate {
    fn default() -> Self {
        Self {
            engine_profile_id: 7,
            description: "LPR Test".to_string(),
            plugins: "VideoSearch,LPREngine,VehicleCountingEngine,MakeModelRecognitionEngine"
                .to_string(),
            transcode: true,
        }
    }
}

impl JobTemplate {
    /// Query-string pairs for `POST /jobs`.
    pub fn upload_params(
        &self,
        camera_id: &ResourceId,
        file_name: &str,
        start_time: String,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("type", UPLOAD_JOB_TYPE.to_string()),
            ("cameraId", camera_id.to_string()),
            ("engineProfileId", self.engine_profile_id.to_string()),
            ("startTime", start_time),
            ("usrFileName", file_name.to_string()),
            ("description", self.description.clone()),
            ("plugins", self.plugins.clone()),
            ("doTranscode", self.transcode.to_string()),
        ]
    }
}

/// Name the asset is uploaded under: the path's final component, or
/// `video.mp4` when the path has none.
pub fn upload_file_name(asset: &Path) -> String {
    asset
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video.mp4".to_string())
}

/// Pull the job id out of a `"Job created : <digits>"` message.
pub fn parse_job_created(message: &str) -> Option<u64> {
    JOB_CREATED
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Job id from a creation response: the `jobId` field if present, otherwise
/// the id embedded in `message`.
///
/// Returns [`IngestError::ContractViolation`] when neither is usable.
pub fn extract_job_id(resp: &CreateJobResponse) -> Result<u64> {
    if let Some(id) = resp.job_id {
        return Ok(id);
    }
    resp.message
        .as_deref()
        .and_then(parse_job_created)
        .ok_or_else(|| {
            IngestError::ContractViolation(format!(
                "job creation response has no job id (message: {:?})",
                resp.message
            ))
        })
}

/// How to space out status polls between fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every time.
    Fixed,
    /// Double the delay after each non-terminal poll, capped at `max_interval`.
    Exponential { max_interval: Duration },
}

/// When to stop waiting for a job.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Default: 5s.
    pub interval: Duration,
    /// Give up after this many status fetches. Default: no cap.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed. Default: 24h.
    pub timeout: Option<Duration>,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: None,
            timeout: Some(Duration::from_secs(24 * 60 * 60)),
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        match self.backoff {
            Backoff::Fixed => current,
            Backoff::Exponential { max_interval } => current.saturating_mul(2).min(max_interval),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        job_id: u64,
        footage_id: ResourceId,
    },
    /// Any terminal status other than `Completed`.
    Failed { job_id: u64, status: JobStatus },
}

impl JobOutcome {
    pub fn job_id(&self) -> u64 {
        match self {
            JobOutcome::Completed { job_id, .. } | JobOutcome::Failed { job_id, .. } => *job_id,
        }
    }

    /// The produced footage, or [`IngestError::JobFailed`].
    pub fn into_footage_id(self) -> Result<ResourceId> {
        match self {
            JobOutcome::Completed { footage_id, .. } => Ok(footage_id),
            JobOutcome::Failed { job_id, status } => Err(IngestError::JobFailed { job_id, status }),
        }
    }
}

/// Upload `asset` as a new job against `camera_id` and return the job id.
pub async fn submit_job(
    client: &Client,
    session: &Session,
    camera_id: &ResourceId,
    asset: &Path,
    template: &JobTemplate,
) -> Result<u64> {
    let file_name = upload_file_name(asset);
    let params = template.upload_params(camera_id, &file_name, timefmt::job_start_time_now());

    let resp = client
        .create_upload_job(session, asset, &file_name, &params)
        .await?;
    let job_id = extract_job_id(&resp)?;
    info!(job_id, asset = %asset.display(), "job created");
    Ok(job_id)
}

/// Poll `GET /jobs/{id}` under `policy` until a terminal status is seen.
pub async fn wait_for_job(
    client: &Client,
    session: &Session,
    job_id: u64,
    policy: &PollPolicy,
) -> Result<JobOutcome> {
    poll_until_terminal(job_id, policy, move || client.get_job(session, job_id)).await
}

/// Submit `asset` and wait for the job to finish.
pub async fn submit_and_wait(
    client: &Client,
    session: &Session,
    camera_id: &ResourceId,
    asset: &Path,
    template: &JobTemplate,
    policy: &PollPolicy,
) -> Result<JobOutcome> {
    let job_id = submit_job(client, session, camera_id, asset, template).await?;
    wait_for_job(client, session, job_id, policy).await
}

/// The polling state machine, independent of where statuses come from.
///
/// The first fetch happens immediately; the policy's delay separates
/// subsequent fetches. A fetch error abandons the job at once.
pub async fn poll_until_terminal<F, Fut>(
    job_id: u64,
    policy: &PollPolicy,
    mut fetch: F,
) -> Result<JobOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobState>>,
{
    let started = Instant::now();
    let mut delay = policy.interval;
    let mut attempts: u32 = 0;

    loop {
        let state = fetch().await?;
        attempts += 1;

        if state.status.is_terminal() {
            return settle(job_id, state);
        }

        if state.status.is_in_progress() {
            info!(job_id, status = ?state.status, "still processing, please be patient");
        } else {
            warn!(job_id, status = ?state.status, "job in non-terminal status, continuing to poll");
        }

        let elapsed = started.elapsed();
        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = policy.timeout.is_some_and(|t| elapsed >= t);
        if out_of_attempts || out_of_time {
            return Err(IngestError::PollTimeout {
                job_id,
                attempts,
                elapsed,
            });
        }

        debug!(job_id, ?delay, "waiting before next poll");
        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

fn settle(job_id: u64, state: JobState) -> Result<JobOutcome> {
    if !state.status.is_completed() {
        warn!(job_id, status = ?state.status, "something went wrong");
        return Ok(JobOutcome::Failed {
            job_id,
            status: state.status,
        });
    }

    match state.footage_id {
        Some(footage_id) => {
            info!(job_id, footage_id = %footage_id, "job completed");
            Ok(JobOutcome::Completed { job_id, footage_id })
        }
        None => Err(IngestError::ContractViolation(format!(
            "job {job_id} completed without a footage id"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn state(status: JobStatus, footage: Option<u64>) -> JobState {
        JobState {
            status,
            footage_id: footage.map(ResourceId::from),
        }
    }

    /// Status source that replays a fixed script and counts fetches.
    #[derive(Clone)]
    struct Script {
        remaining: Arc<Mutex<VecDeque<JobState>>>,
        fetches: Arc<Mutex<u32>>,
    }

    impl Script {
        fn new(states: Vec<JobState>) -> Self {
            Self {
                remaining: Arc::new(Mutex::new(states.into())),
                fetches: Arc::new(Mutex::new(0)),
            }
        }

        fn fetch(&self) -> impl Future<Output = Result<JobState>> {
            *self.fetches.lock().unwrap() += 1;
            let next = self.remaining.lock().unwrap().pop_front();
            async move { next.ok_or(IngestError::MissingPayload("scripted status")) }
        }

        fn fetches(&self) -> u32 {
            *self.fetches.lock().unwrap()
        }
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts: Some(50),
            timeout: None,
            backoff: Backoff::Fixed,
        }
    }

    #[test]
    fn parses_job_created_message() {
        assert_eq!(parse_job_created("Job created : 4821"), Some(4821));
        assert_eq!(parse_job_created("OK. Job created:77 (queued)"), Some(77));
        assert_eq!(parse_job_created("Job queued"), None);
        assert_eq!(parse_job_created("Job created : "), None);
    }

    #[test]
    fn structured_job_id_takes_precedence() {
        let resp = CreateJobResponse {
            job_id: Some(9),
            message: Some("Job created : 4821".into()),
        };
        assert_eq!(extract_job_id(&resp).unwrap(), 9);
    }

    #[test]
    fn unmatched_message_is_a_contract_violation() {
        let resp = CreateJobResponse {
            job_id: None,
            message: Some("Upload accepted".into()),
        };
        assert!(matches!(
            extract_job_id(&resp),
            Err(IngestError::ContractViolation(_))
        ));
        assert!(matches!(
            extract_job_id(&CreateJobResponse::default()),
            Err(IngestError::ContractViolation(_))
        ));
    }

    #[test]
    fn upload_params_carry_fixed_job_settings() {
        let params = JobTemplate::default().upload_params(
            &ResourceId::from(199),
            "LPR_Test_1a.mp4",
            "20210514180100".into(),
        );
        let get = |k: &str| {
            params
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("type"), Some("UploadJob"));
        assert_eq!(get("cameraId"), Some("199"));
        assert_eq!(get("engineProfileId"), Some("7"));
        assert_eq!(get("startTime"), Some("20210514180100"));
        assert_eq!(get("usrFileName"), Some("LPR_Test_1a.mp4"));
        assert_eq!(get("doTranscode"), Some("true"));
        assert!(get("plugins").unwrap().contains("LPREngine"));
    }

    #[test]
    fn exponential_backoff_doubles_up_to_cap() {
        let policy = PollPolicy {
            interval: Duration::from_secs(1),
            backoff: Backoff::Exponential {
                max_interval: Duration::from_secs(5),
            },
            ..Default::default()
        };
        let d1 = policy.next_delay(policy.interval);
        let d2 = policy.next_delay(d1);
        let d3 = policy.next_delay(d2);
        let d4 = policy.next_delay(d3);
        assert_eq!(
            [d1, d2, d3, d4],
            [2u64, 4, 5, 5].map(Duration::from_secs)
        );
    }

    #[test]
    fn exponential_backoff_saturates_instead_of_overflowing() {
        let policy = PollPolicy {
            interval: Duration::from_secs(u64::MAX / 2 + 1),
            backoff: Backoff::Exponential {
                max_interval: Duration::MAX,
            },
            ..Default::default()
        };
        let d1 = policy.next_delay(policy.interval);
        assert_eq!(d1, Duration::MAX);
        assert_eq!(policy.next_delay(d1), Duration::MAX);
    }

    #[test]
    fn upload_name_is_the_final_path_component() {
        assert_eq!(upload_file_name(Path::new("/videos/lot/a.MP4")), "a.MP4");
        assert_eq!(upload_file_name(Path::new("/")), "video.mp4");
        assert_eq!(upload_file_name(Path::new("clips/..")), "video.mp4");
    }

    #[tokio::test]
    async fn completes_after_three_fetches_with_final_footage_id() {
        let script = Script::new(vec![
            state(JobStatus::Waiting, None),
            state(JobStatus::Running, None),
            state(JobStatus::Completed, Some(31)),
        ]);
        let policy = fast_policy();

        let started = std::time::Instant::now();
        let outcome = poll_until_terminal(4821, &policy, || script.fetch())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                job_id: 4821,
                footage_id: ResourceId::from(31)
            }
        );
        assert_eq!(script.fetches(), 3);
        assert!(started.elapsed() >= policy.interval * 2);
    }

    #[tokio::test]
    async fn failed_status_stops_polling_immediately() {
        let script = Script::new(vec![
            state(JobStatus::Running, None),
            state(JobStatus::Failed, None),
            state(JobStatus::Completed, Some(1)),
        ]);

        let outcome = poll_until_terminal(5, &fast_policy(), || script.fetch())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Failed {
                job_id: 5,
                status: JobStatus::Failed
            }
        );
        assert_eq!(script.fetches(), 2);
        assert!(matches!(
            outcome.into_footage_id(),
            Err(IngestError::JobFailed { job_id: 5, .. })
        ));
    }

    #[tokio::test]
    async fn every_non_completed_terminal_status_is_a_failure() {
        for status in [JobStatus::Failed, JobStatus::FailedRetry, JobStatus::Unknown] {
            let script = Script::new(vec![state(status, Some(8))]);
            let outcome = poll_until_terminal(1, &fast_policy(), || script.fetch())
                .await
                .unwrap();
            assert_eq!(outcome, JobOutcome::Failed { job_id: 1, status });
            assert_eq!(script.fetches(), 1);
        }
    }

    #[tokio::test]
    async fn suspended_and_canceled_keep_polling() {
        let script = Script::new(vec![
            state(JobStatus::Suspended, None),
            state(JobStatus::Canceled, None),
            state(JobStatus::Unrecognized, None),
            state(JobStatus::Completed, Some(2)),
        ]);

        let outcome = poll_until_terminal(3, &fast_policy(), || script.fetch())
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Completed { .. }));
        assert_eq!(script.fetches(), 4);
    }

    #[tokio::test]
    async fn never_terminal_job_is_bounded_by_max_attempts() {
        let script = Script::new(vec![state(JobStatus::Running, None); 100]);
        let policy = PollPolicy {
            max_attempts: Some(4),
            ..fast_policy()
        };

        let err = poll_until_terminal(11, &policy, || script.fetch())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::PollTimeout {
                job_id: 11,
                attempts: 4,
                ..
            }
        ));
        assert_eq!(script.fetches(), 4);
    }

    #[tokio::test]
    async fn deadline_produces_timeout_not_failure() {
        let script = Script::new(vec![state(JobStatus::Waiting, None); 100]);
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: None,
            timeout: Some(Duration::from_millis(25)),
            backoff: Backoff::Fixed,
        };

        let err = poll_until_terminal(12, &policy, || script.fetch())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::PollTimeout { job_id: 12, .. }));
        assert!(script.fetches() < 100);
    }

    #[tokio::test]
    async fn fetch_error_abandons_the_job() {
        let script = Script::new(vec![state(JobStatus::Running, None)]);

        let err = poll_until_terminal(13, &fast_policy(), || script.fetch())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::MissingPayload(_)));
        assert_eq!(script.fetches(), 2);
    }

    #[tokio::test]
    async fn completed_without_footage_is_a_contract_violation() {
        let script = Script::new(vec![state(JobStatus::Completed, None)]);

        let err = poll_until_terminal(14, &fast_policy(), || script.fetch())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::ContractViolation(_)));
    }
}
