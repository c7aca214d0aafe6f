//! Sequencing a whole ingestion run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::camera::{release_camera, resolve_camera};
use crate::client::{Client, ClientBuilder, Session};
use crate::config::IngestConfig;
use crate::discovery::discover_assets;
use crate::errors::{IngestError, Result};
use crate::jobs::{submit_job, wait_for_job};
use crate::models::{Camera, FaceMatches, Footage, PlateRecords, QueryWindow, ResourceId};

/// What to do with the remaining assets once one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failed asset; later assets are reported as skipped.
    #[default]
    AbortRemaining,
    /// Record the failure and move on to the next asset.
    ContinueWithNext,
}

/// Pipeline step an asset failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submit,
    Poll,
    Footage,
    Window,
    Plates,
    FaceMatches,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Footage => "footage",
            Stage::Window => "window",
            Stage::Plates => "plates",
            Stage::FaceMatches => "face_matches",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssetOutcome {
    Processed {
        job_id: u64,
        footage_id: ResourceId,
        footage: Footage,
        window: QueryWindow,
        plates: PlateRecords,
        #[serde(skip_serializing_if = "Option::is_none")]
        face_matches: Option<FaceMatches>,
    },
    Failed {
        stage: Stage,
        error: String,
        /// The HTTP exchange failed, rather than the platform's answer.
        transport: bool,
    },
    /// Never attempted because an earlier asset aborted the run.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetReport {
    pub asset: PathBuf,
    #[serde(flatten)]
    pub outcome: AssetOutcome,
}

impl AssetReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AssetOutcome::Failed { .. })
    }
}

/// Returned by [`Ingestor::run`]. Lives only as long as the caller keeps it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub camera: Camera,
    pub assets: Vec<AssetReport>,
    pub camera_released: bool,
}

impl RunReport {
    pub fn processed_count(&self) -> usize {
        self.assets
            .iter()
            .filter(|a| matches!(a.outcome, AssetOutcome::Processed { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.assets.iter().filter(|a| a.is_failed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.assets
            .iter()
            .filter(|a| matches!(a.outcome, AssetOutcome::Skipped))
            .count()
    }

    /// `true` when every asset was processed.
    pub fn is_success(&self) -> bool {
        self.processed_count() == self.assets.len()
    }
}

type StageResult<T> = std::result::Result<T, (Stage, IngestError)>;

fn at<T>(stage: Stage, r: Result<T>) -> StageResult<T> {
    r.map_err(|e| (stage, e))
}

/// Drives a run: authenticate, resolve the camera, then push each asset
/// through submit, poll, footage and plates, one at a time.
pub struct Ingestor {
    client: Client,
    config: IngestConfig,
    #[allow(clippy::type_complexity)]
    on_asset: Option<Box<dyn Fn(&AssetReport) + Send + Sync>>,
}

impl Ingestor {
    pub fn new(client: Client, config: IngestConfig) -> Self {
        Self {
            client,
            config,
            on_asset: None,
        }
    }

    /// Validate `config` and build a client from it.
    pub fn from_config(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        let client = ClientBuilder::new()
            .base_url(config.api_base.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::new(client, config))
    }

    /// Called with each asset's report as soon as it is known.
    pub fn on_asset(mut self, cb: impl Fn(&AssetReport) + Send + Sync + 'static) -> Self {
        self.on_asset = Some(Box::new(cb));
        self
    }

    /// Discover assets under the configured root and ingest them.
    pub async fn run(&self) -> Result<RunReport> {
        let assets = discover_assets(&self.config.asset_root)?;
        info!(count = assets.len(), root = %self.config.asset_root.display(), "assets discovered");
        self.run_assets(assets).await
    }

    /// Ingest `assets` in order.
    ///
    /// Authentication and camera resolution failures end the run with an
    /// error before any asset is touched. Per-asset failures are recorded in
    /// the report according to the configured [`FailurePolicy`].
    pub async fn run_assets(&self, assets: Vec<PathBuf>) -> Result<RunReport> {
        let session = self
            .client
            .authenticate(&self.config.credentials)
            .await
            .inspect_err(|e| error!(error = %e, "authentication failed, aborting run"))?;

        let camera = resolve_camera(&self.client, &session, &self.config.camera_identifier)
            .await
            .inspect_err(|e| error!(error = %e, "could not resolve camera, aborting run"))?;

        let mut reports = Vec::with_capacity(assets.len());
        let mut aborted = false;

        for asset in assets {
            if aborted {
                self.record(&mut reports, asset, AssetOutcome::Skipped);
                continue;
            }

            let outcome = match self.process(&session, &camera, &asset).await {
                Ok(outcome) => outcome,
                Err((stage, e)) => {
                    let transport = e.is_transport();
                    error!(asset = %asset.display(), %stage, transport, error = %e, "asset failed");
                    if self.config.failure_policy == FailurePolicy::AbortRemaining {
                        warn!("abandoning remaining assets");
                        aborted = true;
                    }
                    AssetOutcome::Failed {
                        stage,
                        error: e.to_string(),
                        transport,
                    }
                }
            };
            self.record(&mut reports, asset, outcome);
        }

        let any_failed = reports.iter().any(AssetReport::is_failed);
        let camera_released = if !self.config.camera_delete {
            false
        } else if any_failed && !self.config.release_after_failure {
            info!(camera_id = %camera.camera_id, "keeping camera after failed run");
            false
        } else {
            release_camera(&self.client, &session, &camera).await
        };

        Ok(RunReport {
            camera,
            assets: reports,
            camera_released,
        })
    }

    fn record(&self, reports: &mut Vec<AssetReport>, asset: PathBuf, outcome: AssetOutcome) {
        let report = AssetReport { asset, outcome };
        if let Some(ref cb) = self.on_asset {
            cb(&report);
        }
        reports.push(report);
    }

    async fn process(
        &self,
        session: &Session,
        camera: &Camera,
        asset: &Path,
    ) -> StageResult<AssetOutcome> {
        info!(asset = %asset.display(), camera_id = %camera.camera_id, "submitting asset");
        let job_id = at(
            Stage::Submit,
            submit_job(
                &self.client,
                session,
                &camera.camera_id,
                asset,
                &self.config.job,
            )
            .await,
        )?;

        let outcome = at(
            Stage::Poll,
            wait_for_job(&self.client, session, job_id, &self.config.poll).await,
        )?;
        let footage_id = at(Stage::Poll, outcome.into_footage_id())?;

        let footage = at(
            Stage::Footage,
            self.client.get_footage(session, &footage_id).await,
        )?;
        let window = at(Stage::Window, footage.query_window())?;

        let plates = at(
            Stage::Plates,
            self.client.get_plates(session, &footage_id, &window).await,
        )?;

        let face_matches = match self.config.face_categories.as_deref() {
            Some(categories) => Some(at(
                Stage::FaceMatches,
                self.client
                    .get_face_matches(session, &footage_id, categories, &window)
                    .await,
            )?),
            None => None,
        };

        info!(job_id, footage_id = %footage_id, "asset processed");
        Ok(AssetOutcome::Processed {
            job_id,
            footage_id,
            footage,
            window,
            plates,
            face_matches,
        })
    }
}
