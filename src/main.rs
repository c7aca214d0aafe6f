//! lpr-ingest command line.
//!
//! Usage:
//!     lpr-ingest --api-base https://vms.example.com/api --username ops \
//!         --password ... --camera-uuid gate-7 --asset-path ./videos
//!
//! Every flag can also come from the environment (see `--help`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lpr_ingest::{
    parse_toggle, AssetReport, Backoff, Credentials, FailurePolicy, IngestConfig, Ingestor,
    JobTemplate, PollPolicy,
};

/// Exit status when the run finished but some asset did not make it.
const EXIT_PARTIAL: i32 = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackoffArg {
    Fixed,
    Exponential,
}

#[derive(Parser, Debug)]
#[command(
    name = "lpr-ingest",
    version,
    about = "Upload videos to the analytics platform and fetch plate detections"
)]
struct Args {
    /// Platform API root
    #[arg(long, env = "API_BASE")]
    api_base: String,

    #[arg(long, env = "USERNAME")]
    username: String,

    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    password: String,

    /// Substring identifying the target camera by name
    #[arg(long, env = "CAMERA_UUID")]
    camera_uuid: String,

    /// Directory scanned recursively for .mp4/.mov files
    #[arg(long, env = "ASSET_PATH")]
    asset_path: PathBuf,

    /// Delete the camera when the run ends ("true" or "1")
    #[arg(
        long,
        env = "CAMERA_DELETE",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = parse_toggle
    )]
    camera_delete: bool,

    /// Delete the camera even if an asset failed
    #[arg(
        long,
        env = "RELEASE_AFTER_FAILURE",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = parse_toggle
    )]
    release_after_failure: bool,

    /// Keep going with the next asset after a failure
    #[arg(
        long,
        env = "CONTINUE_ON_ERROR",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = parse_toggle
    )]
    continue_on_error: bool,

    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 5)]
    poll_interval_secs: u64,

    /// Stop polling a job after this many status checks
    #[arg(long, env = "POLL_MAX_ATTEMPTS")]
    poll_max_attempts: Option<u32>,

    /// Stop polling a job after this long (0 disables the deadline)
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 24 * 60 * 60)]
    poll_timeout_secs: u64,

    #[arg(long, env = "POLL_BACKOFF", value_enum, default_value_t = BackoffArg::Fixed)]
    poll_backoff: BackoffArg,

    /// Also fetch face matches in these categories (comma-separated)
    #[arg(long, env = "FACE_CATEGORIES")]
    face_categories: Option<String>,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    request_timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> IngestConfig {
        let interval = Duration::from_secs(self.poll_interval_secs);
        let backoff = match self.poll_backoff {
            BackoffArg::Fixed => Backoff::Fixed,
            BackoffArg::Exponential => Backoff::Exponential {
                max_interval: interval.saturating_mul(12),
            },
        };

        IngestConfig {
            api_base: self.api_base,
            credentials: Credentials::new(self.username, self.password),
            camera_identifier: self.camera_uuid,
            asset_root: self.asset_path,
            camera_delete: self.camera_delete,
            release_after_failure: self.release_after_failure,
            failure_policy: if self.continue_on_error {
                FailurePolicy::ContinueWithNext
            } else {
                FailurePolicy::AbortRemaining
            },
            poll: PollPolicy {
                interval,
                max_attempts: self.poll_max_attempts,
                timeout: (self.poll_timeout_secs > 0)
                    .then(|| Duration::from_secs(self.poll_timeout_secs)),
                backoff,
            },
            job: JobTemplate::default(),
            face_categories: self.face_categories,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lpr_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let config = Args::parse().into_config();

    info!("Starting ingestion");
    info!("  API: {}", config.api_base);
    info!("  Camera: {}", config.camera_identifier);
    info!("  Assets: {}", config.asset_root.display());

    let ingestor = Ingestor::from_config(config)
        .context("Invalid configuration")?
        .on_asset(print_report);

    let report = ingestor.run().await.context("Ingestion run aborted")?;

    info!(
        processed = report.processed_count(),
        failed = report.failed_count(),
        skipped = report.skipped_count(),
        camera_released = report.camera_released,
        "run finished"
    );

    Ok(if report.failed_count() > 0 {
        EXIT_PARTIAL
    } else {
        0
    })
}

fn print_report(report: &AssetReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(asset = %report.asset.display(), error = %e, "could not render result"),
    }
}
