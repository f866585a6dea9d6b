use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use vigil_core::{FaceCatalog, FrameClassifier, FrameSampler, OnnxAnalyzer, PresenceTracker, SystemClock};
use vigil_hw::{Camera, CommandLock, LockActuator};

mod config;
mod display;
mod monitor;

use config::Config;
use display::{FrameSink, Headless, SnapshotWriter};
use monitor::{Monitor, Outcome};

/// Frames between snapshot writes when a snapshot path is configured.
const SNAPSHOT_EVERY: u32 = 5;
/// How long an interrupted monitor gets to notice the stop flag.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "vigild", about = "Lock the workstation when no known face is in front of the camera")]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/vigil/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Seconds per presence window
    #[arg(short, long)]
    wait_secs: Option<u64>,
    /// Directory with one subdirectory of images per known person
    #[arg(short, long)]
    known_people: Option<PathBuf>,
    /// V4L2 camera device
    #[arg(long)]
    camera: Option<String>,
    /// Classify 1 of every N frames
    #[arg(long)]
    classify_every: Option<u32>,
    /// Directory containing the ONNX models
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Maximum embedding distance accepted as a match
    #[arg(long)]
    tolerance: Option<f32>,
    /// Periodically write an annotated frame to this image file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.wait_secs {
            config.wait_secs = v;
        }
        if let Some(v) = self.known_people {
            config.known_people_dir = v;
        }
        if let Some(v) = self.camera {
            config.camera_device = v;
        }
        if let Some(v) = self.classify_every {
            config.classify_every = v;
        }
        if let Some(v) = self.model_dir {
            config.model_dir = v;
        }
        if let Some(v) = self.tolerance {
            config.match_tolerance = v;
        }
        if let Some(v) = self.snapshot {
            config.snapshot_path = Some(v);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    tracing::info!(
        known_people = %config.known_people_dir.display(),
        camera = %config.camera_device,
        wait_secs = config.wait_secs,
        "vigild starting"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (done_tx, mut done_rx) = oneshot::channel();
    let thread_stop = Arc::clone(&stop);
    std::thread::Builder::new()
        .name("vigil-monitor".into())
        .spawn(move || {
            let _ = done_tx.send(run_monitor(&config, &thread_stop));
        })
        .context("failed to spawn monitor thread")?;

    let outcome = tokio::select! {
        result = &mut done_rx => result.context("monitor thread exited without reporting")??,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("interrupt received; stopping monitor");
            stop.store(true, Ordering::Relaxed);
            wait_for_monitor(done_rx, SHUTDOWN_GRACE, tokio::signal::ctrl_c()).await?
        }
    };

    match outcome {
        Outcome::Locked { window } => tracing::info!(window, "workstation locked; exiting"),
        Outcome::Quit => tracing::info!("vigild shutting down"),
    }

    Ok(())
}

/// Wait for a stopped monitor to report. Model loading, catalog enrollment
/// and a blocked capture do not look at the stop flag, so give up after
/// `grace` or on a second interrupt and let process exit reclaim the thread.
async fn wait_for_monitor<F>(
    done: oneshot::Receiver<Result<Outcome>>,
    grace: Duration,
    interrupt: F,
) -> Result<Outcome>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = done => result.context("monitor thread exited without reporting")?,
        _ = tokio::time::sleep(grace) => {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "monitor did not stop in time; exiting");
            Ok(Outcome::Quit)
        }
        _ = interrupt => {
            tracing::warn!("second interrupt; exiting without waiting for the monitor");
            Ok(Outcome::Quit)
        }
    }
}

/// Everything that touches the camera and the models runs on one OS thread.
fn run_monitor(config: &Config, stop: &AtomicBool) -> Result<Outcome> {
    let analyzer = OnnxAnalyzer::load(&config.model_dir)
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;
    tracing::info!(dir = %config.model_dir.display(), "face models loaded");

    if stop.load(Ordering::Relaxed) {
        return Ok(Outcome::Quit);
    }

    let mut classifier = FrameClassifier::new(analyzer, config.match_tolerance);
    let catalog = FaceCatalog::load(&config.known_people_dir, classifier.analyzer_mut());
    if catalog.is_empty() {
        tracing::warn!(
            dir = %config.known_people_dir.display(),
            "no known faces loaded; the workstation will lock after the first window"
        );
    }

    let actuator: Box<dyn LockActuator> = match config.lock_command.as_deref().and_then(CommandLock::from_argv) {
        Some(custom) => Box::new(custom),
        None => vigil_hw::detect_actuator(),
    };
    tracing::info!(actuator = %actuator.describe(), "lock actuator ready");

    let mut sink: Box<dyn FrameSink> = match &config.snapshot_path {
        Some(path) => Box::new(SnapshotWriter::new(path.clone(), SNAPSHOT_EVERY)),
        None => Box::new(Headless),
    };

    if stop.load(Ordering::Relaxed) {
        tracing::info!("stop requested during startup");
        return Ok(Outcome::Quit);
    }

    let camera = Camera::open(&config.camera_device, config.frame_width, config.frame_height)?;
    let mut stream = camera.stream(config.warmup_frames)?;

    let clock = SystemClock;
    let mut monitor = Monitor {
        classifier,
        catalog,
        sampler: FrameSampler::new(config.classify_every)?,
        tracker: PresenceTracker::new(config.wait(), config.rearm_pause()),
        actuator: actuator.as_ref(),
        sink: sink.as_mut(),
        clock: &clock,
        capture_retries: config.capture_retries,
    };

    Ok(monitor.run(&mut stream, stop)?)
}
