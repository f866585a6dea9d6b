//! The presence monitoring loop.
//!
//! One thread captures frames, classifies a sampled subset, feeds the results
//! to the presence tracker, and locks the workstation when a window passes
//! with no known face. The loop ends after the lock attempt, on a stop
//! request, or when the camera fails.

use crate::display::FrameSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use vigil_core::{
    Clock, Decision, FaceAnalyzer, FaceCatalog, FrameClassifier, FrameMatch, FrameSampler,
    PresenceState, PresenceTracker,
};
use vigil_hw::{CameraError, Frame, FrameSource, LockActuator};

const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("camera failure: {0}")]
    Camera(#[from] CameraError),
}

/// Why a monitoring run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The lock action was attempted at the end of `window`.
    Locked { window: u64 },
    /// A stop was requested.
    Quit,
}

/// Everything the loop needs besides the frame source.
pub struct Monitor<'a, A> {
    pub classifier: FrameClassifier<A>,
    pub catalog: FaceCatalog,
    pub sampler: FrameSampler,
    pub tracker: PresenceTracker,
    pub actuator: &'a dyn LockActuator,
    pub sink: &'a mut dyn FrameSink,
    pub clock: &'a dyn Clock,
    pub capture_retries: u32,
}

impl<A: FaceAnalyzer> Monitor<'_, A> {
    /// Run until the workstation is locked, `stop` is set, or capture fails.
    pub fn run(&mut self, source: &mut dyn FrameSource, stop: &AtomicBool) -> Result<Outcome, MonitorError> {
        let mut state = PresenceState::new(self.clock.now());
        let mut matches: Vec<FrameMatch> = Vec::new();

        tracing::info!(
            wait_secs = self.tracker.wait().as_secs_f32(),
            classify_every = self.sampler.every(),
            known_faces = self.catalog.len(),
            "presence monitor started"
        );

        loop {
            if stop.load(Ordering::Relaxed) {
                tracing::info!("stop requested; leaving monitor loop");
                return Ok(Outcome::Quit);
            }

            let frame = self.capture(source)?;

            if self.sampler.tick() {
                match self
                    .classifier
                    .classify(&frame.data, frame.width, frame.height, &self.catalog)
                {
                    Ok(fresh) => {
                        self.tracker.observe(&mut state, &fresh);
                        matches = fresh;
                    }
                    Err(e) => {
                        tracing::warn!(seq = frame.sequence, error = %e, "frame classification failed; keeping previous result");
                    }
                }
            }

            if let Err(e) = self.sink.show(&frame, &matches) {
                tracing::warn!(error = %e, "display update failed");
            }

            match self.tracker.check(&mut state, self.clock.now()) {
                Decision::Continue => {}
                Decision::Rearmed { .. } => self.clock.sleep(self.tracker.rearm_pause()),
                Decision::Lock { window } => {
                    if let Err(e) = self.actuator.lock() {
                        tracing::warn!(
                            error = %e,
                            actuator = %self.actuator.describe(),
                            "lock action failed; stopping anyway"
                        );
                    }
                    return Ok(Outcome::Locked { window });
                }
            }
        }
    }

    fn capture(&self, source: &mut dyn FrameSource) -> Result<Frame, MonitorError> {
        let mut failures = 0u32;
        loop {
            match source.next_frame() {
                Ok(frame) => return Ok(frame),
                Err(e) if failures < self.capture_retries => {
                    failures += 1;
                    tracing::warn!(attempt = failures, error = %e, "frame capture failed; retrying");
                    self.clock.sleep(CAPTURE_RETRY_DELAY);
                }
                Err(e) => {
                    tracing::error!(error = %e, "frame capture failed");
                    return Err(e.into());
                }
            }
        }
    }
}
