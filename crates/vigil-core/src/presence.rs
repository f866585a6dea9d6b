//! Presence tracking: decides when the workstation should lock.
//!
//! Time is cut into fixed windows of `wait` length starting at
//! [`PresenceState::window_start`]. A window in which no known face was
//! observed ends in [`Decision::Lock`]; otherwise the state re-arms for the
//! next window. Boundaries are detected by comparing integer window indices,
//! so a boundary is never missed under scheduling jitter and never fires
//! twice.

use crate::types::FrameMatch;
use std::time::{Duration, Instant};

/// Pause after re-arming, so the loop does not hammer the same boundary instant.
pub const DEFAULT_REARM_PAUSE: Duration = Duration::from_millis(100);

/// Source of monotonic time for the monitor loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation of [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Mutable presence state, owned by the loop driver.
#[derive(Debug, Clone)]
pub struct PresenceState {
    /// No authorized face confirmed in the current window.
    pub lock_armed: bool,
    pub window_start: Instant,
    /// Index of the last window boundary that was acted on.
    pub window_index: u64,
}

impl PresenceState {
    pub fn new(window_start: Instant) -> Self {
        Self {
            lock_armed: true,
            window_start,
            window_index: 0,
        }
    }
}

/// Outcome of a boundary check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Still inside the current window.
    Continue,
    /// A known face was seen during the window that just ended; armed again.
    Rearmed { window: u64 },
    /// No known face during the window that just ended.
    Lock { window: u64 },
}

/// Applies match results and clock ticks to a [`PresenceState`].
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    wait: Duration,
    rearm_pause: Duration,
}

impl PresenceTracker {
    /// `wait` must be non-zero; callers validate configuration before this point.
    pub fn new(wait: Duration, rearm_pause: Duration) -> Self {
        debug_assert!(!wait.is_zero(), "wait interval must be non-zero");
        Self { wait, rearm_pause }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn rearm_pause(&self) -> Duration {
        self.rearm_pause
    }

    /// Record one classified frame. Any known face disarms the lock until the
    /// window ends; frames without one leave the state untouched.
    pub fn observe(&self, state: &mut PresenceState, matches: &[FrameMatch]) {
        if state.lock_armed && matches.iter().any(FrameMatch::is_known) {
            tracing::debug!(window = state.window_index, "known face present; lock disarmed");
            state.lock_armed = false;
        }
    }

    /// Check whether a window boundary has been crossed at `now`.
    ///
    /// If several boundaries passed since the last check (a stalled loop),
    /// they are handled as a single boundary.
    pub fn check(&self, state: &mut PresenceState, now: Instant) -> Decision {
        let elapsed = now.saturating_duration_since(state.window_start);
        let index = window_index(elapsed, self.wait);

        tracing::trace!(
            elapsed_ms = elapsed.as_millis() as u64,
            armed = state.lock_armed,
            "presence tick"
        );

        if index <= state.window_index {
            return Decision::Continue;
        }
        state.window_index = index;

        if state.lock_armed {
            tracing::info!(window = index, "no known face during window; locking");
            Decision::Lock { window: index }
        } else {
            tracing::info!(window = index, "known face seen during window; re-arming");
            state.lock_armed = true;
            Decision::Rearmed { window: index }
        }
    }
}

fn window_index(elapsed: Duration, wait: Duration) -> u64 {
    let wait_nanos = wait.as_nanos().max(1);
    u64::try_from(elapsed.as_nanos() / wait_nanos).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceLocation;

    const LOC: FaceLocation = FaceLocation { top: 0, right: 4, bottom: 4, left: 0 };

    fn known() -> Vec<FrameMatch> {
        vec![
            FrameMatch { location: LOC, identity: None },
            FrameMatch { location: LOC, identity: Some("alice".into()) },
        ]
    }

    fn unknown() -> Vec<FrameMatch> {
        vec![FrameMatch { location: LOC, identity: None }]
    }

    fn tracker() -> PresenceTracker {
        PresenceTracker::new(Duration::from_secs(5), DEFAULT_REARM_PAUSE)
    }

    #[test]
    fn test_known_match_disarms() {
        let start = Instant::now();
        let mut state = PresenceState::new(start);
        tracker().observe(&mut state, &known());
        assert!(!state.lock_armed);
    }

    #[test]
    fn test_unknown_match_is_sticky() {
        let mut state = PresenceState::new(Instant::now());
        let t = tracker();
        t.observe(&mut state, &known());
        t.observe(&mut state, &unknown());
        t.observe(&mut state, &[]);
        assert!(!state.lock_armed);
    }

    #[test]
    fn test_no_decision_at_time_zero_or_inside_window() {
        let start = Instant::now();
        let mut state = PresenceState::new(start);
        let t = tracker();
        assert_eq!(t.check(&mut state, start), Decision::Continue);
        assert_eq!(t.check(&mut state, start + Duration::from_millis(4_999)), Decision::Continue);
    }

    #[test]
    fn test_silent_window_locks_exactly_once() {
        let start = Instant::now();
        let mut state = PresenceState::new(start);
        let t = tracker();

        let decisions: Vec<Decision> = (0..=60)
            .map(|tenth| t.check(&mut state, start + Duration::from_millis(tenth * 100)))
            .filter(|d| *d != Decision::Continue)
            .collect();
        assert_eq!(decisions, vec![Decision::Lock { window: 1 }]);
    }

    #[test]
    fn test_seen_window_rearms_instead_of_locking() {
        let start = Instant::now();
        let mut state = PresenceState::new(start);
        let t = tracker();
        t.observe(&mut state, &known());

        let decision = t.check(&mut state, start + Duration::from_secs(5));
        assert_eq!(decision, Decision::Rearmed { window: 1 });
        assert!(state.lock_armed);
        // Same boundary again does not fire twice.
        assert_eq!(t.check(&mut state, start + Duration::from_millis(5_050)), Decision::Continue);
    }

    #[test]
    fn test_rearmed_silent_window_then_locks() {
        let start = Instant::now();
        let mut state = PresenceState::new(start);
        let t = tracker();
        t.observe(&mut state, &known());
        assert_eq!(t.check(&mut state, start + Duration::from_secs(5)), Decision::Rearmed { window: 1 });
        assert_eq!(t.check(&mut state, start + Duration::from_secs(10)), Decision::Lock { window: 2 });
    }

    #[test]
    fn test_face_visible_until_four_seconds_locks_at_ten() {
        let start = Instant::now();
        let mut state = PresenceState::new(start);
        let t = tracker();
        let mut lock_at = None;

        for tenth in 0..=150u64 {
            let now = start + Duration::from_millis(tenth * 100);
            let matches = if tenth <= 40 { known() } else { unknown() };
            t.observe(&mut state, &matches);
            if let Decision::Lock { .. } = t.check(&mut state, now) {
                lock_at = Some(tenth);
                break;
            }
        }

        assert_eq!(lock_at, Some(100));
    }

    #[test]
    fn test_stalled_loop_collapses_boundaries() {
        let start = Instant::now();
        let mut state = PresenceState::new(start);
        let t = tracker();
        t.observe(&mut state, &known());
        // Jump straight past two boundaries.
        assert_eq!(t.check(&mut state, start + Duration::from_secs(12)), Decision::Rearmed { window: 2 });
        assert_eq!(t.check(&mut state, start + Duration::from_secs(15)), Decision::Lock { window: 3 });
    }

    #[test]
    fn test_window_index_integer_boundaries() {
        let wait = Duration::from_secs(5);
        assert_eq!(window_index(Duration::from_nanos(4_999_999_999), wait), 0);
        assert_eq!(window_index(Duration::from_secs(5), wait), 1);
        assert_eq!(window_index(Duration::from_secs(10), wait), 2);
    }
}
