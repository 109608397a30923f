//! Capture constraints and the automatic-restart throttle.

use super::signals::TrackStatus;

/// What `getUserMedia` is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub facing_mode: &'static str,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            facing_mode: "user",
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

pub fn any_live(tracks: &[TrackStatus]) -> bool {
    tracks.iter().any(TrackStatus::is_live)
}

/// Allows at most one automatic restart per window.
#[derive(Debug, Clone)]
pub struct RestartThrottle {
    window_ms: f64,
    last_attempt_ms: Option<f64>,
}

impl RestartThrottle {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: window_ms as f64,
            last_attempt_ms: None,
        }
    }

    /// Claims the slot for `now_ms` if the previous attempt is old enough.
    pub fn try_acquire(&mut self, now_ms: f64) -> bool {
        if let Some(last) = self.last_attempt_ms {
            if now_ms - last < self.window_ms {
                return false;
            }
        }
        self.last_attempt_ms = Some(now_ms);
        true
    }

    pub fn reset(&mut self) {
        self.last_attempt_ms = None;
    }
}
