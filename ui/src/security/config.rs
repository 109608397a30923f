//! Monitor configuration and host callbacks.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, LockdownFailure};
use super::violation::{SessionSnapshot, Violation};

/// Lockdown policy for one exam attempt.
///
/// Deserializes from camelCase JSON with every key optional, e.g.
/// `{"maxViolations": 5, "requireWebcamMic": false}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityConfig {
    /// Advisory threshold. The monitor only reports it; the host terminates.
    pub max_violations: u32,
    pub require_fullscreen: bool,
    pub require_webcam_mic: bool,
    /// Minimum spacing between automatic media restarts.
    pub restart_throttle_ms: u64,
    pub playback_retry_attempts: u32,
    pub playback_retry_interval_ms: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_violations: 3,
            require_fullscreen: true,
            require_webcam_mic: true,
            restart_throttle_ms: 5_000,
            playback_retry_attempts: 10,
            playback_retry_interval_ms: 300,
        }
    }
}

impl SecurityConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_violations == 0 {
            return Err(ConfigError::ZeroViolationLimit);
        }
        if self.playback_retry_attempts == 0 {
            return Err(ConfigError::ZeroPlaybackAttempts);
        }
        Ok(())
    }
}

type ViolationFn = Rc<dyn Fn(&Violation)>;
type FailureFn = Rc<dyn Fn(&LockdownFailure)>;
type StateFn = Rc<dyn Fn(&SessionSnapshot)>;

/// Host-side hooks invoked synchronously by the monitor.
#[derive(Clone, Default)]
pub struct MonitorCallbacks {
    pub(crate) on_violation: Option<ViolationFn>,
    pub(crate) on_lockdown_fail: Option<FailureFn>,
    pub(crate) on_state_change: Option<StateFn>,
}

impl MonitorCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_violation(mut self, f: impl Fn(&Violation) + 'static) -> Self {
        self.on_violation = Some(Rc::new(f));
        self
    }

    pub fn on_lockdown_fail(mut self, f: impl Fn(&LockdownFailure) + 'static) -> Self {
        self.on_lockdown_fail = Some(Rc::new(f));
        self
    }

    pub fn on_state_change(mut self, f: impl Fn(&SessionSnapshot) + 'static) -> Self {
        self.on_state_change = Some(Rc::new(f));
        self
    }

    /// Run `f` before whatever violation handler is already registered.
    pub fn tap_violation(mut self, f: impl Fn(&Violation) + 'static) -> Self {
        let existing = self.on_violation.take();
        self.on_violation = Some(Rc::new(move |violation: &Violation| {
            f(violation);
            if let Some(next) = existing.as_ref() {
                next(violation);
            }
        }));
        self
    }

    /// Run `f` before whatever state handler is already registered.
    pub fn tap_state(mut self, f: impl Fn(&SessionSnapshot) + 'static) -> Self {
        let existing = self.on_state_change.take();
        self.on_state_change = Some(Rc::new(move |snapshot: &SessionSnapshot| {
            f(snapshot);
            if let Some(next) = existing.as_ref() {
                next(snapshot);
            }
        }));
        self
    }

    pub fn tap_lockdown_fail(mut self, f: impl Fn(&LockdownFailure) + 'static) -> Self {
        let existing = self.on_lockdown_fail.take();
        self.on_lockdown_fail = Some(Rc::new(move |failure: &LockdownFailure| {
            f(failure);
            if let Some(next) = existing.as_ref() {
                next(failure);
            }
        }));
        self
    }
}

impl fmt::Debug for MonitorCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorCallbacks")
            .field("on_violation", &self.on_violation.is_some())
            .field("on_lockdown_fail", &self.on_lockdown_fail.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}
