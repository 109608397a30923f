use dioxus::prelude::*;
use futures_util::StreamExt;

use super::config::{MonitorCallbacks, SecurityConfig};
use super::error::LockdownFailure;
use super::monitor::SecurityMonitor;
use super::violation::{SessionSnapshot, Violation};
use super::DefaultPlatform;

/// Monitor callbacks can fire mid-render or inside an event handler, so they
/// are forwarded through a coroutine instead of writing signals directly.
#[derive(Debug, Clone)]
enum MonitorUpdate {
    State(SessionSnapshot),
    Violation(Violation),
    Failure(LockdownFailure),
}

/// DOM id of the self-preview `<video>` rendered by the host.
pub const PREVIEW_VIDEO_ID: &str = "exam-security-preview";

/// Reactive handle returned by [`use_exam_security`].
#[derive(Clone, PartialEq)]
pub struct ExamSecurity {
    monitor: SecurityMonitor<DefaultPlatform>,
    pub video_id: &'static str,
    pub snapshot: Signal<SessionSnapshot>,
    pub violations: Signal<Vec<Violation>>,
    pub failures: Signal<Vec<LockdownFailure>>,
}

impl ExamSecurity {
    pub fn monitor(&self) -> &SecurityMonitor<DefaultPlatform> {
        &self.monitor
    }

    /// Attach the preview element once it is in the DOM.
    pub fn bind_video(&self) -> bool {
        self.monitor.bind_video_element(self.video_id)
    }

    pub async fn enter_fullscreen(&self) -> bool {
        self.monitor.enter_fullscreen().await
    }

    pub async fn exit_fullscreen(&self) {
        self.monitor.exit_fullscreen().await
    }

    pub async fn start_media(&self) -> bool {
        self.monitor.start_media().await
    }

    pub fn stop_media(&self) {
        self.monitor.stop_media()
    }

    pub fn limit_reached(&self) -> bool {
        self.monitor.limit_reached()
    }
}

/// Create a monitor for the calling component and tear it down when the
/// component unmounts. `config` and `callbacks` are read once.
///
/// The monitor starts unmounted: nothing is counted until the host calls
/// [`SecurityMonitor::mount`], normally when the attempt begins.
pub fn use_exam_security(config: SecurityConfig, callbacks: MonitorCallbacks) -> ExamSecurity {
    let snapshot = use_signal(SessionSnapshot::default);
    let violations = use_signal(Vec::<Violation>::new);
    let failures = use_signal(Vec::<LockdownFailure>::new);

    let bridge = use_coroutine(move |mut rx: UnboundedReceiver<MonitorUpdate>| {
        let mut snapshot_signal = snapshot;
        let mut violations_signal = violations;
        let mut failures_signal = failures;

        async move {
            while let Some(update) = rx.next().await {
                match update {
                    MonitorUpdate::State(next) => {
                        if *snapshot_signal.peek() != next {
                            snapshot_signal.set(next);
                        }
                    }
                    MonitorUpdate::Violation(violation) => {
                        violations_signal.write().push(violation);
                    }
                    MonitorUpdate::Failure(failure) => {
                        failures_signal.write().push(failure);
                    }
                }
            }
        }
    });

    let monitor = use_hook(move || {
        let tx = bridge.tx();
        let state_tx = tx.clone();
        let violation_tx = tx.clone();
        let callbacks = callbacks
            .tap_state(move |snapshot| {
                let _ = state_tx.unbounded_send(MonitorUpdate::State(snapshot.clone()));
            })
            .tap_violation(move |violation| {
                let _ = violation_tx.unbounded_send(MonitorUpdate::Violation(violation.clone()));
            })
            .tap_lockdown_fail(move |failure| {
                let _ = tx.unbounded_send(MonitorUpdate::Failure(failure.clone()));
            });

        SecurityMonitor::new(DefaultPlatform::default(), config, callbacks)
    });

    {
        let monitor = monitor.clone();
        use_drop(move || monitor.teardown());
    }

    ExamSecurity {
        monitor,
        video_id: PREVIEW_VIDEO_ID,
        snapshot,
        violations,
        failures,
    }
}
