use std::cell::Cell;
use std::rc::Rc;

use dioxus::prelude::*;

use crate::components::ProctorPanel;
use crate::core::platform;
use crate::core::storage::{self, AttemptOutcome, AttemptRecord};
use crate::security::{
    use_exam_security, DefaultPlatform, ExamSecurity, LockdownPlatform, MonitorCallbacks,
    SecurityMonitor, SessionReport,
};
use crate::t;

const EXAM_CSS: Asset = asset!("/assets/styling/exam.css");

#[derive(Debug, Clone, PartialEq)]
enum ExamPhase {
    Briefing,
    Starting,
    InProgress,
    Finished {
        outcome: AttemptOutcome,
        report: SessionReport,
    },
}

/// One attempt on one monitor. Opening arms the listeners; the first close
/// (submit, termination or leaving the page) tears down and yields the record.
struct AttemptSession<P: LockdownPlatform> {
    monitor: SecurityMonitor<P>,
    open: Cell<bool>,
}

impl<P: LockdownPlatform> AttemptSession<P> {
    fn new(monitor: SecurityMonitor<P>) -> Self {
        Self {
            monitor,
            open: Cell::new(false),
        }
    }

    fn open(&self) -> bool {
        if self.open.replace(true) {
            return false;
        }
        self.monitor.mount();
        true
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn close(&self, outcome: AttemptOutcome) -> Option<AttemptRecord> {
        if !self.open.replace(false) {
            return None;
        }
        self.monitor.teardown();
        Some(AttemptRecord::new(outcome, self.monitor.report()))
    }
}

type Session = Rc<AttemptSession<DefaultPlatform>>;

#[component]
pub fn ExamAttempt() -> Element {
    let _lang_code: Option<Signal<String>> = try_use_context::<Signal<String>>();
    let _lang_marker = _lang_code.as_ref().map(|s| s()).unwrap_or_default();

    let policy = use_hook(storage::load_policy);
    let max_violations = policy.max_violations;
    let security = use_exam_security(policy, MonitorCallbacks::new());

    let phase = use_signal(|| ExamPhase::Briefing);
    let save_error = use_signal(|| Option::<String>::None);

    let session: Session = {
        let monitor = security.monitor().clone();
        use_hook(move || Rc::new(AttemptSession::new(monitor)))
    };

    // Route changes do not fire `beforeunload`; an open attempt is recorded here.
    {
        let session = session.clone();
        use_drop(move || {
            let Some(record) = session.close(AttemptOutcome::Abandoned) else {
                return;
            };
            tracing::warn!(
                violations = record.report.total(),
                "exam page left during an attempt"
            );
            if let Err(err) = storage::append_attempt(&record) {
                tracing::warn!("could not save abandoned attempt: {err}");
            }
            let monitor = session.monitor.clone();
            if monitor.snapshot().is_fullscreen {
                platform::spawn_future(async move { monitor.exit_fullscreen().await });
            }
        });
    }

    // The monitor only reports the threshold; ending the attempt happens here.
    {
        let security = security.clone();
        let session = session.clone();
        use_effect(move || {
            let violations = (security.snapshot)().violations;
            if security.limit_reached() && phase() == ExamPhase::InProgress {
                tracing::warn!(violations, "violation limit reached; terminating attempt");
                finish_attempt(
                    &security,
                    &session,
                    AttemptOutcome::Terminated,
                    phase,
                    save_error,
                );
            }
        });
    }

    let start = {
        let security = security.clone();
        let session = session.clone();
        let mut phase = phase;
        move |_| {
            if *phase.peek() != ExamPhase::Briefing || !session.open() {
                return;
            }
            phase.set(ExamPhase::Starting);
            let security = security.clone();
            spawn(async move {
                let fullscreen = security.enter_fullscreen().await;
                let media = security.start_media().await;
                tracing::info!(fullscreen, media, "exam started");
                if *phase.peek() == ExamPhase::Starting {
                    phase.set(ExamPhase::InProgress);
                }
            });
        }
    };

    let submit = {
        let security = security.clone();
        let session = session.clone();
        move |_| {
            finish_attempt(
                &security,
                &session,
                AttemptOutcome::Submitted,
                phase,
                save_error,
            )
        }
    };

    let current = phase();
    let starting = current == ExamPhase::Starting;

    rsx! {
        document::Link { rel: "stylesheet", href: EXAM_CSS }
        div { style: "display:none", "{_lang_marker}" }
        section { class: "page page-exam",
            h1 { {t!("exam-title")} }

            match current {
                ExamPhase::Briefing | ExamPhase::Starting => rsx! {
                    p { {t!("exam-intro")} }
                    ul { class: "exam__checklist",
                        li { {t!("exam-check-fullscreen")} }
                        li { {t!("exam-check-camera")} }
                        li { {t!("exam-check-focus")} }
                        li { {t!("exam-check-limit", max = max_violations)} }
                    }
                    div { class: "exam__actions",
                        button {
                            r#type: "button",
                            disabled: starting,
                            onclick: start,
                            {t!("exam-start")}
                        }
                    }
                },
                ExamPhase::InProgress => rsx! {
                    ProctorPanel { security: security.clone(), max_violations }
                    div { class: "exam__actions",
                        button {
                            r#type: "button",
                            onclick: submit,
                            {t!("exam-submit")}
                        }
                    }
                },
                ExamPhase::Finished { outcome, report } => rsx! {
                    if outcome == AttemptOutcome::Terminated {
                        div { class: "exam__banner exam__banner--error", {t!("exam-terminated")} }
                    } else {
                        p { {t!("exam-submitted")} }
                    }
                    p { {t!("exam-summary", count = report.total(), max = report.max_violations)} }
                    ul {
                        for (code, count) in report.counts_by_reason.iter() {
                            li { key: "{code}", "{code}: {count}" }
                        }
                    }
                    if !report.lockdown_failures.is_empty() {
                        h3 { {t!("exam-failures-title")} }
                        ul {
                            for failure in report.lockdown_failures.iter() {
                                li { "{failure.reason}" }
                            }
                        }
                    }
                },
            }

            if let Some(err) = save_error() {
                div { class: "exam__banner exam__banner--error", "{err}" }
            }
        }
    }
}

/// End the attempt: release every lockdown, leave fullscreen, persist the report.
fn finish_attempt(
    security: &ExamSecurity,
    session: &Session,
    outcome: AttemptOutcome,
    mut phase: Signal<ExamPhase>,
    mut save_error: Signal<Option<String>>,
) {
    if !session.is_open() || matches!(*phase.peek(), ExamPhase::Finished { .. }) {
        return;
    }
    let Some(record) = session.close(outcome) else {
        return;
    };

    match storage::append_attempt(&record) {
        Ok(()) => save_error.set(None),
        Err(err) => save_error.set(Some(format!("Failed to save attempt: {err}"))),
    }

    phase.set(ExamPhase::Finished {
        outcome,
        report: record.report,
    });

    let security = security.clone();
    spawn(async move {
        security.exit_fullscreen().await;
    });
}
