use dioxus::prelude::*;

use crate::core::format;
use crate::security::ExamSecurity;
use crate::t;

/// Live proctoring status: camera preview, lockdown state, and the violation log.
#[component]
pub fn ProctorPanel(security: ExamSecurity, max_violations: u32) -> Element {
    let snapshot = (security.snapshot)();
    let violations = (security.violations)();
    let failures = (security.failures)();

    let at_limit = snapshot.violations >= max_violations;
    let counter = format::format_counter(snapshot.violations, max_violations);
    let counter_class = if at_limit {
        "proctor-panel__counter proctor-panel__counter--limit"
    } else {
        "proctor-panel__counter"
    };

    let camera_status = if snapshot.is_requesting_media {
        t!("panel-camera-requesting")
    } else if snapshot.media_active {
        t!("panel-camera-live")
    } else {
        t!("panel-camera-off")
    };
    let fullscreen_status = if snapshot.is_fullscreen {
        t!("panel-fullscreen-on")
    } else {
        t!("panel-fullscreen-off")
    };

    let video_id = security.video_id;
    let binder = security.clone();

    rsx! {
        section { class: "proctor-panel",
            video {
                id: "{video_id}",
                class: "proctor-panel__preview",
                autoplay: true,
                muted: true,
                playsinline: true,
                onmounted: move |_| {
                    binder.bind_video();
                },
            }

            div { class: "proctor-panel__status",
                p {
                    {t!("panel-violations-label")}
                    " "
                    span { class: "{counter_class}", "{counter}" }
                }
                p { {t!("panel-fullscreen-label")} " " "{fullscreen_status}" }
                p { {t!("panel-camera-label")} " " "{camera_status}" }

                if let Some(err) = snapshot.media_error.clone() {
                    div { class: "exam__banner exam__banner--warning", "{err}" }
                }

                for failure in failures.iter() {
                    div { class: "exam__banner exam__banner--error", "{failure.reason}" }
                }

                if !violations.is_empty() {
                    h3 { {t!("panel-log-title")} }
                    ol { class: "proctor-panel__log",
                        for violation in violations.iter().rev() {
                            li { key: "{violation.sequence}",
                                "{format::format_elapsed(violation.session_ms)} "
                                "{violation.message()}"
                            }
                        }
                    }
                }
            }
        }
    }
}
