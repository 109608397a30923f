use dioxus::prelude::*;

use crate::components::PolicySettings;
use crate::core::storage::{self, AttemptOutcome};
use crate::core::format;

fn outcome_label(outcome: AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Submitted => crate::t!("history-outcome-submitted"),
        AttemptOutcome::Terminated => crate::t!("history-outcome-terminated"),
        AttemptOutcome::Abandoned => crate::t!("history-outcome-abandoned"),
    }
}

#[component]
pub fn Home() -> Element {
    // Subscribe to the global language code (if provided) so we re-render on change.
    let _lang_code: Option<Signal<String>> = try_use_context::<Signal<String>>();
    let _lang_marker = _lang_code.as_ref().map(|s| s()).unwrap_or_default();

    let mut attempts = use_signal(storage::load_attempts);
    let mut clear_error = use_signal(|| Option::<String>::None);
    let recent: Vec<_> = attempts().iter().rev().take(5).cloned().collect();

    let clear = move |_| match storage::clear_attempts() {
        Ok(()) => {
            tracing::info!("attempt history cleared");
            attempts.set(Vec::new());
            clear_error.set(None);
        }
        Err(err) => clear_error.set(Some(err.to_string())),
    };

    rsx! {
        div { style: "display:none", "{_lang_marker}" }
        section { class: "page page-home",
            h1 { {crate::t!("home-title")} }
            p { {crate::t!("home-intro")} }

            ul { class: "page-home__features",
                li { {crate::t!("home-feature-fullscreen")} }
                li { {crate::t!("home-feature-camera")} }
                li { {crate::t!("home-feature-violations")} }
            }
            p { class: "page-home__cta", {crate::t!("home-cta")} }

            if !recent.is_empty() {
                h2 { {crate::t!("home-history-title")} }
                ul { class: "page-home__history",
                    for record in recent {
                        li { key: "{record.id}",
                            "{format::format_timestamp(&record.created_at)} · "
                            "{outcome_label(record.outcome)} · "
                            "{format::format_counter(record.report.total(), record.report.max_violations)}"
                        }
                    }
                }
                button { r#type: "button", onclick: clear, {crate::t!("home-clear-history")} }
            }
            if let Some(err) = clear_error() {
                div { class: "notice notice--error", "{err}" }
            }

            PolicySettings {}
        }
    }
}
