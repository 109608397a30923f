use dioxus::prelude::*;

use crate::core::storage;
use crate::security::SecurityConfig;
use crate::t;

const SETTINGS_CSS: Asset = asset!("/assets/styling/settings.css");

/// Parse the violation limit field; blank or non-numeric input is rejected.
fn parse_limit(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

/// Editor for the stored lockdown policy read by the exam page.
#[component]
pub fn PolicySettings() -> Element {
    let mut draft = use_signal(storage::load_policy);
    let mut limit_text = use_signal(|| draft.peek().max_violations.to_string());
    let mut status = use_signal(|| Option::<Result<(), String>>::None);

    let on_limit = move |evt: FormEvent| {
        let value = evt.value();
        if let Some(limit) = parse_limit(&value) {
            draft.write().max_violations = limit;
        }
        limit_text.set(value);
        status.set(None);
    };

    let save = move |_| {
        let config: SecurityConfig = draft();
        let result = match parse_limit(&limit_text()) {
            Some(_) => storage::save_policy(&config).map_err(|err| err.to_string()),
            None => Err(t!("settings-invalid-limit")),
        };
        match &result {
            Ok(()) => tracing::info!(max_violations = config.max_violations, "policy saved"),
            Err(err) => tracing::warn!("policy not saved: {err}"),
        }
        status.set(Some(result));
    };

    let current = draft();

    rsx! {
        document::Link { rel: "stylesheet", href: SETTINGS_CSS }
        section { class: "policy-settings",
            h2 { {t!("settings-title")} }
            label { class: "policy-settings__field",
                span { {t!("settings-max-violations")} }
                input {
                    r#type: "number",
                    min: "1",
                    value: "{limit_text}",
                    oninput: on_limit,
                }
            }
            label { class: "policy-settings__field",
                input {
                    r#type: "checkbox",
                    checked: current.require_fullscreen,
                    onchange: move |evt: FormEvent| {
                        draft.write().require_fullscreen = evt.checked();
                        status.set(None);
                    },
                }
                span { {t!("settings-require-fullscreen")} }
            }
            label { class: "policy-settings__field",
                input {
                    r#type: "checkbox",
                    checked: current.require_webcam_mic,
                    onchange: move |evt: FormEvent| {
                        draft.write().require_webcam_mic = evt.checked();
                        status.set(None);
                    },
                }
                span { {t!("settings-require-camera")} }
            }
            div { class: "policy-settings__actions",
                button { r#type: "button", onclick: save, {t!("settings-save")} }
            }
            match status() {
                Some(Ok(())) => rsx! { p { class: "policy-settings__status", {t!("settings-saved")} } },
                Some(Err(err)) => rsx! { div { class: "notice notice--error", "{err}" } },
                None => rsx! {},
            }
        }
    }
}
