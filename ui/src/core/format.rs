//! Formatting helpers for presenting session state.

use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime};

/// `2 / 3` style counter.
pub fn format_counter(count: u32, max: u32) -> String {
    format!("{count} / {max}")
}

/// Milliseconds since session start as `m:ss`.
pub fn format_elapsed(ms: f64) -> String {
    let total_secs = if ms.is_finite() && ms > 0.0 {
        (ms / 1000.0).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// RFC 3339 timestamp rendered as `YYYY-MM-DD HH:MM` (UTC). Unparseable input is returned unchanged.
pub fn format_timestamp(rfc3339: &str) -> String {
    let display = format_description!("[year]-[month]-[day] [hour]:[minute]");
    OffsetDateTime::parse(rfc3339, &Rfc3339)
        .ok()
        .and_then(|stamp| stamp.format(&display).ok())
        .unwrap_or_else(|| rfc3339.to_string())
}
