//! Violations, the append-only ledger, and the state published to hosts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::error::LockdownFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum ViolationReason {
    TabHidden,
    WindowBlurred,
    ExitedFullscreen,
    ContextMenu,
    BlockedKey(String),
}

impl ViolationReason {
    /// Stable identifier used when grouping violations in reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TabHidden => "tab_hidden",
            Self::WindowBlurred => "window_blurred",
            Self::ExitedFullscreen => "exited_fullscreen",
            Self::ContextMenu => "context_menu",
            Self::BlockedKey(_) => "blocked_key",
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TabHidden => f.write_str("Tab switched or window hidden"),
            Self::WindowBlurred => f.write_str("Window blurred"),
            Self::ExitedFullscreen => f.write_str("Exited fullscreen"),
            Self::ContextMenu => f.write_str("Context menu opened"),
            Self::BlockedKey(key) => write!(f, "Blocked key: {key}"),
        }
    }
}

/// One recorded infraction. `sequence` is the cumulative count after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub sequence: u32,
    pub reason: ViolationReason,
    /// Milliseconds since the monitor was created, on the platform clock.
    pub session_ms: f64,
    pub recorded_at: String,
}

impl Violation {
    pub fn message(&self) -> String {
        self.reason.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViolationLedger {
    entries: Vec<Violation>,
}

impl ViolationLedger {
    pub fn record(&mut self, reason: ViolationReason, session_ms: f64) -> Violation {
        let sequence = self.count().saturating_add(1);
        let recorded_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let violation = Violation {
            sequence,
            reason,
            session_ms,
            recorded_at,
        };
        self.entries.push(violation.clone());
        violation
    }

    pub fn count(&self) -> u32 {
        u32::try_from(self.entries.len()).unwrap_or(u32::MAX)
    }

    pub fn entries(&self) -> &[Violation] {
        &self.entries
    }
}

/// Reactive state of a session, republished after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub violations: u32,
    pub is_fullscreen: bool,
    pub media_active: bool,
    pub is_requesting_media: bool,
    pub media_error: Option<String>,
}

/// Everything the host may want to persist once an attempt ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub max_violations: u32,
    pub limit_reached: bool,
    pub violations: Vec<Violation>,
    pub counts_by_reason: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lockdown_failures: Vec<LockdownFailure>,
}

impl SessionReport {
    pub fn build(
        max_violations: u32,
        ledger: &ViolationLedger,
        lockdown_failures: Vec<LockdownFailure>,
    ) -> Self {
        let mut counts_by_reason = BTreeMap::new();
        for violation in ledger.entries() {
            *counts_by_reason
                .entry(violation.reason.code().to_string())
                .or_insert(0u32) += 1;
        }

        Self {
            max_violations,
            limit_reached: ledger.count() >= max_violations,
            violations: ledger.entries().to_vec(),
            counts_by_reason,
            lockdown_failures,
        }
    }

    pub fn total(&self) -> u32 {
        u32::try_from(self.violations.len()).unwrap_or(u32::MAX)
    }
}
