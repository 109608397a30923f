//! Local persistence for finished attempts and the lockdown policy.
//!
//! The web build keeps a JSON array in `localStorage`; native builds write the
//! same JSON to a file under the OS data directory.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::device::DeviceSnapshot;
use crate::security::{ConfigError, SecurityConfig, SessionReport};

const ATTEMPTS_KEY: &str = "proctorlock.attempts.v1";
const POLICY_KEY: &str = "proctorlock.policy.v1";
/// Where an undecodable history is moved before a new attempt is written.
const QUARANTINE_KEY: &str = "proctorlock.attempts.v1.corrupt";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("could not encode attempts: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Policy(#[from] ConfigError),
    #[cfg(not(target_arch = "wasm32"))]
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Submitted,
    Terminated,
    /// The exam page was left while the attempt was still open.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: String,
    pub created_at: String,
    pub device: DeviceSnapshot,
    pub outcome: AttemptOutcome,
    pub report: SessionReport,
}

impl AttemptRecord {
    pub fn new(outcome: AttemptOutcome, report: SessionReport) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            device: DeviceSnapshot::capture(),
            outcome,
            report,
        }
    }
}

pub fn append_attempt(record: &AttemptRecord) -> Result<(), StorageError> {
    let raw = backend::read(ATTEMPTS_KEY);
    let merged = merge_history(raw.as_deref(), record);
    if let Some(corrupt) = &merged.quarantine {
        backend::write(QUARANTINE_KEY, corrupt)?;
        warn!(key = QUARANTINE_KEY, "unreadable attempt history moved aside");
    }
    let encoded = serde_json::to_string(&merged.attempts)?;
    backend::write(ATTEMPTS_KEY, &encoded)?;
    debug!(id = %record.id, total = merged.attempts.len(), "attempt persisted");
    Ok(())
}

/// History to write after appending, plus the stored blob when it could not be read.
#[derive(Debug)]
struct MergedHistory {
    attempts: Vec<AttemptRecord>,
    quarantine: Option<String>,
}

fn merge_history(raw: Option<&str>, record: &AttemptRecord) -> MergedHistory {
    let (mut attempts, quarantine) = match raw {
        None => (Vec::new(), None),
        Some(raw) => match serde_json::from_str::<Vec<AttemptRecord>>(raw) {
            Ok(attempts) => (attempts, None),
            Err(err) => {
                warn!("stored attempt history is unreadable: {err}");
                (Vec::new(), Some(raw.to_string()))
            }
        },
    };
    attempts.push(record.clone());
    MergedHistory {
        attempts,
        quarantine,
    }
}

/// Stored attempts, oldest first. Unreadable data yields an empty list.
pub fn load_attempts() -> Vec<AttemptRecord> {
    let Some(raw) = backend::read(ATTEMPTS_KEY) else {
        return Vec::new();
    };
    decode_attempts(&raw)
}

pub fn clear_attempts() -> Result<(), StorageError> {
    backend::remove(ATTEMPTS_KEY)
}

/// The stored lockdown policy, or the defaults when none is saved or it is invalid.
pub fn load_policy() -> SecurityConfig {
    match backend::read(POLICY_KEY).map(|raw| SecurityConfig::from_json(&raw)) {
        Some(Ok(config)) => config,
        Some(Err(err)) => {
            warn!("ignoring stored security policy: {err}");
            SecurityConfig::default()
        }
        None => SecurityConfig::default(),
    }
}

pub fn save_policy(config: &SecurityConfig) -> Result<(), StorageError> {
    config.validate()?;
    let encoded = serde_json::to_string(config)?;
    backend::write(POLICY_KEY, &encoded)
}

fn decode_attempts(raw: &str) -> Vec<AttemptRecord> {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!("discarding unreadable attempt history: {err}");
        Vec::new()
    })
}

#[cfg(target_arch = "wasm32")]
mod backend {
    use super::StorageError;
    use web_sys::Storage;

    fn local_storage() -> Result<Storage, StorageError> {
        web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".into()))?
            .local_storage()
            .map_err(|_| StorageError::Unavailable("localStorage access denied".into()))?
            .ok_or_else(|| StorageError::Unavailable("localStorage missing".into()))
    }

    pub fn read(key: &str) -> Option<String> {
        local_storage().ok()?.get_item(key).ok().flatten()
    }

    pub fn write(key: &str, value: &str) -> Result<(), StorageError> {
        local_storage()?
            .set_item(key, value)
            .map_err(|_| StorageError::Unavailable("localStorage quota exceeded".into()))
    }

    pub fn remove(key: &str) -> Result<(), StorageError> {
        local_storage()?
            .remove_item(key)
            .map_err(|_| StorageError::Unavailable("localStorage access denied".into()))
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod backend {
    use std::fs;
    use std::path::PathBuf;

    use super::StorageError;

    fn data_dir() -> Result<PathBuf, StorageError> {
        let dirs = directories::ProjectDirs::from("com", "Proctorlock", "Proctorlock")
            .ok_or_else(|| StorageError::Unavailable("no data directory".into()))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    fn path_for(key: &str) -> Result<PathBuf, StorageError> {
        Ok(data_dir()?.join(format!("{key}.json")))
    }

    pub fn read(key: &str) -> Option<String> {
        fs::read_to_string(path_for(key).ok()?).ok()
    }

    pub fn write(key: &str, value: &str) -> Result<(), StorageError> {
        let path = path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, value)?;
        Ok(())
    }

    pub fn remove(key: &str) -> Result<(), StorageError> {
        match fs::remove_file(path_for(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::violation::ViolationLedger;
    use crate::security::ViolationReason;

    #[test]
    fn record_carries_report_and_fresh_id() {
        let mut ledger = ViolationLedger::default();
        ledger.record(ViolationReason::TabHidden, 12.0);
        let report = SessionReport::build(3, &ledger, Vec::new());

        let first = AttemptRecord::new(AttemptOutcome::Submitted, report.clone());
        let second = AttemptRecord::new(AttemptOutcome::Terminated, report);
        assert_ne!(first.id, second.id);
        assert_eq!(first.report.total(), 1);
        assert!(!first.created_at.is_empty());
    }

    #[test]
    fn attempts_decode_from_stored_json() {
        let record = AttemptRecord::new(
            AttemptOutcome::Terminated,
            SessionReport::build(3, &ViolationLedger::default(), Vec::new()),
        );
        let raw = serde_json::to_string(&vec![record.clone()]).expect("encode");
        assert_eq!(decode_attempts(&raw), vec![record]);
    }

    #[test]
    fn corrupt_history_reads_as_empty() {
        assert!(decode_attempts("[{\"id\":").is_empty());
    }

    fn sample(outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord::new(
            outcome,
            SessionReport::build(3, &ViolationLedger::default(), Vec::new()),
        )
    }

    #[test]
    fn appending_keeps_existing_history() {
        let first = sample(AttemptOutcome::Submitted);
        let raw = serde_json::to_string(&vec![first.clone()]).expect("encode");
        let second = sample(AttemptOutcome::Abandoned);

        let merged = merge_history(Some(&raw), &second);
        assert_eq!(merged.attempts, vec![first, second]);
        assert!(merged.quarantine.is_none());

        let fresh = merge_history(None, &sample(AttemptOutcome::Terminated));
        assert_eq!(fresh.attempts.len(), 1);
        assert!(fresh.quarantine.is_none());
    }

    #[test]
    fn unreadable_history_is_set_aside_not_overwritten() {
        let raw = "[{\"id\":";
        let record = sample(AttemptOutcome::Submitted);

        let merged = merge_history(Some(raw), &record);
        assert_eq!(merged.quarantine.as_deref(), Some(raw));
        assert_eq!(merged.attempts, vec![record]);
    }

    #[test]
    fn outcomes_use_snake_case() {
        let encoded = serde_json::to_string(&AttemptOutcome::Abandoned).expect("encode");
        assert_eq!(encoded, "\"abandoned\"");
    }
}
