//! Error types for the lockdown platform seam and policy loading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A browser API refused or could not perform a lockdown action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("fullscreen request was rejected: {0}")]
    FullscreenRejected(String),
    #[error("camera/microphone permission denied")]
    PermissionDenied,
    #[error("no camera or microphone found")]
    DeviceNotFound,
    #[error("camera or microphone is already in use")]
    DeviceBusy,
    #[error("{0} is not available in this environment")]
    Unsupported(&'static str),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid security policy: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("maxViolations must be at least 1")]
    ZeroViolationLimit,
    #[error("playbackRetryAttempts must be at least 1")]
    ZeroPlaybackAttempts,
}

/// Which lockdown step could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockdownStep {
    Fullscreen,
    Media,
}

/// A required lockdown action that failed. Reported to the host, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockdownFailure {
    pub step: LockdownStep,
    pub reason: String,
}

pub const FULLSCREEN_DENIED: &str = "Fullscreen request was denied";

impl LockdownFailure {
    pub fn fullscreen() -> Self {
        Self {
            step: LockdownStep::Fullscreen,
            reason: FULLSCREEN_DENIED.to_string(),
        }
    }

    pub fn media(message: &str) -> Self {
        Self {
            step: LockdownStep::Media,
            reason: format!("Webcam/microphone unavailable: {message}"),
        }
    }
}

/// Human message stored as the session's media error for a failed capture.
pub fn media_failure_message(err: &PlatformError) -> String {
    match err {
        PlatformError::PermissionDenied => "Camera/microphone permission denied".to_string(),
        PlatformError::DeviceNotFound => "No camera or microphone was found".to_string(),
        PlatformError::DeviceBusy => {
            "Camera or microphone is being used by another application".to_string()
        }
        PlatformError::Unsupported(_) => {
            "Camera/microphone capture is not supported in this browser".to_string()
        }
        PlatformError::FullscreenRejected(detail) | PlatformError::Other(detail) => {
            format!("Could not start camera/microphone: {detail}")
        }
    }
}
