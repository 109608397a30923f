//! Exam lockdown: fullscreen enforcement, webcam/mic capture, and violation
//! tracking for a single exam attempt.

pub mod backend;
pub mod config;
pub mod error;
pub mod headless;
mod hook;
pub mod keys;
pub mod media;
mod monitor;
pub mod playback;
pub mod signals;
pub mod violation;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use backend::{LockdownPlatform, Subscription, VideoSurface, WakeLockHandle};
pub use config::{MonitorCallbacks, SecurityConfig};
pub use error::{ConfigError, LockdownFailure, LockdownStep, PlatformError};
pub use hook::{use_exam_security, ExamSecurity, PREVIEW_VIDEO_ID};
pub use keys::KeyStroke;
pub use monitor::SecurityMonitor;
pub use signals::{BrowserSignal, SignalResponse, TrackChange, TrackEvent, TrackKind};
pub use violation::{SessionReport, SessionSnapshot, Violation, ViolationReason};

#[cfg(target_arch = "wasm32")]
pub type DefaultPlatform = web::WebPlatform;
#[cfg(not(target_arch = "wasm32"))]
pub type DefaultPlatform = headless::HeadlessPlatform;
