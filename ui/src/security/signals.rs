//! Browser-originated signals consumed by the monitor.

use super::keys::KeyStroke;

/// One global browser event, already decoded from the DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSignal {
    VisibilityChanged { hidden: bool },
    WindowBlurred,
    /// The platform is queried for the real state when this arrives.
    FullscreenChanged,
    ContextMenu,
    KeyDown(KeyStroke),
    BeforeUnload,
}

/// What the listener should do with the originating DOM event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalResponse {
    pub prevent_default: bool,
    /// Ask the browser to show its native leave-page confirmation.
    pub confirm_unload: bool,
}

impl SignalResponse {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn prevent() -> Self {
        Self {
            prevent_default: true,
            confirm_unload: false,
        }
    }

    pub fn confirm_unload() -> Self {
        Self {
            prevent_default: true,
            confirm_unload: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// Maps `MediaStreamTrack.kind`.
    pub fn from_kind(kind: &str) -> Self {
        if kind == "audio" {
            Self::Audio
        } else {
            Self::Video
        }
    }

    pub fn device_label(self) -> &'static str {
        match self {
            Self::Video => "Camera",
            Self::Audio => "Microphone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackReadiness {
    Live,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackStatus {
    pub kind: TrackKind,
    pub readiness: TrackReadiness,
    pub muted: bool,
}

impl TrackStatus {
    pub fn is_live(&self) -> bool {
        self.readiness == TrackReadiness::Live
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChange {
    Ended,
    Muted,
    Unmuted,
}

/// A liveness change on one track of the active capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    pub kind: TrackKind,
    pub change: TrackChange,
}
