//! The seam between the monitor and whatever browser it runs in.

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use super::error::PlatformError;
use super::media::MediaConstraints;
use super::signals::{BrowserSignal, SignalResponse, TrackEvent, TrackStatus};

pub type SignalSink = Rc<dyn Fn(BrowserSignal) -> SignalResponse>;
pub type TrackSink = Rc<dyn Fn(TrackEvent)>;

/// Undoes a registration when dropped.
#[must_use = "dropping a Subscription removes what it registered"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn empty() -> Self {
        Self { release: None }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

/// A held screen wake lock.
pub trait WakeLockHandle {
    fn release(self: Box<Self>);
    /// Called if the system drops the lock on its own (e.g. the tab was hidden).
    fn on_release(&self, callback: Box<dyn FnOnce()>);
}

/// The self-preview element a stream is shown in.
pub trait VideoSurface<S> {
    fn set_muted(&self, muted: bool);
    fn set_plays_inline(&self);
    fn set_source(&self, stream: Option<&S>);
    fn play(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>>;
    fn is_paused(&self) -> bool;
    /// `HTMLMediaElement.readyState`.
    fn ready_state(&self) -> u16;
    fn on_loaded_metadata(&self, callback: Box<dyn FnOnce()>) -> Subscription;
}

/// Browser capabilities the monitor drives.
///
/// Implementations are cheap handles; the monitor clones them into spawned
/// tasks. Everything runs on one thread.
pub trait LockdownPlatform: Clone + 'static {
    type Stream: Clone + 'static;
    type Video: VideoSurface<Self::Stream> + 'static;

    fn is_fullscreen(&self) -> bool;
    fn request_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>>;
    fn exit_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>>;

    fn request_media(
        &self,
        constraints: &MediaConstraints,
    ) -> LocalBoxFuture<'static, Result<Self::Stream, PlatformError>>;
    fn track_status(&self, stream: &Self::Stream) -> Vec<TrackStatus>;
    fn stop_tracks(&self, stream: &Self::Stream);
    fn watch_tracks(&self, stream: &Self::Stream, sink: TrackSink) -> Subscription;

    /// `Ok(None)` when the platform has no wake lock API.
    fn request_wake_lock(
        &self,
    ) -> LocalBoxFuture<'static, Result<Option<Box<dyn WakeLockHandle>>, PlatformError>>;

    fn find_video(&self, element_id: &str) -> Option<Self::Video>;

    /// Register every global listener at once; dropping the result removes them all.
    fn install_listeners(&self, sink: SignalSink) -> Subscription;

    fn now_ms(&self) -> f64;
    fn sleep_ms(&self, ms: u64) -> LocalBoxFuture<'static, ()>;
    fn next_frame(&self) -> LocalBoxFuture<'static, ()>;
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn subscription_releases_once_on_drop() {
        let released = Rc::new(Cell::new(0));
        let counter = released.clone();
        let sub = Subscription::new(move || counter.set(counter.get() + 1));
        assert_eq!(released.get(), 0);
        drop(sub);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn empty_subscription_is_inert() {
        drop(Subscription::empty());
    }
}
