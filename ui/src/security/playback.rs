//! Getting a freshly assigned stream to actually play in the preview.
//!
//! `play()` races metadata loading and autoplay policy, so a single call is
//! not enough. The driver tries immediately, again on the next animation
//! frame, then on a bounded timer loop until the element is playing. Every
//! rejection is swallowed. `is_current` is checked between steps so a newer
//! stream (or teardown) stops an old loop.

use futures::future::LocalBoxFuture;
use tracing::debug;

use super::backend::{LockdownPlatform, VideoSurface};

/// `HTMLMediaElement.HAVE_CURRENT_DATA`.
pub const HAVE_CURRENT_DATA: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPlan {
    pub attempts: u32,
    pub interval_ms: u64,
}

pub trait PlaybackClock {
    fn sleep_ms(&self, ms: u64) -> LocalBoxFuture<'static, ()>;
    fn next_frame(&self) -> LocalBoxFuture<'static, ()>;
}

impl<P: LockdownPlatform> PlaybackClock for P {
    fn sleep_ms(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        LockdownPlatform::sleep_ms(self, ms)
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        LockdownPlatform::next_frame(self)
    }
}

pub fn is_playing<S, V: VideoSurface<S> + ?Sized>(video: &V) -> bool {
    !video.is_paused() && video.ready_state() >= HAVE_CURRENT_DATA
}

pub async fn try_play<S, V: VideoSurface<S> + ?Sized>(video: &V) {
    if let Err(err) = video.play().await {
        debug!("preview play() rejected: {err}");
    }
}

/// Returns `true` once the element is playing, `false` if cancelled or out of attempts.
pub async fn drive_playback<S, V, C, F>(
    video: &V,
    clock: &C,
    plan: PlaybackPlan,
    is_current: F,
) -> bool
where
    V: VideoSurface<S> + ?Sized,
    C: PlaybackClock,
    F: Fn() -> bool,
{
    try_play::<S, V>(video).await;
    if !is_current() {
        return false;
    }

    clock.next_frame().await;
    if !is_current() {
        return false;
    }
    try_play::<S, V>(video).await;

    for attempt in 0..plan.attempts {
        if !is_current() {
            return false;
        }
        if is_playing::<S, V>(video) {
            debug!(attempt, "preview playing");
            return true;
        }
        clock.sleep_ms(plan.interval_ms).await;
        if !is_current() {
            return false;
        }
        try_play::<S, V>(video).await;
    }

    let playing = is_current() && is_playing::<S, V>(video);
    if !playing {
        debug!(attempts = plan.attempts, "preview still paused after retries");
    }
    playing
}
