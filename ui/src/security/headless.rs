//! Platform for native builds, where there is no browser to lock down.
//!
//! Every lockdown request fails as unsupported, so hosts see the same
//! `on_lockdown_fail` path they would for a browser without the APIs.

use std::convert::Infallible;

use futures::future::{self, FutureExt, LocalBoxFuture};

use super::backend::{
    LockdownPlatform, SignalSink, Subscription, TrackSink, VideoSurface, WakeLockHandle,
};
use super::error::PlatformError;
use super::media::MediaConstraints;
use super::signals::TrackStatus;
use crate::core::{platform, timing};

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPlatform;

/// Never constructed: capture always fails here.
#[derive(Debug, Clone)]
pub struct HeadlessStream(Infallible);

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessVideo;

impl VideoSurface<HeadlessStream> for HeadlessVideo {
    fn set_muted(&self, _muted: bool) {}

    fn set_plays_inline(&self) {}

    fn set_source(&self, _stream: Option<&HeadlessStream>) {}

    fn play(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        future::ready(Err(PlatformError::Unsupported("video playback"))).boxed_local()
    }

    fn is_paused(&self) -> bool {
        true
    }

    fn ready_state(&self) -> u16 {
        0
    }

    fn on_loaded_metadata(&self, _callback: Box<dyn FnOnce()>) -> Subscription {
        Subscription::empty()
    }
}

impl LockdownPlatform for HeadlessPlatform {
    type Stream = HeadlessStream;
    type Video = HeadlessVideo;

    fn is_fullscreen(&self) -> bool {
        false
    }

    fn request_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        future::ready(Err(PlatformError::Unsupported("fullscreen"))).boxed_local()
    }

    fn exit_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        future::ready(Ok(())).boxed_local()
    }

    fn request_media(
        &self,
        _constraints: &MediaConstraints,
    ) -> LocalBoxFuture<'static, Result<HeadlessStream, PlatformError>> {
        future::ready(Err(PlatformError::Unsupported("camera/microphone capture"))).boxed_local()
    }

    fn track_status(&self, stream: &HeadlessStream) -> Vec<TrackStatus> {
        match stream.0 {}
    }

    fn stop_tracks(&self, stream: &HeadlessStream) {
        match stream.0 {}
    }

    fn watch_tracks(&self, stream: &HeadlessStream, _sink: TrackSink) -> Subscription {
        match stream.0 {}
    }

    fn request_wake_lock(
        &self,
    ) -> LocalBoxFuture<'static, Result<Option<Box<dyn WakeLockHandle>>, PlatformError>> {
        future::ready(Ok(None)).boxed_local()
    }

    fn find_video(&self, _element_id: &str) -> Option<HeadlessVideo> {
        None
    }

    fn install_listeners(&self, _sink: SignalSink) -> Subscription {
        Subscription::empty()
    }

    fn now_ms(&self) -> f64 {
        timing::now_ms()
    }

    fn sleep_ms(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        timing::sleep_ms(ms).boxed_local()
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        timing::next_frame().boxed_local()
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        platform::spawn_future(task);
    }
}
