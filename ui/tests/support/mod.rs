//! Scripted in-memory platform for driving the monitor in tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;

use ui::security::backend::{SignalSink, TrackSink};
use ui::security::media::MediaConstraints;
use ui::security::signals::{TrackReadiness, TrackStatus};
use ui::security::{
    BrowserSignal, LockdownFailure, LockdownPlatform, MonitorCallbacks, PlatformError,
    SecurityConfig, SecurityMonitor, SessionSnapshot, SignalResponse, Subscription, TrackChange,
    TrackEvent, TrackKind, VideoSurface, WakeLockHandle,
};

// ---------------------------------------------------------------------------
// Streams and tracks

struct FakeTrack {
    kind: TrackKind,
    readiness: TrackReadiness,
    muted: bool,
}

struct StreamInner {
    id: u32,
    tracks: RefCell<Vec<FakeTrack>>,
    sinks: RefCell<Vec<(u32, TrackSink)>>,
    next_sink: Cell<u32>,
}

#[derive(Clone)]
pub struct FakeStream(Rc<StreamInner>);

impl FakeStream {
    fn new(id: u32) -> Self {
        let track = |kind| FakeTrack {
            kind,
            readiness: TrackReadiness::Live,
            muted: false,
        };
        Self(Rc::new(StreamInner {
            id,
            tracks: RefCell::new(vec![track(TrackKind::Video), track(TrackKind::Audio)]),
            sinks: RefCell::new(Vec::new()),
            next_sink: Cell::new(0),
        }))
    }

    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn all_stopped(&self) -> bool {
        self.0
            .tracks
            .borrow()
            .iter()
            .all(|track| track.readiness == TrackReadiness::Ended)
    }

    pub fn watcher_count(&self) -> usize {
        self.0.sinks.borrow().len()
    }

    /// Simulate the device dropping every track (sleep, unplug) and fire `ended`.
    pub fn end_all(&self) {
        let kinds: Vec<TrackKind> = {
            let mut tracks = self.0.tracks.borrow_mut();
            tracks
                .iter_mut()
                .map(|track| {
                    track.readiness = TrackReadiness::Ended;
                    track.kind
                })
                .collect()
        };
        for kind in kinds {
            self.emit(TrackEvent {
                kind,
                change: TrackChange::Ended,
            });
        }
    }

    pub fn set_muted(&self, kind: TrackKind, muted: bool) {
        for track in self.0.tracks.borrow_mut().iter_mut() {
            if track.kind == kind {
                track.muted = muted;
            }
        }
        let change = if muted {
            TrackChange::Muted
        } else {
            TrackChange::Unmuted
        };
        self.emit(TrackEvent { kind, change });
    }

    fn emit(&self, event: TrackEvent) {
        let sinks: Vec<TrackSink> = self
            .0
            .sinks
            .borrow()
            .iter()
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in sinks {
            sink(event);
        }
    }

    fn stop(&self) {
        for track in self.0.tracks.borrow_mut().iter_mut() {
            track.readiness = TrackReadiness::Ended;
        }
    }
}

// ---------------------------------------------------------------------------
// Preview element

struct VideoInner {
    source: RefCell<Option<u32>>,
    muted: Cell<bool>,
    inline: Cell<bool>,
    paused: Cell<bool>,
    plays: Cell<u32>,
    /// `play()` starts succeeding on this call number.
    succeed_on: Cell<u32>,
    metadata: RefCell<Option<Box<dyn FnOnce()>>>,
}

#[derive(Clone)]
pub struct FakeVideo(Rc<VideoInner>);

impl FakeVideo {
    pub fn new(succeed_on: u32) -> Self {
        Self(Rc::new(VideoInner {
            source: RefCell::new(None),
            muted: Cell::new(false),
            inline: Cell::new(false),
            paused: Cell::new(true),
            plays: Cell::new(0),
            succeed_on: Cell::new(succeed_on),
            metadata: RefCell::new(None),
        }))
    }

    pub fn source(&self) -> Option<u32> {
        *self.0.source.borrow()
    }

    pub fn plays(&self) -> u32 {
        self.0.plays.get()
    }

    pub fn is_playing(&self) -> bool {
        !self.0.paused.get()
    }

    pub fn is_muted(&self) -> bool {
        self.0.muted.get()
    }

    pub fn is_inline(&self) -> bool {
        self.0.inline.get()
    }

    pub fn fire_loaded_metadata(&self) {
        let callback = self.0.metadata.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl VideoSurface<FakeStream> for FakeVideo {
    fn set_muted(&self, muted: bool) {
        self.0.muted.set(muted);
    }

    fn set_plays_inline(&self) {
        self.0.inline.set(true);
    }

    fn set_source(&self, stream: Option<&FakeStream>) {
        *self.0.source.borrow_mut() = stream.map(FakeStream::id);
        self.0.paused.set(true);
    }

    fn play(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        let count = self.0.plays.get() + 1;
        self.0.plays.set(count);
        if self.0.source.borrow().is_some() && count >= self.0.succeed_on.get() {
            self.0.paused.set(false);
            future::ready(Ok(())).boxed_local()
        } else {
            future::ready(Err(PlatformError::Other("NotAllowedError".into()))).boxed_local()
        }
    }

    fn is_paused(&self) -> bool {
        self.0.paused.get()
    }

    fn ready_state(&self) -> u16 {
        if self.0.paused.get() {
            1
        } else {
            4
        }
    }

    fn on_loaded_metadata(&self, callback: Box<dyn FnOnce()>) -> Subscription {
        *self.0.metadata.borrow_mut() = Some(callback);
        let inner = self.0.clone();
        Subscription::new(move || {
            inner.metadata.borrow_mut().take();
        })
    }
}

// ---------------------------------------------------------------------------
// Wake lock

#[derive(Default)]
struct WakeState {
    supported: bool,
    fail: bool,
    acquired: u32,
    released: u32,
    on_release: Vec<Box<dyn FnOnce()>>,
}

struct FakeWakeLock(Rc<RefCell<WakeState>>);

impl WakeLockHandle for FakeWakeLock {
    fn release(self: Box<Self>) {
        self.0.borrow_mut().released += 1;
    }

    fn on_release(&self, callback: Box<dyn FnOnce()>) {
        self.0.borrow_mut().on_release.push(callback);
    }
}

// ---------------------------------------------------------------------------
// Platform

/// Outcome for the next capture request.
pub enum MediaScript {
    Grant,
    Fail(PlatformError),
    /// Stay pending until [`FakePlatform::resolve_pending_media`].
    Hold,
}

#[derive(Default)]
struct FakeState {
    fullscreen: bool,
    deny_fullscreen: bool,
    fullscreen_requests: u32,
    deny_exit: bool,
    exit_requests: u32,
    media_script: VecDeque<MediaScript>,
    media_requests: u32,
    pending_media: Vec<oneshot::Sender<Result<FakeStream, PlatformError>>>,
    streams: Vec<FakeStream>,
    next_stream_id: u32,
    signal_sink: Option<SignalSink>,
    listeners_installed: u32,
    listeners_removed: u32,
    videos: Vec<(String, FakeVideo)>,
}

#[derive(Clone)]
pub struct FakePlatform {
    state: Rc<RefCell<FakeState>>,
    wake: Rc<RefCell<WakeState>>,
    now: Rc<Cell<f64>>,
    sleeps: Rc<Cell<u32>>,
    spawner: LocalSpawner,
}

impl FakePlatform {
    pub fn new(spawner: LocalSpawner) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::default())),
            wake: Rc::new(RefCell::new(WakeState {
                supported: true,
                ..WakeState::default()
            })),
            now: Rc::new(Cell::new(1_000.0)),
            sleeps: Rc::new(Cell::new(0)),
            spawner,
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn deny_fullscreen(&self) {
        self.state.borrow_mut().deny_fullscreen = true;
    }

    /// The user leaves fullscreen (Esc) without the monitor asking.
    pub fn user_exits_fullscreen(&self) {
        self.state.borrow_mut().fullscreen = false;
    }

    /// Every later exit request is rejected and fullscreen stays on.
    pub fn fail_exit_fullscreen(&self) {
        self.state.borrow_mut().deny_exit = true;
    }

    pub fn exit_requests(&self) -> u32 {
        self.state.borrow().exit_requests
    }

    pub fn script_media(&self, script: MediaScript) {
        self.state.borrow_mut().media_script.push_back(script);
    }

    pub fn resolve_pending_media(&self) {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending_media);
        for sender in pending {
            let stream = self.new_stream();
            let _ = sender.send(Ok(stream));
        }
    }

    pub fn media_requests(&self) -> u32 {
        self.state.borrow().media_requests
    }

    pub fn fullscreen_requests(&self) -> u32 {
        self.state.borrow().fullscreen_requests
    }

    pub fn streams(&self) -> Vec<FakeStream> {
        self.state.borrow().streams.clone()
    }

    pub fn last_stream(&self) -> Option<FakeStream> {
        self.state.borrow().streams.last().cloned()
    }

    pub fn listeners_installed(&self) -> u32 {
        self.state.borrow().listeners_installed
    }

    pub fn listeners_removed(&self) -> u32 {
        self.state.borrow().listeners_removed
    }

    pub fn has_listeners(&self) -> bool {
        self.state.borrow().signal_sink.is_some()
    }

    pub fn add_video(&self, element_id: &str, video: FakeVideo) {
        self.state
            .borrow_mut()
            .videos
            .push((element_id.to_string(), video));
    }

    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }

    pub fn set_wake_lock_supported(&self, supported: bool) {
        self.wake.borrow_mut().supported = supported;
    }

    pub fn fail_wake_lock(&self) {
        self.wake.borrow_mut().fail = true;
    }

    pub fn wake_locks_acquired(&self) -> u32 {
        self.wake.borrow().acquired
    }

    pub fn wake_locks_released(&self) -> u32 {
        self.wake.borrow().released
    }

    /// The system drops the wake lock on its own, as browsers do when the tab hides.
    pub fn system_releases_wake_lock(&self) {
        let callbacks = std::mem::take(&mut self.wake.borrow_mut().on_release);
        for callback in callbacks {
            callback();
        }
    }

    /// Dispatch through the listeners installed by `mount`, as the browser would.
    pub fn dispatch(&self, signal: BrowserSignal) -> Option<SignalResponse> {
        let sink = self.state.borrow().signal_sink.clone();
        sink.map(|sink| sink(signal))
    }

    fn new_stream(&self) -> FakeStream {
        let mut state = self.state.borrow_mut();
        state.next_stream_id += 1;
        let stream = FakeStream::new(state.next_stream_id);
        state.streams.push(stream.clone());
        stream
    }
}

impl LockdownPlatform for FakePlatform {
    type Stream = FakeStream;
    type Video = FakeVideo;

    fn is_fullscreen(&self) -> bool {
        self.state.borrow().fullscreen
    }

    fn request_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        let mut state = self.state.borrow_mut();
        state.fullscreen_requests += 1;
        let result = if state.deny_fullscreen {
            Err(PlatformError::FullscreenRejected("NotAllowedError".into()))
        } else {
            state.fullscreen = true;
            Ok(())
        };
        future::ready(result).boxed_local()
    }

    fn exit_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        let mut state = self.state.borrow_mut();
        state.exit_requests += 1;
        let result = if state.deny_exit {
            Err(PlatformError::Other("TypeError".into()))
        } else {
            state.fullscreen = false;
            Ok(())
        };
        future::ready(result).boxed_local()
    }

    fn request_media(
        &self,
        constraints: &MediaConstraints,
    ) -> LocalBoxFuture<'static, Result<FakeStream, PlatformError>> {
        assert_eq!(constraints.facing_mode, "user");
        let script = {
            let mut state = self.state.borrow_mut();
            state.media_requests += 1;
            state.media_script.pop_front().unwrap_or(MediaScript::Grant)
        };
        match script {
            MediaScript::Grant => future::ready(Ok(self.new_stream())).boxed_local(),
            MediaScript::Fail(err) => future::ready(Err(err)).boxed_local(),
            MediaScript::Hold => {
                let (tx, rx) = oneshot::channel();
                self.state.borrow_mut().pending_media.push(tx);
                async move {
                    rx.await
                        .unwrap_or_else(|_| Err(PlatformError::Other("request dropped".into())))
                }
                .boxed_local()
            }
        }
    }

    fn track_status(&self, stream: &FakeStream) -> Vec<TrackStatus> {
        stream
            .0
            .tracks
            .borrow()
            .iter()
            .map(|track| TrackStatus {
                kind: track.kind,
                readiness: track.readiness,
                muted: track.muted,
            })
            .collect()
    }

    fn stop_tracks(&self, stream: &FakeStream) {
        stream.stop();
    }

    fn watch_tracks(&self, stream: &FakeStream, sink: TrackSink) -> Subscription {
        let id = stream.0.next_sink.get();
        stream.0.next_sink.set(id + 1);
        stream.0.sinks.borrow_mut().push((id, sink));
        let inner = stream.0.clone();
        Subscription::new(move || {
            inner.sinks.borrow_mut().retain(|(sink_id, _)| *sink_id != id);
        })
    }

    fn request_wake_lock(
        &self,
    ) -> LocalBoxFuture<'static, Result<Option<Box<dyn WakeLockHandle>>, PlatformError>> {
        let mut wake = self.wake.borrow_mut();
        let result = if wake.fail {
            Err(PlatformError::Other("NotAllowedError".into()))
        } else if !wake.supported {
            Ok(None)
        } else {
            wake.acquired += 1;
            let handle: Box<dyn WakeLockHandle> = Box::new(FakeWakeLock(self.wake.clone()));
            Ok(Some(handle))
        };
        future::ready(result).boxed_local()
    }

    fn find_video(&self, element_id: &str) -> Option<FakeVideo> {
        self.state
            .borrow()
            .videos
            .iter()
            .find(|(id, _)| id == element_id)
            .map(|(_, video)| video.clone())
    }

    fn install_listeners(&self, sink: SignalSink) -> Subscription {
        {
            let mut state = self.state.borrow_mut();
            state.signal_sink = Some(sink);
            state.listeners_installed += 1;
        }
        let state = self.state.clone();
        Subscription::new(move || {
            let mut state = state.borrow_mut();
            state.signal_sink = None;
            state.listeners_removed += 1;
        })
    }

    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    fn sleep_ms(&self, _ms: u64) -> LocalBoxFuture<'static, ()> {
        self.sleeps.set(self.sleeps.get() + 1);
        future::ready(()).boxed_local()
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        future::ready(()).boxed_local()
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        self.spawner
            .spawn_local(task)
            .expect("local pool accepts tasks");
    }
}

// ---------------------------------------------------------------------------
// Harness

/// A monitor wired to a [`FakePlatform`] plus recordings of every callback.
pub struct Harness {
    pub pool: LocalPool,
    pub platform: FakePlatform,
    pub monitor: SecurityMonitor<FakePlatform>,
    pub violations: Rc<RefCell<Vec<(String, u32)>>>,
    pub failures: Rc<RefCell<Vec<LockdownFailure>>>,
    pub states: Rc<RefCell<Vec<SessionSnapshot>>>,
}

impl Harness {
    pub fn new(config: SecurityConfig) -> Self {
        let pool = LocalPool::new();
        let platform = FakePlatform::new(pool.spawner());

        let violations = Rc::new(RefCell::new(Vec::new()));
        let failures = Rc::new(RefCell::new(Vec::new()));
        let states = Rc::new(RefCell::new(Vec::new()));

        let callbacks = {
            let violations = violations.clone();
            let failures = failures.clone();
            let states = states.clone();
            MonitorCallbacks::new()
                .on_violation(move |v| violations.borrow_mut().push((v.message(), v.sequence)))
                .on_lockdown_fail(move |f| failures.borrow_mut().push(f.clone()))
                .on_state_change(move |s| states.borrow_mut().push(s.clone()))
        };

        let monitor = SecurityMonitor::new(platform.clone(), config, callbacks);
        Self {
            pool,
            platform,
            monitor,
            violations,
            failures,
            states,
        }
    }

    pub fn mounted(config: SecurityConfig) -> Self {
        let harness = Self::new(config);
        harness.monitor.mount();
        harness
    }

    pub fn run<F: Future>(&mut self, future: F) -> F::Output {
        self.pool.run_until(future)
    }

    /// Run every spawned task (restarts, playback retries) to completion.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn enter_fullscreen(&mut self) -> bool {
        let monitor = self.monitor.clone();
        self.run(async move { monitor.enter_fullscreen().await })
    }

    pub fn exit_fullscreen(&mut self) {
        let monitor = self.monitor.clone();
        self.run(async move { monitor.exit_fullscreen().await })
    }

    pub fn start_media(&mut self) -> bool {
        let monitor = self.monitor.clone();
        self.run(async move { monitor.start_media().await })
    }

    pub fn signal(&self, signal: BrowserSignal) -> SignalResponse {
        self.platform
            .dispatch(signal)
            .expect("monitor listeners are installed")
    }

    pub fn violation_messages(&self) -> Vec<String> {
        self.violations
            .borrow()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    pub fn last_state(&self) -> SessionSnapshot {
        self.states.borrow().last().cloned().unwrap_or_default()
    }
}
