//! The exam security monitor.
//!
//! One `SecurityMonitor` guards one exam attempt. It owns the capture stream
//! and wake lock, turns browser signals into violations, and reports both
//! violations and failed lockdown steps to the host through callbacks. It is
//! a sensor: reaching `max_violations` is reported via `limit_reached()`, and
//! ending the attempt is the host's call.
//!
//! Public operations never panic or return errors. Platform failures become a
//! `false` result plus an `on_lockdown_fail` notification.
//!
//! All state lives behind `Rc` with `Cell`/`RefCell`; no borrow is held across
//! an `.await` or while a host callback runs, so callbacks may re-enter the
//! monitor (e.g. stop media from inside `on_violation`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use super::backend::{LockdownPlatform, SignalSink, Subscription, VideoSurface, WakeLockHandle};
use super::config::{MonitorCallbacks, SecurityConfig};
use super::error::{media_failure_message, LockdownFailure};
use super::keys;
use super::media::{any_live, MediaConstraints, RestartThrottle};
use super::playback::{self, PlaybackPlan};
use super::signals::{BrowserSignal, SignalResponse, TrackChange, TrackEvent};
use super::violation::{
    SessionReport, SessionSnapshot, Violation, ViolationLedger, ViolationReason,
};

struct Session<S> {
    is_fullscreen: bool,
    stream: Option<S>,
    media_error: Option<String>,
    is_requesting_media: bool,
}

impl<S> Default for Session<S> {
    fn default() -> Self {
        Self {
            is_fullscreen: false,
            stream: None,
            media_error: None,
            is_requesting_media: false,
        }
    }
}

struct HeldWakeLock {
    generation: u64,
    handle: Box<dyn WakeLockHandle>,
}

struct Inner<P: LockdownPlatform> {
    platform: P,
    config: SecurityConfig,
    callbacks: MonitorCallbacks,
    started_at_ms: f64,
    session: RefCell<Session<P::Stream>>,
    ledger: RefCell<ViolationLedger>,
    failures: RefCell<Vec<LockdownFailure>>,
    listeners: RefCell<Option<Subscription>>,
    track_watch: RefCell<Option<Subscription>>,
    metadata_watch: RefCell<Option<Subscription>>,
    video: RefCell<Option<Rc<P::Video>>>,
    wake_lock: RefCell<Option<HeldWakeLock>>,
    wake_generation: Cell<u64>,
    // Bumped whenever the preview source changes; stale playback loops compare against it.
    attach_epoch: Cell<u64>,
    // Bumped by stop_media; a capture request that resolves afterwards is discarded.
    media_epoch: Cell<u64>,
    recovery_armed: Cell<bool>,
    restart: RefCell<RestartThrottle>,
}

impl<P: LockdownPlatform> Drop for Inner<P> {
    fn drop(&mut self) {
        self.listeners.get_mut().take();
        self.track_watch.get_mut().take();
        self.metadata_watch.get_mut().take();
        if let Some(stream) = self.session.get_mut().stream.take() {
            self.platform.stop_tracks(&stream);
        }
        if let Some(held) = self.wake_lock.get_mut().take() {
            held.handle.release();
        }
    }
}

pub struct SecurityMonitor<P: LockdownPlatform> {
    inner: Rc<Inner<P>>,
}

impl<P: LockdownPlatform> Clone for SecurityMonitor<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: LockdownPlatform> PartialEq for SecurityMonitor<P> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<P: LockdownPlatform> SecurityMonitor<P> {
    pub fn new(platform: P, config: SecurityConfig, callbacks: MonitorCallbacks) -> Self {
        let started_at_ms = platform.now_ms();
        let restart = RestartThrottle::new(config.restart_throttle_ms);
        Self {
            inner: Rc::new(Inner {
                platform,
                config,
                callbacks,
                started_at_ms,
                session: RefCell::new(Session::default()),
                ledger: RefCell::new(ViolationLedger::default()),
                failures: RefCell::new(Vec::new()),
                listeners: RefCell::new(None),
                track_watch: RefCell::new(None),
                metadata_watch: RefCell::new(None),
                video: RefCell::new(None),
                wake_lock: RefCell::new(None),
                wake_generation: Cell::new(0),
                attach_epoch: Cell::new(0),
                media_epoch: Cell::new(0),
                recovery_armed: Cell::new(false),
                restart: RefCell::new(restart),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.inner.session.borrow();
        SessionSnapshot {
            violations: self.inner.ledger.borrow().count(),
            is_fullscreen: session.is_fullscreen,
            media_active: session.stream.is_some(),
            is_requesting_media: session.is_requesting_media,
            media_error: session.media_error.clone(),
        }
    }

    pub fn violation_count(&self) -> u32 {
        self.inner.ledger.borrow().count()
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.inner.ledger.borrow().entries().to_vec()
    }

    pub fn limit_reached(&self) -> bool {
        self.violation_count() >= self.inner.config.max_violations
    }

    pub fn report(&self) -> SessionReport {
        SessionReport::build(
            self.inner.config.max_violations,
            &self.inner.ledger.borrow(),
            self.inner.failures.borrow().clone(),
        )
    }

    pub fn media_stream(&self) -> Option<P::Stream> {
        self.inner.session.borrow().stream.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.listeners.borrow().is_some()
    }

    /// Register the global listeners. Calling it again while mounted does nothing.
    pub fn mount(&self) {
        if self.is_mounted() {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let sink: SignalSink = Rc::new(move |signal| match weak.upgrade() {
            Some(inner) => SecurityMonitor { inner }.handle_signal(signal),
            None => SignalResponse::pass(),
        });
        let subscription = self.inner.platform.install_listeners(sink);
        *self.inner.listeners.borrow_mut() = Some(subscription);
        info!(
            require_fullscreen = self.inner.config.require_fullscreen,
            require_webcam_mic = self.inner.config.require_webcam_mic,
            max_violations = self.inner.config.max_violations,
            "exam security monitor mounted"
        );
        self.sync_fullscreen();
        self.publish();
    }

    /// Remove every listener and release capture and wake lock. Idempotent.
    pub fn teardown(&self) {
        let listeners = self.inner.listeners.borrow_mut().take();
        if listeners.is_some() {
            drop(listeners);
            info!("exam security listeners removed");
        }
        self.stop_media();
        self.detach_video();
    }

    /// Decide what a browser signal means for the session.
    pub fn handle_signal(&self, signal: BrowserSignal) -> SignalResponse {
        match signal {
            BrowserSignal::VisibilityChanged { hidden: true } => {
                self.record_violation(ViolationReason::TabHidden);
                SignalResponse::pass()
            }
            BrowserSignal::VisibilityChanged { hidden: false } => {
                // Device sleep and tab switches are where capture usually dies.
                self.check_media_liveness();
                self.refresh_wake_lock();
                SignalResponse::pass()
            }
            BrowserSignal::WindowBlurred => {
                self.record_violation(ViolationReason::WindowBlurred);
                SignalResponse::pass()
            }
            BrowserSignal::FullscreenChanged => {
                let active = self.sync_fullscreen();
                if self.inner.config.require_fullscreen && !active {
                    self.record_violation(ViolationReason::ExitedFullscreen);
                }
                SignalResponse::pass()
            }
            BrowserSignal::ContextMenu => {
                self.record_violation(ViolationReason::ContextMenu);
                SignalResponse::prevent()
            }
            BrowserSignal::KeyDown(stroke) => match keys::blocked_label(&stroke) {
                Some(label) => {
                    self.record_violation(ViolationReason::BlockedKey(label));
                    SignalResponse::prevent()
                }
                None => SignalResponse::pass(),
            },
            BrowserSignal::BeforeUnload => SignalResponse::confirm_unload(),
        }
    }

    pub async fn enter_fullscreen(&self) -> bool {
        if !self.inner.config.require_fullscreen {
            return true;
        }
        if self.inner.platform.is_fullscreen() {
            self.sync_fullscreen();
            return true;
        }

        let request = self.inner.platform.request_fullscreen();
        match request.await {
            Ok(()) => {
                self.sync_fullscreen();
                info!("fullscreen entered");
                true
            }
            Err(err) => {
                warn!("fullscreen request failed: {err}");
                self.sync_fullscreen();
                self.report_failure(LockdownFailure::fullscreen());
                false
            }
        }
    }

    /// Leaving fullscreen is not security critical, so failures are dropped.
    pub async fn exit_fullscreen(&self) {
        if !self.inner.platform.is_fullscreen() {
            return;
        }
        let request = self.inner.platform.exit_fullscreen();
        if let Err(err) = request.await {
            debug!("exit fullscreen failed: {err}");
        }
        self.sync_fullscreen();
    }

    pub async fn start_media(&self) -> bool {
        let inner = &self.inner;
        if !inner.config.require_webcam_mic {
            return true;
        }
        inner.recovery_armed.set(true);

        if self.has_live_stream() {
            debug!("reusing live capture stream");
            return true;
        }

        let epoch = inner.media_epoch.get();
        inner.session.borrow_mut().is_requesting_media = true;
        self.publish();

        let request = inner.platform.request_media(&MediaConstraints::default());
        let outcome = request.await;

        if inner.media_epoch.get() != epoch {
            if let Ok(stream) = outcome.as_ref() {
                inner.platform.stop_tracks(stream);
            }
            debug!("capture request resolved after media was stopped; discarded");
            return false;
        }

        match outcome {
            Ok(stream) => {
                info!("camera/microphone capture started");
                self.install_stream(stream);
                self.acquire_wake_lock(epoch).await;
                true
            }
            Err(err) => {
                warn!("camera/microphone request failed: {err}");
                let message = media_failure_message(&err);
                {
                    let mut session = inner.session.borrow_mut();
                    session.is_requesting_media = false;
                    session.media_error = Some(message.clone());
                }
                self.publish();
                self.report_failure(LockdownFailure::media(&message));
                false
            }
        }
    }

    /// Stop capture and release the wake lock. Does nothing without a stream.
    pub fn stop_media(&self) {
        let inner = &self.inner;
        inner.media_epoch.set(inner.media_epoch.get() + 1);
        inner.recovery_armed.set(false);
        inner.restart.borrow_mut().reset();

        let (stream, changed) = {
            let mut session = inner.session.borrow_mut();
            let changed = session.stream.is_some()
                || session.media_error.is_some()
                || session.is_requesting_media;
            session.media_error = None;
            session.is_requesting_media = false;
            (session.stream.take(), changed)
        };

        let watch = inner.track_watch.borrow_mut().take();
        drop(watch);

        if let Some(stream) = stream.as_ref() {
            inner.platform.stop_tracks(stream);
            info!("camera/microphone capture stopped");
            self.attach_stream_to_video();
        }

        self.release_wake_lock();

        if changed {
            self.publish();
        }
    }

    /// Use `video` as the self-preview. The current stream, if any, is attached at once.
    pub fn attach_video(&self, video: P::Video) {
        *self.inner.video.borrow_mut() = Some(Rc::new(video));
        self.attach_stream_to_video();
    }

    /// Look up the preview element by DOM id and attach it.
    pub fn bind_video_element(&self, element_id: &str) -> bool {
        match self.inner.platform.find_video(element_id) {
            Some(video) => {
                self.attach_video(video);
                true
            }
            None => {
                debug!(element_id, "preview element not found");
                false
            }
        }
    }

    pub fn detach_video(&self) {
        let inner = &self.inner;
        inner.attach_epoch.set(inner.attach_epoch.get() + 1);
        let watch = inner.metadata_watch.borrow_mut().take();
        drop(watch);
        let video = inner.video.borrow_mut().take();
        if let Some(video) = video {
            video.set_source(None);
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        if let Some(on_state_change) = self.inner.callbacks.on_state_change.clone() {
            on_state_change(&snapshot);
        }
    }

    fn record_violation(&self, reason: ViolationReason) -> Violation {
        let session_ms = self.inner.platform.now_ms() - self.inner.started_at_ms;
        let violation = self.inner.ledger.borrow_mut().record(reason, session_ms);
        warn!(
            sequence = violation.sequence,
            reason = %violation.reason,
            "exam violation recorded"
        );
        if let Some(on_violation) = self.inner.callbacks.on_violation.clone() {
            on_violation(&violation);
        }
        self.publish();
        violation
    }

    fn report_failure(&self, failure: LockdownFailure) {
        warn!(step = ?failure.step, reason = %failure.reason, "lockdown step failed");
        self.inner.failures.borrow_mut().push(failure.clone());
        if let Some(on_lockdown_fail) = self.inner.callbacks.on_lockdown_fail.clone() {
            on_lockdown_fail(&failure);
        }
    }

    /// Copy the platform's real fullscreen state into the session.
    fn sync_fullscreen(&self) -> bool {
        let actual = self.inner.platform.is_fullscreen();
        let changed = {
            let mut session = self.inner.session.borrow_mut();
            let changed = session.is_fullscreen != actual;
            session.is_fullscreen = actual;
            changed
        };
        if changed {
            self.publish();
        }
        actual
    }

    fn has_live_stream(&self) -> bool {
        let stream = self.inner.session.borrow().stream.clone();
        stream.map_or(false, |stream| {
            any_live(&self.inner.platform.track_status(&stream))
        })
    }

    fn set_media_error(&self, error: Option<String>) {
        let changed = {
            let mut session = self.inner.session.borrow_mut();
            let changed = session.media_error != error;
            session.media_error = error;
            changed
        };
        if changed {
            self.publish();
        }
    }

    fn install_stream(&self, stream: P::Stream) {
        let inner = &self.inner;
        let previous = {
            let mut session = inner.session.borrow_mut();
            session.is_requesting_media = false;
            session.media_error = None;
            session.stream.replace(stream.clone())
        };

        let stale_watch = inner.track_watch.borrow_mut().take();
        drop(stale_watch);
        if let Some(previous) = previous {
            inner.platform.stop_tracks(&previous);
            debug!("replaced capture stream stopped");
        }

        let weak = Rc::downgrade(&self.inner);
        let watch = inner.platform.watch_tracks(
            &stream,
            Rc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    SecurityMonitor { inner }.handle_track_event(event);
                }
            }),
        );
        *inner.track_watch.borrow_mut() = Some(watch);

        self.publish();
        self.attach_stream_to_video();
    }

    fn handle_track_event(&self, event: TrackEvent) {
        let device = event.kind.device_label();
        match event.change {
            TrackChange::Ended => {
                warn!(device, "capture track ended");
                self.set_media_error(Some(format!("{device} stopped unexpectedly")));
                self.check_media_liveness();
            }
            TrackChange::Muted => {
                debug!(device, "capture track muted");
                self.set_media_error(Some(format!("{device} feed muted")));
            }
            TrackChange::Unmuted => {
                debug!(device, "capture track unmuted");
                self.set_media_error(None);
            }
        }
    }

    /// Restart capture if it is required, was started, and has no live track left.
    fn check_media_liveness(&self) {
        let inner = &self.inner;
        if !inner.config.require_webcam_mic || !inner.recovery_armed.get() {
            return;
        }
        if inner.session.borrow().is_requesting_media {
            return;
        }
        if self.has_live_stream() {
            return;
        }

        let now = inner.platform.now_ms();
        if !inner.restart.borrow_mut().try_acquire(now) {
            debug!("capture restart throttled");
            return;
        }

        info!("capture lost; restarting camera/microphone");
        let monitor = self.clone();
        inner.platform.spawn_local(
            async move {
                let _ = monitor.start_media().await;
            }
            .boxed_local(),
        );
    }

    async fn acquire_wake_lock(&self, media_epoch: u64) {
        let inner = &self.inner;
        if inner.wake_lock.borrow().is_some() {
            return;
        }

        let request = inner.platform.request_wake_lock();
        let handle = match request.await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!("wake lock API unavailable");
                return;
            }
            Err(err) => {
                debug!("wake lock request ignored: {err}");
                return;
            }
        };

        if inner.media_epoch.get() != media_epoch {
            handle.release();
            return;
        }

        let generation = inner.wake_generation.get() + 1;
        inner.wake_generation.set(generation);

        let weak = Rc::downgrade(&self.inner);
        handle.on_release(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let taken = match inner.wake_lock.try_borrow_mut() {
                Ok(mut slot) if slot.as_ref().map(|held| held.generation) == Some(generation) => {
                    slot.take()
                }
                _ => None,
            };
            if let Some(held) = taken {
                debug!("wake lock released by the system");
                // The handle owns the listener running this callback; drop it later.
                inner.platform.spawn_local(
                    async move {
                        drop(held);
                    }
                    .boxed_local(),
                );
            }
        }));

        let previous = inner
            .wake_lock
            .borrow_mut()
            .replace(HeldWakeLock { generation, handle });
        if let Some(previous) = previous {
            previous.handle.release();
        }
        debug!("screen wake lock acquired");
    }

    fn refresh_wake_lock(&self) {
        let inner = &self.inner;
        if inner.wake_lock.borrow().is_some() || inner.session.borrow().stream.is_none() {
            return;
        }
        let monitor = self.clone();
        let epoch = inner.media_epoch.get();
        inner.platform.spawn_local(
            async move {
                monitor.acquire_wake_lock(epoch).await;
            }
            .boxed_local(),
        );
    }

    fn release_wake_lock(&self) {
        let held = self.inner.wake_lock.borrow_mut().take();
        if let Some(held) = held {
            held.handle.release();
            debug!("screen wake lock released");
        }
    }

    /// Point the preview at the current stream and start the playback retries.
    fn attach_stream_to_video(&self) {
        let inner = &self.inner;
        let epoch = inner.attach_epoch.get() + 1;
        inner.attach_epoch.set(epoch);
        let stale_watch = inner.metadata_watch.borrow_mut().take();
        drop(stale_watch);

        let video = inner.video.borrow().clone();
        let Some(video) = video else {
            return;
        };
        let stream = inner.session.borrow().stream.clone();
        let Some(stream) = stream else {
            video.set_source(None);
            return;
        };

        // Muted + inline keeps autoplay policies from rejecting play().
        video.set_muted(true);
        video.set_plays_inline();
        video.set_source(Some(&stream));

        let weak = Rc::downgrade(&self.inner);
        let is_current = move || {
            weak.upgrade()
                .map_or(false, |inner| inner.attach_epoch.get() == epoch)
        };

        let on_metadata = {
            let video = video.clone();
            let platform = inner.platform.clone();
            let is_current = is_current.clone();
            Box::new(move || {
                if is_current() {
                    platform.spawn_local(
                        async move {
                            playback::try_play::<P::Stream, P::Video>(&*video).await;
                        }
                        .boxed_local(),
                    );
                }
            })
        };
        let watch = video.on_loaded_metadata(on_metadata);
        *inner.metadata_watch.borrow_mut() = Some(watch);

        let plan = PlaybackPlan {
            attempts: inner.config.playback_retry_attempts,
            interval_ms: inner.config.playback_retry_interval_ms,
        };
        let platform = inner.platform.clone();
        inner.platform.spawn_local(
            async move {
                playback::drive_playback::<P::Stream, P::Video, P, _>(
                    &*video, &platform, plan, is_current,
                )
                .await;
            }
            .boxed_local(),
        );
    }
}
