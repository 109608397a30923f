//! Browser platform built on `web-sys`.
//!
//! Fullscreen and wake lock go through `Reflect` so the promise-returning
//! forms are awaited and a missing API degrades to a no-op instead of a
//! link error.

use std::cell::RefCell;

use futures::future::{self, FutureExt, LocalBoxFuture};
use js_sys::{Function, Object, Promise, Reflect};
use tracing::debug;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    BeforeUnloadEvent, Document, DomException, Event, EventTarget, HtmlVideoElement,
    KeyboardEvent, MediaStream, MediaStreamTrack, MediaStreamTrackState, VisibilityState,
};

use super::backend::{
    LockdownPlatform, SignalSink, Subscription, TrackSink, VideoSurface, WakeLockHandle,
};
use super::error::PlatformError;
use super::keys::KeyStroke;
use super::media::MediaConstraints;
use super::signals::{
    BrowserSignal, SignalResponse, TrackChange, TrackEvent, TrackKind, TrackReadiness,
    TrackStatus,
};
use crate::core::{platform, timing};

/// An event listener that unregisters itself on drop.
struct Listener {
    target: EventTarget,
    event: &'static str,
    capture: bool,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach(
        target: &EventTarget,
        event: &'static str,
        capture: bool,
        handler: impl FnMut(Event) + 'static,
    ) -> Option<Self> {
        let callback = Closure::<dyn FnMut(Event)>::new(handler);
        target
            .add_event_listener_with_callback_and_bool(
                event,
                callback.as_ref().unchecked_ref(),
                capture,
            )
            .map_err(|err| debug!("addEventListener({event}) failed: {}", describe(&err)))
            .ok()?;
        Some(Self {
            target: target.clone(),
            event,
            capture,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self.target.remove_event_listener_with_callback_and_bool(
            self.event,
            self.callback.as_ref().unchecked_ref(),
            self.capture,
        );
    }
}

fn listeners_subscription(listeners: Vec<Listener>) -> Subscription {
    Subscription::new(move || drop(listeners))
}

fn document() -> Option<Document> {
    web_sys::window().and_then(|win| win.document())
}

fn describe(value: &JsValue) -> String {
    if let Some(exception) = value.dyn_ref::<DomException>() {
        return format!("{}: {}", exception.name(), exception.message());
    }
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

fn call_method(target: &JsValue, name: &str) -> Result<JsValue, JsValue> {
    let method = Reflect::get(target, &JsValue::from_str(name))?;
    let method: Function = method
        .dyn_into()
        .map_err(|_| JsValue::from_str(&format!("{name} is not supported")))?;
    method.call0(target)
}

/// Await `value` if it is a promise, otherwise pass it through.
async fn settle(value: JsValue) -> Result<JsValue, JsValue> {
    match value.dyn_into::<Promise>() {
        Ok(promise) => JsFuture::from(promise).await,
        Err(plain) => Ok(plain),
    }
}

fn set_prop(target: &Object, key: &str, value: &JsValue) -> Result<(), PlatformError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(|err| PlatformError::Other(describe(&err)))
}

fn constraints_object(constraints: &MediaConstraints) -> Result<Object, PlatformError> {
    let video = Object::new();
    set_prop(&video, "facingMode", &JsValue::from_str(constraints.facing_mode))?;

    let audio = Object::new();
    set_prop(
        &audio,
        "echoCancellation",
        &JsValue::from_bool(constraints.echo_cancellation),
    )?;
    set_prop(
        &audio,
        "noiseSuppression",
        &JsValue::from_bool(constraints.noise_suppression),
    )?;

    let root = Object::new();
    set_prop(&root, "video", &video)?;
    set_prop(&root, "audio", &audio)?;
    Ok(root)
}

fn media_error(value: JsValue) -> PlatformError {
    let name = value
        .dyn_ref::<DomException>()
        .map(|exception| exception.name())
        .unwrap_or_default();
    match name.as_str() {
        "NotAllowedError" | "SecurityError" | "PermissionDeniedError" => {
            PlatformError::PermissionDenied
        }
        "NotFoundError" | "OverconstrainedError" | "DevicesNotFoundError" => {
            PlatformError::DeviceNotFound
        }
        "NotReadableError" | "TrackStartError" | "AbortError" => PlatformError::DeviceBusy,
        _ => PlatformError::Other(describe(&value)),
    }
}

fn tracks(stream: &MediaStream) -> Vec<MediaStreamTrack> {
    stream
        .get_tracks()
        .iter()
        .filter_map(|value| value.dyn_into::<MediaStreamTrack>().ok())
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebPlatform;

pub struct WebVideo(HtmlVideoElement);

impl WebVideo {
    pub fn new(element: HtmlVideoElement) -> Self {
        Self(element)
    }
}

impl VideoSurface<MediaStream> for WebVideo {
    fn set_muted(&self, muted: bool) {
        self.0.set_muted(muted);
    }

    fn set_plays_inline(&self) {
        let _ = self.0.set_attribute("playsinline", "");
        let _ = self.0.set_attribute("webkit-playsinline", "");
    }

    fn set_source(&self, stream: Option<&MediaStream>) {
        self.0.set_src_object(stream);
    }

    fn play(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        match self.0.play() {
            Ok(promise) => async move {
                JsFuture::from(promise)
                    .await
                    .map(|_| ())
                    .map_err(|err| PlatformError::Other(describe(&err)))
            }
            .boxed_local(),
            Err(err) => future::ready(Err(PlatformError::Other(describe(&err)))).boxed_local(),
        }
    }

    fn is_paused(&self) -> bool {
        self.0.paused()
    }

    fn ready_state(&self) -> u16 {
        self.0.ready_state()
    }

    fn on_loaded_metadata(&self, callback: Box<dyn FnOnce()>) -> Subscription {
        let mut pending = Some(callback);
        let listener = Listener::attach(self.0.as_ref(), "loadedmetadata", false, move |_| {
            if let Some(callback) = pending.take() {
                callback();
            }
        });
        listeners_subscription(listener.into_iter().collect())
    }
}

/// `WakeLockSentinel`, reached through `Reflect`.
struct WebWakeLock {
    sentinel: JsValue,
    listeners: RefCell<Vec<Listener>>,
}

impl WakeLockHandle for WebWakeLock {
    fn release(self: Box<Self>) {
        match call_method(&self.sentinel, "release") {
            Ok(pending) => platform::spawn_future(async move {
                let _ = settle(pending).await;
            }),
            Err(err) => debug!("wake lock release failed: {}", describe(&err)),
        }
    }

    fn on_release(&self, callback: Box<dyn FnOnce()>) {
        let Some(target) = self.sentinel.dyn_ref::<EventTarget>() else {
            return;
        };
        let mut pending = Some(callback);
        if let Some(listener) = Listener::attach(target, "release", false, move |_| {
            if let Some(callback) = pending.take() {
                callback();
            }
        }) {
            self.listeners.borrow_mut().push(listener);
        }
    }
}

impl LockdownPlatform for WebPlatform {
    type Stream = MediaStream;
    type Video = WebVideo;

    fn is_fullscreen(&self) -> bool {
        document()
            .and_then(|doc| doc.fullscreen_element())
            .is_some()
    }

    fn request_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        async move {
            let root = document()
                .and_then(|doc| doc.document_element())
                .ok_or(PlatformError::Unsupported("fullscreen"))?;
            let pending = call_method(root.as_ref(), "requestFullscreen")
                .map_err(|err| PlatformError::FullscreenRejected(describe(&err)))?;
            settle(pending)
                .await
                .map(|_| ())
                .map_err(|err| PlatformError::FullscreenRejected(describe(&err)))
        }
        .boxed_local()
    }

    fn exit_fullscreen(&self) -> LocalBoxFuture<'static, Result<(), PlatformError>> {
        async move {
            let doc = document().ok_or(PlatformError::Unsupported("fullscreen"))?;
            let pending = call_method(doc.as_ref(), "exitFullscreen")
                .map_err(|err| PlatformError::Other(describe(&err)))?;
            settle(pending)
                .await
                .map(|_| ())
                .map_err(|err| PlatformError::Other(describe(&err)))
        }
        .boxed_local()
    }

    fn request_media(
        &self,
        constraints: &MediaConstraints,
    ) -> LocalBoxFuture<'static, Result<MediaStream, PlatformError>> {
        let constraints = constraints.clone();
        async move {
            let window =
                web_sys::window().ok_or(PlatformError::Unsupported("camera/microphone capture"))?;
            let devices = window
                .navigator()
                .media_devices()
                .map_err(|_| PlatformError::Unsupported("camera/microphone capture"))?;
            let options = constraints_object(&constraints)?;
            let pending = devices
                .get_user_media_with_constraints(options.unchecked_ref())
                .map_err(media_error)?;
            let stream = JsFuture::from(pending).await.map_err(media_error)?;
            stream
                .dyn_into::<MediaStream>()
                .map_err(|_| PlatformError::Other("getUserMedia returned no stream".into()))
        }
        .boxed_local()
    }

    fn track_status(&self, stream: &MediaStream) -> Vec<TrackStatus> {
        tracks(stream)
            .iter()
            .map(|track| TrackStatus {
                kind: TrackKind::from_kind(&track.kind()),
                readiness: match track.ready_state() {
                    MediaStreamTrackState::Live => TrackReadiness::Live,
                    _ => TrackReadiness::Ended,
                },
                muted: track.muted(),
            })
            .collect()
    }

    fn stop_tracks(&self, stream: &MediaStream) {
        for track in tracks(stream) {
            track.stop();
        }
    }

    fn watch_tracks(&self, stream: &MediaStream, sink: TrackSink) -> Subscription {
        let mut listeners = Vec::new();
        for track in tracks(stream) {
            let kind = TrackKind::from_kind(&track.kind());
            for (event, change) in [
                ("ended", TrackChange::Ended),
                ("mute", TrackChange::Muted),
                ("unmute", TrackChange::Unmuted),
            ] {
                let sink = sink.clone();
                listeners.extend(Listener::attach(track.as_ref(), event, false, move |_| {
                    sink(TrackEvent { kind, change });
                }));
            }
        }
        listeners_subscription(listeners)
    }

    fn request_wake_lock(
        &self,
    ) -> LocalBoxFuture<'static, Result<Option<Box<dyn WakeLockHandle>>, PlatformError>> {
        async move {
            let Some(window) = web_sys::window() else {
                return Ok(None);
            };
            let navigator: JsValue = window.navigator().into();
            let wake_lock = Reflect::get(&navigator, &JsValue::from_str("wakeLock"))
                .unwrap_or(JsValue::UNDEFINED);
            if wake_lock.is_undefined() || wake_lock.is_null() {
                return Ok(None);
            }
            let Some(request) = Reflect::get(&wake_lock, &JsValue::from_str("request"))
                .ok()
                .and_then(|value| value.dyn_into::<Function>().ok())
            else {
                return Ok(None);
            };
            let pending = request
                .call1(&wake_lock, &JsValue::from_str("screen"))
                .map_err(|err| PlatformError::Other(describe(&err)))?;
            let sentinel = settle(pending)
                .await
                .map_err(|err| PlatformError::Other(describe(&err)))?;
            let handle: Box<dyn WakeLockHandle> = Box::new(WebWakeLock {
                sentinel,
                listeners: RefCell::new(Vec::new()),
            });
            Ok(Some(handle))
        }
        .boxed_local()
    }

    fn find_video(&self, element_id: &str) -> Option<WebVideo> {
        document()?
            .get_element_by_id(element_id)?
            .dyn_into::<HtmlVideoElement>()
            .ok()
            .map(WebVideo::new)
    }

    fn install_listeners(&self, sink: SignalSink) -> Subscription {
        let (Some(window), Some(doc)) = (web_sys::window(), document()) else {
            return Subscription::empty();
        };
        let window_target: &EventTarget = window.as_ref();
        let document_target: &EventTarget = doc.as_ref();
        let mut listeners = Vec::with_capacity(6);

        {
            let sink = sink.clone();
            let doc = doc.clone();
            listeners.extend(Listener::attach(
                document_target,
                "visibilitychange",
                false,
                move |_| {
                    let hidden = doc.visibility_state() == VisibilityState::Hidden;
                    sink(BrowserSignal::VisibilityChanged { hidden });
                },
            ));
        }
        {
            let sink = sink.clone();
            listeners.extend(Listener::attach(window_target, "blur", false, move |_| {
                sink(BrowserSignal::WindowBlurred);
            }));
        }
        {
            let sink = sink.clone();
            listeners.extend(Listener::attach(
                document_target,
                "fullscreenchange",
                false,
                move |_| {
                    sink(BrowserSignal::FullscreenChanged);
                },
            ));
        }
        {
            let sink = sink.clone();
            listeners.extend(Listener::attach(
                document_target,
                "contextmenu",
                false,
                move |event| {
                    apply_response(&event, sink(BrowserSignal::ContextMenu));
                },
            ));
        }
        {
            let sink = sink.clone();
            // Capture phase so page handlers cannot swallow the stroke first.
            listeners.extend(Listener::attach(window_target, "keydown", true, move |event| {
                let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                let stroke = KeyStroke {
                    key: key_event.key(),
                    ctrl: key_event.ctrl_key(),
                    meta: key_event.meta_key(),
                    alt: key_event.alt_key(),
                    shift: key_event.shift_key(),
                };
                apply_response(&event, sink(BrowserSignal::KeyDown(stroke)));
            }));
        }
        {
            let sink = sink.clone();
            listeners.extend(Listener::attach(
                window_target,
                "beforeunload",
                false,
                move |event| {
                    apply_response(&event, sink(BrowserSignal::BeforeUnload));
                },
            ));
        }

        debug!(count = listeners.len(), "exam security listeners installed");
        listeners_subscription(listeners)
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

fn apply_response(event: &Event, response: SignalResponse) {
    if response.prevent_default {
        event.prevent_default();
    }
    if response.confirm_unload {
        if let Some(unload) = event.dyn_ref::<BeforeUnloadEvent>() {
            // Legacy browsers only show the prompt when returnValue is set.
            unload.set_return_value("");
        }
    }
}
