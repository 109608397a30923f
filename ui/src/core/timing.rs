//! Clock and timer utilities shared by the monitor's retry loops.

#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|win| win.performance())
        .map(|perf| perf.now())
        .unwrap_or_else(js_sys::Date::now)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use once_cell::sync::Lazy;
    use std::time::Instant;

    static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);
    ORIGIN.elapsed().as_secs_f64() * 1000.0
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep_ms(ms: u64) {
    gloo_timers::future::TimeoutFuture::new(ms.min(u32::MAX as u64) as u32).await;
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

/// Resolve on the next animation frame.
#[cfg(target_arch = "wasm32")]
pub async fn next_frame() {
    use wasm_bindgen::{closure::Closure, JsCast};

    let Some(window) = web_sys::window() else {
        return;
    };
    let (tx, rx) = futures_channel::oneshot::channel::<()>();
    // once_into_js keeps the callback alive until the browser invokes it.
    let callback = Closure::once_into_js(move || {
        let _ = tx.send(());
    });
    if window
        .request_animation_frame(callback.unchecked_ref())
        .is_err()
    {
        return;
    }
    let _ = rx.await;
}

/// Native builds have no compositor tick; approximate one 60 Hz frame.
#[cfg(not(target_arch = "wasm32"))]
pub async fn next_frame() {
    sleep_ms(16).await;
}
