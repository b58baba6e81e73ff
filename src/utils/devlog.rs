//! Developer-level logging ("level 6") with an opt-in, per-thread capture buffer.
//!
//! Query timing lines go through `dev6!` so tests can assert on them without installing
//! a global logger.

use std::cell::RefCell;

thread_local! {
    static CAPTURE: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Stops capturing on the owning thread when dropped.
pub struct CaptureGuard;

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE.with(|c| *c.borrow_mut() = None);
    }
}

/// Starts capturing `dev6!` lines emitted on the current thread.
#[must_use]
pub fn enable_thread_sink() -> CaptureGuard {
    CAPTURE.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard
}

pub fn write_str(msg: &str) {
    CAPTURE.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Takes every captured line, leaving the buffer empty. Empty when capture is off.
pub fn drain() -> Vec<String> {
    CAPTURE.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

#[must_use]
pub fn snapshot() -> Vec<String> {
    CAPTURE.with(|c| c.borrow().clone().unwrap_or_default())
}

/// Emits a developer log line: captured for the current thread when enabled, and routed to
/// the `estatequery::dev6` target at TRACE.
#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        $crate::utils::devlog::write_str(&__s);
        log::log!(target: "estatequery::dev6", log::Level::Trace, "{}", __s);
    }};
}
