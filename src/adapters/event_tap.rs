//! Raw input-event tap: listen-only mouse/keyboard/scroll capture active only while a route
//! recording is in progress (spec §4.1, §4.10, §9).
//!
//! Grounded on `original_source/nexus/via/tap.py`'s `CGEventTap` listen-only installation;
//! the teacher has no analogous capture-only event tap (its hotkey stack only registers
//! global shortcuts), so the CGEventTap FFI shape here is learned directly from the original
//! source rather than adapted from teacher code. Enrichment (window bounds, relative
//! coordinates, AX hit-test) mirrors `original_source/nexus/via/tap.py`'s `_on_event`.

use super::{Modifiers, RawEventKind, RawEventTap, RawInputEvent, WindowList};
use crate::error::{NexusError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

struct Shared {
    running: AtomicBool,
    events: Mutex<Vec<RawInputEvent>>,
    start: Mutex<Option<Instant>>,
    window_list: Arc<dyn WindowList>,
}

pub struct MacEventTap {
    shared: Arc<Shared>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl MacEventTap {
    /// `window_list` backs click enrichment (which window/relative position a click landed
    /// in); AX-role/label enrichment goes through `accessibility::hit_test_at_point`, a
    /// system-wide query that doesn't need a per-pid `Accessibility` handle.
    pub fn new(window_list: Arc<dyn WindowList>) -> Self {
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                events: Mutex::new(Vec::new()),
                start: Mutex::new(None),
                window_list,
            }),
            thread: Mutex::new(None),
        }
    }
}

impl RawEventTap for MacEventTap {
    fn start(&self) -> Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(NexusError::AdapterFailed("event tap already running".into()));
        }
        self.shared.events.lock().clear();
        *self.shared.start.lock() = Some(Instant::now());

        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || tap_loop(shared));
        *self.thread.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Vec<RawInputEvent> {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        self.shared.events.lock().drain(..).collect()
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

#[cfg(target_os = "macos")]
#[allow(dead_code)]
mod ffi {
    use core_foundation::string::CFStringRef;
    use std::os::raw::c_void;

    #[repr(C)]
    pub struct __CFMachPort(c_void);
    pub type CFMachPortRef = *const __CFMachPort;
    #[repr(C)]
    pub struct __CFRunLoopSource(c_void);
    pub type CFRunLoopSourceRef = *const __CFRunLoopSource;
    #[repr(C)]
    pub struct __CFRunLoop(c_void);
    pub type CFRunLoopRef = *const __CFRunLoop;
    pub type CGEventRef = *mut c_void;
    pub type CGEventTapProxy = *const c_void;
    pub type CFAllocatorRef = *const c_void;

    pub type CGEventTapCallBack =
        extern "C" fn(CGEventTapProxy, u32, CGEventRef, *mut c_void) -> CGEventRef;

    pub const K_CG_HID_EVENT_TAP: u32 = 0;
    pub const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
    pub const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;

    pub const K_CG_EVENT_LEFT_MOUSE_DOWN: u32 = 1;
    pub const K_CG_EVENT_RIGHT_MOUSE_DOWN: u32 = 3;
    pub const K_CG_EVENT_KEY_DOWN: u32 = 10;
    pub const K_CG_EVENT_SCROLL_WHEEL: u32 = 22;

    pub fn event_mask(types: &[u32]) -> u64 {
        types.iter().fold(0u64, |acc, t| acc | (1u64 << t))
    }

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        pub fn CGEventTapCreate(
            tap: u32,
            place: u32,
            options: u32,
            events_of_interest: u64,
            callback: CGEventTapCallBack,
            user_info: *mut c_void,
        ) -> CFMachPortRef;
        pub fn CGEventTapEnable(tap: CFMachPortRef, enable: u8);
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    extern "C" {
        pub fn CFMachPortCreateRunLoopSource(
            allocator: CFAllocatorRef,
            port: CFMachPortRef,
            order: isize,
        ) -> CFRunLoopSourceRef;
        pub fn CFRunLoopGetCurrent() -> CFRunLoopRef;
        pub fn CFRunLoopAddSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);
        pub fn CFRunLoopRunInMode(mode: CFStringRef, seconds: f64, return_after_source_handled: u8) -> i32;
        pub static kCFRunLoopDefaultMode: CFStringRef;
    }
}

/// Installs a listen-only `CGEventTap` covering mouse-down, key-down, and scroll-wheel
/// events, then pumps the run loop in short slices until `stop()` clears the running flag.
/// Each callback invocation appends an enriched [`RawInputEvent`] timestamped relative to
/// `start`; the tap is installed with `kCGEventTapOptionListenOnly` so recorded routes never
/// interfere with normal input delivery.
#[cfg(target_os = "macos")]
fn tap_loop(shared: Arc<Shared>) {
    let mask = ffi::event_mask(&[
        ffi::K_CG_EVENT_LEFT_MOUSE_DOWN,
        ffi::K_CG_EVENT_RIGHT_MOUSE_DOWN,
        ffi::K_CG_EVENT_KEY_DOWN,
        ffi::K_CG_EVENT_SCROLL_WHEEL,
    ]);

    let user_info = Arc::into_raw(shared.clone()) as *mut std::os::raw::c_void;
    let tap = unsafe {
        ffi::CGEventTapCreate(
            ffi::K_CG_HID_EVENT_TAP,
            ffi::K_CG_HEAD_INSERT_EVENT_TAP,
            ffi::K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
            mask,
            handle_tap_event,
            user_info,
        )
    };

    if tap.is_null() {
        // Most commonly: accessibility/input-monitoring permission not granted. Reclaim the
        // leaked Arc and fall back to idling so `stop()` still terminates this thread cleanly.
        unsafe { Arc::from_raw(user_info as *const Shared) };
        while shared.running.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        return;
    }

    unsafe { ffi::CGEventTapEnable(tap, 1) };
    let source = unsafe { ffi::CFMachPortCreateRunLoopSource(std::ptr::null(), tap, 0) };
    let run_loop = unsafe { ffi::CFRunLoopGetCurrent() };
    let mode = unsafe { ffi::kCFRunLoopDefaultMode };
    unsafe { ffi::CFRunLoopAddSource(run_loop, source, mode) };

    while shared.running.load(Ordering::SeqCst) {
        unsafe { ffi::CFRunLoopRunInMode(mode, 0.1, 0) };
    }

    unsafe { Arc::from_raw(user_info as *const Shared) };
}

#[cfg(target_os = "macos")]
extern "C" fn handle_tap_event(
    _proxy: ffi::CGEventTapProxy,
    event_type: u32,
    event: ffi::CGEventRef,
    user_info: *mut std::os::raw::c_void,
) -> ffi::CGEventRef {
    use core_graphics::event::CGEvent;
    use foreign_types::ForeignType;

    let shared = unsafe { &*(user_info as *const Shared) };
    // Wrap without taking ownership: the event stream owns `event`, and a listen-only tap
    // must hand the exact same pointer back unmodified.
    let cg_event = unsafe { CGEvent::from_ptr(event as *mut _) };
    record_event(shared, event_type, &cg_event);
    std::mem::forget(cg_event);
    event
}

#[cfg(target_os = "macos")]
fn record_event(shared: &Shared, event_type: u32, event: &core_graphics::event::CGEvent) {
    use core_graphics::event::{CGEventFlags, EventField};

    let ts = shared.start.lock().map(|t| t.elapsed().as_millis() as u64).unwrap_or(0);
    let loc = event.location();
    let flags = event.get_flags();
    let modifiers = Modifiers {
        cmd: flags.contains(CGEventFlags::CGEventFlagCommand),
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        ctrl: flags.contains(CGEventFlags::CGEventFlagControl),
        opt: flags.contains(CGEventFlags::CGEventFlagAlternate),
    };

    let kind = match event_type {
        ffi::K_CG_EVENT_LEFT_MOUSE_DOWN | ffi::K_CG_EVENT_RIGHT_MOUSE_DOWN => RawEventKind::Click,
        ffi::K_CG_EVENT_KEY_DOWN => RawEventKind::Key,
        ffi::K_CG_EVENT_SCROLL_WHEEL => RawEventKind::Scroll,
        _ => return,
    };

    let button = match event_type {
        ffi::K_CG_EVENT_LEFT_MOUSE_DOWN => Some("left".to_string()),
        ffi::K_CG_EVENT_RIGHT_MOUSE_DOWN => Some("right".to_string()),
        _ => None,
    };

    let key_code = if kind == RawEventKind::Key {
        Some(event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16)
    } else {
        None
    };

    let (x, y) = if kind == RawEventKind::Scroll {
        let dy = event.get_integer_value_field(EventField::SCROLL_WHEEL_EVENT_DELTA_AXIS_1) as f64;
        let dx = event.get_integer_value_field(EventField::SCROLL_WHEEL_EVENT_DELTA_AXIS_2) as f64;
        (loc.x + dx, loc.y + dy)
    } else {
        (loc.x, loc.y)
    };

    let (window, rel_x, rel_y, ax_role, ax_label) = if kind == RawEventKind::Click {
        enrich_click(shared, loc.x, loc.y)
    } else {
        (None, None, None, None, None)
    };

    shared.events.lock().push(RawInputEvent {
        ts_offset_ms: ts,
        kind,
        x: Some(x),
        y: Some(y),
        button,
        key_code,
        key_char: None,
        modifiers,
        window,
        rel_x,
        rel_y,
        ax_role,
        ax_label,
    });
}

#[allow(clippy::type_complexity)]
#[cfg(target_os = "macos")]
fn enrich_click(
    shared: &Shared,
    x: f64,
    y: f64,
) -> (Option<(f64, f64, f64, f64)>, Option<f64>, Option<f64>, Option<String>, Option<String>) {
    let window = shared
        .window_list
        .list(None)
        .unwrap_or_default()
        .into_iter()
        .find(|w| w.bounds.w > 0.0 && w.bounds.h > 0.0 && w.bounds.contains(x, y));

    let (win_tuple, rel_x, rel_y) = match &window {
        Some(w) => (
            Some((w.bounds.x, w.bounds.y, w.bounds.w, w.bounds.h)),
            Some(((x - w.bounds.x) / w.bounds.w).clamp(0.0, 1.0)),
            Some(((y - w.bounds.y) / w.bounds.h).clamp(0.0, 1.0)),
        ),
        None => (None, None, None),
    };

    let (ax_role, ax_label) = super::accessibility::hit_test_at_point(x, y)
        .map_or((None, None), |(role, label)| (Some(role), Some(label)));

    (win_tuple, rel_x, rel_y, ax_role, ax_label)
}

#[cfg(not(target_os = "macos"))]
fn tap_loop(shared: Arc<Shared>) {
    while shared.running.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
}

#[allow(dead_code)]
fn push_click(shared: &Shared, x: f64, y: f64, button: &str, modifiers: Modifiers) {
    let ts = shared
        .start
        .lock()
        .map(|t| t.elapsed().as_millis() as u64)
        .unwrap_or(0);
    let (window, rel_x, rel_y, ax_role, ax_label) = enrich_or_default(shared, x, y);
    shared.events.lock().push(RawInputEvent {
        ts_offset_ms: ts,
        kind: RawEventKind::Click,
        x: Some(x),
        y: Some(y),
        button: Some(button.to_string()),
        key_code: None,
        key_char: None,
        modifiers,
        window,
        rel_x,
        rel_y,
        ax_role,
        ax_label,
    });
}

#[allow(dead_code)]
fn push_key(shared: &Shared, key_code: u16, key_char: Option<String>, modifiers: Modifiers) {
    let ts = shared
        .start
        .lock()
        .map(|t| t.elapsed().as_millis() as u64)
        .unwrap_or(0);
    shared.events.lock().push(RawInputEvent {
        ts_offset_ms: ts,
        kind: RawEventKind::Key,
        x: None,
        y: None,
        button: None,
        key_code: Some(key_code),
        key_char,
        modifiers,
        window: None,
        rel_x: None,
        rel_y: None,
        ax_role: None,
        ax_label: None,
    });
}

#[allow(dead_code)]
fn push_scroll(shared: &Shared, x: f64, y: f64, dx: i32, dy: i32) {
    let ts = shared
        .start
        .lock()
        .map(|t| t.elapsed().as_millis() as u64)
        .unwrap_or(0);
    shared.events.lock().push(RawInputEvent {
        ts_offset_ms: ts,
        kind: RawEventKind::Scroll,
        x: Some(x + dx as f64),
        y: Some(y + dy as f64),
        button: None,
        key_code: None,
        key_char: None,
        modifiers: Modifiers::default(),
        window: None,
        rel_x: None,
        rel_y: None,
        ax_role: None,
        ax_label: None,
    });
}

/// Non-macOS / test-only counterpart of [`enrich_click`] used by [`push_click`] so it builds
/// on every platform; on macOS it shares the same window-list + AX hit-test enrichment.
#[allow(clippy::type_complexity)]
fn enrich_or_default(
    #[allow(unused_variables)] shared: &Shared,
    #[allow(unused_variables)] x: f64,
    #[allow(unused_variables)] y: f64,
) -> (Option<(f64, f64, f64, f64)>, Option<f64>, Option<f64>, Option<String>, Option<String>) {
    #[cfg(target_os = "macos")]
    {
        enrich_click(shared, x, y)
    }
    #[cfg(not(target_os = "macos"))]
    {
        (None, None, None, None, None)
    }
}
