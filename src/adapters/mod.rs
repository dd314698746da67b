//! Capability adapters: the narrow, platform-specific interfaces the core consumes (spec
//! §4.1). Each adapter fails with a [`crate::error::NexusError`] rather than unwinding; none
//! blocks the caller unboundedly — adapters wrapping OS run-loops hand events back through a
//! bounded queue from a dedicated thread instead.

pub mod accessibility;
pub mod browser;
pub mod capture;
pub mod change_events;
pub mod event_tap;
pub mod input;
pub mod ocr;
pub mod scripting;
pub mod windows;

use crate::error::Result;
use crate::model::{AppInfo, Bounds, Element, WindowInfo};

/// Accessibility tree walking, element search, menu bars, and action execution.
///
/// Grounded on `original_source/nexus/sense/access.py` and `act/native.py`.
pub trait Accessibility: Send + Sync {
    fn is_trusted(&self) -> bool;
    fn frontmost_app(&self) -> Result<AppInfo>;
    fn running_apps(&self) -> Result<Vec<AppInfo>>;
    fn windows(&self) -> Result<Vec<WindowInfo>>;
    fn window_title(&self, pid: i32) -> Result<Option<String>>;
    fn focused_element(&self, pid: i32) -> Result<Option<Element>>;
    fn describe_app(&self, pid: i32, max_elements: usize) -> Result<Vec<Element>>;
    fn find_elements(&self, query: &str, pid: i32) -> Result<Vec<(Element, u32)>>;
    fn menu_bar(&self, pid: i32) -> Result<Vec<MenuItem>>;
    fn find_menu_item(&self, path: &[String], pid: i32) -> Result<Option<MenuItem>>;

    fn press(&self, element: &Element) -> Result<()>;
    fn confirm(&self, element: &Element) -> Result<()>;
    fn show_menu(&self, element: &Element) -> Result<()>;
    fn set_attribute(&self, element: &Element, attr: &str, value: &str) -> Result<()>;
    fn activate_app(&self, name: &str) -> Result<()>;
    /// Sets a window's `AXPosition`/`AXSize` directly, used by window-move/resize/tile ops
    /// that have a pid but no live element handle for the window itself.
    fn set_window_bounds(&self, pid: i32, bounds: Bounds) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub path: Vec<String>,
    pub label: String,
    pub enabled: bool,
    pub shortcut: Option<String>,
}

/// Whole-screen, region, and per-window raster capture.
pub trait ScreenCapture: Send + Sync {
    fn capture_screen(&self) -> Result<RasterImage>;
    fn capture_region(&self, x: i32, y: i32, w: i32, h: i32) -> Result<RasterImage>;
    fn capture_window(&self, window_id: u32) -> Result<RasterImage>;
}

pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixels, row-major.
    pub rgba: Vec<u8>,
}

/// A single OCR detection (spec §4.1: `{text, confidence, bounds, center}`).
#[derive(Debug, Clone)]
pub struct OcrDetection {
    pub text: String,
    pub confidence: f32,
    pub bounds: crate::model::Bounds,
    pub center: (f64, f64),
}

pub trait Ocr: Send + Sync {
    fn recognize(&self, image: &RasterImage, origin: (f64, f64)) -> Result<Vec<OcrDetection>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Modifiers {
    pub cmd: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub opt: bool,
}

/// Mouse/keyboard synthesis. Grounded on `original_source/nexus/act/input.py`.
pub trait InputSynthesis: Send + Sync {
    fn click(&self, x: f64, y: f64, button: MouseButton, modifiers: Modifiers) -> Result<()>;
    fn double_click(&self, x: f64, y: f64) -> Result<()>;
    fn triple_click(&self, x: f64, y: f64) -> Result<()>;
    fn hover(&self, x: f64, y: f64) -> Result<()>;
    fn drag(&self, from: (f64, f64), to: (f64, f64)) -> Result<()>;
    fn scroll(&self, x: f64, y: f64, dx: i32, dy: i32) -> Result<()>;
    /// Synthesizes keystrokes directly; callers needing the atomic-paste fallback for long
    /// strings should go through [`crate::adapters::scripting::atomic_paste`] instead.
    fn type_text(&self, text: &str) -> Result<()>;
    fn key_press(&self, key_code: u16, modifiers: Modifiers) -> Result<()>;
    fn hotkey(&self, key_codes: &[u16], modifiers: Modifiers) -> Result<()>;
}

pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Synchronous scripting-language snippet execution (AppleScript on macOS).
pub trait Scripting: Send + Sync {
    fn run(&self, snippet: &str, timeout: std::time::Duration) -> Result<ScriptOutput>;
}

/// Raw window-list enumeration, filterable by owner — used to detect system-level dialogs
/// whose owning process name is known (spec §4.1).
pub trait WindowList: Send + Sync {
    fn list(&self, owner_filter: Option<&str>) -> Result<Vec<WindowInfo>>;
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub pid: i32,
    pub notification: String,
    pub element_label: Option<String>,
}

/// Subscribes to accessibility change notifications for a process; delivers through a
/// bounded queue from a dedicated background thread (spec §4.1, §4.10, §9).
pub trait ChangeEventSource: Send + Sync {
    fn subscribe(&self, pid: i32) -> Result<()>;
    fn unsubscribe(&self, pid: i32);
    /// Drains all buffered events for `pid` (or all processes if `None`).
    fn drain(&self, pid: Option<i32>) -> Vec<ChangeEvent>;
}

#[derive(Debug, Clone)]
pub struct RawInputEvent {
    pub ts_offset_ms: u64,
    pub kind: RawEventKind,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub button: Option<String>,
    pub key_code: Option<u16>,
    pub key_char: Option<String>,
    pub modifiers: Modifiers,
    /// Bounds (x, y, w, h) of the window under the event, if any (spec §4.10 enrichment).
    pub window: Option<(f64, f64, f64, f64)>,
    /// Position within `window`, normalized to `0.0..=1.0` on each axis.
    pub rel_x: Option<f64>,
    pub rel_y: Option<f64>,
    /// Role/label of the AX element hit-tested at the event's screen position, for clicks.
    pub ax_role: Option<String>,
    pub ax_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Click,
    Key,
    Scroll,
}

/// Listen-only capture of mouse/keyboard/scroll events, active only while a route recording
/// is in progress (spec §4.1, §4.10).
pub trait RawEventTap: Send + Sync {
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Vec<RawInputEvent>;
    fn is_running(&self) -> bool;
}
