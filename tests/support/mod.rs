//! Shared fakes for the integration suite: lightweight stand-ins for the platform adapters,
//! wired into a real `Dispatcher` the same way `Engine::new` wires the macOS adapters.

#![allow(dead_code)]

use nexus_core::adapters::{
    Accessibility, MenuItem, MouseButton, Modifiers, Ocr, OcrDetection, RasterImage, ScreenCapture,
    ScriptOutput, Scripting, WindowList,
};
use nexus_core::config::Config;
use nexus_core::error::{NexusError, Result};
use nexus_core::intent::Dispatcher;
use nexus_core::model::{AppInfo, Element, Role, SourceTag, WindowInfo};
use nexus_core::recipes::{self, RecipeRegistry};
use nexus_core::session::{ActionJournal, ControlChannel, RecordingState, SpatialCache};
use nexus_core::store::Store;
use nexus_core::{adapters::accessibility::score_candidate, hooks, perception::PerceptionPipeline};

use std::sync::{Arc, Mutex};

/// A labeled, positioned widget the fake accessibility tree can hand back.
#[derive(Clone)]
pub struct FakeElement {
    pub role: Role,
    pub raw_role: &'static str,
    pub label: String,
    pub value: Option<String>,
    pub position: (f64, f64),
    pub enabled: bool,
}

impl FakeElement {
    pub fn new(role: Role, raw_role: &'static str, label: &str, x: f64, y: f64) -> Self {
        Self { role, raw_role, label: label.to_string(), value: None, position: (x, y), enabled: true }
    }

    fn to_element(&self) -> Element {
        Element {
            role: self.role,
            raw_role: self.raw_role.to_string(),
            label: self.label.clone(),
            value: self.value.clone(),
            position: Some(self.position),
            size: Some((80.0, 24.0)),
            enabled: self.enabled,
            focused: false,
            source: SourceTag::Tree,
            handle: None,
            container: None,
        }
    }
}

/// A fake app's entire known state: its elements plus the window bounds reported for it.
#[derive(Clone, Default)]
pub struct FakeApp {
    pub elements: Vec<FakeElement>,
    pub window: Option<(f64, f64, f64, f64)>,
}

#[derive(Default)]
struct AccessibilityState {
    apps: std::collections::HashMap<i32, (String, FakeApp)>,
    frontmost: Option<i32>,
    activate_calls: Vec<String>,
}

/// A stand-in for the macOS accessibility tree: per-pid element lists, driven entirely by
/// the test setting them up, with no live AX calls.
pub struct FakeAccessibility {
    state: Mutex<AccessibilityState>,
}

impl FakeAccessibility {
    pub fn new() -> Self {
        Self { state: Mutex::new(AccessibilityState::default()) }
    }

    pub fn register_app(&self, pid: i32, name: &str, app: FakeApp) {
        let mut state = self.state.lock().unwrap();
        state.apps.insert(pid, (name.to_string(), app));
    }

    pub fn set_frontmost(&self, pid: i32) {
        self.state.lock().unwrap().frontmost = Some(pid);
    }

    pub fn activate_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().activate_calls.clone()
    }
}

impl Accessibility for FakeAccessibility {
    fn is_trusted(&self) -> bool {
        true
    }

    fn frontmost_app(&self) -> Result<AppInfo> {
        let state = self.state.lock().unwrap();
        let pid = state.frontmost.ok_or_else(|| NexusError::AdapterFailed("no frontmost app".into()))?;
        let (name, _) = state.apps.get(&pid).cloned().ok_or_else(|| NexusError::AdapterFailed("unknown pid".into()))?;
        Ok(AppInfo { pid, name, bundle_id: None, active: true })
    }

    fn running_apps(&self) -> Result<Vec<AppInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .apps
            .iter()
            .map(|(pid, (name, _))| AppInfo { pid: *pid, name: name.clone(), bundle_id: None, active: Some(*pid) == state.frontmost })
            .collect())
    }

    fn windows(&self) -> Result<Vec<WindowInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .apps
            .iter()
            .filter_map(|(pid, (name, app))| {
                app.window.map(|(x, y, w, h)| WindowInfo {
                    app_name: name.clone(),
                    title: name.clone(),
                    pid: *pid,
                    bounds: nexus_core::model::Bounds { x, y, w, h },
                })
            })
            .collect())
    }

    fn window_title(&self, pid: i32) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.apps.get(&pid).map(|(name, _)| name.clone()))
    }

    fn focused_element(&self, _pid: i32) -> Result<Option<Element>> {
        Ok(None)
    }

    fn describe_app(&self, pid: i32, _max_elements: usize) -> Result<Vec<Element>> {
        let state = self.state.lock().unwrap();
        Ok(state.apps.get(&pid).map(|(_, app)| app.elements.iter().map(FakeElement::to_element).collect()).unwrap_or_default())
    }

    fn find_elements(&self, query: &str, pid: i32) -> Result<Vec<(Element, u32)>> {
        let state = self.state.lock().unwrap();
        let Some((_, app)) = state.apps.get(&pid) else { return Ok(Vec::new()) };
        let mut scored: Vec<(Element, u32)> = app
            .elements
            .iter()
            .map(|el| {
                let score = score_candidate(query, None, &el.label, el.value.as_deref());
                (el.to_element(), score)
            })
            .filter(|(_, score)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(scored)
    }

    fn menu_bar(&self, _pid: i32) -> Result<Vec<MenuItem>> {
        Ok(Vec::new())
    }

    fn find_menu_item(&self, _path: &[String], _pid: i32) -> Result<Option<MenuItem>> {
        Ok(None)
    }

    fn press(&self, _element: &Element) -> Result<()> {
        Err(NexusError::UnsupportedCapability("press".into()))
    }

    fn confirm(&self, _element: &Element) -> Result<()> {
        Err(NexusError::UnsupportedCapability("confirm".into()))
    }

    fn show_menu(&self, _element: &Element) -> Result<()> {
        Err(NexusError::UnsupportedCapability("show_menu".into()))
    }

    fn set_attribute(&self, _element: &Element, _attr: &str, _value: &str) -> Result<()> {
        Err(NexusError::UnsupportedCapability("set_attribute".into()))
    }

    fn activate_app(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.activate_calls.push(name.to_string());
        if let Some(pid) = state.apps.iter().find(|(_, (n, _))| n == name).map(|(pid, _)| *pid) {
            state.frontmost = Some(pid);
        }
        Ok(())
    }

    fn set_window_bounds(&self, pid: i32, bounds: nexus_core::model::Bounds) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let (_, app) = state.apps.get_mut(&pid).ok_or_else(|| NexusError::AdapterFailed("unknown pid".into()))?;
        app.window = Some((bounds.x, bounds.y, bounds.w, bounds.h));
        Ok(())
    }
}

/// Records every synthesized click/key so tests can assert on them; never touches real input.
#[derive(Default)]
pub struct FakeInput {
    pub clicks: Mutex<Vec<(f64, f64, MouseButton)>>,
    pub key_presses: Mutex<Vec<(u16, Modifiers)>>,
    pub hotkeys: Mutex<Vec<(Vec<u16>, Modifiers)>>,
}

impl FakeInput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl nexus_core::adapters::InputSynthesis for FakeInput {
    fn click(&self, x: f64, y: f64, button: MouseButton, _modifiers: Modifiers) -> Result<()> {
        self.clicks.lock().unwrap().push((x, y, button));
        Ok(())
    }

    fn double_click(&self, x: f64, y: f64) -> Result<()> {
        self.clicks.lock().unwrap().push((x, y, MouseButton::Left));
        Ok(())
    }

    fn triple_click(&self, x: f64, y: f64) -> Result<()> {
        self.clicks.lock().unwrap().push((x, y, MouseButton::Left));
        Ok(())
    }

    fn hover(&self, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    fn drag(&self, _from: (f64, f64), _to: (f64, f64)) -> Result<()> {
        Ok(())
    }

    fn scroll(&self, _x: f64, _y: f64, _dx: i32, _dy: i32) -> Result<()> {
        Ok(())
    }

    fn type_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn key_press(&self, key_code: u16, modifiers: Modifiers) -> Result<()> {
        self.key_presses.lock().unwrap().push((key_code, modifiers));
        Ok(())
    }

    fn hotkey(&self, key_codes: &[u16], modifiers: Modifiers) -> Result<()> {
        self.hotkeys.lock().unwrap().push((key_codes.to_vec(), modifiers));
        Ok(())
    }
}

/// Reports no windows unless a test pre-loads one for a given owner (dialog detection).
#[derive(Default)]
pub struct FakeWindowList {
    by_owner: Mutex<std::collections::HashMap<String, Vec<WindowInfo>>>,
}

impl FakeWindowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_owner_windows(&self, owner: &str, windows: Vec<WindowInfo>) {
        self.by_owner.lock().unwrap().insert(owner.to_string(), windows);
    }
}

impl WindowList for FakeWindowList {
    fn list(&self, owner_filter: Option<&str>) -> Result<Vec<WindowInfo>> {
        let Some(owner) = owner_filter else { return Ok(Vec::new()) };
        Ok(self.by_owner.lock().unwrap().get(owner).cloned().unwrap_or_default())
    }
}

pub struct FakeScreenCapture;

impl ScreenCapture for FakeScreenCapture {
    fn capture_screen(&self) -> Result<RasterImage> {
        Ok(RasterImage { width: 1, height: 1, rgba: vec![0, 0, 0, 0] })
    }

    fn capture_region(&self, _x: i32, _y: i32, _w: i32, _h: i32) -> Result<RasterImage> {
        Ok(RasterImage { width: 1, height: 1, rgba: vec![0, 0, 0, 0] })
    }

    fn capture_window(&self, _window_id: u32) -> Result<RasterImage> {
        Ok(RasterImage { width: 1, height: 1, rgba: vec![0, 0, 0, 0] })
    }
}

pub struct FakeOcr;

impl Ocr for FakeOcr {
    fn recognize(&self, _image: &RasterImage, _origin: (f64, f64)) -> Result<Vec<OcrDetection>> {
        Ok(Vec::new())
    }
}

/// Records the AppleScript-ish snippets handed to it, used by recipe-handler scenarios.
#[derive(Default)]
pub struct FakeScripting {
    pub calls: Mutex<Vec<String>>,
}

impl FakeScripting {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scripting for FakeScripting {
    fn run(&self, snippet: &str, _timeout: std::time::Duration) -> Result<ScriptOutput> {
        self.calls.lock().unwrap().push(snippet.to_string());
        Ok(ScriptOutput { stdout: String::new(), stderr: String::new(), exit_code: 0 })
    }
}

/// Everything a test needs to keep alive and assert on after dispatching through the
/// `Dispatcher` it owns.
pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub accessibility: Arc<FakeAccessibility>,
    pub input: Arc<FakeInput>,
    pub window_list: Arc<FakeWindowList>,
    pub scripting: Arc<FakeScripting>,
    pub store: Arc<Store>,
    // Keeps the control-channel tempdir alive for the harness's lifetime.
    _control_dir: tempfile::TempDir,
}

/// Builds a `Dispatcher` the same way `Engine::new` does, substituting fakes for every
/// platform adapter.
pub fn build_harness(config: Config) -> Harness {
    let config = Arc::new(config);
    let accessibility = Arc::new(FakeAccessibility::new());
    let capture: Arc<dyn ScreenCapture> = Arc::new(FakeScreenCapture);
    let ocr: Arc<dyn Ocr> = Arc::new(FakeOcr);
    let input = Arc::new(FakeInput::new());
    let scripting = Arc::new(FakeScripting::new());
    let window_list = Arc::new(FakeWindowList::new());
    let browser = Arc::new(nexus_core::adapters::browser::BrowserBridge::new(&config));
    let cache = Arc::new(SpatialCache::new(config.cache_ttl(), config.cache_capacity));
    let journal = Arc::new(ActionJournal::new(config.journal_capacity));
    let control_dir = tempfile::tempdir().unwrap();
    let control = Arc::new(ControlChannel::new(control_dir.path().join("control.json")));
    let recording = Arc::new(RecordingState::new());
    let store = Arc::new(Store::open_in_memory().unwrap());
    let hook_registry = Arc::new(hooks::HookRegistry::new());
    hooks::register_builtins(&hook_registry, cache.clone(), journal.clone(), store.clone(), config.clone());
    let recipes = Arc::new(RecipeRegistry::new());
    recipes::register_builtins(&recipes);

    let accessibility_dyn: Arc<dyn Accessibility> = accessibility.clone();
    let window_list_dyn: Arc<dyn WindowList> = window_list.clone();
    let input_dyn: Arc<dyn nexus_core::adapters::InputSynthesis> = input.clone();
    let scripting_dyn: Arc<dyn Scripting> = scripting.clone();

    let pipeline = Arc::new(PerceptionPipeline::new(
        accessibility_dyn.clone(),
        capture.clone(),
        ocr.clone(),
        window_list_dyn.clone(),
        cache.clone(),
        config.perceive_max_elements,
    ));

    let dispatcher = Arc::new(Dispatcher {
        accessibility: accessibility_dyn,
        capture,
        ocr,
        input: input_dyn,
        scripting: scripting_dyn,
        window_list: window_list_dyn,
        browser,
        pipeline,
        cache,
        journal,
        control,
        store: store.clone(),
        hooks: hook_registry,
        recipes,
        config,
        recording,
    });

    Harness {
        dispatcher,
        accessibility,
        input,
        window_list,
        scripting,
        store,
        _control_dir: control_dir,
    }
}
