//! Top-level orchestrator (spec §9 "process-wide singletons with idempotent init"): builds
//! every capability adapter, registry, and session singleton from a [`Config`] and exposes the
//! three tool-surface operations the stdio protocol server drives — `perceive`, `act`,
//! `remember` — plus the read-only skills/workflows catalogs served as MCP resources
//! (spec §10.4).
//!
//! Grounded on `original_source/nexus/server.py`'s three-tool surface and response-formatting
//! conventions; the adapter wiring mirrors the teacher's own app-state construction in its MCP
//! server entry point.

use crate::adapters::browser::BrowserBridge;
use crate::adapters::accessibility::MacAccessibility;
use crate::adapters::capture::XcapScreenCapture;
use crate::adapters::change_events::MacChangeEventSource;
use crate::adapters::input::MacInput;
use crate::adapters::ocr::VisionOcr;
use crate::adapters::scripting::MacScripting;
use crate::adapters::windows::MacWindowList;
use crate::adapters::{
    Accessibility, ChangeEventSource, InputSynthesis, Ocr, ScreenCapture, Scripting, WindowList,
};
use crate::config::Config;
use crate::error::{NexusError, Result, ResultExt};
use crate::fusion::{self, PerceiveOptions};
use crate::hooks::{register_builtins as register_hook_builtins, Event, HookContext, HookRegistry};
use crate::intent::{DispatchOutcome, Dispatcher};
use crate::model::{AppInfo, CachedElement, Element, Snapshot};
use crate::perception::PerceptionPipeline;
use crate::recipes::{self, RecipeRegistry};
use crate::session::{ActionJournal, ControlChannel, RecordingState, SpatialCache};
use crate::store::{Store, Workflow};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// The text and (optionally) image payload a `perceive` tool call returns (spec §10.4:
/// `perceive(...) -> text | (text, image)`).
pub struct PerceiveOutcome {
    pub text: String,
    /// Base64-encoded PNG, present only when `screenshot=true` was requested.
    pub screenshot_base64: Option<String>,
}

/// A static, documented catalog entry advising a CLI/file/web shortcut over blind GUI
/// automation (spec §1 "Out of scope" framing, generalized into a queryable catalog per
/// SPEC_FULL.md §10.4's `nexus://skills` resource).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Skill {
    pub id: String,
    pub app: Option<String>,
    pub summary: String,
    pub advice: String,
}

/// Owns every process-wide singleton and drives the three tool operations. One instance lives
/// for the process lifetime; `Arc<Engine>` is shared with the protocol server's request
/// handlers (spec §9).
pub struct Engine {
    pub dispatcher: Arc<Dispatcher>,
    change_events: Arc<dyn ChangeEventSource>,
    /// The previous `perceive` call's snapshot per pid, used for the optional `diff=true`
    /// section (spec §4.3) — independent of `act`'s own before/after snapshot pair.
    last_perceive: Mutex<HashMap<i32, Snapshot>>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let config = Arc::new(config);

        let accessibility: Arc<dyn Accessibility> = Arc::new(MacAccessibility::new());
        let capture: Arc<dyn ScreenCapture> = Arc::new(XcapScreenCapture);
        let ocr: Arc<dyn Ocr> = Arc::new(VisionOcr);
        let input: Arc<dyn InputSynthesis> = Arc::new(MacInput);
        let scripting: Arc<dyn Scripting> = Arc::new(MacScripting);
        let window_list: Arc<dyn WindowList> = Arc::new(MacWindowList);
        let browser = Arc::new(BrowserBridge::new(&config));

        let cache = Arc::new(SpatialCache::new(config.cache_ttl(), config.cache_capacity));
        let journal = Arc::new(ActionJournal::new(config.journal_capacity));
        let control = Arc::new(ControlChannel::new(ControlChannel::default_path()));
        let recording = Arc::new(RecordingState::new());

        let db_path = config
            .db_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Store::default_path);
        let store = Arc::new(Store::open(&db_path)?);

        let hooks = Arc::new(HookRegistry::new());
        register_hook_builtins(&hooks, cache.clone(), journal.clone(), store.clone(), config.clone());

        let recipes = Arc::new(RecipeRegistry::new());
        recipes::register_builtins(&recipes);

        let pipeline = Arc::new(PerceptionPipeline::new(
            accessibility.clone(),
            capture.clone(),
            ocr.clone(),
            window_list.clone(),
            cache.clone(),
            config.perceive_max_elements,
        ));

        let dispatcher = Arc::new(Dispatcher {
            accessibility,
            capture,
            ocr,
            input,
            scripting,
            window_list,
            browser,
            pipeline,
            cache,
            journal,
            control,
            store,
            hooks,
            recipes,
            config,
            recording,
        });

        let change_events: Arc<dyn ChangeEventSource> = Arc::new(MacChangeEventSource::new());

        Ok(Arc::new(Self {
            dispatcher,
            change_events,
            last_perceive: Mutex::new(HashMap::new()),
        }))
    }

    fn resolve_app(&self, app_name: &str) -> Result<AppInfo> {
        let d = &self.dispatcher;
        if app_name.is_empty() {
            return d.accessibility.frontmost_app();
        }
        d.accessibility
            .running_apps()?
            .into_iter()
            .find(|a| a.name.eq_ignore_ascii_case(app_name))
            .ok_or_else(|| NexusError::ElementNotFound {
                query: app_name.to_string(),
                app: None,
                suggestions: Vec::new(),
            })
    }

    /// Runs the `perceive` tool (spec §4.2, §4.3): before/after hooks around the perception
    /// pipeline, fusion text rendering, and the optional screenshot/diff/observe sections.
    pub fn perceive(&self, opts: PerceiveOptions) -> Result<PerceiveOutcome> {
        let d = &self.dispatcher;
        let app_info = self.resolve_app(&opts.app_name)?;
        let pid = app_info.pid;

        let mut ctx = HookContext { pid: Some(pid), app: Some(app_info.name.clone()), ..Default::default() };
        d.hooks.run(Event::BeforePerceive, &mut ctx);

        let mut lines = Vec::new();
        let trusted = d.accessibility.is_trusted();

        if !trusted {
            lines.push("not trusted: accessibility permission missing; showing window list only.".to_string());
            let windows = d.accessibility.windows().unwrap_or_default();
            for w in windows.iter().take(d.config.perceive_max_windows) {
                lines.push(format!("- {} : {}", w.app_name, w.title));
            }
            let screenshot_base64 = if opts.include_screenshot {
                encode_screenshot(d.capture.as_ref()).log_err()
            } else {
                None
            };
            return Ok(PerceiveOutcome { text: lines.join("\n"), screenshot_base64 });
        }

        let (elements, fingerprint, from_cache) = if let Some(cached) = ctx.cached_elements.take() {
            let fp = ctx.fingerprint_before.clone().unwrap_or_default();
            (cached.into_iter().map(from_cached).collect(), fp, true)
        } else {
            let result = d.pipeline.run(pid)?;
            (result.elements, result.fingerprint, result.from_cache)
        };

        ctx.detected_dialogs = d.detect_dialogs();
        d.hooks.run(Event::AfterPerceive, &mut ctx);

        lines.push(format!("app: {} (pid {pid}){}", app_info.name, if from_cache { " [cached]" } else { "" }));

        let windows = d.accessibility.windows().unwrap_or_default();
        if let Some(w) = windows.iter().find(|w| w.pid == pid) {
            lines.push(format!("window: {}", w.title));
        }

        if let Some(focused) = d.accessibility.focused_element(pid).log_err().flatten() {
            lines.push(format!("focused: {:?} \"{}\"", focused.role, focused.label));
        }

        if !windows.is_empty() {
            lines.push("windows:".to_string());
            for w in windows.iter().take(d.config.perceive_max_windows) {
                lines.push(format!("  - {} : {}", w.app_name, w.title));
            }
        }

        if opts.include_menus {
            if let Ok(menu) = d.accessibility.menu_bar(pid) {
                lines.push("menus:".to_string());
                for item in menu.iter().take(d.config.perceive_max_menu_items) {
                    lines.push(format!("  {}", item.path.join(" > ")));
                }
            }
        }

        for event in drain_change_events(&self.change_events, pid, opts.include_observe) {
            lines.push(format!("observed: {} ({})", event.notification, event.element_label.unwrap_or_default()));
        }

        if let Some(query) = &opts.query {
            let scored = crate::perception::perception_find(&d.cache, d.accessibility.as_ref(), query, pid, d.config.perceive_max_elements)?;
            lines.push(format!("matches for {query:?}:"));
            for s in scored.iter().take(d.config.perceive_max_elements) {
                lines.push(format!("  {:?} \"{}\" (score {})", s.element.role, s.element.label, s.score));
            }
        } else {
            let truncated: Vec<_> = elements.iter().take(d.config.perceive_max_elements).collect();
            let owned: Vec<_> = truncated.into_iter().cloned().collect();
            lines.push(fusion::render_element_listing(&owned));
            if elements.len() > d.config.perceive_max_elements {
                lines.push(format!(
                    "... and {} more (use query= to search)",
                    elements.len() - d.config.perceive_max_elements
                ));
            }
        }

        if opts.include_content {
            let values: Vec<&str> = elements
                .iter()
                .filter_map(|e| e.value.as_deref())
                .filter(|v| !v.is_empty())
                .collect();
            if !values.is_empty() {
                lines.push(format!("content:\n{}", values.join("\n")));
            }
        }

        if let Some(hint) = &ctx.label_hint {
            lines.push(hint.clone());
        }

        let app_name = app_info.name.clone();
        let window_pairs: Vec<(String, String)> =
            windows.iter().filter(|w| w.pid == pid).map(|w| (w.app_name.clone(), w.title.clone())).collect();
        let snapshot = fusion::snapshot(&app_name, &elements, &window_pairs);

        if opts.include_diff {
            let mut last = self.last_perceive.lock();
            if let Some(before) = last.get(&pid) {
                let diff_text = fusion::snapshot_diff(before, &snapshot);
                if !diff_text.is_empty() {
                    lines.push(format!("diff since last perceive:\n{diff_text}"));
                }
            }
            last.insert(pid, snapshot);
        } else {
            self.last_perceive.lock().insert(pid, snapshot);
        }

        let _ = fingerprint;

        let screenshot_base64 = if opts.include_screenshot {
            encode_screenshot(d.capture.as_ref()).log_err()
        } else {
            None
        };

        d.control.record_telemetry(Some("perceive"), None, Some("ok"), None, None, true);

        Ok(PerceiveOutcome { text: lines.join("\n"), screenshot_base64 })
    }

    /// Runs the `act` tool: delegates to the dispatcher, which owns the full spec §4.5 flow.
    pub fn act(&self, action: &str, app: Option<&str>) -> DispatchOutcome {
        let pid = app.and_then(|a| self.dispatcher.resolve_pid(a));
        self.dispatcher.dispatch_text(action, app, pid)
    }

    /// Runs the `remember` tool (spec §6): `set/get/delete/list/clear/stats`.
    pub fn remember(&self, op: &str, key: Option<&str>, value: Option<&str>) -> Result<String> {
        let store = &self.dispatcher.store;
        match op {
            "set" => {
                let (k, v) = (
                    key.ok_or_else(|| NexusError::AdapterFailed("set requires key".to_string()))?,
                    value.ok_or_else(|| NexusError::AdapterFailed("set requires value".to_string()))?,
                );
                store.memory_set(k, v)?;
                Ok(format!("remembered {k:?}"))
            }
            "get" => {
                let k = key.ok_or_else(|| NexusError::AdapterFailed("get requires key".to_string()))?;
                match store.memory_get(k)? {
                    Some(v) => Ok(v),
                    None => Ok(format!("no memory for {k:?}")),
                }
            }
            "delete" => {
                let k = key.ok_or_else(|| NexusError::AdapterFailed("delete requires key".to_string()))?;
                store.memory_delete(k)?;
                Ok(format!("forgot {k:?}"))
            }
            "list" => {
                let entries = store.memory_list()?;
                if entries.is_empty() {
                    return Ok("no memories stored".to_string());
                }
                Ok(entries.into_iter().map(|(k, v)| format!("{k} = {v}")).collect::<Vec<_>>().join("\n"))
            }
            "clear" => {
                store.memory_clear()?;
                Ok("cleared all memories".to_string())
            }
            "stats" => {
                let actions = store.action_count()?;
                let methods = store.method_app_count()?;
                let labels = store.label_count(false)?;
                let global_labels = store.label_count(true)?;
                Ok(format!(
                    "{actions} actions recorded, {methods} app/method pairs tracked, \
                     {labels} app-specific labels learned, {global_labels} global labels learned"
                ))
            }
            other => Err(NexusError::AdapterFailed(format!("unknown remember op {other:?}"))),
        }
    }

    pub fn skills(&self) -> Vec<Skill> {
        builtin_skills()
    }

    pub fn skill(&self, id: &str) -> Option<Skill> {
        builtin_skills().into_iter().find(|s| s.id == id)
    }

    pub fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.dispatcher.store.workflow_list()
    }

    pub fn workflow(&self, name: &str) -> Result<Option<Workflow>> {
        self.dispatcher.store.workflow_get(name)
    }
}

/// Drains buffered accessibility-change events for `pid`, first ensuring a subscription
/// exists (spec §4.1, §4.10: "drained observer events" section of `perceive`'s output).
fn drain_change_events(
    source: &Arc<dyn ChangeEventSource>,
    pid: i32,
    observe: bool,
) -> Vec<crate::adapters::ChangeEvent> {
    if !observe {
        return Vec::new();
    }
    let _ = source.subscribe(pid);
    source.drain(Some(pid))
}

/// Rehydrates a spatial-cache hit into a live [`Element`] (minus `handle`, which the cache
/// never stores — see [`Element::to_cached`]).
fn from_cached(c: CachedElement) -> Element {
    Element {
        role: c.role,
        raw_role: c.raw_role,
        label: c.label,
        value: c.value,
        position: c.position,
        size: c.size,
        enabled: c.enabled,
        focused: c.focused,
        source: c.source,
        handle: None,
        container: c.container,
    }
}

fn encode_screenshot(capture: &dyn ScreenCapture) -> Result<String> {
    let image = capture.capture_screen()?;
    let buffer = image::RgbaImage::from_raw(image.width, image.height, image.rgba)
        .ok_or_else(|| NexusError::AdapterFailed("screenshot buffer dimensions mismatch".to_string()))?;
    let mut bytes: Vec<u8> = Vec::new();
    image::DynamicImage::ImageRgba8(buffer)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| NexusError::AdapterFailed(format!("screenshot encode failed: {e}")))?;
    use base64::Engine as _;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Documented CLI/file/web shortcuts preferred over blind GUI automation (spec §1's
/// out-of-scope framing), surfaced as the `nexus://skills` resource.
fn builtin_skills() -> Vec<Skill> {
    vec![
        Skill {
            id: "finder-open".to_string(),
            app: Some("Finder".to_string()),
            summary: "Open a file or folder".to_string(),
            advice: "prefer `open <path>` (shell) over navigating Finder's GUI".to_string(),
        },
        Skill {
            id: "browser-navigate".to_string(),
            app: None,
            summary: "Load a URL in the active browser".to_string(),
            advice: "use the `navigate <url>` browser op (CDP) rather than clicking the address bar".to_string(),
        },
        Skill {
            id: "clipboard".to_string(),
            app: None,
            summary: "Read or write the clipboard".to_string(),
            advice: "use `get clipboard` / `set clipboard` shortcuts instead of simulating cmd-c/cmd-v on a hidden field".to_string(),
        },
        Skill {
            id: "shell-script".to_string(),
            app: None,
            summary: "Run a repeatable multi-step task".to_string(),
            advice: "check `list recipes` first; a scripted recipe is faster and more reliable than GUI replay".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an `Engine` against a throwaway on-disk database. Adapter construction never
    /// touches the accessibility/screen APIs (only method calls do), so this is safe to run
    /// off macOS and without the permission prompt.
    fn test_engine() -> (Arc<Engine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nexus.db");
        let config = Config { db_path: Some(db_path.to_string_lossy().to_string()), ..Default::default() };
        (Engine::new(config).unwrap(), dir)
    }

    #[test]
    fn remember_set_get_roundtrip() {
        let (engine, _dir) = test_engine();
        engine.remember("set", Some("color"), Some("blue")).unwrap();
        assert_eq!(engine.remember("get", Some("color"), None).unwrap(), "blue");
    }

    #[test]
    fn remember_get_missing_key_reports_absence() {
        let (engine, _dir) = test_engine();
        assert_eq!(engine.remember("get", Some("nope"), None).unwrap(), "no memory for \"nope\"");
    }

    #[test]
    fn remember_set_without_value_errors() {
        let (engine, _dir) = test_engine();
        assert!(engine.remember("set", Some("color"), None).is_err());
    }

    #[test]
    fn remember_unknown_op_errors() {
        let (engine, _dir) = test_engine();
        assert!(engine.remember("explode", None, None).is_err());
    }

    #[test]
    fn remember_clear_empties_list() {
        let (engine, _dir) = test_engine();
        engine.remember("set", Some("a"), Some("1")).unwrap();
        engine.remember("clear", None, None).unwrap();
        assert_eq!(engine.remember("list", None, None).unwrap(), "no memories stored");
    }

    #[test]
    fn skills_lookup_by_id() {
        let (engine, _dir) = test_engine();
        assert!(engine.skill("finder-open").is_some());
        assert!(engine.skill("does-not-exist").is_none());
        assert_eq!(engine.skills().len(), 4);
    }

    #[test]
    fn list_workflows_starts_empty() {
        let (engine, _dir) = test_engine();
        assert!(engine.list_workflows().unwrap().is_empty());
        assert!(engine.workflow("nope").unwrap().is_none());
    }

    #[test]
    fn from_cached_drops_handle_only() {
        let cached = CachedElement {
            role: crate::model::Role::Button,
            raw_role: "AXButton".to_string(),
            label: "Save".to_string(),
            value: None,
            position: Some((0.0, 0.0)),
            size: Some((10.0, 10.0)),
            enabled: true,
            focused: false,
            source: crate::model::SourceTag::Tree,
            container: None,
        };
        let element = from_cached(cached.clone());
        assert_eq!(element.label, cached.label);
        assert!(element.handle.is_none());
    }
}
