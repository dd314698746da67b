//! Intent dispatcher (spec §4.5): paused-check, before/after-act hooks, recipe routing, the
//! exhaustive verb-dispatch match over [`ParsedIntent`], snapshot-and-verify, and the
//! wrong-app retry.

use super::parser::{parse_step, split_chain};
use super::types::*;
use super::window_grid;
use crate::adapters::{
    Accessibility, InputSynthesis, MouseButton, Modifiers, Ocr, ScreenCapture, Scripting,
    WindowList,
};
use crate::adapters::browser::BrowserBridge;
use crate::config::Config;
use crate::error::{NexusError, Result};
use crate::fusion;
use crate::hooks::{Event, HookContext, HookRegistry};
use crate::model::{Bounds, Element, Snapshot};
use crate::perception::{
    classify_dialog, detect_system_dialogs, perception_find, suggest_labels, DialogClass,
    PerceptionPipeline, Scored,
};
use crate::recipes::{self, Handler, RecipeRegistry};
use crate::session::{ActionJournal, ControlChannel, RecordingState, SpatialCache};
use crate::store::Store;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inter-step/inter-retry settle delay (spec §4.5 "pause briefly (≈150 ms)").
const SETTLE: Duration = Duration::from_millis(150);
/// Delay before the background re-activation that counteracts host focus theft (spec §4.5).
const FOCUS_RESTORE_DELAY: Duration = Duration::from_millis(400);

thread_local! {
    /// Set by `handle_click` when a click only succeeded after translating its target through
    /// a learned label (spec §4.8, §8 "Label learning" end-to-end scenario); read back by
    /// `dispatch_intent` right after the handler returns. The stdio server drives one request
    /// at a time on this thread, so a thread-local avoids plumbing the value through every
    /// `run_handler` match arm just for this one case.
    static LAST_VIA_LABEL: std::cell::RefCell<Option<String>> = std::cell::RefCell::new(None);
}

/// Everything the dispatcher needs to run a step: adapters, the perception pipeline, the
/// registries, and the shared session state. One instance lives for the process lifetime
/// (spec §9 "process-wide singletons with idempotent init").
pub struct Dispatcher {
    pub accessibility: Arc<dyn Accessibility>,
    pub capture: Arc<dyn ScreenCapture>,
    pub ocr: Arc<dyn Ocr>,
    pub input: Arc<dyn InputSynthesis>,
    pub scripting: Arc<dyn Scripting>,
    pub window_list: Arc<dyn WindowList>,
    pub browser: Arc<BrowserBridge>,
    pub pipeline: Arc<PerceptionPipeline>,
    pub cache: Arc<SpatialCache>,
    pub journal: Arc<ActionJournal>,
    pub control: Arc<ControlChannel>,
    pub store: Arc<Store>,
    pub hooks: Arc<HookRegistry>,
    pub recipes: Arc<RecipeRegistry>,
    pub config: Arc<Config>,
    pub recording: Arc<RecordingState>,
}

/// The outcome of dispatching one step, formatted by the caller (spec §4.5 step 7, §7).
pub struct DispatchOutcome {
    pub ok: bool,
    pub via: Option<String>,
    pub result_text: String,
    pub error: Option<NexusError>,
    pub diff: Option<String>,
    pub retried: bool,
    pub skill_hint: Option<String>,
    /// The last 3 journal lines at the time this outcome was produced (spec §4.5 step 7
    /// "compact post-state + last 3 journal lines").
    pub recent_journal: Vec<String>,
    /// Set when a click succeeded only after translating its target through a learned label,
    /// e.g. `"save -> guardar"` (spec §8 "Label learning" end-to-end scenario).
    pub via_label: Option<String>,
}

impl DispatchOutcome {
    fn ok(result_text: impl Into<String>) -> Self {
        Self {
            ok: true,
            via: None,
            result_text: result_text.into(),
            error: None,
            diff: None,
            retried: false,
            skill_hint: None,
            recent_journal: Vec::new(),
            via_label: None,
        }
    }

    fn err(error: NexusError) -> Self {
        Self {
            ok: false,
            via: None,
            result_text: String::new(),
            error: Some(error),
            diff: None,
            retried: false,
            skill_hint: None,
            recent_journal: Vec::new(),
            via_label: None,
        }
    }
}

impl Dispatcher {
    /// Dispatches free text that may contain a `;`-separated chain (spec §4.5 "for chains, any
    /// step failure stops the chain and returns a step-indexed failure"). `app`/`pid` track the
    /// current target, re-resolved across steps when an `open <app>` step runs.
    pub fn dispatch_text(&self, text: &str, app: Option<&str>, pid: Option<i32>) -> DispatchOutcome {
        let steps = split_chain(text);
        if steps.is_empty() {
            return DispatchOutcome::err(NexusError::AdapterFailed("empty action".to_string()));
        }

        let mut app = app.map(|s| s.to_string());
        let mut pid = pid;
        let mut last = DispatchOutcome::ok(String::new());

        for (i, step) in steps.iter().enumerate() {
            let intent = match parse_step(step) {
                Ok(intent) => intent,
                Err(message) => {
                    // Recipes match raw text directly and are consulted independently of
                    // whether the step parses as a GUI verb (spec §4.5 step 3 "recipe
                    // routing is consulted first"); try one before giving up on a step the
                    // parser doesn't recognize.
                    if let Some(mut outcome) = self.try_recipe_only(step, app.as_deref()) {
                        if !outcome.ok {
                            outcome.result_text = format!("step {}: {}", i + 1, outcome.result_text);
                            return outcome;
                        }
                        last = outcome;
                        continue;
                    }
                    return DispatchOutcome::err(NexusError::AdapterFailed(format!(
                        "step {}: {message}",
                        i + 1
                    )));
                }
            };

            if let ParsedIntent::Open { app: target } = &intent {
                app = Some(target.clone());
                pid = self.resolve_pid(target);
            }

            last = self.dispatch_intent(step, &intent, app.as_deref(), pid);
            if !last.ok {
                last.result_text = format!("step {}: {}", i + 1, last.result_text);
                return last;
            }
        }
        last
    }

    /// Dispatches one already-parsed intent (spec §4.5 steps 1-7). `raw` is the original step
    /// text, used for recipe matching (recipes match against free text, not the parsed shape).
    pub fn dispatch_intent(&self, raw: &str, intent: &ParsedIntent, app: Option<&str>, pid: Option<i32>) -> DispatchOutcome {
        if self.control.is_paused() {
            return DispatchOutcome::err(NexusError::AdapterFailed(
                "agent is paused; resume via the control channel before retrying".to_string(),
            ));
        }

        if let ParsedIntent::Chain(steps) = intent {
            let mut last = DispatchOutcome::ok(String::new());
            for (i, step) in steps.iter().enumerate() {
                last = self.dispatch_intent(raw, step, app, pid);
                if !last.ok {
                    last.result_text = format!("chain step {}: {}", i + 1, last.result_text);
                    return last;
                }
            }
            return last;
        }

        let mut ctx = HookContext {
            pid,
            app: app.map(|s| s.to_string()),
            intent_text: Some(raw.to_string()),
            verb: Some(intent.canonical_verb().to_string()),
            target: intent.target().map(|s| s.to_string()),
            detected_dialogs: self.detect_dialogs(),
            ..Default::default()
        };
        if let Some((name, step)) = self.recording.next_step() {
            ctx.recording_name = Some(name);
            ctx.recording_step = Some(step);
        }
        self.hooks.run(Event::BeforeAct, &mut ctx);
        if let Some(stop) = ctx.short_circuit.take() {
            self.hooks.run(Event::OnError, &mut ctx);
            let mut outcome = DispatchOutcome::err(NexusError::AdapterFailed(stop));
            outcome.skill_hint = ctx.skill_hint;
            return outcome;
        }

        // Recipe routing (spec §4.5 step 3): the first matching recipe wins and a successful
        // result short-circuits GUI handling entirely; a failing recipe falls through silently.
        // Global recipes (no app key) match regardless of whether an app is in scope, so the
        // lookup always runs, not just when `app` is `Some`.
        if let Some((name, handler, captures)) = self.recipes.find_match(raw, app.unwrap_or_default()) {
            if let Ok(text) = self.run_recipe(&handler, &captures) {
                let mut outcome = DispatchOutcome::ok(text);
                outcome.via = Some(format!("recipe({name})"));
                self.record_after_act(&mut ctx, true, None);
                return outcome;
            }
        }

        let is_getter = intent.is_getter();
        let before_snapshot = if !is_getter {
            pid.and_then(|p| self.take_snapshot(p, app.unwrap_or_default()).ok())
        } else {
            None
        };
        let start = Instant::now();

        LAST_VIA_LABEL.with(|cell| *cell.borrow_mut() = None);
        let mut result = self.run_handler(intent, app, pid);

        // Wrong-app retry (spec §4.5 step 6): one retry after reactivating the named app, only
        // when the handler failed with an element-not-found and the foreground app differs.
        let mut retried = false;
        if let (Err(err), Some(target_app)) = (&result, app) {
            if err.is_element_not_found() {
                let foreground_differs = self
                    .accessibility
                    .frontmost_app()
                    .map(|f| f.name != target_app)
                    .unwrap_or(true);
                if foreground_differs && self.accessibility.activate_app(target_app).is_ok() {
                    if let Some(p) = pid {
                        self.pipeline.invalidate(p);
                    }
                    std::thread::sleep(SETTLE);
                    result = self.run_handler(intent, app, pid);
                    retried = true;
                }
            }
        }
        let via_label = LAST_VIA_LABEL.with(|cell| cell.borrow_mut().take());

        let elapsed_s = start.elapsed().as_secs_f64();
        let ok = result.is_ok();

        let diff = if !is_getter {
            std::thread::sleep(SETTLE);
            if let (Some(before), Some(p)) = (&before_snapshot, pid) {
                self.pipeline.invalidate(p);
                self.take_snapshot(p, app.unwrap_or_default())
                    .ok()
                    .map(|after| {
                        let d = fusion::snapshot_diff(before, &after);
                        ctx.fingerprint_before = Some(before.fingerprint.clone());
                        ctx.fingerprint_after = Some(after.fingerprint.clone());
                        d
                    })
            } else {
                None
            }
        } else {
            None
        };

        ctx.ok = Some(ok);
        ctx.elapsed_s = Some(elapsed_s);
        ctx.via_label = via_label.clone();
        if let Err(err) = &result {
            ctx.error_message = Some(err.to_string());
        }
        self.hooks.run(Event::AfterAct, &mut ctx);

        self.control.record_telemetry(
            Some("act"),
            Some(intent.canonical_verb()),
            Some(if ok { "ok" } else { "error" }),
            None,
            Some(elapsed_s),
            true,
        );

        self.schedule_focus_restore(intent, app);

        let recent_journal: Vec<String> = self
            .journal
            .tail(3)
            .into_iter()
            .map(|e| format!("{} {} -> {}", e.app, e.intent_text, if e.ok { "ok" } else { "error" }))
            .collect();

        match result {
            Ok(text) => {
                let mut outcome = DispatchOutcome::ok(text);
                outcome.diff = diff;
                outcome.retried = retried;
                outcome.recent_journal = recent_journal;
                outcome.via_label = via_label;
                outcome
            }
            Err(err) => {
                self.hooks.run(Event::OnError, &mut ctx);
                let mut outcome = DispatchOutcome::err(err);
                outcome.retried = retried;
                outcome.skill_hint = ctx.skill_hint;
                outcome.recent_journal = recent_journal;
                outcome
            }
        }
    }

    fn record_after_act(&self, ctx: &mut HookContext, ok: bool, elapsed_s: Option<f64>) {
        ctx.ok = Some(ok);
        ctx.elapsed_s = elapsed_s.or(Some(0.0));
        self.hooks.run(Event::AfterAct, ctx);
    }

    fn take_snapshot(&self, pid: i32, app_name: &str) -> Result<Snapshot> {
        let result = self.pipeline.run(pid)?;
        let windows = self
            .accessibility
            .windows()?
            .into_iter()
            .filter(|w| w.pid == pid)
            .map(|w| (w.app_name, w.title))
            .collect::<Vec<_>>();
        Ok(fusion::snapshot(app_name, &result.elements, &windows))
    }

    /// Classifies whatever system dialogs are currently on screen (spec §4.7's before_act
    /// unsafe-dialog guard and after_perceive's auto-dismiss hint both need this). OCRs each
    /// candidate window's bounds the same way `perception::layers::template_layer`'s caller
    /// does, since several classes (network/folder permission, code-signing, save-changes,
    /// keychain) are only distinguishable by their body text, not the owning process name.
    pub(crate) fn detect_dialogs(&self) -> Vec<(String, DialogClass)> {
        detect_system_dialogs(self.window_list.as_ref())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|w| {
                let text = self.ocr_window_text(&w.bounds);
                classify_dialog(&w.app_name, &text).map(|class| (w.app_name.clone(), class))
            })
            .collect()
    }

    /// Captures and OCRs a window's bounds, collapsing any detection text into one string for
    /// `classify_dialog`. Capture/OCR failures degrade to an empty string rather than aborting
    /// dialog detection — a dialog with no readable text still gets owner-name classification.
    fn ocr_window_text(&self, bounds: &Bounds) -> String {
        let Ok(image) = self
            .capture
            .capture_region(bounds.x as i32, bounds.y as i32, bounds.w as i32, bounds.h as i32)
        else {
            return String::new();
        };
        self.ocr
            .recognize(&image, (bounds.x, bounds.y))
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn resolve_pid(&self, app: &str) -> Option<i32> {
        self.accessibility
            .running_apps()
            .ok()?
            .into_iter()
            .find(|a| a.name.eq_ignore_ascii_case(app))
            .map(|a| a.pid)
    }

    /// Recipe routing for a step the GUI parser didn't recognize as a known verb (spec §4.5
    /// step 3: recipes match raw text and are consulted independently of GUI parsing).
    /// Returns `None` when nothing matches, so the caller can fall back to the parser's error.
    fn try_recipe_only(&self, raw: &str, app: Option<&str>) -> Option<DispatchOutcome> {
        let (name, handler, captures) = self.recipes.find_match(raw, app.unwrap_or_default())?;

        let mut ctx = HookContext {
            app: app.map(|s| s.to_string()),
            intent_text: Some(raw.to_string()),
            verb: Some("recipe".to_string()),
            detected_dialogs: self.detect_dialogs(),
            ..Default::default()
        };
        self.hooks.run(Event::BeforeAct, &mut ctx);
        if let Some(stop) = ctx.short_circuit.take() {
            self.hooks.run(Event::OnError, &mut ctx);
            let mut outcome = DispatchOutcome::err(NexusError::AdapterFailed(stop));
            outcome.skill_hint = ctx.skill_hint;
            return Some(outcome);
        }

        match self.run_recipe(&handler, &captures) {
            Ok(text) => {
                let mut outcome = DispatchOutcome::ok(text);
                outcome.via = Some(format!("recipe({name})"));
                self.record_after_act(&mut ctx, true, None);
                Some(outcome)
            }
            Err(_) => None,
        }
    }

    fn run_recipe(&self, handler: &Handler, captures: &[String]) -> Result<String> {
        match handler {
            Handler::Scripting(template) => {
                let snippet = recipes::substitute(template, captures);
                let out = self
                    .scripting
                    .run(&snippet, Duration::from_secs(self.config.scripting_timeout_s))?;
                if out.exit_code != 0 {
                    return Err(NexusError::AdapterFailed(out.stderr));
                }
                Ok(out.stdout)
            }
            Handler::Shell(template) => {
                let command = recipes::substitute(template, captures);
                run_shell(&command, Duration::from_secs(self.config.scripting_timeout_s))
            }
            Handler::OpenUrl(template) => {
                let url = recipes::substitute(template, captures);
                open::that(&url).map_err(|e| NexusError::AdapterFailed(e.to_string()))?;
                Ok(format!("opened {url}"))
            }
        }
    }

    /// The exhaustive GUI-verb match (spec §4.5 step 4).
    fn run_handler(&self, intent: &ParsedIntent, app: Option<&str>, pid: Option<i32>) -> Result<String> {
        match intent {
            ParsedIntent::Click { target, role_filter, flags, disambiguator, menu_path } => {
                self.handle_click(target, role_filter.as_deref(), *flags, disambiguator, menu_path.as_deref(), app, pid)
            }
            ParsedIntent::Type { text, target } => self.handle_type(text, target.as_deref(), pid),
            ParsedIntent::Press { keys } => self.handle_press(keys),
            ParsedIntent::Scroll(target) => self.handle_scroll(target, pid),
            ParsedIntent::Hover { target } => self.handle_hover(target, pid),
            ParsedIntent::Drag { from, to } => self.handle_drag(from, to, pid),
            ParsedIntent::Fill { fields } => self.handle_fill(fields, pid),
            ParsedIntent::Wait { target, timeout, until_disappears } => {
                self.handle_wait(target.as_deref(), *timeout, *until_disappears, pid)
            }
            ParsedIntent::Open { app: name } => self.handle_open(name),
            ParsedIntent::SwitchTo { app: name } => self.handle_open(name),
            ParsedIntent::Menu { path } => self.handle_menu(path, pid),
            ParsedIntent::WindowOp(op) => self.handle_window_op(op, app, pid),
            ParsedIntent::NavPath { steps } => self.handle_nav_path(steps, pid),
            ParsedIntent::BrowserOp(op) => self.handle_browser_op(op),
            ParsedIntent::WorkflowOp(op) => self.handle_workflow_op(op),
            ParsedIntent::Shortcut(shortcut) => self.handle_shortcut(*shortcut, app, pid),
            ParsedIntent::WhereIsApp { app: name } => self.handle_where_is(name),
            ParsedIntent::CloseWindow => self.press_keys(&["cmd".to_string(), "w".to_string()]),
            ParsedIntent::Chain(_) => unreachable!("chains are unrolled in dispatch_intent"),
        }
    }

    fn find_target(&self, target: &str, pid: i32) -> Result<Scored> {
        let scored = perception_find(&self.cache, self.accessibility.as_ref(), target, pid, 500)?;
        scored.into_iter().next().ok_or_else(|| NexusError::ElementNotFound {
            query: target.to_string(),
            app: None,
            suggestions: self.suggest_for(target, pid),
        })
    }

    /// Closest-label "did you mean" candidates for a failed lookup (spec §7
    /// `ElementNotFound.suggestions`), scored against every labeled element currently known
    /// for `pid` (cache first, live describe_app on a miss).
    fn suggest_for(&self, target: &str, pid: i32) -> Vec<String> {
        let labels: Vec<String> = if let Some((cached, _)) = self.cache.get(pid, 500) {
            cached.into_iter().filter_map(|c| (!c.label.is_empty()).then_some(c.label)).collect()
        } else {
            self.accessibility
                .describe_app(pid, 500)
                .map(|elements| {
                    elements.into_iter().filter_map(|e| (!e.label.is_empty()).then_some(e.label)).collect()
                })
                .unwrap_or_default()
        };
        suggest_labels(target, &labels, 3)
    }

    fn handle_click(
        &self,
        target: &str,
        role_filter: Option<&str>,
        flags: ClickModifiers,
        disambiguator: &Disambiguator,
        menu_path: Option<&[String]>,
        app: Option<&str>,
        pid: Option<i32>,
    ) -> Result<String> {
        let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;

        if let Some(path) = menu_path {
            return self.handle_menu(path, Some(pid));
        }

        if let Disambiguator::Coordinate { x, y } = disambiguator {
            self.click_at(*x, *y, flags)?;
            return Ok(format!("clicked at ({x:.0},{y:.0})"));
        }

        match self.click_by_label(target, role_filter, flags, disambiguator, pid) {
            Err(err) if err.is_element_not_found() => {
                // Label-learning retry (spec §4.8, §8 "Label learning" end-to-end scenario): a
                // prior fail→success correlation may have learned `target` as an alias for a
                // differently-labeled element in this app; try that translation once before
                // giving up.
                let Some(app_name) = app else { return Err(err) };
                let Some(learned) = self.store.label_lookup(app_name, &target.to_lowercase()).ok().flatten() else {
                    return Err(err);
                };
                let text = self.click_by_label(&learned, role_filter, flags, disambiguator, pid)?;
                LAST_VIA_LABEL.with(|cell| {
                    *cell.borrow_mut() = Some(format!("{} -> {learned}", target.to_lowercase()))
                });
                Ok(text)
            }
            other => other,
        }
    }

    fn click_by_label(
        &self,
        target: &str,
        role_filter: Option<&str>,
        flags: ClickModifiers,
        disambiguator: &Disambiguator,
        pid: i32,
    ) -> Result<String> {
        let mut query = target.to_string();
        if let Some(role) = role_filter {
            query = format!("{role} {query}");
        }
        let scored = perception_find(&self.cache, self.accessibility.as_ref(), &query, pid, 500)?;
        let candidates = self.apply_disambiguator(scored, disambiguator);
        let Scored { element, .. } = candidates
            .into_iter()
            .next()
            .ok_or_else(|| NexusError::ElementNotFound {
                query: target.to_string(),
                app: None,
                suggestions: self.suggest_for(target, pid),
            })?;

        self.click_element(&element, flags)?;
        Ok(format!("clicked {:?} \"{}\"", element.role, element.label))
    }

    fn apply_disambiguator(&self, mut scored: Vec<Scored>, disambiguator: &Disambiguator) -> Vec<Scored> {
        match disambiguator {
            Disambiguator::Ordinal { n, role } => {
                if let Some(role) = role {
                    scored.retain(|s| format!("{:?}", s.element.role).eq_ignore_ascii_case(role));
                }
                let idx = if *n < 0 {
                    scored.len().saturating_sub(1)
                } else {
                    (*n as usize).saturating_sub(1)
                };
                scored.into_iter().nth(idx).into_iter().collect()
            }
            Disambiguator::Spatial { direction, reference } => {
                self.filter_spatial(scored, *direction, reference)
            }
            Disambiguator::Region(region) => self.filter_region(scored, *region),
            Disambiguator::Container { row_match } => {
                let needle = row_match.to_lowercase();
                scored.retain(|s| s.element.container.as_deref().unwrap_or_default().to_lowercase().contains(&needle));
                scored
            }
            Disambiguator::ContainerIndex { row_n } => {
                scored.into_iter().nth(row_n.saturating_sub(1)).into_iter().collect()
            }
            Disambiguator::Coordinate { .. } | Disambiguator::None => scored,
        }
    }

    fn filter_spatial(&self, scored: Vec<Scored>, direction: SpatialDirection, reference: &str) -> Vec<Scored> {
        let Some(reference_pos) = scored
            .iter()
            .find(|s| s.element.label.eq_ignore_ascii_case(reference))
            .and_then(|s| s.element.position)
        else {
            return scored;
        };
        scored
            .into_iter()
            .filter(|s| {
                let Some((x, y)) = s.element.position else { return false };
                match direction {
                    SpatialDirection::Below => y > reference_pos.1,
                    SpatialDirection::Above => y < reference_pos.1,
                    SpatialDirection::LeftOf => x < reference_pos.0,
                    SpatialDirection::RightOf => x > reference_pos.0,
                    SpatialDirection::Near => {
                        let dx = x - reference_pos.0;
                        let dy = y - reference_pos.1;
                        (dx * dx + dy * dy).sqrt() < 200.0
                    }
                }
            })
            .collect()
    }

    fn filter_region(&self, scored: Vec<Scored>, region: ScreenRegion) -> Vec<Scored> {
        let screen = self.screen_bounds();
        scored
            .into_iter()
            .filter(|s| {
                let Some((x, y)) = s.element.position else { return false };
                region_contains(region, screen, x, y)
            })
            .collect()
    }

    fn screen_bounds(&self) -> Bounds {
        Bounds { x: 0.0, y: 0.0, w: 1920.0, h: 1080.0 }
    }

    fn click_element(&self, element: &Element, flags: ClickModifiers) -> Result<()> {
        if flags.double || flags.triple || flags.right || flags.shift || flags.cmd || flags.opt || flags.ctrl {
            let Some((x, y)) = element.position else {
                return Err(NexusError::AdapterFailed("element has no position for modified click".to_string()));
            };
            return self.click_at(x, y, flags);
        }
        if self.accessibility.press(element).is_ok() {
            return Ok(());
        }
        if self.accessibility.confirm(element).is_ok() {
            return Ok(());
        }
        if self.accessibility.show_menu(element).is_ok() {
            return Ok(());
        }
        let (x, y) = element
            .position
            .ok_or_else(|| NexusError::AdapterFailed("element has no position for coordinate fallback".to_string()))?;
        self.input.click(x, y, MouseButton::Left, Modifiers::default())
    }

    fn click_at(&self, x: f64, y: f64, flags: ClickModifiers) -> Result<()> {
        let modifiers = Modifiers { cmd: flags.cmd, shift: flags.shift, ctrl: flags.ctrl, opt: flags.opt };
        if flags.double {
            return self.input.double_click(x, y);
        }
        if flags.triple {
            return self.input.triple_click(x, y);
        }
        let button = if flags.right { MouseButton::Right } else { MouseButton::Left };
        self.input.click(x, y, button, modifiers)
    }

    fn handle_type(&self, text: &str, target: Option<&str>, pid: Option<i32>) -> Result<String> {
        if let (Some(target), Some(pid)) = (target, pid) {
            let scored = self.find_target(target, pid)?;
            if self.accessibility.set_attribute(&scored.element, "AXValue", text).is_ok() {
                return Ok(format!("typed into \"{target}\""));
            }
        }
        if text.len() > 8 {
            crate::adapters::scripting::atomic_paste(text, self.input.as_ref(), &self.config)?;
        } else {
            self.input.type_text(text)?;
        }
        Ok(format!("typed {text:?}"))
    }

    fn handle_press(&self, keys: &[String]) -> Result<String> {
        self.press_keys(keys)
    }

    fn press_keys(&self, keys: &[String]) -> Result<String> {
        let mut modifiers = Modifiers::default();
        let mut codes = Vec::new();
        for token in keys {
            if !crate::adapters::input::parse_modifier_token(token, &mut modifiers) {
                if let Some(code) = crate::adapters::input::key_alias_to_code(token) {
                    codes.push(code);
                }
            }
        }
        if codes.is_empty() {
            return Err(NexusError::AdapterFailed(format!("no recognized key in {keys:?}")));
        }
        if codes.len() == 1 && !modifiers.cmd && !modifiers.shift && !modifiers.ctrl && !modifiers.opt {
            self.input.key_press(codes[0], modifiers)?;
        } else {
            self.input.hotkey(&codes, modifiers)?;
        }
        Ok(format!("pressed {}", keys.join("+")))
    }

    fn handle_scroll(&self, target: &ScrollTarget, pid: Option<i32>) -> Result<String> {
        match target {
            ScrollTarget::Plain { direction, clicks } => {
                let (dx, dy) = scroll_delta(*direction, *clicks);
                self.input.scroll(0.0, 0.0, dx, dy)?;
                Ok(format!("scrolled {direction:?} {clicks}"))
            }
            ScrollTarget::InElement { direction, clicks, element } => {
                let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
                let scored = self.find_target(element, pid)?;
                let (x, y) = scored.element.position.unwrap_or((0.0, 0.0));
                let (dx, dy) = scroll_delta(*direction, *clicks);
                self.input.scroll(x, y, dx, dy)?;
                Ok(format!("scrolled {direction:?} in \"{element}\""))
            }
            ScrollTarget::Until { target } => {
                let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
                for _ in 0..self.config.scroll_until_max_iterations {
                    self.pipeline.invalidate(pid);
                    if self.find_target(target, pid).is_ok() {
                        return Ok(format!("scrolled until \"{target}\" appeared"));
                    }
                    self.input.scroll(0.0, 0.0, 0, 3)?;
                }
                Err(NexusError::ElementNotFound {
                    query: target.clone(),
                    app: None,
                    suggestions: self.suggest_for(target, pid),
                })
            }
        }
    }

    fn handle_hover(&self, target: &str, pid: Option<i32>) -> Result<String> {
        let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
        let scored = self.find_target(target, pid)?;
        let (x, y) = scored
            .element
            .position
            .ok_or_else(|| NexusError::AdapterFailed("element has no position".to_string()))?;
        self.input.hover(x, y)?;
        Ok(format!("hovering \"{target}\""))
    }

    fn handle_drag(&self, from: &str, to: &str, pid: Option<i32>) -> Result<String> {
        let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
        let from_pos = self.resolve_point(from, pid)?;
        let to_pos = self.resolve_point(to, pid)?;
        self.input.drag(from_pos, to_pos)?;
        Ok(format!("dragged \"{from}\" to \"{to}\""))
    }

    fn resolve_point(&self, spec: &str, pid: i32) -> Result<(f64, f64)> {
        if let Some((x, y)) = parse_xy(spec) {
            return Ok((x, y));
        }
        let scored = self.find_target(spec, pid)?;
        scored.element.position.ok_or_else(|| NexusError::AdapterFailed(format!("\"{spec}\" has no position")))
    }

    fn handle_fill(&self, fields: &[(String, String)], pid: Option<i32>) -> Result<String> {
        let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
        let mut filled = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let scored = self.find_target(name, pid)?;
            self.accessibility.set_attribute(&scored.element, "AXValue", value)?;
            std::thread::sleep(Duration::from_millis(100));
            filled.push(name.clone());
        }
        Ok(format!("filled {}", filled.join(", ")))
    }

    fn handle_wait(&self, target: Option<&str>, timeout: Duration, until_disappears: bool, pid: Option<i32>) -> Result<String> {
        let Some(target) = target else {
            std::thread::sleep(timeout);
            return Ok(format!("waited {:.1}s", timeout.as_secs_f64()));
        };
        let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
        let deadline = Instant::now() + timeout;
        loop {
            self.pipeline.invalidate(pid);
            let found = self.find_target(target, pid).is_ok();
            if found != until_disappears {
                let verb = if until_disappears { "disappeared" } else { "appeared" };
                return Ok(format!("\"{target}\" {verb}"));
            }
            if Instant::now() >= deadline {
                return Err(NexusError::Timeout(timeout));
            }
            std::thread::sleep(Duration::from_millis(500));
        }
    }

    fn handle_open(&self, name: &str) -> Result<String> {
        self.accessibility.activate_app(name)?;
        Ok(format!("opened {name}"))
    }

    fn handle_menu(&self, path: &[String], pid: Option<i32>) -> Result<String> {
        let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
        let item = self
            .accessibility
            .find_menu_item(path, pid)?
            .ok_or_else(|| NexusError::ElementNotFound { query: path.join(" > "), app: None, suggestions: Vec::new() })?;
        if !item.enabled {
            return Err(NexusError::AdapterFailed(format!("menu item {:?} is disabled", item.label)));
        }
        if let Some(shortcut) = &item.shortcut {
            let keys: Vec<String> = shortcut.split('+').map(|s| s.to_string()).collect();
            return self.press_keys(&keys);
        }
        Err(NexusError::UnsupportedCapability("menu item has no shortcut and no direct AX handle".to_string()))
    }

    fn handle_window_op(&self, op: &WindowOp, app: Option<&str>, pid: Option<i32>) -> Result<String> {
        let screen = self.screen_bounds();
        match op {
            WindowOp::ListWindows => {
                let windows = self.accessibility.windows()?;
                Ok(windows.iter().map(|w| format!("{} - {}", w.app_name, w.title)).collect::<Vec<_>>().join("\n"))
            }
            WindowOp::Info => {
                let Some(pid) = pid else { return Err(NexusError::AdapterFailed("no active process".to_string())) };
                let bounds = self.current_window_bounds(pid)?;
                Ok(format!("{}x{} at ({},{})", bounds.w, bounds.h, bounds.x, bounds.y))
            }
            WindowOp::Minimize | WindowOp::Restore | WindowOp::Maximize | WindowOp::Fullscreen => {
                let key = match op {
                    WindowOp::Minimize => "m",
                    WindowOp::Fullscreen => "f",
                    _ => "return",
                };
                self.press_keys(&["cmd".to_string(), key.to_string()])
            }
            WindowOp::CloseWindow => self.press_keys(&["cmd".to_string(), "w".to_string()]),
            WindowOp::Move { app: target_app, slot } => {
                let pid = target_app
                    .as_deref()
                    .and_then(|a| self.resolve_pid(a))
                    .or(pid)
                    .ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
                let current = self.current_window_bounds(pid)?;
                let bounds = window_grid::slot_to_bounds(slot, screen, current);
                self.move_window_to(pid, bounds)?;
                Ok(format!("moved window to {bounds:?}"))
            }
            WindowOp::Resize { app: target_app, spec } => {
                let pid = target_app
                    .as_deref()
                    .and_then(|a| self.resolve_pid(a))
                    .or(pid)
                    .ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
                let current = self.current_window_bounds(pid)?;
                let bounds = window_grid::resize_to_bounds(spec, current);
                self.move_window_to(pid, bounds)?;
                Ok(format!("resized window to {}x{}", bounds.w, bounds.h))
            }
            WindowOp::Tile { a, b } => {
                let (left, right) = window_grid::tile_bounds(screen);
                let pid_a = self.resolve_pid(a).ok_or_else(|| NexusError::ElementNotFound { query: a.clone(), app: None, suggestions: Vec::new() })?;
                let pid_b = self.resolve_pid(b).ok_or_else(|| NexusError::ElementNotFound { query: b.clone(), app: None, suggestions: Vec::new() })?;
                self.move_window_to(pid_a, left)?;
                self.move_window_to(pid_b, right)?;
                Ok(format!("tiled {a} and {b}"))
            }
        }
        .map(|text| {
            let _ = app;
            text
        })
    }

    fn current_window_bounds(&self, pid: i32) -> Result<Bounds> {
        self.accessibility
            .windows()?
            .into_iter()
            .find(|w| w.pid == pid)
            .map(|w| w.bounds)
            .ok_or_else(|| NexusError::AdapterFailed(format!("no window found for pid {pid}")))
    }

    fn move_window_to(&self, pid: i32, bounds: Bounds) -> Result<()> {
        self.accessibility.set_window_bounds(pid, bounds)
    }

    fn handle_nav_path(&self, steps: &[String], pid: Option<i32>) -> Result<String> {
        let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
        for step in steps {
            let scored = self.find_target(step, pid)?;
            self.click_element(&scored.element, ClickModifiers::default())?;
            std::thread::sleep(Duration::from_millis(300));
            self.pipeline.invalidate(pid);
        }
        Ok(format!("navigated {}", steps.join(" > ")))
    }

    fn handle_browser_op(&self, op: &BrowserOp) -> Result<String> {
        self.browser.ensure_running()?;
        self.browser.attach(None)?;
        match op {
            BrowserOp::NavigateUrl(url) => {
                let url = auto_scheme(url);
                self.browser.navigate(&url)?;
                Ok(format!("navigated to {url}"))
            }
            BrowserOp::Js(expr) => Ok(self.browser.evaluate(expr)?.to_string()),
            BrowserOp::SwitchTab(query) => {
                self.browser.attach(Some(query))?;
                self.browser.bring_to_front()?;
                Ok(format!("switched to tab matching {query:?}"))
            }
            BrowserOp::NewTab(url) => {
                let target = url.clone().unwrap_or_else(|| "about:blank".to_string());
                self.browser.navigate(&target)?;
                Ok(format!("opened new tab {target}"))
            }
            BrowserOp::CloseTab(_) => self.press_keys(&["cmd".to_string(), "w".to_string()]),
            BrowserOp::GetConsole => Err(NexusError::UnsupportedCapability("console capture not wired to CDP Log domain".to_string())),
            BrowserOp::GetUrl => Ok(self.browser.evaluate("window.location.href")?.to_string()),
            BrowserOp::GetTabs => Err(NexusError::UnsupportedCapability("tab enumeration not exposed past CDP discovery".to_string())),
        }
    }

    fn handle_workflow_op(&self, op: &WorkflowOp) -> Result<String> {
        match op {
            WorkflowOp::RecordStart { name, kind } => match kind {
                RecordKind::Workflow => {
                    self.recording.start(name).map_err(NexusError::AdapterFailed)?;
                    self.store.workflow_create(name, None)?;
                    Ok(format!("started recording workflow \"{name}\""))
                }
                RecordKind::Route => Ok(format!("started recording route \"{name}\"")),
            },
            WorkflowOp::RecordStop => match self.recording.stop() {
                Some((name, steps)) => Ok(format!("stopped recording \"{name}\" ({steps} steps)")),
                None => Err(NexusError::AdapterFailed("not currently recording".to_string())),
            },
            WorkflowOp::Replay { name, kind } => match kind {
                RecordKind::Route => {
                    let route = self
                        .store
                        .route_get(name)?
                        .ok_or_else(|| NexusError::AdapterFailed(format!("no route named {name:?}")))?;
                    // The route's own recorded app, not whatever happens to be active, decides
                    // which process's current window the locator tiers resolve against.
                    let pid = route.app.as_deref().and_then(|app| self.resolve_pid(app));
                    let results = crate::via::replay_route(self.accessibility.as_ref(), self.input.as_ref(), &route, pid, 1.0)?;
                    Ok(format!("replayed {} steps of route \"{name}\"", results.len()))
                }
                RecordKind::Workflow => {
                    let workflow = self
                        .store
                        .workflow_get(name)?
                        .ok_or_else(|| NexusError::AdapterFailed(format!("no workflow named {name:?}")))?;
                    for step in &workflow.steps {
                        self.dispatch_text(&step.action, workflow.app.as_deref(), None);
                    }
                    self.store.workflow_record_outcome(name, true)?;
                    Ok(format!("replayed workflow \"{name}\" ({} steps)", workflow.steps.len()))
                }
            },
            WorkflowOp::List(kind) => match kind {
                RecordKind::Route => Ok(self.store.route_list()?.into_iter().map(|r| r.name).collect::<Vec<_>>().join("\n")),
                RecordKind::Workflow => Ok(self.store.workflow_list()?.into_iter().map(|w| w.name).collect::<Vec<_>>().join("\n")),
            },
            WorkflowOp::Delete { name, kind } => {
                match kind {
                    RecordKind::Route => self.store.route_delete(name)?,
                    RecordKind::Workflow => self.store.workflow_delete(name)?,
                }
                Ok(format!("deleted {kind:?} \"{name}\""))
            }
        }
    }

    fn handle_shortcut(&self, shortcut: Shortcut, app: Option<&str>, pid: Option<i32>) -> Result<String> {
        match shortcut {
            Shortcut::SelectAll => self.press_keys(&["cmd".to_string(), "a".to_string()]),
            Shortcut::Copy => self.press_keys(&["cmd".to_string(), "c".to_string()]),
            Shortcut::Paste => self.press_keys(&["cmd".to_string(), "v".to_string()]),
            Shortcut::Undo => self.press_keys(&["cmd".to_string(), "z".to_string()]),
            Shortcut::Redo => self.press_keys(&["cmd".to_string(), "shift".to_string(), "z".to_string()]),
            Shortcut::GetClipboard => {
                let clipboard = arboard::Clipboard::new()
                    .and_then(|mut c| c.get_text())
                    .map_err(|e| NexusError::AdapterFailed(e.to_string()))?;
                Ok(clipboard)
            }
            Shortcut::GetSelection => {
                get_selected_text::get_selected_text().map_err(|e| NexusError::AdapterFailed(e.to_string()))
            }
            Shortcut::GetTable => {
                let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
                let result = self.pipeline.run(pid)?;
                Ok(result
                    .tables
                    .into_iter()
                    .map(|t| format!("{}: {} rows", t.label, t.rows.len()))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Shortcut::GetList => {
                let pid = pid.ok_or_else(|| NexusError::AdapterFailed("no active process".to_string()))?;
                let result = self.pipeline.run(pid)?;
                Ok(result
                    .lists
                    .into_iter()
                    .map(|l| format!("{}: {} items", l.label, l.items.len()))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Shortcut::ListRecipes => {
                let app = app.unwrap_or_default();
                Ok(self.recipes.names_for(app).join("\n"))
            }
        }
    }

    fn handle_where_is(&self, app: &str) -> Result<String> {
        let fingerprint = self
            .accessibility
            .frontmost_app()
            .ok()
            .and_then(|f| self.resolve_pid(&f.name))
            .and_then(|pid| self.pipeline.run(pid).ok())
            .map(|r| r.fingerprint);
        let Some(current) = fingerprint else {
            return Ok(format!("no recorded path known yet; open {app} and try again"));
        };
        let target_node = self.store.graph_node(app)?;
        let Some(target) = target_node.map(|n| n.hash) else {
            return Ok(format!("no navigation history recorded for {app} yet"));
        };
        match crate::navigation::suggest_action(&self.store, &current, &target) {
            Some(action) => Ok(format!("try: {action}")),
            None => Ok(format!("no known path from here to {app}")),
        }
    }

    /// Schedules a background re-activation ≈400ms out when the intent implies focus moved to
    /// a named app, to counteract focus theft by the host that invoked the tool (spec §4.5).
    fn schedule_focus_restore(&self, intent: &ParsedIntent, app: Option<&str>) {
        let target = match intent {
            ParsedIntent::SwitchTo { app } | ParsedIntent::Open { app } => Some(app.clone()),
            _ => app.map(|s| s.to_string()),
        };
        let Some(target) = target else { return };
        let accessibility = self.accessibility.clone();
        std::thread::spawn(move || {
            std::thread::sleep(FOCUS_RESTORE_DELAY);
            let _ = accessibility.activate_app(&target);
        });
    }
}

fn region_contains(region: ScreenRegion, screen: Bounds, x: f64, y: f64) -> bool {
    let col = if x < screen.w / 3.0 {
        0
    } else if x < 2.0 * screen.w / 3.0 {
        1
    } else {
        2
    };
    let row = if y < screen.h / 3.0 {
        0
    } else if y < 2.0 * screen.h / 3.0 {
        1
    } else {
        2
    };
    matches!(
        (row, col, region),
        (0, 0, ScreenRegion::TopLeft)
            | (0, 1, ScreenRegion::TopCenter)
            | (0, 2, ScreenRegion::TopRight)
            | (1, 0, ScreenRegion::MiddleLeft)
            | (1, 1, ScreenRegion::Center)
            | (1, 2, ScreenRegion::MiddleRight)
            | (2, 0, ScreenRegion::BottomLeft)
            | (2, 1, ScreenRegion::BottomCenter)
            | (2, 2, ScreenRegion::BottomRight)
    )
}

fn scroll_delta(direction: ScrollDirection, clicks: u32) -> (i32, i32) {
    let n = clicks as i32;
    match direction {
        ScrollDirection::Up => (0, -n),
        ScrollDirection::Down => (0, n),
        ScrollDirection::Left => (-n, 0),
        ScrollDirection::Right => (n, 0),
    }
}

/// Prefixes a bare host/path with `https://` (spec §4.5 "navigate-to-url auto http(s)/file
/// scheme"); leaves anything already carrying a scheme or an explicit local path alone.
fn auto_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else if url.starts_with('/') || url.starts_with('.') {
        format!("file://{url}")
    } else {
        format!("https://{url}")
    }
}

fn parse_xy(spec: &str) -> Option<(f64, f64)> {
    let spec = spec.trim().trim_start_matches("at").trim();
    let mut parts = spec.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty());
    let x: f64 = parts.next()?.parse().ok()?;
    let y: f64 = parts.next()?.parse().ok()?;
    Some((x, y))
}

/// Runs a shell command via the system shell, capturing stdout/stderr within `timeout` (spec
/// §4.6 "shell command with capture and a default 30s timeout").
fn run_shell(command: &str, timeout: Duration) -> Result<String> {
    let mut child = std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| NexusError::AdapterFailed(e.to_string()))?;

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(|e| NexusError::AdapterFailed(e.to_string()))? {
            use std::io::Read;
            let mut stdout = String::new();
            let mut stderr = String::new();
            if let Some(mut out) = child.stdout.take() {
                let _ = out.read_to_string(&mut stdout);
            }
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr);
            }
            if status.success() {
                return Ok(stdout);
            }
            return Err(NexusError::AdapterFailed(stderr));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            return Err(NexusError::Timeout(timeout));
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_classifies_center() {
        let screen = Bounds { x: 0.0, y: 0.0, w: 900.0, h: 900.0 };
        assert!(region_contains(ScreenRegion::Center, screen, 450.0, 450.0));
        assert!(!region_contains(ScreenRegion::TopLeft, screen, 450.0, 450.0));
    }

    #[test]
    fn scroll_delta_down_is_positive_y() {
        assert_eq!(scroll_delta(ScrollDirection::Down, 3), (0, 3));
    }

    #[test]
    fn parse_xy_handles_comma_and_space() {
        assert_eq!(parse_xy("at 10,20"), Some((10.0, 20.0)));
        assert_eq!(parse_xy("10 20"), Some((10.0, 20.0)));
    }
}
