//! Input-synthesis adapter: CGEvent-based click/type/key/scroll, matching
//! `original_source/nexus/act/input.py` one-for-one but using `core-graphics` CGEvent
//! posting instead of pyautogui.

use super::{InputSynthesis, Modifiers, MouseButton};
use crate::error::Result;
use std::thread::sleep;
use std::time::Duration;

pub struct MacInput;

#[cfg(target_os = "macos")]
mod cg {
    use core_graphics::event::{
        CGEvent, CGEventFlags, CGEventTapLocation, CGEventType, CGMouseButton, ScrollEventUnit,
    };
    use core_graphics::event_source::{CGEventSourceStateID, CGEventSource};
    use core_graphics::geometry::CGPoint;

    pub fn source() -> CGEventSource {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState).expect("CGEventSource")
    }

    pub fn modifier_flags(m: super::Modifiers) -> CGEventFlags {
        let mut flags = CGEventFlags::empty();
        if m.cmd {
            flags |= CGEventFlags::CGEventFlagCommand;
        }
        if m.shift {
            flags |= CGEventFlags::CGEventFlagShift;
        }
        if m.ctrl {
            flags |= CGEventFlags::CGEventFlagControl;
        }
        if m.opt {
            flags |= CGEventFlags::CGEventFlagAlternate;
        }
        flags
    }

    pub fn mouse_button(b: super::MouseButton) -> (CGMouseButton, CGEventType, CGEventType) {
        match b {
            super::MouseButton::Left => (
                CGMouseButton::Left,
                CGEventType::LeftMouseDown,
                CGEventType::LeftMouseUp,
            ),
            super::MouseButton::Right => (
                CGMouseButton::Right,
                CGEventType::RightMouseDown,
                CGEventType::RightMouseUp,
            ),
            super::MouseButton::Middle => (
                CGMouseButton::Center,
                CGEventType::OtherMouseDown,
                CGEventType::OtherMouseUp,
            ),
        }
    }

    pub fn point(x: f64, y: f64) -> CGPoint {
        CGPoint::new(x, y)
    }

    pub const TAP: CGEventTapLocation = CGEventTapLocation::HID;
    pub use core_graphics::event::CGEvent as _Event;
    pub type Unit = ScrollEventUnit;
}

#[cfg(target_os = "macos")]
impl InputSynthesis for MacInput {
    fn click(&self, x: f64, y: f64, button: MouseButton, modifiers: Modifiers) -> Result<()> {
        use core_graphics::event::CGEvent;
        let src = cg::source();
        let (cg_button, down, up) = cg::mouse_button(button);
        let flags = cg::modifier_flags(modifiers);
        let p = cg::point(x, y);
        if let Ok(ev) = CGEvent::new_mouse_event(src.clone(), down, p, cg_button) {
            ev.set_flags(flags);
            ev.post(cg::TAP);
        }
        if let Ok(ev) = CGEvent::new_mouse_event(cg::source(), up, p, cg_button) {
            ev.set_flags(flags);
            ev.post(cg::TAP);
        }
        Ok(())
    }

    fn double_click(&self, x: f64, y: f64) -> Result<()> {
        self.click(x, y, MouseButton::Left, Modifiers::default())?;
        sleep(Duration::from_millis(40));
        self.click(x, y, MouseButton::Left, Modifiers::default())
    }

    fn triple_click(&self, x: f64, y: f64) -> Result<()> {
        for _ in 0..3 {
            self.click(x, y, MouseButton::Left, Modifiers::default())?;
            sleep(Duration::from_millis(40));
        }
        Ok(())
    }

    fn hover(&self, x: f64, y: f64) -> Result<()> {
        use core_graphics::event::{CGEvent, CGEventType};
        let p = cg::point(x, y);
        if let Ok(ev) =
            CGEvent::new_mouse_event(cg::source(), CGEventType::MouseMoved, p, core_graphics::event::CGMouseButton::Left)
        {
            ev.post(cg::TAP);
        }
        Ok(())
    }

    fn drag(&self, from: (f64, f64), to: (f64, f64)) -> Result<()> {
        use core_graphics::event::{CGEvent, CGEventType, CGMouseButton};
        let src = cg::source();
        let down = cg::point(from.0, from.1);
        let up = cg::point(to.0, to.1);
        if let Ok(ev) = CGEvent::new_mouse_event(src.clone(), CGEventType::LeftMouseDown, down, CGMouseButton::Left) {
            ev.post(cg::TAP);
        }
        sleep(Duration::from_millis(20));
        if let Ok(ev) = CGEvent::new_mouse_event(src.clone(), CGEventType::LeftMouseDragged, up, CGMouseButton::Left) {
            ev.post(cg::TAP);
        }
        sleep(Duration::from_millis(20));
        if let Ok(ev) = CGEvent::new_mouse_event(src, CGEventType::LeftMouseUp, up, CGMouseButton::Left) {
            ev.post(cg::TAP);
        }
        Ok(())
    }

    fn scroll(&self, x: f64, y: f64, dx: i32, dy: i32) -> Result<()> {
        use core_graphics::event::CGEvent;
        self.hover(x, y)?;
        if let Ok(ev) = CGEvent::new_scroll_event(cg::source(), cg::Unit::Pixel, 2, dy, dx, 0) {
            ev.post(cg::TAP);
        }
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        use core_graphics::event::CGEvent;
        for ch in text.encode_utf16() {
            if let Ok(ev) = CGEvent::new_keyboard_event(cg::source(), 0, true) {
                ev.set_string_from_utf16_unchecked(&[ch]);
                ev.post(cg::TAP);
            }
            if let Ok(ev) = CGEvent::new_keyboard_event(cg::source(), 0, false) {
                ev.set_string_from_utf16_unchecked(&[ch]);
                ev.post(cg::TAP);
            }
        }
        Ok(())
    }

    fn key_press(&self, key_code: u16, modifiers: Modifiers) -> Result<()> {
        self.hotkey(&[key_code], modifiers)
    }

    fn hotkey(&self, key_codes: &[u16], modifiers: Modifiers) -> Result<()> {
        use core_graphics::event::CGEvent;
        let flags = cg::modifier_flags(modifiers);
        for &code in key_codes {
            if let Ok(ev) = CGEvent::new_keyboard_event(cg::source(), code, true) {
                ev.set_flags(flags);
                ev.post(cg::TAP);
            }
        }
        for &code in key_codes.iter().rev() {
            if let Ok(ev) = CGEvent::new_keyboard_event(cg::source(), code, false) {
                ev.set_flags(flags);
                ev.post(cg::TAP);
            }
        }
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
impl InputSynthesis for MacInput {
    fn click(&self, _x: f64, _y: f64, _button: MouseButton, _modifiers: Modifiers) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn double_click(&self, _x: f64, _y: f64) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn triple_click(&self, _x: f64, _y: f64) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn hover(&self, _x: f64, _y: f64) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn drag(&self, _from: (f64, f64), _to: (f64, f64)) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn scroll(&self, _x: f64, _y: f64, _dx: i32, _dy: i32) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn type_text(&self, _text: &str) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn key_press(&self, _key_code: u16, _modifiers: Modifiers) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
    fn hotkey(&self, _key_codes: &[u16], _modifiers: Modifiers) -> Result<()> {
        Err(crate::error::NexusError::UnsupportedCapability("input synthesis".into()))
    }
}

/// Key-alias table for `press`/`hotkey` parsing (spec §4.5 item: "resolves aliases").
pub fn key_alias_to_code(alias: &str) -> Option<u16> {
    Some(match alias.to_lowercase().as_str() {
        "enter" | "return" => 36,
        "esc" | "escape" => 53,
        "space" => 49,
        "tab" => 48,
        "delete" | "backspace" => 51,
        "up" | "arrowup" => 126,
        "down" | "arrowdown" => 125,
        "left" | "arrowleft" => 123,
        "right" | "arrowright" => 124,
        "f1" => 122,
        "f2" => 120,
        "f3" => 99,
        "f4" => 118,
        "f5" => 96,
        "f6" => 97,
        "f7" => 98,
        "f8" => 100,
        "f9" => 101,
        "f10" => 109,
        "f11" => 103,
        "f12" => 111,
        other if other.len() == 1 => return ascii_key_code(other.chars().next().unwrap()),
        _ => return None,
    })
}

fn ascii_key_code(c: char) -> Option<u16> {
    // macOS virtual-keycode layout for the US QWERTY letters/digits row — covers the common
    // single-character hotkey case (`cmd+s`, `ctrl+c`, ...).
    let table: &[(char, u16)] = &[
        ('a', 0), ('s', 1), ('d', 2), ('f', 3), ('h', 4), ('g', 5), ('z', 6), ('x', 7),
        ('c', 8), ('v', 9), ('b', 11), ('q', 12), ('w', 13), ('e', 14), ('r', 15), ('y', 16),
        ('t', 17), ('1', 18), ('2', 19), ('3', 20), ('4', 21), ('6', 22), ('5', 23), ('9', 25),
        ('7', 26), ('8', 28), ('0', 29), ('o', 31), ('u', 32), ('i', 34), ('p', 35), ('l', 37),
        ('j', 38), ('k', 40), ('n', 45), ('m', 46),
    ];
    table.iter().find(|(ch, _)| *ch == c.to_ascii_lowercase()).map(|(_, code)| *code)
}

/// Resolves modifier alias tokens (`cmd`, `ctrl`, `alt`/`opt`, `shift`) into a [`Modifiers`].
pub fn parse_modifier_token(token: &str, modifiers: &mut Modifiers) -> bool {
    match token.to_lowercase().as_str() {
        "cmd" | "command" => modifiers.cmd = true,
        "ctrl" | "control" => modifiers.ctrl = true,
        "alt" | "opt" | "option" => modifiers.opt = true,
        "shift" => modifiers.shift = true,
        _ => return false,
    }
    true
}
