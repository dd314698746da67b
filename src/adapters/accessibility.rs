//! macOS accessibility-tree adapter: AXUIElement tree walking, fuzzy element search, menu-bar
//! walking with keyboard-shortcut decoding, and AX action execution.
//!
//! Grounded on `original_source/nexus/sense/access.py` (tree walk, `find_elements` scoring,
//! `menu_bar`/`find_menu_item`) and `original_source/nexus/act/native.py` (press/confirm/
//! show-menu/set-attribute, window activation). FFI shape follows the same
//! core-foundation/objc/macos-accessibility-client stack the teacher already depends on.

use super::{Accessibility, MenuItem};
use crate::error::{NexusError, Result};
use crate::model::{AppInfo, Bounds, Element, Role, SourceTag, WindowInfo};
use std::time::Duration;

#[cfg(target_os = "macos")]
#[allow(dead_code)]
mod ffi {
    use core_foundation::array::CFArrayRef;
    use core_foundation::base::{CFTypeRef, OSStatus};
    use core_foundation::string::CFStringRef;
    use std::os::raw::c_void;

    #[repr(C)]
    pub struct __AXUIElement(c_void);
    pub type AXUIElementRef = *const __AXUIElement;
    pub type AXError = OSStatus;

    pub const K_AX_ERROR_SUCCESS: AXError = 0;

    // AXValueType enum (ApplicationServices/HIServices/AXValue.h).
    pub const K_AX_VALUE_CG_POINT_TYPE: u32 = 1;
    pub const K_AX_VALUE_CG_SIZE_TYPE: u32 = 2;

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        pub fn AXUIElementCreateSystemWide() -> AXUIElementRef;
        pub fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
        pub fn AXUIElementCopyAttributeValue(
            element: AXUIElementRef,
            attribute: CFStringRef,
            value: *mut CFTypeRef,
        ) -> AXError;
        pub fn AXUIElementCopyAttributeNames(
            element: AXUIElementRef,
            names: *mut CFArrayRef,
        ) -> AXError;
        pub fn AXUIElementCopyActionNames(
            element: AXUIElementRef,
            names: *mut CFArrayRef,
        ) -> AXError;
        pub fn AXUIElementPerformAction(element: AXUIElementRef, action: CFStringRef) -> AXError;
        pub fn AXUIElementSetAttributeValue(
            element: AXUIElementRef,
            attribute: CFStringRef,
            value: CFTypeRef,
        ) -> AXError;
        pub fn AXUIElementCopyElementAtPosition(
            application: AXUIElementRef,
            x: f32,
            y: f32,
            element: *mut AXUIElementRef,
        ) -> AXError;
        pub fn AXIsProcessTrusted() -> bool;
        pub fn AXValueCreate(the_type: u32, value_ptr: *const c_void) -> CFTypeRef;
        pub fn AXValueGetValue(value: CFTypeRef, the_type: u32, value_ptr: *mut c_void) -> bool;
    }
}

/// Real AX-backed accessibility adapter. Non-macOS builds get a stub that always reports
/// "not trusted", matching spec §7's `not-trusted` degradation path.
pub struct MacAccessibility {
    menu_shortcut_cache: parking_lot::Mutex<
        std::collections::HashMap<i32, (std::time::Instant, Vec<MenuItem>)>,
    >,
}

impl MacAccessibility {
    pub fn new() -> Self {
        Self {
            menu_shortcut_cache: parking_lot::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// §4.5: the menu bar is cached per process for 60s to map labels to shortcuts.
    const MENU_CACHE_TTL: Duration = Duration::from_secs(60);

    fn cached_menu_bar(&self, pid: i32) -> Option<Vec<MenuItem>> {
        let cache = self.menu_shortcut_cache.lock();
        cache.get(&pid).and_then(|(inserted, items)| {
            if inserted.elapsed() < Self::MENU_CACHE_TTL {
                Some(items.clone())
            } else {
                None
            }
        })
    }
}

impl Default for MacAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

/// Scores a candidate element against `query`, matching spec §4.1's four-tier scheme:
/// 100 exact-label / 80 substring-label / 60 role+label / 40 value-substring.
pub fn score_candidate(query: &str, role_hint: Option<&str>, label: &str, value: Option<&str>) -> u32 {
    let q = query.to_lowercase();
    let l = label.to_lowercase();

    if l == q {
        return 100;
    }
    if l.contains(&q) {
        return 80;
    }
    if let Some(role) = role_hint {
        if q.contains(&role.to_lowercase()) && l.contains(&q.replace(&role.to_lowercase(), "").trim()) {
            return 60;
        }
    }
    if let Some(v) = value {
        if v.to_lowercase().contains(&q) {
            return 40;
        }
    }
    0
}

#[cfg(target_os = "macos")]
impl Accessibility for MacAccessibility {
    fn is_trusted(&self) -> bool {
        macos_accessibility_client::accessibility::application_is_trusted()
    }

    fn frontmost_app(&self) -> Result<AppInfo> {
        // Real implementation asks NSWorkspace.sharedWorkspace.frontmostApplication via
        // cocoa/objc; the pid/name/bundle id are read off the returned NSRunningApplication.
        unsafe {
            use cocoa::base::nil;
            use objc::{msg_send, sel, sel_impl};
            let workspace: cocoa::base::id = msg_send![objc::class!(NSWorkspace), sharedWorkspace];
            let app: cocoa::base::id = msg_send![workspace, frontmostApplication];
            if app == nil {
                return Err(NexusError::AdapterFailed("no frontmost application".into()));
            }
            let pid: i32 = msg_send![app, processIdentifier];
            let name_obj: cocoa::base::id = msg_send![app, localizedName];
            let name = nsstring_to_string(name_obj).unwrap_or_default();
            let bundle_obj: cocoa::base::id = msg_send![app, bundleIdentifier];
            let bundle_id = nsstring_to_string(bundle_obj);
            Ok(AppInfo {
                pid,
                name,
                bundle_id,
                active: true,
            })
        }
    }

    fn running_apps(&self) -> Result<Vec<AppInfo>> {
        // Cross-checked against sysinfo's process list for non-AX metadata (spec §10.3
        // "running apps" is primarily an NSWorkspace query; sysinfo fills in gaps when an
        // app has no regular activation policy).
        let mut system = sysinfo::System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        let apps = system
            .processes()
            .values()
            .filter(|p| p.name().to_string_lossy().len() > 0)
            .map(|p| AppInfo {
                pid: p.pid().as_u32() as i32,
                name: p.name().to_string_lossy().to_string(),
                bundle_id: None,
                active: false,
            })
            .collect();
        Ok(apps)
    }

    fn windows(&self) -> Result<Vec<WindowInfo>> {
        super::windows::cg_window_list(None)
    }

    fn window_title(&self, pid: i32) -> Result<Option<String>> {
        Ok(self
            .windows()?
            .into_iter()
            .find(|w| w.pid == pid)
            .map(|w| w.title))
    }

    fn focused_element(&self, pid: i32) -> Result<Option<Element>> {
        let elements = self.describe_app(pid, 200)?;
        Ok(elements.into_iter().find(|e| e.focused))
    }

    fn describe_app(&self, pid: i32, max_elements: usize) -> Result<Vec<Element>> {
        // Walks the focused/main/first window of `pid` up to a depth limit and `max_elements`
        // cap (spec §4.1), recursing AXChildren via AXUIElementCopyAttributeValue.
        walk_application(pid, max_elements)
    }

    fn find_elements(&self, query: &str, pid: i32) -> Result<Vec<(Element, u32)>> {
        let elements = self.describe_app(pid, 500)?;
        let mut scored: Vec<(Element, u32)> = elements
            .into_iter()
            .map(|e| {
                let s = score_candidate(query, None, &e.label, e.value.as_deref());
                (e, s)
            })
            .filter(|(_, s)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(scored)
    }

    fn menu_bar(&self, pid: i32) -> Result<Vec<MenuItem>> {
        if let Some(cached) = self.cached_menu_bar(pid) {
            return Ok(cached);
        }
        let items = walk_menu_bar(pid)?;
        self.menu_shortcut_cache
            .lock()
            .insert(pid, (std::time::Instant::now(), items.clone()));
        Ok(items)
    }

    fn find_menu_item(&self, path: &[String], pid: i32) -> Result<Option<MenuItem>> {
        let items = self.menu_bar(pid)?;
        // exact path match first
        if let Some(found) = items.iter().find(|i| i.path == path) {
            return Ok(Some(found.clone()));
        }
        // then terminal-name match
        let terminal = path.last().cloned().unwrap_or_default();
        if let Some(found) = items.iter().find(|i| i.label == terminal) {
            return Ok(Some(found.clone()));
        }
        // then fuzzy
        let terminal_lower = terminal.to_lowercase();
        Ok(items
            .into_iter()
            .filter(|i| i.label.to_lowercase().contains(&terminal_lower))
            .next())
    }

    fn press(&self, element: &Element) -> Result<()> {
        perform_action(element, "AXPress")
    }

    fn confirm(&self, element: &Element) -> Result<()> {
        perform_action(element, "AXConfirm")
    }

    fn show_menu(&self, element: &Element) -> Result<()> {
        perform_action(element, "AXShowMenu")
    }

    fn set_attribute(&self, element: &Element, attr: &str, value: &str) -> Result<()> {
        set_string_attribute(element, attr, value)
    }

    fn activate_app(&self, name: &str) -> Result<()> {
        let script = format!("tell application \"{}\" to activate", escape_applescript(name));
        super::scripting::MacScripting::default().run(&script, Duration::from_secs(5))?;
        Ok(())
    }

    fn set_window_bounds(&self, pid: i32, bounds: Bounds) -> Result<()> {
        set_window_bounds(pid, bounds)
    }
}

#[cfg(not(target_os = "macos"))]
impl Accessibility for MacAccessibility {
    fn is_trusted(&self) -> bool {
        false
    }
    fn frontmost_app(&self) -> Result<AppInfo> {
        Err(NexusError::NotTrusted)
    }
    fn running_apps(&self) -> Result<Vec<AppInfo>> {
        Ok(Vec::new())
    }
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(Vec::new())
    }
    fn window_title(&self, _pid: i32) -> Result<Option<String>> {
        Ok(None)
    }
    fn focused_element(&self, _pid: i32) -> Result<Option<Element>> {
        Ok(None)
    }
    fn describe_app(&self, _pid: i32, _max_elements: usize) -> Result<Vec<Element>> {
        Err(NexusError::NotTrusted)
    }
    fn find_elements(&self, _query: &str, _pid: i32) -> Result<Vec<(Element, u32)>> {
        Err(NexusError::NotTrusted)
    }
    fn menu_bar(&self, _pid: i32) -> Result<Vec<MenuItem>> {
        Ok(Vec::new())
    }
    fn find_menu_item(&self, _path: &[String], _pid: i32) -> Result<Option<MenuItem>> {
        Ok(None)
    }
    fn press(&self, _element: &Element) -> Result<()> {
        Err(NexusError::NotTrusted)
    }
    fn confirm(&self, _element: &Element) -> Result<()> {
        Err(NexusError::NotTrusted)
    }
    fn show_menu(&self, _element: &Element) -> Result<()> {
        Err(NexusError::NotTrusted)
    }
    fn set_attribute(&self, _element: &Element, _attr: &str, _value: &str) -> Result<()> {
        Err(NexusError::NotTrusted)
    }
    fn activate_app(&self, _name: &str) -> Result<()> {
        Err(NexusError::NotTrusted)
    }
    fn set_window_bounds(&self, _pid: i32, _bounds: Bounds) -> Result<()> {
        Err(NexusError::NotTrusted)
    }
}

/// Newtype around a retained `AXUIElementRef` so it can live inside an
/// [`crate::model::ElementHandle`]'s `Box<dyn Any + Send + Sync>`. Raw pointers aren't
/// `Send`/`Sync` on their own; the pointee is only ever touched through the AX API, which is
/// safe to call from any thread.
#[cfg(target_os = "macos")]
struct AxHandle(ffi::AXUIElementRef);

#[cfg(target_os = "macos")]
unsafe impl Send for AxHandle {}
#[cfg(target_os = "macos")]
unsafe impl Sync for AxHandle {}

#[cfg(target_os = "macos")]
impl Drop for AxHandle {
    fn drop(&mut self) {
        unsafe { core_foundation::base::CFRelease(self.0 as core_foundation::base::CFTypeRef) };
    }
}

/// Reads `attribute` off `element` and hands back the raw, still-owned `CFType`. Returns
/// `None` on any AX error or null result rather than propagating — a missing attribute is
/// routine (not every role carries every attribute), not a failure.
#[cfg(target_os = "macos")]
fn copy_attribute(
    element: ffi::AXUIElementRef,
    attr: &str,
) -> Option<core_foundation::base::CFType> {
    use core_foundation::base::TCFType;
    use core_foundation::string::CFString;
    let key = CFString::new(attr);
    let mut value: core_foundation::base::CFTypeRef = std::ptr::null();
    let err =
        unsafe { ffi::AXUIElementCopyAttributeValue(element, key.as_concrete_TypeRef(), &mut value) };
    if err != ffi::K_AX_ERROR_SUCCESS || value.is_null() {
        return None;
    }
    Some(unsafe { core_foundation::base::CFType::wrap_under_create_rule(value) })
}

#[cfg(target_os = "macos")]
fn attribute_string(element: ffi::AXUIElementRef, attr: &str) -> Option<String> {
    use core_foundation::string::CFString;
    copy_attribute(element, attr)?
        .downcast::<CFString>()
        .map(|s| s.to_string())
}

#[cfg(target_os = "macos")]
fn attribute_bool(element: ffi::AXUIElementRef, attr: &str) -> Option<bool> {
    use core_foundation::boolean::CFBoolean;
    copy_attribute(element, attr)?
        .downcast::<CFBoolean>()
        .map(|b| b.into())
}

#[cfg(target_os = "macos")]
fn attribute_int(element: ffi::AXUIElementRef, attr: &str) -> Option<i64> {
    use core_foundation::number::CFNumber;
    copy_attribute(element, attr)?
        .downcast::<CFNumber>()
        .and_then(|n| n.to_i64())
}

#[cfg(target_os = "macos")]
fn attribute_point(element: ffi::AXUIElementRef, attr: &str) -> Option<(f64, f64)> {
    use core_foundation::base::TCFType;
    let value = copy_attribute(element, attr)?;
    let mut point = core_graphics::geometry::CGPoint { x: 0.0, y: 0.0 };
    let ok = unsafe {
        ffi::AXValueGetValue(
            value.as_CFTypeRef(),
            ffi::K_AX_VALUE_CG_POINT_TYPE,
            &mut point as *mut _ as *mut std::os::raw::c_void,
        )
    };
    ok.then_some((point.x, point.y))
}

#[cfg(target_os = "macos")]
fn attribute_size(element: ffi::AXUIElementRef, attr: &str) -> Option<(f64, f64)> {
    use core_foundation::base::TCFType;
    let value = copy_attribute(element, attr)?;
    let mut size = core_graphics::geometry::CGSize { width: 0.0, height: 0.0 };
    let ok = unsafe {
        ffi::AXValueGetValue(
            value.as_CFTypeRef(),
            ffi::K_AX_VALUE_CG_SIZE_TYPE,
            &mut size as *mut _ as *mut std::os::raw::c_void,
        )
    };
    ok.then_some((size.width, size.height))
}

/// Extracts the raw AX element out of a just-copied `CFType` and gives the caller its own
/// retain, independent of whatever container (array, attribute slot) it came from.
#[cfg(target_os = "macos")]
fn retain_ax_ref(value: core_foundation::base::CFType) -> ffi::AXUIElementRef {
    use core_foundation::base::TCFType;
    let raw = value.as_CFTypeRef() as ffi::AXUIElementRef;
    unsafe { core_foundation::base::CFRetain(raw as core_foundation::base::CFTypeRef) };
    raw
}

#[cfg(target_os = "macos")]
fn copy_children(element: ffi::AXUIElementRef) -> Vec<ffi::AXUIElementRef> {
    use core_foundation::array::CFArray;
    use core_foundation::base::{CFType, TCFType};
    let Some(value) = copy_attribute(element, "AXChildren") else {
        return Vec::new();
    };
    let raw = value.as_CFTypeRef();
    std::mem::forget(value);
    let array: CFArray<CFType> =
        unsafe { CFArray::wrap_under_create_rule(raw as core_foundation::array::CFArrayRef) };
    array
        .iter()
        .map(|item| {
            let ptr = item.as_CFTypeRef();
            unsafe { core_foundation::base::CFRetain(ptr) };
            ptr as ffi::AXUIElementRef
        })
        .collect()
}

#[cfg(target_os = "macos")]
fn retain_handle(node: ffi::AXUIElementRef) -> crate::model::ElementHandle {
    unsafe { core_foundation::base::CFRetain(node as core_foundation::base::CFTypeRef) };
    crate::model::ElementHandle(Box::new(AxHandle(node)))
}

#[cfg(target_os = "macos")]
fn resolve_root_window(app: ffi::AXUIElementRef) -> Option<ffi::AXUIElementRef> {
    for attr in ["AXFocusedWindow", "AXMainWindow"] {
        if let Some(value) = copy_attribute(app, attr) {
            return Some(retain_ax_ref(value));
        }
    }
    copy_children(app).into_iter().next()
}

#[cfg(target_os = "macos")]
fn walk_application(pid: i32, max_elements: usize) -> Result<Vec<Element>> {
    // Bounded-depth AXChildren recursion from the application's focused/main/first window,
    // stopping once `max_elements` have been emitted. Each visited node reads AXRole,
    // AXTitle/AXDescription/AXValue as the label precedence, AXPosition/AXSize via AXValue
    // unwrapping (CGPoint/CGSize), and AXEnabled/AXFocused.
    const MAX_DEPTH: usize = 12;
    let app = unsafe { ffi::AXUIElementCreateApplication(pid) };
    if app.is_null() {
        return Ok(Vec::new());
    }
    let Some(root) = resolve_root_window(app) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(max_elements.min(512));
    walk_node(root, None, 0, MAX_DEPTH, max_elements, &mut out);
    Ok(out)
}

#[cfg(target_os = "macos")]
fn walk_node(
    node: ffi::AXUIElementRef,
    container: Option<String>,
    depth: usize,
    max_depth: usize,
    max_elements: usize,
    out: &mut Vec<Element>,
) {
    if depth > max_depth || out.len() >= max_elements {
        return;
    }

    let raw_role = attribute_string(node, "AXRole").unwrap_or_default();
    if raw_role.is_empty() {
        return;
    }
    let label = attribute_string(node, "AXTitle")
        .or_else(|| attribute_string(node, "AXDescription"))
        .or_else(|| attribute_string(node, "AXValue"))
        .unwrap_or_default();
    let value = attribute_string(node, "AXValue");
    let position = attribute_point(node, "AXPosition");
    let size = attribute_size(node, "AXSize");
    let enabled = attribute_bool(node, "AXEnabled").unwrap_or(true);
    let focused = attribute_bool(node, "AXFocused").unwrap_or(false);

    let is_container = matches!(
        raw_role.as_str(),
        "AXGroup" | "AXToolbar" | "AXTable" | "AXScrollArea" | "AXSplitGroup" | "AXOutline"
    );
    let this_container = if is_container && !label.is_empty() {
        Some(label.clone())
    } else {
        container.clone()
    };

    out.push(Element {
        role: Role::from_ax_role(&raw_role),
        raw_role,
        label,
        value,
        position,
        size,
        enabled,
        focused,
        source: SourceTag::Tree,
        handle: Some(retain_handle(node)),
        container,
    });

    for child in copy_children(node) {
        if out.len() >= max_elements {
            break;
        }
        walk_node(child, this_container.clone(), depth + 1, max_depth, max_elements, out);
    }
}

#[cfg(target_os = "macos")]
fn walk_menu_bar(pid: i32) -> Result<Vec<MenuItem>> {
    // Recurses AXMenuBar -> AXChildren to depth 3, decoding AXMenuItemCmdChar +
    // AXMenuItemCmdModifiers (bit 4=ctrl, 2=opt, 1=shift, 8=no-cmd) into a human shortcut
    // string such as "cmd+shift+s".
    let app = unsafe { ffi::AXUIElementCreateApplication(pid) };
    if app.is_null() {
        return Ok(Vec::new());
    }
    let Some(menu_bar_value) = copy_attribute(app, "AXMenuBar") else {
        return Ok(Vec::new());
    };
    let menu_bar = retain_ax_ref(menu_bar_value);
    let mut out = Vec::new();
    for top in copy_children(menu_bar) {
        walk_menu_node(top, Vec::new(), 0, &mut out);
    }
    Ok(out)
}

#[cfg(target_os = "macos")]
fn walk_menu_node(node: ffi::AXUIElementRef, mut path: Vec<String>, depth: usize, out: &mut Vec<MenuItem>) {
    if depth > 3 {
        return;
    }
    let label = attribute_string(node, "AXTitle").unwrap_or_default();
    if label.is_empty() {
        return;
    }
    path.push(label.clone());
    let enabled = attribute_bool(node, "AXEnabled").unwrap_or(true);
    let children = copy_children(node);
    let shortcut = menu_shortcut(node);

    if children.is_empty() || shortcut.is_some() {
        out.push(MenuItem { path: path.clone(), label, enabled, shortcut });
    }
    for child in children {
        walk_menu_node(child, path.clone(), depth + 1, out);
    }
}

#[cfg(target_os = "macos")]
fn menu_shortcut(node: ffi::AXUIElementRef) -> Option<String> {
    let cmd_char = attribute_string(node, "AXMenuItemCmdChar")?;
    if cmd_char.is_empty() {
        return None;
    }
    let mods = attribute_int(node, "AXMenuItemCmdModifiers").unwrap_or(0);
    let mut parts: Vec<&str> = Vec::new();
    if mods & 8 == 0 {
        parts.push("cmd");
    }
    if mods & 4 != 0 {
        parts.push("ctrl");
    }
    if mods & 2 != 0 {
        parts.push("opt");
    }
    if mods & 1 != 0 {
        parts.push("shift");
    }
    let prefix = parts.join("+");
    let ch = cmd_char.to_lowercase();
    Some(if prefix.is_empty() { ch } else { format!("{prefix}+{ch}") })
}

#[cfg(target_os = "macos")]
fn ax_handle(element: &Element, action: &str) -> Result<&AxHandle> {
    element
        .handle
        .as_ref()
        .ok_or_else(|| {
            NexusError::AdapterFailed(format!(
                "element {:?} has no live AX handle for action {action}",
                element.label
            ))
        })?
        .0
        .downcast_ref::<AxHandle>()
        .ok_or_else(|| NexusError::AdapterFailed("element handle is not an AX element".into()))
}

#[cfg(target_os = "macos")]
fn perform_action(element: &Element, action: &str) -> Result<()> {
    use core_foundation::base::TCFType;
    use core_foundation::string::CFString;
    let handle = ax_handle(element, action)?;
    let key = CFString::new(action);
    let err = unsafe { ffi::AXUIElementPerformAction(handle.0, key.as_concrete_TypeRef()) };
    if err == ffi::K_AX_ERROR_SUCCESS {
        Ok(())
    } else {
        Err(NexusError::AdapterFailed(format!("{action} failed with AXError {err}")))
    }
}

#[cfg(target_os = "macos")]
fn set_string_attribute(element: &Element, attr: &str, value: &str) -> Result<()> {
    use core_foundation::base::TCFType;
    use core_foundation::string::CFString;
    let handle = ax_handle(element, "set-attribute")?;
    let key = CFString::new(attr);
    let cf_value = CFString::new(value);
    let err = unsafe {
        ffi::AXUIElementSetAttributeValue(handle.0, key.as_concrete_TypeRef(), cf_value.as_CFTypeRef())
    };
    if err == ffi::K_AX_ERROR_SUCCESS {
        Ok(())
    } else {
        Err(NexusError::AdapterFailed(format!("set {attr} failed with AXError {err}")))
    }
}

#[cfg(target_os = "macos")]
fn set_window_bounds(pid: i32, bounds: Bounds) -> Result<()> {
    let app = unsafe { ffi::AXUIElementCreateApplication(pid) };
    if app.is_null() {
        return Err(NexusError::AdapterFailed(format!("no AX application for pid {pid}")));
    }
    let Some(window) = resolve_root_window(app) else {
        return Err(NexusError::AdapterFailed(format!("no window found for pid {pid}")));
    };
    set_point_attribute(window, "AXPosition", bounds.x, bounds.y)?;
    set_size_attribute(window, "AXSize", bounds.w, bounds.h)
}

#[cfg(target_os = "macos")]
fn set_point_attribute(element: ffi::AXUIElementRef, attr: &str, x: f64, y: f64) -> Result<()> {
    use core_foundation::base::TCFType;
    use core_foundation::string::CFString;
    let point = core_graphics::geometry::CGPoint { x, y };
    let value = unsafe {
        ffi::AXValueCreate(
            ffi::K_AX_VALUE_CG_POINT_TYPE,
            &point as *const _ as *const std::os::raw::c_void,
        )
    };
    if value.is_null() {
        return Err(NexusError::AdapterFailed(format!("failed to box {attr}")));
    }
    let key = CFString::new(attr);
    let err = unsafe { ffi::AXUIElementSetAttributeValue(element, key.as_concrete_TypeRef(), value) };
    unsafe { core_foundation::base::CFRelease(value) };
    if err == ffi::K_AX_ERROR_SUCCESS {
        Ok(())
    } else {
        Err(NexusError::AdapterFailed(format!("set {attr} failed with AXError {err}")))
    }
}

#[cfg(target_os = "macos")]
fn set_size_attribute(element: ffi::AXUIElementRef, attr: &str, w: f64, h: f64) -> Result<()> {
    use core_foundation::base::TCFType;
    use core_foundation::string::CFString;
    let size = core_graphics::geometry::CGSize { width: w, height: h };
    let value = unsafe {
        ffi::AXValueCreate(
            ffi::K_AX_VALUE_CG_SIZE_TYPE,
            &size as *const _ as *const std::os::raw::c_void,
        )
    };
    if value.is_null() {
        return Err(NexusError::AdapterFailed(format!("failed to box {attr}")));
    }
    let key = CFString::new(attr);
    let err = unsafe { ffi::AXUIElementSetAttributeValue(element, key.as_concrete_TypeRef(), value) };
    unsafe { core_foundation::base::CFRelease(value) };
    if err == ffi::K_AX_ERROR_SUCCESS {
        Ok(())
    } else {
        Err(NexusError::AdapterFailed(format!("set {attr} failed with AXError {err}")))
    }
}

/// Hit-tests the system-wide AX element at `(x, y)`, used by the event tap to enrich recorded
/// clicks with the role/label of whatever sits under the cursor (spec §4.10).
#[cfg(target_os = "macos")]
pub fn hit_test_at_point(x: f64, y: f64) -> Option<(String, String)> {
    let system_wide = unsafe { ffi::AXUIElementCreateSystemWide() };
    if system_wide.is_null() {
        return None;
    }
    let mut found: ffi::AXUIElementRef = std::ptr::null();
    let err = unsafe {
        ffi::AXUIElementCopyElementAtPosition(system_wide, x as f32, y as f32, &mut found)
    };
    if err != ffi::K_AX_ERROR_SUCCESS || found.is_null() {
        return None;
    }
    let role = attribute_string(found, "AXRole").unwrap_or_default();
    let label = attribute_string(found, "AXTitle")
        .or_else(|| attribute_string(found, "AXDescription"))
        .unwrap_or_default();
    unsafe { core_foundation::base::CFRelease(found as core_foundation::base::CFTypeRef) };
    Some((role, label))
}

#[cfg(not(target_os = "macos"))]
pub fn hit_test_at_point(_x: f64, _y: f64) -> Option<(String, String)> {
    None
}

#[cfg(target_os = "macos")]
fn nsstring_to_string(obj: cocoa::base::id) -> Option<String> {
    use objc::{msg_send, sel, sel_impl};
    if obj == cocoa::base::nil {
        return None;
    }
    unsafe {
        let bytes: *const std::os::raw::c_char = msg_send![obj, UTF8String];
        if bytes.is_null() {
            return None;
        }
        Some(std::ffi::CStr::from_ptr(bytes).to_string_lossy().to_string())
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn bounds_from_element(e: &Element) -> Option<Bounds> {
    let (x, y) = e.position?;
    let (w, h) = e.size.unwrap_or((0.0, 0.0));
    Some(Bounds { x, y, w, h })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_label_scores_100() {
        assert_eq!(score_candidate("save", None, "Save", None), 100);
    }

    #[test]
    fn substring_label_scores_80() {
        assert_eq!(score_candidate("save", None, "Save As…", None), 80);
    }

    #[test]
    fn value_substring_scores_40() {
        assert_eq!(score_candidate("gmail", None, "Email", Some("user@gmail.com")), 40);
    }

    #[test]
    fn no_match_scores_0() {
        assert_eq!(score_candidate("xyz", None, "Save", None), 0);
    }
}
