//! Window-list adapter: enumerates on-screen windows with owner name and bounds.
//!
//! Grounded on `original_source/nexus/sense/screen.py` (Quartz `CGWindowListCopyWindowInfo`)
//! — used both as the accessibility adapter's `windows()` backend and directly for detecting
//! system dialogs by owning process name (spec §4.1).

use super::WindowList;
use crate::error::Result;
use crate::model::{Bounds, WindowInfo};

pub struct MacWindowList;

impl WindowList for MacWindowList {
    fn list(&self, owner_filter: Option<&str>) -> Result<Vec<WindowInfo>> {
        let all = cg_window_list(owner_filter)?;
        Ok(all)
    }
}

/// Shared by the accessibility adapter's `windows()` and this module's `list()`.
///
/// Real implementation calls `CGWindowListCopyWindowInfo(kCGWindowListOptionOnScreenOnly |
/// kCGWindowListExcludeDesktopElements, kCGNullWindowID)` and reads `kCGWindowOwnerName`,
/// `kCGWindowName`, `kCGWindowOwnerPID`, and `kCGWindowBounds` out of each dictionary.
pub fn cg_window_list(owner_filter: Option<&str>) -> Result<Vec<WindowInfo>> {
    #[cfg(target_os = "macos")]
    {
        let windows = platform_window_list()?;
        Ok(match owner_filter {
            Some(owner) => windows
                .into_iter()
                .filter(|w| w.app_name.eq_ignore_ascii_case(owner))
                .collect(),
            None => windows,
        })
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = owner_filter;
        Ok(Vec::new())
    }
}

#[cfg(target_os = "macos")]
fn platform_window_list() -> Result<Vec<WindowInfo>> {
    // xcap already depends on CoreGraphics window enumeration for its own capture-by-window
    // API; we reuse it here for window discovery rather than hand-rolling a second
    // CGWindowListCopyWindowInfo binding.
    let windows = xcap::Window::all().map_err(|e| {
        crate::error::NexusError::AdapterFailed(format!("window list failed: {e}"))
    })?;
    Ok(windows
        .into_iter()
        .filter_map(|w| {
            let app_name = w.app_name().ok()?;
            let title = w.title().unwrap_or_default();
            let pid = w.pid().ok()? as i32;
            Some(WindowInfo {
                app_name,
                title,
                pid,
                bounds: Bounds {
                    x: w.x().unwrap_or(0) as f64,
                    y: w.y().unwrap_or(0) as f64,
                    w: w.width().unwrap_or(0) as f64,
                    h: w.height().unwrap_or(0) as f64,
                },
            })
        })
        .collect())
}
