//! Window slot and resize-spec geometry (spec §4.6 window management), mapping a
//! [`WindowSlot`]/[`ResizeSpec`] plus a screen size into absolute window bounds.

use super::types::{ResizeSpec, WindowSlot};
use crate::model::Bounds;

/// Resolves a [`WindowSlot`] into absolute bounds given the current screen size and the
/// window's existing bounds (needed for `Coordinate`, which keeps the current size).
pub fn slot_to_bounds(slot: &WindowSlot, screen: Bounds, current: Bounds) -> Bounds {
    match slot {
        WindowSlot::LeftHalf => Bounds { x: screen.x, y: screen.y, w: screen.w / 2.0, h: screen.h },
        WindowSlot::RightHalf => {
            Bounds { x: screen.x + screen.w / 2.0, y: screen.y, w: screen.w / 2.0, h: screen.h }
        }
        WindowSlot::TopHalf => Bounds { x: screen.x, y: screen.y, w: screen.w, h: screen.h / 2.0 },
        WindowSlot::BottomHalf => {
            Bounds { x: screen.x, y: screen.y + screen.h / 2.0, w: screen.w, h: screen.h / 2.0 }
        }
        WindowSlot::Center => Bounds {
            x: screen.x + screen.w / 4.0,
            y: screen.y + screen.h / 4.0,
            w: screen.w / 2.0,
            h: screen.h / 2.0,
        },
        WindowSlot::Quarter(n) => quarter_bounds(*n, screen),
        WindowSlot::Thirds(n) => thirds_bounds(*n, screen),
        WindowSlot::Coordinate(x, y) => Bounds { x: *x, y: *y, w: current.w, h: current.h },
    }
}

fn quarter_bounds(n: u8, screen: Bounds) -> Bounds {
    let hw = screen.w / 2.0;
    let hh = screen.h / 2.0;
    match n {
        1 => Bounds { x: screen.x, y: screen.y, w: hw, h: hh },
        2 => Bounds { x: screen.x + hw, y: screen.y, w: hw, h: hh },
        3 => Bounds { x: screen.x, y: screen.y + hh, w: hw, h: hh },
        _ => Bounds { x: screen.x + hw, y: screen.y + hh, w: hw, h: hh },
    }
}

fn thirds_bounds(n: u8, screen: Bounds) -> Bounds {
    let tw = screen.w / 3.0;
    let idx = (n.saturating_sub(1)).min(2) as f64;
    Bounds { x: screen.x + idx * tw, y: screen.y, w: tw, h: screen.h }
}

/// Resolves a [`ResizeSpec`] into absolute width/height, anchored at the window's current
/// top-left corner.
pub fn resize_to_bounds(spec: &ResizeSpec, current: Bounds) -> Bounds {
    match spec {
        ResizeSpec::Absolute { w, h } => Bounds { x: current.x, y: current.y, w: *w, h: *h },
        ResizeSpec::Percent(pct) => {
            let factor = pct / 100.0;
            Bounds { x: current.x, y: current.y, w: current.w * factor, h: current.h * factor }
        }
    }
}

/// Splits the screen into two side-by-side halves for `tile A and B` (spec §4.6).
pub fn tile_bounds(screen: Bounds) -> (Bounds, Bounds) {
    let left = Bounds { x: screen.x, y: screen.y, w: screen.w / 2.0, h: screen.h };
    let right = Bounds { x: screen.x + screen.w / 2.0, y: screen.y, w: screen.w / 2.0, h: screen.h };
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Bounds = Bounds { x: 0.0, y: 0.0, w: 1920.0, h: 1080.0 };
    const CURRENT: Bounds = Bounds { x: 100.0, y: 100.0, w: 400.0, h: 300.0 };

    #[test]
    fn left_half_spans_half_width() {
        let b = slot_to_bounds(&WindowSlot::LeftHalf, SCREEN, CURRENT);
        assert_eq!(b.w, 960.0);
        assert_eq!(b.x, 0.0);
    }

    #[test]
    fn quarter_two_is_top_right() {
        let b = quarter_bounds(2, SCREEN);
        assert_eq!(b.x, 960.0);
        assert_eq!(b.y, 0.0);
    }

    #[test]
    fn coordinate_keeps_current_size() {
        let b = slot_to_bounds(&WindowSlot::Coordinate(50.0, 60.0), SCREEN, CURRENT);
        assert_eq!(b.w, CURRENT.w);
        assert_eq!(b.x, 50.0);
    }

    #[test]
    fn percent_resize_scales_both_dimensions() {
        let b = resize_to_bounds(&ResizeSpec::Percent(50.0), CURRENT);
        assert_eq!(b.w, 200.0);
        assert_eq!(b.h, 150.0);
    }

    #[test]
    fn tile_splits_screen_evenly() {
        let (left, right) = tile_bounds(SCREEN);
        assert_eq!(left.w + right.w, SCREEN.w);
    }
}
