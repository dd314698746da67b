//! Screen-capture adapter: whole screen, rectangular region, or specific window id.
//!
//! Grounded on `original_source/nexus/sense/capture.py` (Quartz `CGWindowListCreateImage` /
//! ScreenCaptureKit) but implemented on top of `xcap`, the cross-platform capture crate
//! already in the teacher's dependency stack, rather than re-binding CoreGraphics directly.

use super::{RasterImage, ScreenCapture};
use crate::error::{NexusError, Result};

pub struct XcapScreenCapture;

impl ScreenCapture for XcapScreenCapture {
    fn capture_screen(&self) -> Result<RasterImage> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| NexusError::AdapterFailed(format!("monitor enumeration failed: {e}")))?;
        let primary = monitors
            .into_iter()
            .next()
            .ok_or_else(|| NexusError::AdapterFailed("no monitor found".into()))?;
        let image = primary
            .capture_image()
            .map_err(|e| NexusError::AdapterFailed(format!("screen capture failed: {e}")))?;
        Ok(image_to_raster(image))
    }

    fn capture_region(&self, x: i32, y: i32, w: i32, h: i32) -> Result<RasterImage> {
        let full = self.capture_screen()?;
        Ok(crop(&full, x, y, w, h))
    }

    fn capture_window(&self, window_id: u32) -> Result<RasterImage> {
        let windows = xcap::Window::all()
            .map_err(|e| NexusError::AdapterFailed(format!("window enumeration failed: {e}")))?;
        let window = windows
            .into_iter()
            .find(|w| w.id().ok() == Some(window_id))
            .ok_or_else(|| NexusError::AdapterFailed(format!("window {window_id} not found")))?;
        let image = window
            .capture_image()
            .map_err(|e| NexusError::AdapterFailed(format!("window capture failed: {e}")))?;
        Ok(image_to_raster(image))
    }
}

fn image_to_raster(image: image::RgbaImage) -> RasterImage {
    let (width, height) = image.dimensions();
    RasterImage {
        width,
        height,
        rgba: image.into_raw(),
    }
}

fn crop(image: &RasterImage, x: i32, y: i32, w: i32, h: i32) -> RasterImage {
    let x0 = x.clamp(0, image.width as i32) as u32;
    let y0 = y.clamp(0, image.height as i32) as u32;
    let x1 = (x + w).clamp(0, image.width as i32) as u32;
    let y1 = (y + h).clamp(0, image.height as i32) as u32;
    let out_w = x1.saturating_sub(x0);
    let out_h = y1.saturating_sub(y0);
    let mut rgba = Vec::with_capacity((out_w * out_h * 4) as usize);
    for row in y0..y1 {
        let row_start = ((row * image.width + x0) * 4) as usize;
        let row_end = row_start + (out_w * 4) as usize;
        rgba.extend_from_slice(&image.rgba[row_start..row_end.min(image.rgba.len())]);
    }
    RasterImage {
        width: out_w,
        height: out_h,
        rgba,
    }
}

/// Bounds a screenshot's encoded size for inclusion in a `perceive` response (spec §4.3
/// "screenshot encoded as a bounded-size image"). Downscales by integer factors until under
/// `max_bytes` (rough estimate: width*height*3/4 for a JPEG-ish compression ratio).
pub fn bound_for_response(image: RasterImage, max_bytes: usize) -> RasterImage {
    let mut current = image;
    loop {
        let estimate = (current.width as usize) * (current.height as usize) * 3 / 4;
        if estimate <= max_bytes || current.width < 64 {
            return current;
        }
        current = downscale_half(&current);
    }
}

fn downscale_half(image: &RasterImage) -> RasterImage {
    let w = (image.width / 2).max(1);
    let h = (image.height / 2).max(1);
    let mut rgba = vec![0u8; (w * h * 4) as usize];
    for y in 0..h {
        for x in 0..w {
            let src_idx = (((y * 2) * image.width + (x * 2)) * 4) as usize;
            let dst_idx = ((y * w + x) * 4) as usize;
            if src_idx + 4 <= image.rgba.len() {
                rgba[dst_idx..dst_idx + 4].copy_from_slice(&image.rgba[src_idx..src_idx + 4]);
            }
        }
    }
    RasterImage {
        width: w,
        height: h,
        rgba,
    }
}
