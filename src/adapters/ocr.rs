//! OCR adapter: Apple Vision framework text recognition over a captured region.
//!
//! Grounded on `original_source/nexus/sense/ocr.py`: `VNRecognizeTextRequest` with
//! `recognitionLevel = .accurate`, default languages `en` + `es`, and conversion from
//! Vision's bottom-left-origin normalized bounding boxes to top-left-origin pixel
//! coordinates. Gated behind the `ocr` Cargo feature, matching the teacher's own feature
//! flag for this capability.

use super::{Ocr, OcrDetection, RasterImage};
use crate::error::{NexusError, Result};
use crate::model::Bounds;

pub struct VisionOcr;

#[cfg(all(target_os = "macos", feature = "ocr"))]
impl Ocr for VisionOcr {
    fn recognize(&self, image: &RasterImage, origin: (f64, f64)) -> Result<Vec<OcrDetection>> {
        let raw = vision_recognize_text(image)?;
        Ok(raw
            .into_iter()
            .map(|d| normalize(d, image.width, image.height, origin))
            .collect())
    }
}

#[cfg(not(all(target_os = "macos", feature = "ocr")))]
impl Ocr for VisionOcr {
    fn recognize(&self, _image: &RasterImage, _origin: (f64, f64)) -> Result<Vec<OcrDetection>> {
        Err(NexusError::UnsupportedCapability("ocr".into()))
    }
}

/// A detection as returned directly by Vision, before coordinate normalization: bounding box
/// is `(x, y, w, h)` as fractions in [0,1] with origin at the bottom-left of the image.
struct RawDetection {
    text: String,
    confidence: f32,
    bbox: (f64, f64, f64, f64),
}

/// `VNRequestTextRecognitionLevel.accurate`, per Vision.h.
const VN_REQUEST_TEXT_RECOGNITION_LEVEL_ACCURATE: i64 = 1;

#[cfg(all(target_os = "macos", feature = "ocr"))]
fn vision_recognize_text(image: &RasterImage) -> Result<Vec<RawDetection>> {
    use cocoa::base::{id, nil};
    use cocoa::foundation::NSString;
    use core_foundation::base::TCFType;
    use core_graphics::geometry::CGRect;
    use objc::{class, msg_send, sel, sel_impl};

    let Some(cg_image) = build_cg_image(image) else {
        return Err(NexusError::AdapterFailed("failed to build CGImage for OCR".into()));
    };

    unsafe {
        let handler: id = msg_send![class!(VNImageRequestHandler), alloc];
        let handler: id =
            msg_send![handler, initWithCGImage: cg_image.as_concrete_TypeRef() options: nil];
        if handler == nil {
            return Err(NexusError::AdapterFailed("VNImageRequestHandler init failed".into()));
        }

        let request: id = msg_send![class!(VNRecognizeTextRequest), new];
        let _: () = msg_send![request, setRecognitionLevel: VN_REQUEST_TEXT_RECOGNITION_LEVEL_ACCURATE];
        let langs: id = msg_send![class!(NSMutableArray), array];
        for lang in ["en", "es"] {
            let ns_lang = NSString::alloc(nil).init_str(lang);
            let _: () = msg_send![langs, addObject: ns_lang];
        }
        let _: () = msg_send![request, setRecognitionLanguages: langs];

        let requests: id = msg_send![class!(NSArray), arrayWithObject: request];
        let mut error: id = nil;
        let ok: bool = msg_send![handler, performRequests: requests error: &mut error];
        if !ok {
            return Err(NexusError::AdapterFailed("VNImageRequestHandler performRequests failed".into()));
        }

        let results: id = msg_send![request, results];
        let count: usize = msg_send![results, count];
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let observation: id = msg_send![results, objectAtIndex: i];
            let candidates: id = msg_send![observation, topCandidates: 1u64];
            let candidate_count: usize = msg_send![candidates, count];
            if candidate_count == 0 {
                continue;
            }
            let candidate: id = msg_send![candidates, objectAtIndex: 0u64];
            let text_obj: id = msg_send![candidate, string];
            let text = nsstring_to_string(text_obj).unwrap_or_default();
            let confidence: f32 = msg_send![candidate, confidence];
            let bbox: CGRect = msg_send![observation, boundingBox];
            out.push(RawDetection {
                text,
                confidence,
                bbox: (bbox.origin.x, bbox.origin.y, bbox.size.width, bbox.size.height),
            });
        }
        Ok(out)
    }
}

/// Wraps the raw RGBA8 buffer in a `CGImage`, the shape `VNImageRequestHandler` needs.
#[cfg(all(target_os = "macos", feature = "ocr"))]
fn build_cg_image(image: &RasterImage) -> Option<core_graphics::image::CGImage> {
    use core_graphics::base::{kCGBitmapByteOrder32Big, kCGImageAlphaPremultipliedLast};
    use core_graphics::color_space::CGColorSpace;
    use core_graphics::data_provider::CGDataProvider;
    use core_graphics::image::{CGColorRenderingIntent, CGImage};

    if image.rgba.len() < (image.width as usize) * (image.height as usize) * 4 {
        return None;
    }
    let color_space = CGColorSpace::create_device_rgb();
    let provider = CGDataProvider::from_buffer(std::sync::Arc::new(image.rgba.clone()));
    let bitmap_info = kCGBitmapByteOrder32Big | kCGImageAlphaPremultipliedLast;
    Some(CGImage::new(
        image.width as usize,
        image.height as usize,
        8,
        32,
        image.width as usize * 4,
        &color_space,
        bitmap_info,
        &provider,
        false,
        CGColorRenderingIntent::RenderingIntentDefault,
    ))
}

#[cfg(all(target_os = "macos", feature = "ocr"))]
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

fn normalize(raw: RawDetection, image_w: u32, image_h: u32, origin: (f64, f64)) -> OcrDetection {
    let (nx, ny, nw, nh) = raw.bbox;
    // Vision's origin is bottom-left; flip to top-left pixel space before adding the
    // window/region origin the caller captured from.
    let px = nx * image_w as f64;
    let pw = nw * image_w as f64;
    let ph = nh * image_h as f64;
    let py = (1.0 - ny - nh) * image_h as f64;

    let bounds = Bounds {
        x: origin.0 + px,
        y: origin.1 + py,
        w: pw,
        h: ph,
    };
    OcrDetection {
        text: raw.text,
        confidence: raw.confidence,
        center: bounds.center(),
        bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_flips_origin_to_top_left() {
        let raw = RawDetection {
            text: "Save".into(),
            confidence: 0.9,
            bbox: (0.1, 0.8, 0.2, 0.1),
        };
        let d = normalize(raw, 1000, 1000, (0.0, 0.0));
        // ny=0.8, nh=0.1 -> top-left y = (1 - 0.8 - 0.1) * 1000 = 100
        assert!((d.bounds.y - 100.0).abs() < 1e-6);
        assert!((d.bounds.x - 100.0).abs() < 1e-6);
    }
}
