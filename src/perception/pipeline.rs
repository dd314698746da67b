//! Ordered layer registry and pipeline driver (spec §4.2). Running the pipeline for a
//! process yields `(elements, context)`; a broken layer must not break the pipeline — each
//! handler is isolated behind `log_err`/`warn_on_err`.

use super::layers::{
    detect_system_dialogs, ocr_layer, ocr_layer_condition, template_layer, tree_layer,
    LayerContext, ListWidget, Table,
};
use crate::adapters::{Accessibility, Ocr, ScreenCapture, WindowList};
use crate::error::{ResultExt, Result};
use crate::model::{CachedElement, Element};
use crate::session::SpatialCache;
use std::sync::Arc;

pub struct PerceptionResult {
    pub elements: Vec<Element>,
    pub tables: Vec<Table>,
    pub lists: Vec<ListWidget>,
    pub fingerprint: String,
    pub from_cache: bool,
}

/// Holds the capability adapters and the per-process perception cache (shared instance with
/// the session spatial cache, per spec §4.2/§4.9's identical TTL/capacity semantics).
pub struct PerceptionPipeline {
    accessibility: Arc<dyn Accessibility>,
    capture: Arc<dyn ScreenCapture>,
    ocr: Arc<dyn Ocr>,
    window_list: Arc<dyn WindowList>,
    cache: Arc<SpatialCache>,
    max_elements: usize,
}

impl PerceptionPipeline {
    pub fn new(
        accessibility: Arc<dyn Accessibility>,
        capture: Arc<dyn ScreenCapture>,
        ocr: Arc<dyn Ocr>,
        window_list: Arc<dyn WindowList>,
        cache: Arc<SpatialCache>,
        max_elements: usize,
    ) -> Self {
        Self {
            accessibility,
            capture,
            ocr,
            window_list,
            cache,
            max_elements,
        }
    }

    pub fn invalidate(&self, pid: i32) {
        self.cache.invalidate(pid);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Runs the full layered pipeline for `pid`, or returns the cached result if fresh
    /// (spec §4.2, §4.7 `before_perceive` hook pre-empts this by populating the context
    /// directly — see `hooks::builtin::spatial_cache_read`).
    pub fn run(&self, pid: i32) -> Result<PerceptionResult> {
        if let Some((cached, fingerprint)) = self.cache.get(pid, self.max_elements) {
            return Ok(PerceptionResult {
                elements: cached.into_iter().map(from_cached).collect(),
                tables: Vec::new(),
                lists: Vec::new(),
                fingerprint,
                from_cache: true,
            });
        }

        let mut ctx = LayerContext {
            pid,
            window_bounds: self
                .accessibility
                .windows()
                .ok()
                .and_then(|ws| ws.into_iter().find(|w| w.pid == pid))
                .map(|w| w.bounds),
            ..Default::default()
        };

        // Tree layer (priority 10): isolated so an AX failure degrades to an empty tree
        // rather than aborting the whole pipeline.
        let mut elements: Vec<Element> = tree_layer(self.accessibility.as_ref(), &mut ctx)
            .log_err()
            .map(|o| o.elements)
            .unwrap_or_default();

        // OCR layer (priority 50, conditional).
        if ocr_layer_condition(&elements) {
            if let Some(output) = ocr_layer(self.capture.as_ref(), self.ocr.as_ref(), &ctx, None).log_err() {
                elements.extend(output.elements);
            }
        }

        // Template layer (priority 60, conditional on a detected system dialog).
        if let Some(dialog_windows) = detect_system_dialogs(self.window_list.as_ref()).log_err() {
            if !dialog_windows.is_empty() {
                let with_text: Vec<_> = dialog_windows
                    .into_iter()
                    .map(|w| (w, String::new()))
                    .collect();
                elements.extend(template_layer(&with_text));
            }
        }

        let fingerprint = crate::fusion::fingerprint(&elements);
        let cached: Vec<CachedElement> = elements.iter().map(Element::to_cached).collect();
        self.cache.put(pid, cached, fingerprint.clone(), self.max_elements);

        Ok(PerceptionResult {
            elements,
            tables: ctx.tables,
            lists: ctx.lists,
            fingerprint,
            from_cache: false,
        })
    }
}

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
