//! Envelope threaded through every hook handler. A handler reads the fields relevant to its
//! event and writes back whatever it produces (e.g. the circuit breaker sets `short_circuit`,
//! the spatial-cache-read hook populates `cached_elements`).

use crate::model::CachedElement;
use crate::perception::DialogClass;

#[derive(Debug, Default)]
pub struct HookContext {
    pub pid: Option<i32>,
    pub app: Option<String>,
    pub intent_text: Option<String>,
    pub verb: Option<String>,

    /// The target-phrase string named by this intent, if any (`ParsedIntent::target()`),
    /// used to key label-learning lookups and the fail-then-success correlation (spec §4.8).
    pub target: Option<String>,

    /// How the target was resolved (`"ax_find"`, `"coordinate"`, `"spatial"`, ...), recorded
    /// alongside the action outcome for `remember(op="stats")`'s per-method tallies.
    pub method: Option<String>,

    /// The learned label substituted for `target` when the handler used one, recorded with
    /// the action so a later failure can be correlated back to it (spec §4.8).
    pub via_label: Option<String>,

    pub ok: Option<bool>,
    pub elapsed_s: Option<f64>,
    pub fingerprint_before: Option<String>,
    pub fingerprint_after: Option<String>,
    pub error_message: Option<String>,

    /// Populated by `before_perceive`'s spatial-cache-read hook as a pipeline short-circuit:
    /// if set, the pipeline driver skips the layered run entirely (spec §4.7).
    pub cached_elements: Option<Vec<CachedElement>>,

    /// Set by `before_act`'s circuit breaker to halt dispatch before the GUI handler runs.
    pub short_circuit: Option<String>,

    /// Dialogs detected this perceive call, for `after_perceive`'s auto-dismiss-safe-dialogs
    /// and dialog-detection handlers.
    pub detected_dialogs: Vec<(String, DialogClass)>,

    /// A learned-label hint injected by `after_perceive` for the dispatcher's retry path.
    pub label_hint: Option<String>,

    /// A skill/recipe suggestion surfaced by `on_error`.
    pub skill_hint: Option<String>,

    /// Whether this action is part of an in-progress workflow/route recording, and if so
    /// which step number it occupies (spec §4.7 "workflow-step recorder").
    pub recording_step: Option<u32>,
    /// The name of the workflow being recorded, paired with `recording_step`.
    pub recording_name: Option<String>,
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }
}
