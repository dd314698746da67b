//! Perception: layer registry + pipeline (spec §4.2). Layers are registered as
//! `(name, priority, handler, optional-condition)` and run in ascending priority; a broken
//! layer must not break the pipeline.

mod find;
mod layers;
mod pipeline;

pub use find::{perception_find, suggest_labels, Scored};
pub use layers::{
    classify_dialog, detect_system_dialogs, ocr_layer, template_layer, tree_layer, DialogClass,
    LayerContext, LayerOutput, ListWidget, Table,
};
pub use pipeline::{PerceptionPipeline, PerceptionResult};
