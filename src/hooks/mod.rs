//! The five-event hook pipeline (spec §4.7): `before_perceive`, `after_perceive`,
//! `before_act`, `after_act`, `on_error`. Handlers are isolated — a handler returning or
//! throwing an error is recorded in a 20-entry ring and the pipeline continues (spec §9
//! "error-as-value discipline").

mod builtins;
mod context;
mod registry;

pub use builtins::register_builtins;
pub use context::HookContext;
pub use registry::{Event, HookError, HookRegistry};
