//! Recipes: `(name, pattern, handler, optional-app-key, priority)` registrations matched
//! against free-text intents before GUI dispatch (spec §4.6). The concrete recipe set is
//! data, not core logic — see [`builtins::register_builtins`].

mod builtins;
mod registry;

pub use builtins::register_builtins;
pub use registry::{substitute, Handler, Recipe, RecipeMatch, RecipeRegistry};
