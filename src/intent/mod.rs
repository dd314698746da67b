//! Intent parsing and dispatch (spec §4.4, §4.5): normalizes a free-text action string into a
//! [`types::ParsedIntent`], then drives perception, recipes, and the GUI handlers to execute
//! it.

mod bundles;
mod dispatcher;
mod parser;
mod types;
mod window_grid;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use parser::{parse_step, similarity, split_chain};
pub use types::*;
