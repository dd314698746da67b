//! Typed configuration, loaded once from `~/.config/nexus/config.json` with environment
//! overrides and an injectable path for tests.
//!
//! Grounded on the teacher's `config/{mod.rs,loader.rs,types.rs}` split; condensed into one
//! file since this crate's configuration surface is far smaller than the launcher's.

mod loader;
mod types;

pub use loader::{load, load_from};
pub use types::Config;
