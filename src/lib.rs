//! `nexus_core`: the perception-action engine behind the `nexus-agent` stdio tool server.
//!
//! Module layout follows the teacher's own separation of capability adapters, pure-logic
//! subsystems, and the stdio protocol frontend.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod hooks;
pub mod intent;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod perception;
pub mod protocol;
pub mod recipes;
pub mod session;
pub mod store;
pub mod via;

pub use engine::Engine;
pub use error::{NexusError, Result};
