//! Fusion: the text-producing layer consumed by `perceive`, plus the snapshot/diff machinery
//! shared with `act` (spec §4.3).
//!
//! Split `mod.rs` + `part_000.rs` (snapshot capture, fingerprint, diff) + `part_001.rs` (text
//! rendering/noise filter), matching the teacher's large-module convention for
//! `mcp_server`/`mcp_protocol`.

mod part_000;
mod part_001;

pub use part_000::{diff as snapshot_diff, fingerprint, snapshot};
pub use part_001::{render_element_listing, PerceiveOptions};
