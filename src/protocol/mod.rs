//! Stdio-framed JSON-RPC 2.0 tool server (spec §10.4): exposes `perceive`/`act`/`remember` as
//! tools and `nexus://skills[/{id}]`/`nexus://workflows[/{id}]` as resources.
//!
//! Split `mod.rs` + `part_000.rs` (JSON-RPC envelope types, request parsing, stdio loop) +
//! `part_001.rs` (tool/resource definitions and call handlers), matching the teacher's
//! `mcp_server`/`mcp_protocol` large-module convention.

mod part_000;
mod part_001;

pub use part_000::{run_stdio, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
