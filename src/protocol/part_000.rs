//! JSON-RPC 2.0 envelope types, request parsing, and the stdio read/dispatch/write loop.
//!
//! Grounded on the teacher's `mcp_protocol` module (envelope shape, error codes,
//! `parse_request`) and `mcp_server` module (per-request correlation id, connection loop
//! structure) — generalized from the teacher's loopback-HTTP transport to newline-delimited
//! JSON-RPC over stdio, per spec §10.4.

use super::part_001::handle_request;
use crate::engine::Engine;
use crate::logging;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use tracing::debug;

pub const JSONRPC_VERSION: &str = "2.0";

pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, result: Some(result), error: None }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: None }),
        }
    }
}

/// Parses one line of input into a request, or a ready-to-send error response if the line is
/// malformed (spec §10.4, mirroring the teacher's `parse_request`).
pub fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| JsonRpcResponse::error(Value::Null, error_codes::PARSE_ERROR, format!("parse error: {e}")))?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let jsonrpc = value.get("jsonrpc").and_then(|v| v.as_str()).ok_or_else(|| {
        JsonRpcResponse::error(id.clone(), error_codes::INVALID_REQUEST, "missing 'jsonrpc' field")
    })?;
    if jsonrpc != JSONRPC_VERSION {
        return Err(JsonRpcResponse::error(
            id.clone(),
            error_codes::INVALID_REQUEST,
            format!("invalid jsonrpc version: expected '{JSONRPC_VERSION}', got '{jsonrpc}'"),
        ));
    }

    let method = value
        .get("method")
        .and_then(|v| v.as_str())
        .ok_or_else(|| JsonRpcResponse::error(id.clone(), error_codes::INVALID_REQUEST, "missing 'method' field"))?
        .to_string();

    let params = value.get("params").cloned().unwrap_or_else(|| Value::Object(Default::default()));

    Ok(JsonRpcRequest { jsonrpc: JSONRPC_VERSION.to_string(), id, method, params })
}

/// Reads newline-delimited JSON-RPC requests from `stdin`, dispatches each through
/// [`handle_request`], and writes the newline-delimited response to `stdout`. Runs until
/// stdin closes (spec §10.4).
pub fn run_stdio(engine: Arc<Engine>) {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let reader = BufReader::new(stdin.lock());

    for line in reader.lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let correlation_id = uuid::Uuid::new_v4().to_string();
        let _guard = logging::set_correlation_id(correlation_id.clone());
        debug!(category = "protocol", payload = %logging::summarize_payload(line), "received request");

        let response = match parse_request(line) {
            Ok(request) => handle_request(&engine, request),
            Err(error_response) => error_response,
        };

        let Ok(body) = serde_json::to_string(&response) else { continue };
        if writeln!(stdout, "{body}").is_err() || stdout.flush().is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_request() {
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#;
        let request = parse_request(line).unwrap();
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.id, Value::from(1));
    }

    #[test]
    fn defaults_missing_params_to_empty_object() {
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let request = parse_request(line).unwrap();
        assert_eq!(request.params, Value::Object(Default::default()));
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let line = r#"{"jsonrpc":"1.0","id":1,"method":"tools/list"}"#;
        let err = parse_request(line).unwrap_err();
        assert_eq!(err.error.unwrap().code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn rejects_missing_method() {
        let line = r#"{"jsonrpc":"2.0","id":1}"#;
        let err = parse_request(line).unwrap_err();
        assert_eq!(err.error.unwrap().code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_request("not json").unwrap_err();
        assert_eq!(err.error.unwrap().code, error_codes::PARSE_ERROR);
    }

    #[test]
    fn success_response_omits_error_field() {
        let response = JsonRpcResponse::success(Value::from(1), serde_json::json!({"ok": true}));
        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("error").is_none());
        assert!(body.get("result").is_some());
    }

    #[test]
    fn error_response_omits_result_field() {
        let response = JsonRpcResponse::error(Value::from(1), error_codes::METHOD_NOT_FOUND, "nope");
        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("result").is_none());
        assert_eq!(body["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }
}
