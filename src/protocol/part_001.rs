//! Tool/resource definitions and `tools/call`/`resources/read` handlers.
//!
//! Grounded on the teacher's `mcp_protocol` request-routing and `mcp_server` resource-URI
//! parsing, with the tool surface and `Done:`/`Failed:` response-prefix convention taken from
//! `original_source/nexus/server.py`'s three-tool FastMCP server (spec §10.4).

use super::part_000::{error_codes, JsonRpcRequest, JsonRpcResponse};
use crate::engine::Engine;
use crate::fusion::PerceiveOptions;
use serde_json::{json, Value};

pub fn handle_request(engine: &Engine, request: JsonRpcRequest) -> JsonRpcResponse {
    match request.method.as_str() {
        "initialize" => handle_initialize(request),
        "tools/list" => handle_tools_list(request),
        "tools/call" => handle_tools_call(engine, request),
        "resources/list" => handle_resources_list(request),
        "resources/read" => handle_resources_read(engine, request),
        other => JsonRpcResponse::error(
            request.id,
            error_codes::METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ),
    }
}

fn handle_initialize(request: JsonRpcRequest) -> JsonRpcResponse {
    JsonRpcResponse::success(
        request.id,
        json!({
            "serverInfo": {
                "name": "nexus-agent",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {
                "tools": {"listChanged": false},
                "resources": {"subscribe": false, "listChanged": false},
            },
        }),
    )
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "perceive",
            "description": "Perceive the current state of an app's UI as a structured text inventory of interactive elements.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "app": {"type": "string", "description": "App name; frontmost app if omitted"},
                    "query": {"type": "string", "description": "Search for elements matching this text instead of listing everything"},
                    "screenshot": {"type": "boolean", "description": "Include a base64-encoded PNG screenshot"},
                    "menus": {"type": "boolean", "description": "Include the menu bar"},
                    "diff": {"type": "boolean", "description": "Include a diff against the previous perceive of this app"},
                    "content": {"type": "boolean", "description": "Include full text-field values"},
                    "observe": {"type": "boolean", "description": "Include accessibility change events observed since the last call"}
                }
            }
        },
        {
            "name": "act",
            "description": "Execute a free-text action (optionally a ';'-separated chain) against an app's UI.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "description": "e.g. 'click Save', 'type hello; press enter'"},
                    "app": {"type": "string", "description": "App name; frontmost app if omitted"}
                },
                "required": ["action"]
            }
        },
        {
            "name": "remember",
            "description": "Read or write the agent's persistent key-value memory.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "op": {"type": "string", "enum": ["set", "get", "delete", "list", "clear", "stats"]},
                    "key": {"type": "string"},
                    "value": {"type": "string"}
                },
                "required": ["op"]
            }
        }
    ])
}

fn handle_tools_list(request: JsonRpcRequest) -> JsonRpcResponse {
    JsonRpcResponse::success(request.id, json!({ "tools": tool_definitions() }))
}

fn text_result(text: impl Into<String>, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text.into()}],
        "isError": is_error,
    })
}

fn text_and_image_result(text: String, image_base64: Option<String>) -> Value {
    let mut content = vec![json!({"type": "text", "text": text})];
    if let Some(data) = image_base64 {
        content.push(json!({"type": "image", "data": data, "mimeType": "image/png"}));
    }
    json!({ "content": content, "isError": false })
}

fn handle_tools_call(engine: &Engine, request: JsonRpcRequest) -> JsonRpcResponse {
    let Some(params) = request.params.as_object() else {
        return JsonRpcResponse::error(request.id, error_codes::INVALID_PARAMS, "expected params object");
    };
    let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(request.id, error_codes::INVALID_PARAMS, "missing 'name'");
    };
    let empty = json!({});
    let args = params.get("arguments").unwrap_or(&empty);

    let result = match name {
        "perceive" => call_perceive(engine, args),
        "act" => call_act(engine, args),
        "remember" => call_remember(engine, args),
        other => {
            return JsonRpcResponse::error(request.id, error_codes::METHOD_NOT_FOUND, format!("unknown tool: {other}"));
        }
    };

    JsonRpcResponse::success(request.id, result)
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

fn arg_bool(args: &Value, key: &str) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn call_perceive(engine: &Engine, args: &Value) -> Value {
    let opts = PerceiveOptions {
        trusted: false,
        app_name: arg_str(args, "app").unwrap_or_default().to_string(),
        window_title: String::new(),
        query: arg_str(args, "query").map(str::to_string),
        include_menus: arg_bool(args, "menus"),
        include_diff: arg_bool(args, "diff"),
        include_screenshot: arg_bool(args, "screenshot"),
        include_content: arg_bool(args, "content"),
        include_observe: arg_bool(args, "observe"),
    };

    match engine.perceive(opts) {
        Ok(outcome) => text_and_image_result(outcome.text, outcome.screenshot_base64),
        Err(e) => text_result(format!("Failed: {e}"), true),
    }
}

/// Formats a dispatch outcome the way `original_source/nexus/server.py`'s `act` tool does:
/// a `Done:`/`Failed:` prefix, the resolved method, suggestions/skill hint on failure, a
/// compact diff, and the last 3 journal lines.
fn call_act(engine: &Engine, args: &Value) -> Value {
    let Some(action) = arg_str(args, "action") else {
        return text_result("Failed: missing required argument 'action'", true);
    };
    let app = arg_str(args, "app");

    let outcome = engine.act(action, app);
    let mut lines = Vec::new();

    if outcome.ok {
        lines.push(format!("Done: {}", outcome.result_text));
        if let Some(via) = &outcome.via {
            lines.push(format!("via: {via}"));
        }
        if let Some(via_label) = &outcome.via_label {
            lines.push(format!("via_label: {via_label}"));
        }
        if outcome.retried {
            lines.push("retried after wrong-app detection".to_string());
        }
        if let Some(diff) = &outcome.diff {
            if !diff.is_empty() {
                lines.push(format!("diff:\n{diff}"));
            }
        }
    } else {
        let message = outcome.error.as_ref().map(|e| e.to_string()).unwrap_or(outcome.result_text.clone());
        lines.push(format!("Failed: {message}"));
        if let Some(hint) = &outcome.skill_hint {
            lines.push(format!("hint: {hint}"));
        }
    }

    if !outcome.recent_journal.is_empty() {
        lines.push(format!("recent:\n{}", outcome.recent_journal.join("\n")));
    }

    text_result(lines.join("\n"), !outcome.ok)
}

fn call_remember(engine: &Engine, args: &Value) -> Value {
    let Some(op) = arg_str(args, "op") else {
        return text_result("Failed: missing required argument 'op'", true);
    };
    let key = arg_str(args, "key");
    let value = arg_str(args, "value");

    match engine.remember(op, key, value) {
        Ok(text) => text_result(text, false),
        Err(e) => text_result(format!("Failed: {e}"), true),
    }
}

fn resource_definitions() -> Value {
    json!([
        {
            "uri": "nexus://skills",
            "name": "skills",
            "description": "Documented CLI/file/web shortcuts preferred over blind GUI automation",
            "mimeType": "application/json",
        },
        {
            "uri": "nexus://workflows",
            "name": "workflows",
            "description": "Saved multi-step action sequences with hash-verified checkpoints",
            "mimeType": "application/json",
        },
    ])
}

fn handle_resources_list(request: JsonRpcRequest) -> JsonRpcResponse {
    JsonRpcResponse::success(request.id, json!({ "resources": resource_definitions() }))
}

fn handle_resources_read(engine: &Engine, request: JsonRpcRequest) -> JsonRpcResponse {
    let Some(params) = request.params.as_object() else {
        return JsonRpcResponse::error(request.id, error_codes::INVALID_PARAMS, "expected params object");
    };
    let Some(uri) = params.get("uri").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(request.id, error_codes::INVALID_PARAMS, "missing 'uri'");
    };

    match read_resource(engine, uri) {
        Ok(contents) => JsonRpcResponse::success(
            request.id,
            json!({ "contents": [{"uri": uri, "mimeType": "application/json", "text": contents.to_string()}] }),
        ),
        Err(message) => JsonRpcResponse::error(request.id, error_codes::INVALID_PARAMS, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_engine() -> (std::sync::Arc<Engine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nexus.db");
        let config = crate::config::Config {
            db_path: Some(db_path.to_string_lossy().to_string()),
            ..Default::default()
        };
        (Engine::new(config).unwrap(), dir)
    }

    #[test]
    fn tool_definitions_lists_the_three_tools() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools.as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["perceive", "act", "remember"]);
    }

    #[test]
    fn arg_str_and_arg_bool_read_from_object() {
        let args = json!({"app": "Finder", "screenshot": true});
        assert_eq!(arg_str(&args, "app"), Some("Finder"));
        assert_eq!(arg_str(&args, "missing"), None);
        assert!(arg_bool(&args, "screenshot"));
        assert!(!arg_bool(&args, "menus"));
    }

    #[test]
    fn text_result_sets_is_error_flag() {
        let ok = text_result("done", false);
        assert_eq!(ok["isError"], false);
        let err = text_result("failed", true);
        assert_eq!(err["isError"], true);
    }

    #[test]
    fn call_remember_without_op_fails() {
        let (engine, _dir) = test_engine();
        let result = call_remember(&engine, &json!({}));
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn call_remember_roundtrips_through_engine() {
        let (engine, _dir) = test_engine();
        call_remember(&engine, &json!({"op": "set", "key": "a", "value": "1"}));
        let result = call_remember(&engine, &json!({"op": "get", "key": "a"}));
        assert_eq!(result["content"][0]["text"], "1");
    }

    #[test]
    fn read_resource_lists_skills() {
        let (engine, _dir) = test_engine();
        let value = read_resource(&engine, "nexus://skills").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
    }

    #[test]
    fn read_resource_fetches_single_skill() {
        let (engine, _dir) = test_engine();
        let value = read_resource(&engine, "nexus://skills/finder-open").unwrap();
        assert_eq!(value["id"], "finder-open");
    }

    #[test]
    fn read_resource_unknown_skill_errors() {
        let (engine, _dir) = test_engine();
        assert!(read_resource(&engine, "nexus://skills/nope").is_err());
    }

    #[test]
    fn read_resource_lists_empty_workflows() {
        let (engine, _dir) = test_engine();
        let value = read_resource(&engine, "nexus://workflows").unwrap();
        assert!(value.as_array().unwrap().is_empty());
    }

    #[test]
    fn read_resource_unknown_uri_errors() {
        let (engine, _dir) = test_engine();
        assert!(read_resource(&engine, "nexus://bogus").is_err());
    }
}

fn read_resource(engine: &Engine, uri: &str) -> Result<Value, String> {
    if let Some(rest) = uri.strip_prefix("nexus://skills") {
        let id = rest.trim_start_matches('/');
        return if id.is_empty() {
            Ok(json!(engine.skills()))
        } else {
            engine
                .skill(id)
                .map(|s| json!(s))
                .ok_or_else(|| format!("no such skill: {id}"))
        };
    }

    if let Some(rest) = uri.strip_prefix("nexus://workflows") {
        let name = rest.trim_start_matches('/');
        return if name.is_empty() {
            engine.list_workflows().map(|w| json!(w)).map_err(|e| e.to_string())
        } else {
            engine
                .workflow(name)
                .map_err(|e| e.to_string())?
                .map(|w| json!(w))
                .ok_or_else(|| format!("no such workflow: {name}"))
        };
    }

    Err(format!("unknown resource uri: {uri}"))
}
