//! Integration tests for the Atelier MCP file server.
//!
//! The first group spawns the actual `atelier-mcp` binary and talks raw
//! JSON-RPC over its stdio; the second drives the server through
//! [`McpToolChannel`], both in-process and as a child process.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use atelier::{ToolChannel, WorkspaceRoot};
use atelier_mcp::McpToolChannel;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

const BINARY: &str = env!("CARGO_BIN_EXE_atelier-mcp");

/// Helper owning a spawned file server process.
struct McpServerProcess {
    child: Child,
}

impl McpServerProcess {
    fn spawn(workspace: &Path) -> Self {
        let child = Command::new(BINARY)
            .arg(workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap_or_else(|e| panic!("Failed to spawn MCP server at {BINARY:?}: {e}"));

        Self { child }
    }

    /// Send a JSON-RPC request and read the single-line response.
    fn request(&mut self, request: Value) -> Value {
        let stdin = self.child.stdin.as_mut().expect("stdin not captured");
        let stdout = self.child.stdout.as_mut().expect("stdout not captured");

        let request_str = serde_json::to_string(&request).expect("serialize request");
        writeln!(stdin, "{}", request_str).expect("write request");
        stdin.flush().expect("flush stdin");

        let mut reader = BufReader::new(stdout);
        let mut response_line = String::new();
        reader.read_line(&mut response_line).expect("read response");

        serde_json::from_str(&response_line)
            .unwrap_or_else(|e| panic!("parse response '{}': {}", response_line.trim(), e))
    }

    /// Send a notification (no response expected).
    fn notify(&mut self, notification: Value) {
        let stdin = self.child.stdin.as_mut().expect("stdin not captured");
        let notification_str =
            serde_json::to_string(&notification).expect("serialize notification");
        writeln!(stdin, "{}", notification_str).expect("write notification");
        stdin.flush().expect("flush stdin");
    }

    fn call(&mut self, id: u64, name: &str, arguments: Value) -> Value {
        self.request(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }))
    }
}

impl Drop for McpServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Perform the MCP initialization handshake.
fn initialize(server: &mut McpServerProcess) -> Value {
    let init_response = server.request(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "atelier-mcp-test",
                "version": "0.1.0"
            }
        }
    }));

    assert_eq!(init_response["jsonrpc"], "2.0");
    assert_eq!(init_response["id"], 1);
    assert!(
        init_response.get("result").is_some(),
        "Expected result in initialize response, got: {}",
        init_response
    );

    server.notify(json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }));

    // Give the server a moment to process
    std::thread::sleep(Duration::from_millis(50));

    init_response
}

fn text_of(response: &Value) -> &str {
    response["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("expected text content, got: {response}"))
}

fn is_error(response: &Value) -> bool {
    response["result"]["isError"].as_bool().unwrap_or(false)
}

#[test]
fn test_mcp_initialize() {
    let workspace = TempDir::new().expect("create temp dir");
    let mut server = McpServerProcess::spawn(workspace.path());
    let response = initialize(&mut server);

    let result = &response["result"];
    assert!(result.get("serverInfo").is_some(), "Expected serverInfo");
    assert!(
        result["capabilities"].get("tools").is_some(),
        "Expected tools capability"
    );
}

#[test]
fn test_mcp_list_tools() {
    let workspace = TempDir::new().expect("create temp dir");
    let mut server = McpServerProcess::spawn(workspace.path());
    initialize(&mut server);

    let response = server.request(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/list",
        "params": {}
    }));

    let tools = response["result"]["tools"]
        .as_array()
        .expect("tools should be an array");
    let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["create_file", "delete_file", "edit_file"]);

    for tool in tools {
        assert!(tool.get("description").is_some(), "Tool should have description");
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[test]
fn test_mcp_create_edit_delete() {
    let workspace = TempDir::new().expect("create temp dir");
    let mut server = McpServerProcess::spawn(workspace.path());
    initialize(&mut server);

    let response = server.call(
        3,
        "create_file",
        json!({"path": "src/main.txt", "content": "hello hello"}),
    );
    assert_eq!(text_of(&response), "File 'src/main.txt' created successfully.");
    assert!(!is_error(&response));

    let response = server.call(
        4,
        "edit_file",
        json!({"path": "src/main.txt", "search_text": "hello", "replace_text": "bye"}),
    );
    assert_eq!(text_of(&response), "File 'src/main.txt' edited successfully.");
    assert_eq!(
        fs::read_to_string(workspace.path().join("src/main.txt")).unwrap(),
        "bye bye"
    );

    let response = server.call(5, "delete_file", json!({"path": "src/main.txt"}));
    assert_eq!(text_of(&response), "File 'src/main.txt' deleted successfully.");
    assert!(!workspace.path().join("src/main.txt").exists());
}

#[test]
fn test_mcp_rejects_escape() {
    let parent = TempDir::new().expect("create temp dir");
    let workspace = parent.path().join("ws");
    fs::create_dir(&workspace).unwrap();

    let mut server = McpServerProcess::spawn(&workspace);
    initialize(&mut server);

    let response = server.call(
        6,
        "create_file",
        json!({"path": "../outside.txt", "content": "x"}),
    );
    assert_eq!(
        text_of(&response),
        "Error: Path '../outside.txt' is invalid or outside of the workspace."
    );
    assert!(is_error(&response));
    assert!(!parent.path().join("outside.txt").exists());
}

#[test]
fn test_mcp_unknown_tool() {
    let workspace = TempDir::new().expect("create temp dir");
    let mut server = McpServerProcess::spawn(workspace.path());
    initialize(&mut server);

    let response = server.call(7, "chmod", json!({}));
    assert_eq!(text_of(&response), "Error: Unknown tool 'chmod'.");
    assert!(is_error(&response));
}

#[test]
fn test_mcp_missing_workspace_exits() {
    let parent = TempDir::new().expect("create temp dir");
    let output = Command::new(BINARY)
        .arg(parent.path().join("nope"))
        .stdin(Stdio::null())
        .output()
        .expect("run binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not usable"), "stderr was: {stderr}");
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn exercise_channel(mut channel: McpToolChannel, workspace: &Path) {
    let names: Vec<_> = channel
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["create_file", "delete_file", "edit_file"]);

    let reply = channel
        .invoke("create_file", object(json!({"path": "a.txt", "content": "one"})))
        .await
        .unwrap();
    assert_eq!(reply, "File 'a.txt' created successfully.");

    let reply = channel
        .invoke("delete_file", object(json!({"path": "missing.txt"})))
        .await
        .unwrap();
    assert_eq!(reply, "Error: File not found at 'missing.txt'.");

    let reply = channel.invoke("rename_file", Map::new()).await.unwrap();
    assert_eq!(reply, "Error: Unknown tool 'rename_file'.");

    assert_eq!(fs::read_to_string(workspace.join("a.txt")).unwrap(), "one");

    channel.close().await.unwrap();
    assert!(matches!(
        channel.invoke("create_file", Map::new()).await,
        Err(atelier::ChannelError::Closed)
    ));
}

#[tokio::test]
async fn test_in_process_channel() {
    let workspace = TempDir::new().expect("create temp dir");
    let root = WorkspaceRoot::new(workspace.path()).unwrap();
    let channel = McpToolChannel::in_process(root).await.unwrap();
    exercise_channel(channel, workspace.path()).await;
}

#[tokio::test]
async fn test_spawned_channel() {
    let workspace = TempDir::new().expect("create temp dir");
    let root = WorkspaceRoot::new(workspace.path()).unwrap();
    let channel = McpToolChannel::spawn(BINARY, &root).await.unwrap();
    exercise_channel(channel, workspace.path()).await;
}

#[tokio::test]
async fn test_spawn_missing_binary_fails_to_open() {
    let workspace = TempDir::new().expect("create temp dir");
    let root = WorkspaceRoot::new(workspace.path()).unwrap();
    let err = McpToolChannel::spawn(workspace.path().join("no-such-binary"), &root)
        .await
        .unwrap_err();
    assert!(matches!(err, atelier::ChannelError::Open(_)));
}

#[tokio::test]
async fn test_turn_over_mcp_channel() {
    use atelier::{
        Completion, ScriptedProvider, Segment, SessionStore, Settings, ToolCall, TurnOrchestrator,
    };
    use atelier_mcp::McpChannelOpener;

    let base = TempDir::new().expect("create temp dir");
    let store = SessionStore::new(base.path());
    let dir = store.base().join("00000000-0000-4000-8000-000000000001");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.txt"), "hello").unwrap();

    let provider = ScriptedProvider::with_completions([Completion::new(vec![
        Segment::text("Sure."),
        Segment::ToolCall(ToolCall::new(
            "tu_1",
            "edit_file",
            json!({"path": "a.txt", "search_text": "hello", "replace_text": "world"}),
        )),
        Segment::ToolCall(ToolCall::new(
            "tu_2",
            "create_file",
            json!({"path": "../escape.txt", "content": "x"}),
        )),
    ])]);
    let orchestrator = TurnOrchestrator::new(
        provider,
        McpChannelOpener::Spawn(BINARY.into()),
        &Settings::default(),
    );

    let result = orchestrator
        .prompt(&store, "00000000-0000-4000-8000-000000000001", "go")
        .await
        .unwrap();

    assert_eq!(
        result.message,
        "Sure.\n\
         Executed edit_file: File 'a.txt' edited successfully.\n\
         Executed create_file: Error: Path '../escape.txt' is invalid or outside of the workspace."
    );
    assert_eq!(result.file_tree.paths().collect::<Vec<_>>(), ["a.txt"]);
    assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "world");
    assert!(!store.base().join("escape.txt").exists());
}
