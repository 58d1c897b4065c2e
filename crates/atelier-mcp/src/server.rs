//! MCP server over the workspace tool set.

use std::sync::Arc;

use atelier::{ToolDefinition, ToolOutcome, WorkspaceRoot, WorkspaceTools};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
};

/// MCP server whose tools are confined to one workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceServer {
    tools: Arc<WorkspaceTools>,
}

impl WorkspaceServer {
    /// Create a server bound to `root`.
    pub fn new(root: WorkspaceRoot) -> Self {
        Self {
            tools: Arc::new(WorkspaceTools::new(root)),
        }
    }

    /// The workspace this server operates on.
    pub fn root(&self) -> &WorkspaceRoot {
        self.tools.root()
    }
}

fn to_mcp_tool(definition: ToolDefinition) -> Tool {
    let input_schema = match definition.parameters {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    };

    Tool {
        name: definition.name.into(),
        title: None,
        description: Some(definition.description.into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

impl ServerHandler for WorkspaceServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "File server for a single project workspace. Use 'create_file' to write a file, \
                'edit_file' to replace every occurrence of a text in a file and 'delete_file' to \
                remove a file. Paths are relative to the workspace root and may not leave it."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: WorkspaceTools::definitions()
                .into_iter()
                .map(to_mcp_tool)
                .collect(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = request.arguments.unwrap_or_default();
        tracing::debug!(tool = %request.name, "tools/call");

        Ok(match self.tools.dispatch(request.name.as_ref(), &arguments) {
            ToolOutcome::Success(message) => CallToolResult::success(vec![Content::text(message)]),
            ToolOutcome::Failure(message) => CallToolResult::error(vec![Content::text(message)]),
        })
    }
}
