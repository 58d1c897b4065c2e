//! Workspace file tools exposed to the agent.
//!
//! This module provides:
//!
//! - [`ToolDefinition`] - A tool's schema (name, description, JSON Schema parameters)
//! - [`ToolOutcome`] - Tagged success/failure result of one tool call
//! - [`WorkspaceTools`] - The `create_file`, `delete_file` and `edit_file`
//!   operations, bound to one [`WorkspaceRoot`]
//!
//! Tools never return `Err`: every failure, including a path that escapes the
//! workspace, becomes a [`ToolOutcome::Failure`] carrying a message the model
//! can read and react to.

use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::guard::WorkspaceRoot;

/// Tool name for [`WorkspaceTools::create`].
pub const CREATE_FILE: &str = "create_file";
/// Tool name for [`WorkspaceTools::delete`].
pub const DELETE_FILE: &str = "delete_file";
/// Tool name for [`WorkspaceTools::edit`].
pub const EDIT_FILE: &str = "edit_file";

/// Full definition of a tool including its parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    #[serde(default)]
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Create a definition whose parameters are the JSON Schema of `T`.
    pub fn for_params<T: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let schema = schemars::schema_for!(T);
        let parameters = serde_json::to_value(schema).unwrap_or_else(|_| {
            serde_json::json!({ "type": "object", "properties": {} })
        });
        Self::new(name, description, parameters)
    }
}

/// Outcome of a single tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The operation was carried out.
    Success(String),
    /// The operation was refused or failed.
    Failure(String),
}

impl ToolOutcome {
    /// Returns true for [`ToolOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        match self {
            ToolOutcome::Success(msg) | ToolOutcome::Failure(msg) => msg,
        }
    }

    /// Consume the outcome, keeping only the message.
    pub fn into_message(self) -> String {
        match self {
            ToolOutcome::Success(msg) | ToolOutcome::Failure(msg) => msg,
        }
    }
}

/// Parameters for `create_file`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateFileParams {
    /// The relative path for the new file (e.g., "src/index.js").
    pub path: String,
    /// The text content to write into the file.
    #[serde(default)]
    pub content: String,
}

/// Parameters for `delete_file`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteFileParams {
    /// The relative path of the file to delete.
    pub path: String,
}

/// Parameters for `edit_file`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EditFileParams {
    /// The relative path of the file to edit.
    pub path: String,
    /// The text to search for.
    pub search_text: String,
    /// The text to replace it with.
    pub replace_text: String,
}

/// The file tools, bound to a single workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceTools {
    root: WorkspaceRoot,
}

impl WorkspaceTools {
    /// Bind the tools to a workspace root.
    pub fn new(root: WorkspaceRoot) -> Self {
        Self { root }
    }

    /// The workspace these tools operate on.
    pub fn root(&self) -> &WorkspaceRoot {
        &self.root
    }

    /// Definitions of every tool, in the order they are advertised.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::for_params::<CreateFileParams>(
                CREATE_FILE,
                "Creates a new file at a given path within the workspace. \
                 If the file already exists, it will be overwritten.",
            ),
            ToolDefinition::for_params::<DeleteFileParams>(
                DELETE_FILE,
                "Deletes a file at a given path within the workspace.",
            ),
            ToolDefinition::for_params::<EditFileParams>(
                EDIT_FILE,
                "Finds and replaces text within a specified file.",
            ),
        ]
    }

    /// Route a tool call by name to the matching operation.
    pub fn dispatch(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutcome {
        match name {
            CREATE_FILE => match parse::<CreateFileParams>(name, arguments) {
                Ok(p) => self.create(&p.path, &p.content),
                Err(outcome) => outcome,
            },
            DELETE_FILE => match parse::<DeleteFileParams>(name, arguments) {
                Ok(p) => self.delete(&p.path),
                Err(outcome) => outcome,
            },
            EDIT_FILE => match parse::<EditFileParams>(name, arguments) {
                Ok(p) => self.edit(&p.path, &p.search_text, &p.replace_text),
                Err(outcome) => outcome,
            },
            _ => {
                tracing::warn!(tool = %name, "unknown tool requested");
                ToolOutcome::Failure(format!("Error: Unknown tool '{name}'."))
            }
        }
    }

    /// Create (or overwrite) a file, creating missing parent directories.
    pub fn create(&self, path: &str, content: &str) -> ToolOutcome {
        let Ok(target) = self.root.resolve(path) else {
            return invalid_path(path);
        };

        let written = match target.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| fs::write(&target, content));

        match written {
            Ok(()) => {
                tracing::debug!(path = %path, bytes = content.len(), "created file");
                ToolOutcome::Success(format!("File '{path}' created successfully."))
            }
            Err(e) => ToolOutcome::Failure(format!("Error creating file '{path}': {e}")),
        }
    }

    /// Delete a regular file. Directories are never removed.
    pub fn delete(&self, path: &str) -> ToolOutcome {
        let Ok(target) = self.root.resolve(path) else {
            return invalid_path(path);
        };
        if !target.is_file() {
            return not_found(path);
        }

        match fs::remove_file(&target) {
            Ok(()) => {
                tracing::debug!(path = %path, "deleted file");
                ToolOutcome::Success(format!("File '{path}' deleted successfully."))
            }
            Err(e) => ToolOutcome::Failure(format!("Error deleting file '{path}': {e}")),
        }
    }

    /// Replace every literal occurrence of `search` with `replace`.
    ///
    /// A `search` string that does not occur is not an error; the file is
    /// rewritten unchanged.
    pub fn edit(&self, path: &str, search: &str, replace: &str) -> ToolOutcome {
        let Ok(target) = self.root.resolve(path) else {
            return invalid_path(path);
        };
        if !target.is_file() {
            return not_found(path);
        }
        if search.is_empty() {
            return ToolOutcome::Failure("Error: search_text must not be empty.".to_string());
        }

        match rewrite(&target, |text| text.replace(search, replace)) {
            Ok(changed) => {
                tracing::debug!(path = %path, changed, "edited file");
                ToolOutcome::Success(format!("File '{path}' edited successfully."))
            }
            Err(e) => ToolOutcome::Failure(format!("Error editing file '{path}': {e}")),
        }
    }
}

fn rewrite(target: &Path, edit: impl FnOnce(&str) -> String) -> std::io::Result<bool> {
    let original = fs::read_to_string(target)?;
    let updated = edit(&original);
    let changed = updated != original;
    fs::write(target, updated)?;
    Ok(changed)
}

fn parse<T: serde::de::DeserializeOwned>(
    name: &str,
    arguments: &Map<String, Value>,
) -> Result<T, ToolOutcome> {
    serde_json::from_value(Value::Object(arguments.clone())).map_err(|e| {
        ToolOutcome::Failure(format!("Error: Invalid arguments for '{name}': {e}"))
    })
}

fn invalid_path(path: &str) -> ToolOutcome {
    ToolOutcome::Failure(format!(
        "Error: Path '{path}' is invalid or outside of the workspace."
    ))
}

fn not_found(path: &str) -> ToolOutcome {
    ToolOutcome::Failure(format!("Error: File not found at '{path}'."))
}
