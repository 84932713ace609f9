//! Line protocol types.
//!
//! The server reads one `ToolRequest` per line on stdin and writes one
//! `ToolResponse` per line on stdout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolOutput;

/// Request sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Response written back for every request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: String,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn error(message: &str) -> Self {
        ToolResponse {
            content: format!("Error: {message}"),
            is_error: true,
        }
    }

    /// One JSON line. Falls back to a fixed error line if encoding fails.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"content":"Error: failed to encode response: {e}","is_error":true}}"#)
        })
    }
}

impl From<ToolOutput> for ToolResponse {
    fn from(output: ToolOutput) -> Self {
        ToolResponse {
            content: output.text,
            is_error: output.is_error,
        }
    }
}
