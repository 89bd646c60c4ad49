// crates/foresight-client/src/envelope.rs
//
// JSON request/response envelope spoken by the ledger gateway.

use serde::{Deserialize, Serialize};

/// Request envelope: a method name and a JSON params payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub method: String,
    pub params: serde_json::Value,
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// The result data (if success).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error message (if failure).
    #[serde(default)]
    pub error: Option<String>,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: serde_json::Value) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }
}
