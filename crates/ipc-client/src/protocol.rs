//! JSON-RPC 2.0 protocol types

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: serde_json::Value,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Result of the `status` method
///
/// Only `state` is required; older clients omit the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResult {
    pub state: String,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uptime_secs: Option<u64>,
    #[serde(default)]
    pub peer_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_request_serialization() {
        let request = RpcRequest::new("status", Some(serde_json::json!({"verbose": true})), 1);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"status\""));
    }

    #[test]
    fn test_rpc_request_no_params() {
        let request = RpcRequest::new("status", None, 1);
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_rpc_response_with_error() {
        let json = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#;
        let response: RpcResponse = serde_json::from_str(json).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.as_ref().unwrap().code, -32601);
    }

    #[test]
    fn test_minimal_status_result() {
        let result: StatusResult = serde_json::from_str(r#"{"state":"idle"}"#).unwrap();
        assert_eq!(result.state, "idle");
        assert!(!result.connected);
        assert!(result.version.is_none());
    }

    #[test]
    fn test_full_status_result() {
        let json = r#"{"state":"connected","connected":true,"version":"0.4.1","uptime_secs":90,"peer_count":7}"#;
        let result: StatusResult = serde_json::from_str(json).unwrap();
        assert!(result.connected);
        assert_eq!(result.version.as_deref(), Some("0.4.1"));
        assert_eq!(result.uptime_secs, Some(90));
        assert_eq!(result.peer_count, Some(7));
    }
}
