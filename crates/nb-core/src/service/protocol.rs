//! JSON-RPC request/response envelopes.
//!
//! Requests are `{method, params, id}` (a `jsonrpc` member is optional and
//! echoed back when present). Responses always carry both `result` and
//! `error`, one of them null, plus the request `id`.

use nb_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Incoming call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            method: method.into(),
            params,
            id,
        }
    }
}

/// Outgoing reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub result: Value,
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: None,
            result,
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: None,
            result: Value::Null,
            error: Some(error),
            id,
        }
    }

    /// Tag the response as JSON-RPC 2.0 when the request was.
    pub fn with_jsonrpc(mut self, version: Option<String>) -> Self {
        self.jsonrpc = version;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"result":null,"error":{{"code":{},"message":"serialization failed"}},"id":null}}"#,
                INTERNAL_ERROR
            )
        })
    }
}

/// Error member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(PARSE_ERROR, format!("parse error: {}", detail))
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(INVALID_REQUEST, format!("invalid request: {}", detail))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {}", method))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("invalid params: {}", detail))
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(INTERNAL_ERROR, format!("internal error: {}", detail))
    }

    /// Bridge failure: the stable bridge code plus its report as `data`.
    pub fn from_domain(err: &Error) -> Self {
        let data = serde_json::to_value(err.report()).ok();
        Self {
            code: i64::from(err.code()),
            message: err.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn request_without_jsonrpc_member() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"method":"parse","params":["hi"],"id":7}"#).unwrap();
        assert!(req.jsonrpc.is_none());
        assert_eq!(req.method, "parse");
        assert_eq!(req.params, json!(["hi"]));
        assert_eq!(req.id, json!(7));
    }

    #[test]
    fn request_defaults_missing_params_and_id() {
        let req: RpcRequest = serde_json::from_str(r#"{"method":"ping"}"#).unwrap();
        assert!(req.params.is_null());
        assert!(req.id.is_null());
    }

    #[test]
    fn success_keeps_null_error_member() {
        let resp = RpcResponse::success(json!("a"), json!({"ok": true}));
        let value: Value = serde_json::from_str(&resp.to_json()).unwrap();
        assert_eq!(value["result"]["ok"], true);
        assert!(value.get("error").is_some_and(Value::is_null));
        assert_eq!(value["id"], "a");
        assert!(value.get("jsonrpc").is_none());
    }

    #[test]
    fn failure_keeps_null_result_member() {
        let resp = RpcResponse::failure(json!(1), RpcError::method_not_found("nope"))
            .with_jsonrpc(Some(JSONRPC_VERSION.to_string()));
        let value: Value = serde_json::from_str(&resp.to_json()).unwrap();
        assert!(value.get("result").is_some_and(Value::is_null));
        assert_eq!(value["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(value["jsonrpc"], "2.0");
    }

    #[test]
    fn domain_error_carries_report() {
        let err = Error::ChannelTimeout {
            elapsed: Duration::from_secs(5),
            partial_bytes: 12,
        };
        let rpc = RpcError::from_domain(&err);
        assert_eq!(rpc.code, 25);
        let data = rpc.data.unwrap();
        assert_eq!(data["code_name"], "ERR_CHANNEL_TIMEOUT");
        assert_eq!(data["recoverable"], true);
        assert!(!rpc.message.contains("Sentence"));
    }
}
