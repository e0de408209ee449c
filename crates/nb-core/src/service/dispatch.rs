//! Method registry and envelope dispatch.
//!
//! Handlers are registered under a fixed name with a typed parameter tuple.
//! Dispatch never relies on panics or dynamic lookup of arbitrary names:
//! every outcome is one of the [`DispatchError`] variants or a result.

use super::protocol::{RpcError, RpcRequest, RpcResponse};
use crate::logging::event_names;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix reserved for protocol-level methods.
pub const RESERVED_PREFIX: &str = "rpc.";

type Handler<C> = Box<dyn Fn(&C, Value) -> Result<Value, DispatchError> + Send + Sync>;

/// Rejected registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid method name {0:?}: use lowercase letters, digits, '_' and '.'")]
    InvalidName(String),

    #[error("method name {0:?} is reserved")]
    Reserved(String),

    #[error("method {0:?} is already registered")]
    Duplicate(String),
}

/// Why a call produced no result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Application(#[from] nb_common::Error),
}

impl DispatchError {
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            DispatchError::Parse(detail) => RpcError::parse_error(detail),
            DispatchError::InvalidRequest(detail) => RpcError::invalid_request(detail),
            DispatchError::MethodNotFound(method) => RpcError::method_not_found(method),
            DispatchError::InvalidParams(detail) => RpcError::invalid_params(detail),
            DispatchError::Application(err) => RpcError::from_domain(err),
        }
    }
}

/// Public description of a registered method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodInfo {
    pub name: String,
    pub description: String,
    pub params: Vec<String>,
}

struct Entry<C> {
    info: MethodInfo,
    handler: Handler<C>,
}

/// Name → handler table over a shared context `C`.
pub struct MethodRegistry<C> {
    methods: BTreeMap<String, Entry<C>>,
}

impl<C> Default for MethodRegistry<C> {
    fn default() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }
}

impl<C> MethodRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`.
    ///
    /// `params` names the positional parameters in order; a call may pass
    /// them as an array or as an object keyed by these names. `P` is usually
    /// a tuple such as `(String,)`.
    pub fn register<P, R, F>(
        &mut self,
        name: &str,
        description: &str,
        params: &[&str],
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        P: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(&C, P) -> nb_common::Result<R> + Send + Sync + 'static,
    {
        validate_name(name)?;
        if self.methods.contains_key(name) {
            return Err(RegistrationError::Duplicate(name.to_string()));
        }

        let param_names: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        let positional_names = param_names.clone();
        let wrapped: Handler<C> = Box::new(move |ctx: &C, raw: Value| -> Result<Value, DispatchError> {
            let positional = to_positional(raw, &positional_names)?;
            let parsed: P = serde_json::from_value(positional)
                .map_err(|e| DispatchError::InvalidParams(e.to_string()))?;
            let result = handler(ctx, parsed)?;
            serde_json::to_value(result).map_err(|e| nb_common::Error::Json(e).into())
        });

        self.methods.insert(
            name.to_string(),
            Entry {
                info: MethodInfo {
                    name: name.to_string(),
                    description: description.to_string(),
                    params: param_names,
                },
                handler: wrapped,
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered methods, sorted by name.
    pub fn methods(&self) -> Vec<MethodInfo> {
        self.methods.values().map(|e| e.info.clone()).collect()
    }

    /// Invoke a decoded request.
    pub fn call(&self, ctx: &C, request: &RpcRequest) -> Result<Value, DispatchError> {
        let entry = self
            .methods
            .get(&request.method)
            .ok_or_else(|| DispatchError::MethodNotFound(request.method.clone()))?;
        (entry.handler)(ctx, request.params.clone())
    }

    /// Decode one raw envelope, invoke it and build the reply.
    pub fn dispatch(&self, ctx: &C, raw: &str) -> RpcResponse {
        let request = match decode_request(raw) {
            Ok(request) => request,
            Err((id, err)) => {
                warn!(event = event_names::RPC_FAILED, error = %err, "rejected envelope");
                return RpcResponse::failure(id, err.to_rpc_error());
            }
        };
        debug!(event = event_names::RPC_RECEIVED, method = %request.method, "rpc call");

        let response = match self.call(ctx, &request) {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(err) => {
                warn!(
                    event = event_names::RPC_FAILED,
                    method = %request.method,
                    error = %err,
                    "rpc call failed"
                );
                RpcResponse::failure(request.id, err.to_rpc_error())
            }
        };
        response.with_jsonrpc(request.jsonrpc)
    }
}

/// Parse and shape-check an envelope. On failure, returns the request id
/// when it could be recovered.
pub fn decode_request(raw: &str) -> Result<RpcRequest, (Value, DispatchError)> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| (Value::Null, DispatchError::Parse(e.to_string())))?;

    let Value::Object(map) = &value else {
        return Err((
            Value::Null,
            DispatchError::InvalidRequest("envelope must be a JSON object".to_string()),
        ));
    };
    let id = map.get("id").cloned().unwrap_or(Value::Null);

    match map.get("method") {
        Some(Value::String(m)) if !m.is_empty() => {}
        _ => {
            return Err((
                id,
                DispatchError::InvalidRequest("\"method\" must be a non-empty string".to_string()),
            ))
        }
    }
    match map.get("params") {
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => {}
        Some(_) => {
            return Err((
                id,
                DispatchError::InvalidRequest("\"params\" must be an array or object".to_string()),
            ))
        }
    }

    serde_json::from_value(value).map_err(|e| (id, DispatchError::InvalidRequest(e.to_string())))
}

/// Normalize params to an array in declaration order.
fn to_positional(raw: Value, names: &[String]) -> Result<Value, DispatchError> {
    match raw {
        Value::Null => Ok(Value::Array(Vec::new())),
        Value::Array(items) => Ok(Value::Array(items)),
        Value::Object(mut map) => {
            let items = names
                .iter()
                .map(|name| map.remove(name).unwrap_or(Value::Null))
                .collect();
            if let Some(extra) = map.keys().next() {
                return Err(DispatchError::InvalidParams(format!(
                    "unknown parameter {:?}",
                    extra
                )));
            }
            Ok(Value::Array(items))
        }
        other => Err(DispatchError::InvalidParams(format!(
            "expected array or object, got {}",
            other
        ))),
    }
}

fn validate_name(name: &str) -> Result<(), RegistrationError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    let starts_ok = name.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    if !valid_chars || !starts_ok {
        return Err(RegistrationError::InvalidName(name.to_string()));
    }
    if name.starts_with(RESERVED_PREFIX) {
        return Err(RegistrationError::Reserved(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::protocol::{INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
    use serde::de::IgnoredAny;
    use serde_json::json;

    struct Counter {
        base: i64,
    }

    fn registry() -> MethodRegistry<Counter> {
        let mut reg = MethodRegistry::new();
        reg.register("add", "add to base", &["n"], |c: &Counter, (n,): (i64,)| {
            Ok(c.base + n)
        })
        .unwrap();
        reg.register(
            "greet",
            "greeting",
            &["name", "punct"],
            |_: &Counter, (name, punct): (String, Option<String>)| {
                Ok(format!("hello {}{}", name, punct.unwrap_or_default()))
            },
        )
        .unwrap();
        reg.register("fail", "always fails", &[], |_: &Counter, _: IgnoredAny| {
            Err::<(), _>(nb_common::Error::NotReady {
                state: "closed".to_string(),
            })
        })
        .unwrap();
        reg
    }

    #[test]
    fn positional_params() {
        let resp = registry().dispatch(&Counter { base: 40 }, r#"{"method":"add","params":[2],"id":1}"#);
        assert_eq!(resp.result, json!(42));
        assert!(resp.error.is_none());
        assert_eq!(resp.id, json!(1));
    }

    #[test]
    fn named_params_with_optional_member() {
        let reg = registry();
        let ctx = Counter { base: 0 };
        let resp = reg.dispatch(&ctx, r#"{"method":"greet","params":{"name":"ann"},"id":"x"}"#);
        assert_eq!(resp.result, json!("hello ann"));
        let resp = reg.dispatch(&ctx, r#"{"method":"greet","params":["bo","!"],"id":"y"}"#);
        assert_eq!(resp.result, json!("hello bo!"));
    }

    #[test]
    fn unknown_named_param_rejected() {
        let resp = registry().dispatch(
            &Counter { base: 0 },
            r#"{"method":"add","params":{"n":1,"m":2},"id":3}"#,
        );
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[test]
    fn wrong_param_type_and_arity() {
        let reg = registry();
        let ctx = Counter { base: 0 };
        let resp = reg.dispatch(&ctx, r#"{"method":"add","params":["two"],"id":1}"#);
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
        let resp = reg.dispatch(&ctx, r#"{"method":"add","params":[1,2],"id":1}"#);
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[test]
    fn malformed_envelopes() {
        let reg = registry();
        let ctx = Counter { base: 0 };
        assert_eq!(reg.dispatch(&ctx, "not json").error.unwrap().code, PARSE_ERROR);
        assert_eq!(reg.dispatch(&ctx, "[1,2]").error.unwrap().code, INVALID_REQUEST);

        let resp = reg.dispatch(&ctx, r#"{"params":[],"id":9}"#);
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(resp.id, json!(9));

        let resp = reg.dispatch(&ctx, r#"{"method":"add","params":"2","id":9}"#);
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn unknown_method() {
        let resp = registry().dispatch(&Counter { base: 0 }, r#"{"method":"__class__","id":1}"#);
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn application_error_uses_bridge_code() {
        let resp = registry().dispatch(&Counter { base: 0 }, r#"{"method":"fail","id":1}"#);
        let err = resp.error.unwrap();
        assert_eq!(err.code, 24);
        assert_eq!(err.data.unwrap()["code_name"], "ERR_NOT_READY");
        assert!(resp.result.is_null());
    }

    #[test]
    fn jsonrpc_member_is_echoed() {
        let reg = registry();
        let ctx = Counter { base: 1 };
        let resp = reg.dispatch(&ctx, r#"{"jsonrpc":"2.0","method":"add","params":[1],"id":1}"#);
        assert_eq!(resp.jsonrpc.as_deref(), Some("2.0"));
        let resp = reg.dispatch(&ctx, r#"{"method":"add","params":[1],"id":1}"#);
        assert!(resp.jsonrpc.is_none());
    }

    #[test]
    fn registration_is_validated() {
        let mut reg = registry();
        let noop = |_: &Counter, _: IgnoredAny| Ok(());
        assert_eq!(
            reg.register("add", "", &[], noop),
            Err(RegistrationError::Duplicate("add".to_string()))
        );
        assert_eq!(
            reg.register("rpc.discover", "", &[], noop),
            Err(RegistrationError::Reserved("rpc.discover".to_string()))
        );
        for bad in ["", "Parse", "_private", "has space", "a-b"] {
            assert_eq!(
                reg.register(bad, "", &[], noop),
                Err(RegistrationError::InvalidName(bad.to_string()))
            );
        }
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn methods_listed_sorted() {
        let names: Vec<String> = registry().methods().into_iter().map(|m| m.name).collect();
        assert_eq!(names, ["add", "fail", "greet"]);
    }
}
