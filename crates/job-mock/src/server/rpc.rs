//! KBase flavoured JSON-RPC envelopes.
//!
//! Requests look like
//! `{"version": "1.1", "method": "narrative_job_mock.check_job", "params": [...], "id": ...}`
//! and successful results are always wrapped in a one element list.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::{models::JsonRpcError, Error, Result};

pub const MODULE_NAME: &str = "narrative_job_mock";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcRequest {
    pub fn envelope(&self) -> Envelope {
        if self.jsonrpc.as_deref() == Some("2.0") {
            Envelope::V2
        } else {
            Envelope::V1_1
        }
    }
}

/// Protocol flavour the response is written in, chosen to match the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    V1_1,
    V2,
}

impl Envelope {
    fn base(self, id: Option<Value>) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        match self {
            Envelope::V1_1 => map.insert("version".to_string(), json!("1.1")),
            Envelope::V2 => map.insert("jsonrpc".to_string(), json!("2.0")),
        };
        map.insert("id".to_string(), id.unwrap_or(Value::Null));
        map
    }

    pub fn success(self, id: Option<Value>, result: Value) -> Value {
        let mut map = self.base(id);
        map.insert("result".to_string(), json!([result]));
        Value::Object(map)
    }

    pub fn failure(self, id: Option<Value>, error: JsonRpcError) -> Value {
        let mut map = self.base(id);
        map.insert("error".to_string(), json!(error));
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    CheckJob,
    CheckJobs,
    Status,
}

impl RpcMethod {
    /// Resolves a fully qualified `<module>.<function>` name.
    pub fn parse(method: &str) -> Result<Self> {
        let not_found = || Error::MethodNotFound(method.to_string());

        let (module, function) = method.split_once('.').ok_or_else(not_found)?;
        if module != MODULE_NAME {
            return Err(not_found());
        }

        match function {
            "check_job" => Ok(RpcMethod::CheckJob),
            "check_jobs" => Ok(RpcMethod::CheckJobs),
            "status" => Ok(RpcMethod::Status),
            _ => Err(not_found()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RpcMethod::CheckJob => "check_job",
            RpcMethod::CheckJobs => "check_jobs",
            RpcMethod::Status => "status",
        }
    }

    pub fn requires_auth(self) -> bool {
        !matches!(self, RpcMethod::Status)
    }
}

/// Positional arguments of a call. A missing `params` means no arguments.
pub fn positional_params(params: Value) -> Result<Vec<Value>> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Array(args) => Ok(args),
        other => Err(Error::InvalidParams(format!(
            "params must be a list, got {}",
            other
        ))),
    }
}

pub fn error_code(err: &Error) -> i64 {
    match err {
        Error::Parse(_) => -32700,
        Error::InvalidRequest(_) => -32600,
        Error::MethodNotFound(_) => -32601,
        Error::InvalidParams(_) => -32602,
        Error::Unauthorized(_) => -32400,
        _ => -32000,
    }
}

/// Error block sent back to the caller for `err`.
pub fn to_rpc_error(err: &Error) -> JsonRpcError {
    match err {
        Error::Upstream(upstream) => JsonRpcError {
            name: "JSONRPCError".to_string(),
            code: error_code(err),
            message: upstream.message.clone(),
            error: Some(upstream.error.clone().unwrap_or_else(|| upstream.to_string())),
            ..Default::default()
        },
        other => JsonRpcError {
            name: "JSONRPCError".to_string(),
            code: error_code(other),
            message: other.to_string(),
            error: None,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_qualified_methods() {
        assert_eq!(RpcMethod::parse("narrative_job_mock.check_job").unwrap(), RpcMethod::CheckJob);
        assert_eq!(RpcMethod::parse("narrative_job_mock.check_jobs").unwrap(), RpcMethod::CheckJobs);
        assert_eq!(RpcMethod::parse("narrative_job_mock.status").unwrap(), RpcMethod::Status);
    }

    #[test]
    fn rejects_other_modules_and_functions() {
        for method in ["check_job", "NarrativeJobService.check_job", "narrative_job_mock.run_job"] {
            assert!(matches!(RpcMethod::parse(method), Err(Error::MethodNotFound(_))), "{}", method);
        }
    }

    #[test]
    fn only_status_is_anonymous() {
        assert!(RpcMethod::CheckJob.requires_auth());
        assert!(RpcMethod::CheckJobs.requires_auth());
        assert!(!RpcMethod::Status.requires_auth());
    }

    #[test]
    fn envelopes_match_request_flavour() {
        let v1: RpcRequest = serde_json::from_value(json!({
            "version": "1.1", "method": "narrative_job_mock.status", "id": "12"
        }))
        .unwrap();
        assert_eq!(v1.envelope(), Envelope::V1_1);
        assert_eq!(
            v1.envelope().success(v1.id.clone(), json!({"state": "OK"})),
            json!({"version": "1.1", "id": "12", "result": [{"state": "OK"}]})
        );

        let v2: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "narrative_job_mock.status", "id": 3
        }))
        .unwrap();
        assert_eq!(v2.envelope(), Envelope::V2);
        assert_eq!(
            v2.envelope().success(v2.id.clone(), Value::Null),
            json!({"jsonrpc": "2.0", "id": 3, "result": [null]})
        );
    }

    #[test]
    fn positional_params_require_a_list() {
        assert!(positional_params(Value::Null).unwrap().is_empty());
        assert_eq!(positional_params(json!(["a"])).unwrap(), vec![json!("a")]);
        assert!(matches!(positional_params(json!({"job_id": "a"})), Err(Error::InvalidParams(_))));
    }

    #[test]
    fn upstream_errors_keep_their_message() {
        let err = Error::Upstream(JsonRpcError {
            name: "JSONRPCError".to_string(),
            code: -32000,
            message: "Token validation failed".to_string(),
            error: Some("traceback".to_string()),
            ..Default::default()
        });
        let rpc = to_rpc_error(&err);
        assert_eq!(rpc.code, -32000);
        assert_eq!(rpc.message, "Token validation failed");
        assert_eq!(rpc.error.as_deref(), Some("traceback"));
    }

    #[test]
    fn local_errors_map_to_standard_codes() {
        assert_eq!(error_code(&Error::Parse("x".into())), -32700);
        assert_eq!(error_code(&Error::InvalidRequest("x".into())), -32600);
        assert_eq!(error_code(&Error::MethodNotFound("x".into())), -32601);
        assert_eq!(error_code(&Error::InvalidParams("x".into())), -32602);
        assert_eq!(error_code(&Error::Unauthorized("x".into())), -32400);
        assert_eq!(error_code(&Error::Validation("x".into())), -32000);
    }
}
