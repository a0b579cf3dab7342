//! Job status records exchanged with the Narrative Job Service.
//!
//! Field names follow the NJS wire format. Fields this service does not
//! interpret are kept in `extra` so they pass through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle state reported for a job.
///
/// NJS reports `queued`, `in-progress`, `completed` and `suspend`. Mocked
/// children additionally use `running` and `error`. Anything else is kept
/// as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Queued,
    InProgress,
    Completed,
    Suspend,
    Running,
    Error,
    Other(String),
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::InProgress => write!(f, "in-progress"),
            JobState::Completed => write!(f, "completed"),
            JobState::Suspend => write!(f, "suspend"),
            JobState::Running => write!(f, "running"),
            JobState::Error => write!(f, "error"),
            JobState::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s {
            "queued" => JobState::Queued,
            "in-progress" => JobState::InProgress,
            "completed" => JobState::Completed,
            "suspend" => JobState::Suspend,
            "running" => JobState::Running,
            "error" => JobState::Error,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        JobState::from(s.as_str())
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.to_string()
    }
}

/// Error block of a JSON-RPC response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    // e.g. `data`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.code, self.message)
    }
}

/// Status of a single job as reported by NJS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_state: Option<JobState>,

    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub canceled: Option<bool>,

    /// Deprecated spelling of `canceled`, still reported by NJS.
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,

    // Milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<i64>,

    /// `Some(Value::Null)` when NJS sent an explicit `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_jobs: Option<Vec<JobStatus>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of an RPC call stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcContext {
    #[serde(default, deserialize_with = "null_as_default")]
    pub call_stack: Vec<MethodCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How a job was launched. Owned by NJS, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    /// `<module>.<function>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub params: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_ver: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_context: Option<RpcContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ws_objects: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wsid: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobParams {
    /// Per-child parameter sets of a batch job, found at `params[0].params`.
    ///
    /// Returns an empty slice when that path is missing or is not a list.
    pub fn batch_child_params(&self) -> &[Value] {
        self.params
            .first()
            .and_then(|first| first.get("params"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Response of a `check_jobs` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckJobsResult {
    #[serde(default)]
    pub job_states: HashMap<String, JobStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_params: Option<HashMap<String, JobParams>>,

    #[serde(default)]
    pub check_error: HashMap<String, JsonRpcError>,
}

/// Parameters of the `check_jobs` RPC method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckJobsParams {
    pub job_ids: Vec<String>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub with_job_params: Option<bool>,
}

impl CheckJobsParams {
    pub fn include_params(&self) -> bool {
        self.with_job_params.unwrap_or(false)
    }
}

/// Outcome of looking up a single job: its status, or the error NJS
/// reported while checking it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobLookup {
    State(JobStatus),
    Error(JsonRpcError),
}

/// Static health descriptor returned by the `status` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub state: String,
    pub message: String,
    pub version: String,
    pub git_url: String,
    pub git_commit_hash: String,
}

/// Reads `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keeps an explicit `null` as `Some(Value::Null)` so it is written back out.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// KBase booleans travel as `0`/`1`. Accepts JSON booleans too, always
/// writes integers.
mod flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_u8(u8::from(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::Number(n)) => Ok(Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false))),
            Some(other) => Err(D::Error::custom(format!(
                "expected a boolean or 0/1, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_status_keeps_unknown_fields() {
        let raw = json!({
            "job_id": "5ad7ec09e4b0a7033d0286cf",
            "job_state": "completed",
            "finished": 1,
            "ujs_url": "https://ci.kbase.us/services/userandjobstate/",
            "canceled": 0,
            "cancelled": 0,
            "creation_time": 1524100105000i64,
            "status": ["2018-04-19T01:08:32+0000", 0, "complete", "done", null, null, 0, 1],
            "result": [{"report_ref": "1/2/3"}]
        });

        let status: JobStatus = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(status.job_state, Some(JobState::Completed));
        assert_eq!(status.canceled, Some(false));
        assert_eq!(status.extra.get("finished"), Some(&json!(1)));
        assert!(status.child_jobs.is_none());

        assert_eq!(serde_json::to_value(&status).unwrap(), raw);
    }

    #[test]
    fn flags_accept_booleans_and_integers() {
        let status: JobStatus =
            serde_json::from_value(json!({"job_id": "a", "canceled": true, "cancelled": 1}))
                .unwrap();
        assert_eq!(status.canceled, Some(true));
        assert_eq!(status.cancelled, Some(true));

        let out = serde_json::to_value(&status).unwrap();
        assert_eq!(out["canceled"], json!(1));
        assert_eq!(out["cancelled"], json!(1));
    }

    #[test]
    fn flags_reject_strings() {
        let res = serde_json::from_value::<JobStatus>(json!({"job_id": "a", "canceled": "yes"}));
        assert!(res.is_err());
    }

    #[test]
    fn unrecognized_job_state_round_trips() {
        let status: JobStatus =
            serde_json::from_value(json!({"job_id": "a", "job_state": "estimating"})).unwrap();
        assert_eq!(status.job_state, Some(JobState::Other("estimating".to_string())));
        assert_eq!(serde_json::to_value(&status).unwrap()["job_state"], json!("estimating"));
    }

    #[test]
    fn batch_child_params_reads_nested_list() {
        let params: JobParams = serde_json::from_value(json!({
            "method": "kb_BatchApp.run_batch",
            "params": [{"module_name": "MEGAHIT", "params": [{"a": 1}, {"a": 2}, {"a": 3}]}]
        }))
        .unwrap();
        assert_eq!(params.batch_child_params().len(), 3);
    }

    #[test]
    fn batch_child_params_is_empty_when_missing_or_malformed() {
        let no_params: JobParams = serde_json::from_value(json!({"method": "a.b"})).unwrap();
        assert!(no_params.batch_child_params().is_empty());

        let no_nested: JobParams =
            serde_json::from_value(json!({"method": "a.b", "params": [{"x": 1}]})).unwrap();
        assert!(no_nested.batch_child_params().is_empty());

        let not_a_list: JobParams =
            serde_json::from_value(json!({"method": "a.b", "params": [{"params": "nope"}]}))
                .unwrap();
        assert!(not_a_list.batch_child_params().is_empty());
    }

    #[test]
    fn error_block_keeps_extra_fields_and_tolerates_nulls() {
        let raw = json!({"name": "x", "code": null, "message": "m", "data": {"k": 1}});
        let err: JsonRpcError = serde_json::from_value(raw).unwrap();
        assert_eq!(err.code, 0);
        assert_eq!(err.extra.get("data"), Some(&json!({"k": 1})));

        let out = serde_json::to_value(&err).unwrap();
        assert_eq!(out["data"], json!({"k": 1}));
    }

    #[test]
    fn null_launch_params_read_as_empty() {
        let params: JobParams = serde_json::from_value(json!({
            "method": "a.b",
            "params": null,
            "rpc_context": {"call_stack": null, "run_id": "r1"}
        }))
        .unwrap();
        assert!(params.params.is_empty());
        assert!(params.rpc_context.as_ref().unwrap().call_stack.is_empty());
        assert!(params.batch_child_params().is_empty());
    }

    #[test]
    fn call_stack_entries_keep_extra_fields() {
        let call: MethodCall = serde_json::from_value(json!({
            "time": "2018-06-11T15:32:13+0000",
            "method": "kb_BatchApp.run_batch",
            "job_id": "5b1e95fde4b0d417818a2b85",
            "run_id": "abc"
        }))
        .unwrap();
        assert_eq!(call.extra.get("run_id"), Some(&json!("abc")));
    }

    #[test]
    fn explicit_null_result_and_status_pass_through() {
        let raw = json!({"job_id": "a", "job_state": "queued", "status": null, "result": null});
        let status: JobStatus = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(status.result, Some(Value::Null));
        assert_eq!(status.status, Some(Value::Null));
        assert_eq!(serde_json::to_value(&status).unwrap(), raw);

        let missing: JobStatus = serde_json::from_value(json!({"job_id": "a"})).unwrap();
        assert!(missing.result.is_none());
        assert!(serde_json::to_value(&missing).unwrap().get("result").is_none());
    }

    #[test]
    fn check_jobs_params_default_to_no_job_params() {
        let params: CheckJobsParams =
            serde_json::from_value(json!({"job_ids": ["a", "b"]})).unwrap();
        assert!(!params.include_params());

        let params: CheckJobsParams =
            serde_json::from_value(json!({"job_ids": ["a"], "with_job_params": 1})).unwrap();
        assert!(params.include_params());
    }

    #[test]
    fn job_lookup_serializes_without_tag() {
        let lookup = JobLookup::Error(JsonRpcError {
            name: "JSONRPCError".to_string(),
            code: -32000,
            message: "no such job".to_string(),
            error: None,
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&lookup).unwrap(),
            json!({"name": "JSONRPCError", "code": -32000, "message": "no such job"})
        );
    }
}
