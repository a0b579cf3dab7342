use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::JobStatusClient;
use crate::{
    config::NjsConfig,
    models::{CheckJobsResult, JsonRpcError},
    Error, Result,
};

const CHECK_JOBS_METHOD: &str = "NarrativeJobService.check_jobs";

/// JSON-RPC 1.1 client for the Narrative Job Service.
pub struct NjsClient {
    url: Url,
    client: Client,
}

impl NjsClient {
    pub fn new(config: &NjsConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("invalid NJS url {}: {}", config.url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Calls `method` and returns the first element of the result list.
    async fn call_method(&self, method: &str, params: Vec<Value>, token: Option<&str>) -> Result<Value> {
        let body = json!({
            "method": method,
            "params": params,
            "version": "1.1",
            "id": Uuid::new_v4().to_string(),
        });

        let mut request = self.client.post(self.url.clone()).json(&body);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }

        debug!("Calling {} at {}", method, self.url);
        let response = request.send().await?;

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            let text = response.text().await?;
            warn!("{} failed with a server error", method);
            return Err(Error::Upstream(server_error(&text)));
        }

        let response = response.error_for_status()?;
        let payload: Value = response.json().await?;

        if let Some(err) = payload.get("error").filter(|e| !e.is_null()) {
            let err = serde_json::from_value(err.clone()).unwrap_or_else(|_| unknown_error(err.to_string()));
            return Err(Error::Upstream(err));
        }

        match payload.get("result") {
            Some(Value::Array(results)) => Ok(results.first().cloned().unwrap_or(Value::Null)),
            Some(Value::Null) => Ok(Value::Null),
            Some(other) => Ok(other.clone()),
            None => Err(Error::Upstream(unknown_error(
                "An unknown server error occurred".to_string(),
            ))),
        }
    }
}

#[async_trait]
impl JobStatusClient for NjsClient {
    async fn check_jobs(&self, job_ids: Vec<String>, token: Option<String>) -> Result<CheckJobsResult> {
        let params = json!({
            "job_ids": job_ids,
            "with_job_params": 1,
        });

        let value = self
            .call_method(CHECK_JOBS_METHOD, vec![params], token.as_deref())
            .await?;

        if !value.is_object() {
            return Err(Error::Validation(format!(
                "{} returned {}, expected a mapping",
                CHECK_JOBS_METHOD,
                json_kind(&value)
            )));
        }

        serde_json::from_value(value).map_err(|e| {
            Error::Validation(format!("{} returned a malformed result: {}", CHECK_JOBS_METHOD, e))
        })
    }
}

/// Decodes the body of a 500 response, falling back to the raw text when
/// it is not a JSON-RPC error.
fn server_error(text: &str) -> JsonRpcError {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| body.get("error").cloned())
        .and_then(|err| serde_json::from_value(err).ok())
        .unwrap_or_else(|| unknown_error(text.to_string()))
}

fn unknown_error(message: String) -> JsonRpcError {
    JsonRpcError {
        name: "Unknown".to_string(),
        code: 0,
        message,
        error: None,
        ..Default::default()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_decodes_json_rpc_body() {
        let err = server_error(
            r#"{"version":"1.1","error":{"name":"JSONRPCError","code":-32000,"message":"Token is expired","error":"trace"}}"#,
        );
        assert_eq!(err.name, "JSONRPCError");
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "Token is expired");
        assert_eq!(err.error.as_deref(), Some("trace"));
    }

    #[test]
    fn server_error_falls_back_to_text() {
        let err = server_error("<html>Bad Gateway</html>");
        assert_eq!(err.name, "Unknown");
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "<html>Bad Gateway</html>");
    }

    #[test]
    fn rejects_unparseable_url() {
        let config = NjsConfig {
            url: "not a url".to_string(),
            timeout_secs: 5,
        };
        assert!(matches!(NjsClient::new(&config), Err(Error::Config(_))));
    }
}
