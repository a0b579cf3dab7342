pub mod config;
pub mod metrics;
pub mod mocker;
pub mod models;
pub mod njs;
pub mod server;

use thiserror::Error;

use crate::models::JsonRpcError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Upstream error: {0}")]
    Upstream(JsonRpcError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authentication required: {0}")]
    Unauthorized(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_displays_upstream_message() {
        let err = Error::Upstream(JsonRpcError {
            name: "JSONRPCError".to_string(),
            code: -32000,
            message: "job not found".to_string(),
            error: None,
            ..Default::default()
        });
        assert_eq!(err.to_string(), "Upstream error: JSONRPCError (-32000): job not found");
    }
}
