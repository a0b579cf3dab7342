mod routes;
pub mod rpc;

use axum::{
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::{Config, ServiceInfo},
    mocker::StateMocker,
    models::CheckJobsParams,
    njs::JobStatusClient,
    Error, Result,
};

use self::rpc::{positional_params, RpcMethod, MODULE_NAME};

pub struct Server {
    mocker: StateMocker,
    service: ServiceInfo,
}

impl Server {
    pub fn new(config: &Config, client: Arc<dyn JobStatusClient>) -> Self {
        Self {
            mocker: StateMocker::new(client),
            service: config.service.clone(),
        }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route("/", post(routes::rpc))
            .route("/rpc", post(routes::rpc))
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }

    /// Runs one RPC method. `token` is the caller's Authorization header.
    pub async fn call(&self, method: RpcMethod, params: Value, token: Option<&str>) -> Result<Value> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        if method.requires_auth() && token.is_none() {
            return Err(Error::Unauthorized(format!(
                "Authentication required for {} but no authentication header was passed",
                MODULE_NAME
            )));
        }

        let args = positional_params(params)?;
        match method {
            RpcMethod::CheckJob => {
                let job_id = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidParams("check_job expects a job id".to_string()))?;
                let lookup = self.mocker.check_job(job_id, token).await?;
                Ok(serde_json::to_value(lookup)?)
            }
            RpcMethod::CheckJobs => {
                let first = args.into_iter().next().ok_or_else(|| {
                    Error::InvalidParams("check_jobs expects a CheckJobsParams structure".to_string())
                })?;
                let params: CheckJobsParams = serde_json::from_value(first)
                    .map_err(|e| Error::InvalidParams(format!("invalid CheckJobsParams: {}", e)))?;
                let result = self
                    .mocker
                    .check_jobs(&params.job_ids, params.include_params(), token)
                    .await?;
                Ok(serde_json::to_value(result)?)
            }
            RpcMethod::Status => Ok(serde_json::to_value(self.service.status())?),
        }
    }
}
