use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    rpc::{to_rpc_error, Envelope, RpcMethod, RpcRequest},
    Server,
};
use crate::{metrics, Error};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn rpc(
    State(server): State<Arc<Server>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => return failure(Envelope::V1_1, None, &Error::Parse(e.to_string())),
    };

    let id = raw.get("id").cloned();
    let request: RpcRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => return failure(Envelope::V1_1, id, &Error::InvalidRequest(e.to_string())),
    };
    let envelope = request.envelope();

    let method = match RpcMethod::parse(&request.method) {
        Ok(method) => method,
        Err(e) => {
            error!("Rejected call to {}", request.method);
            return failure(envelope, request.id, &e);
        }
    };

    info!("Handling RPC call {}", request.method);
    metrics::RPC_CALLS_TOTAL.with_label_values(&[method.name()]).inc();

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match server.call(method, request.params, token).await {
        Ok(result) => (StatusCode::OK, Json(envelope.success(request.id, result))),
        Err(e) => {
            error!("RPC call {} failed: {}", request.method, e);
            metrics::RPC_ERRORS_TOTAL.with_label_values(&[method.name()]).inc();
            failure(envelope, request.id, &e)
        }
    }
}

fn failure(envelope: Envelope, id: Option<Value>, err: &Error) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(envelope.failure(id, to_rpc_error(err))),
    )
}
