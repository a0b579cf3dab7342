use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RPC_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("narrative_job_mock_rpc_calls_total", "Total number of RPC calls."),
        &["method"]
    )
    .unwrap();
    pub static ref RPC_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "narrative_job_mock_rpc_errors_total",
            "Total number of RPC calls answered with an error."
        ),
        &["method"]
    )
    .unwrap();
    pub static ref BATCH_JOBS_MOCKED_TOTAL: IntCounter = IntCounter::new(
        "narrative_job_mock_batch_jobs_mocked_total",
        "Total number of batch jobs given mock children."
    )
    .unwrap();
    pub static ref MOCK_CHILD_JOBS_TOTAL: IntCounter = IntCounter::new(
        "narrative_job_mock_child_jobs_total",
        "Total number of mock child job states built."
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(RPC_CALLS_TOTAL.clone()),
            Box::new(RPC_ERRORS_TOTAL.clone()),
            Box::new(BATCH_JOBS_MOCKED_TOTAL.clone()),
            Box::new(MOCK_CHILD_JOBS_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("Failed to register metric: {}", e);
            }
        }
    });
}

pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| crate::Error::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_metrics_are_exposed() {
        register_metrics();
        register_metrics();
        RPC_CALLS_TOTAL.with_label_values(&["status"]).inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("narrative_job_mock_rpc_calls_total"));
    }
}
