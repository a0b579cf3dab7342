//! Batch job state mocking.
//!
//! Real job states come from NJS. For batch app jobs a list of child job
//! states is fabricated from the parent's own status, cycling through
//! running, error and completed so UIs have varied data to render.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    metrics,
    models::{CheckJobsResult, JobLookup, JobParams, JobState, JobStatus, JsonRpcError},
    njs::JobStatusClient,
    Error, Result,
};

pub const BATCH_APP_ID: &str = "kb_BatchApp/run_batch";
pub const BATCH_APP_METHOD: &str = "kb_BatchApp.run_batch";

/// True when the job was launched as the batch app.
///
/// Some launch paths only fill `app_id`, others only `method`, so either
/// one matching is enough.
pub fn is_batch_job(params: &JobParams) -> bool {
    params.app_id.as_deref() == Some(BATCH_APP_ID)
        || params.method.as_deref() == Some(BATCH_APP_METHOD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPhase {
    Running,
    Error,
    Completed,
}

impl MockPhase {
    const CYCLE: [MockPhase; 3] = [MockPhase::Running, MockPhase::Error, MockPhase::Completed];

    pub fn for_index(index: usize) -> Self {
        Self::CYCLE[index % Self::CYCLE.len()]
    }
}

impl From<MockPhase> for JobState {
    fn from(phase: MockPhase) -> Self {
        match phase {
            MockPhase::Running => JobState::Running,
            MockPhase::Error => JobState::Error,
            MockPhase::Completed => JobState::Completed,
        }
    }
}

pub fn mock_error() -> JsonRpcError {
    JsonRpcError {
        name: "Mock Error".to_string(),
        code: -32000,
        message: "A dummy error happened.".to_string(),
        error: Some(
            "An error occurred while running this child job. If this weren't a mockup, you should be worried."
                .to_string(),
        ),
        ..Default::default()
    }
}

pub fn mock_result() -> Value {
    json!([{
        "report_ref": "123/45",
        "report_name": "dummy_report"
    }])
}

/// Builds the status of the child at `index`, borrowing timing and
/// cancellation fields from the parent.
pub fn mock_child_status(index: usize, job_id: String, parent: &JobStatus) -> JobStatus {
    let phase = MockPhase::for_index(index);

    let (result, error) = match phase {
        MockPhase::Running => (None, None),
        MockPhase::Error => (None, Some(mock_error())),
        MockPhase::Completed => (Some(mock_result()), None),
    };

    JobStatus {
        job_id,
        job_state: Some(phase.into()),
        canceled: Some(parent.canceled.unwrap_or(false)),
        cancelled: Some(parent.cancelled.unwrap_or(false)),
        creation_time: Some(parent.creation_time.unwrap_or(0)),
        exec_start_time: Some(parent.exec_start_time.unwrap_or(0)),
        finish_time: Some(parent.finish_time.unwrap_or(0)),
        status: Some(json!([])),
        result,
        error,
        child_jobs: None,
        extra: Default::default(),
    }
}

/// One mocked child per entry of the batch's child parameter list, ids
/// `{job_id}_{index}`.
pub fn build_mock_batch(job_id: &str, params: &JobParams, parent: &JobStatus) -> Vec<JobStatus> {
    params
        .batch_child_params()
        .iter()
        .enumerate()
        .map(|(index, _)| mock_child_status(index, format!("{}_{}", job_id, index), parent))
        .collect()
}

/// Replaces `child_jobs` on every batch job in `stats`. Returns how many
/// jobs were mocked.
pub fn attach_mock_batches(stats: &mut CheckJobsResult) -> usize {
    let Some(job_params) = stats.job_params.as_ref() else {
        return 0;
    };

    let mut mocked = 0;
    for (job_id, params) in job_params.iter().filter(|(_, p)| is_batch_job(p)) {
        let Some(state) = stats.job_states.get_mut(job_id) else {
            debug!("Batch job {} has no state entry, skipping mock children", job_id);
            continue;
        };
        let children = build_mock_batch(job_id, params, state);
        debug!("Mocked {} child jobs for batch job {}", children.len(), job_id);
        metrics::MOCK_CHILD_JOBS_TOTAL.inc_by(children.len() as u64);
        state.child_jobs = Some(children);
        mocked += 1;
    }

    metrics::BATCH_JOBS_MOCKED_TOTAL.inc_by(mocked as u64);
    mocked
}

/// Proxies job status lookups to NJS and layers mocked batch children on
/// top of the real states.
pub struct StateMocker {
    client: Arc<dyn JobStatusClient>,
}

impl StateMocker {
    pub fn new(client: Arc<dyn JobStatusClient>) -> Self {
        Self { client }
    }

    /// Status of a single job, or the error NJS reported for it. `None` when
    /// NJS returned neither.
    pub async fn check_job(&self, job_id: &str, token: Option<&str>) -> Result<Option<JobLookup>> {
        let mut stats = self.check_jobs(&[job_id.to_string()], true, token).await?;

        if let Some(state) = stats.job_states.remove(job_id) {
            return Ok(Some(JobLookup::State(state)));
        }
        Ok(stats.check_error.remove(job_id).map(JobLookup::Error))
    }

    pub async fn check_jobs(
        &self,
        job_ids: &[String],
        with_job_params: bool,
        token: Option<&str>,
    ) -> Result<CheckJobsResult> {
        if job_ids.is_empty() {
            return Err(Error::InvalidParams("job_ids must not be empty".to_string()));
        }

        // Params are always needed to spot batch jobs.
        let mut stats = self
            .client
            .check_jobs(job_ids.to_vec(), token.map(str::to_string))
            .await?;

        let mocked = attach_mock_batches(&mut stats);
        info!(
            "Checked {} jobs: {} states, {} errors, {} batch jobs mocked",
            job_ids.len(),
            stats.job_states.len(),
            stats.check_error.len(),
            mocked
        );

        if !with_job_params {
            stats.job_params = None;
        }
        Ok(stats)
    }
}
