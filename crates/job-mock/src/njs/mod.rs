mod client;

pub use client::NjsClient;

use async_trait::async_trait;

use crate::models::CheckJobsResult;

/// Source of real job states.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStatusClient: Send + Sync {
    /// States, launch params and per-job errors for `job_ids`. Launch params
    /// are always requested.
    async fn check_jobs(
        &self,
        job_ids: Vec<String>,
        token: Option<String>,
    ) -> crate::Result<CheckJobsResult>;
}
