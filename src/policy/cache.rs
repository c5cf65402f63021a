use moka::future::Cache;
use std::future::Future;
use std::time::Duration;

use crate::error::AttendanceError;
use crate::model::attendance_policy::AttendancePolicy;

/// company_id => active policy (None is cached too: "no policy configured")
#[derive(Clone)]
pub struct PolicyCache {
    inner: Cache<u64, Option<AttendancePolicy>>,
}

impl PolicyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached policy or run `load` once for concurrent callers.
    pub async fn get_or_load<F>(
        &self,
        company_id: u64,
        load: F,
    ) -> Result<Option<AttendancePolicy>, AttendanceError>
    where
        F: Future<Output = Result<Option<AttendancePolicy>, AttendanceError>>,
    {
        self.inner
            .try_get_with(company_id, load)
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn invalidate(&self, company_id: u64) {
        self.inner.invalidate(&company_id).await;
    }
}
