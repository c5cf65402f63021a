use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, NewAttendance, StoredStatus};
use crate::model::attendance_policy::AttendancePolicy;
use crate::policy::ledger::GraceUsageLedger;

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmployeeRef {
    pub id: u64,
    pub company_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    #[schema(example = 1000)]
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    #[schema(example = "PRESENT")]
    /// Filter by stored status
    pub status: Option<StoredStatus>,
    #[schema(example = "2026-03-01", format = "date", value_type = String)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-03-31", format = "date", value_type = String)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

impl AttendanceFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.per_page()
    }
}

/// Persistence the attendance service depends on.
///
/// Every store is also the grace-usage ledger, so the count and the write
/// hit the same data.
#[async_trait]
pub trait AttendanceStore: GraceUsageLedger {
    async fn find_employee(&self, employee_id: u64) -> Result<Option<EmployeeRef>, AttendanceError>;

    async fn policy_for_company(
        &self,
        company_id: u64,
    ) -> Result<Option<AttendancePolicy>, AttendanceError>;

    async fn find_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError>;

    async fn find_record(&self, id: u64) -> Result<Option<AttendanceRecord>, AttendanceError>;

    /// Insert a new day; `AlreadyCheckedIn` if one exists for that date.
    async fn insert_day(&self, day: NewAttendance) -> Result<AttendanceRecord, AttendanceError>;

    /// Insert or overwrite the row for (employee_id, attendance_date).
    async fn upsert_day(&self, day: NewAttendance) -> Result<AttendanceRecord, AttendanceError>;

    async fn update_record(&self, record: &AttendanceRecord) -> Result<(), AttendanceError>;

    async fn delete_record(&self, id: u64) -> Result<bool, AttendanceError>;

    async fn list_records(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), AttendanceError>;

    async fn records_between(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError>;

    /// `id` of the argument is ignored; `PolicyExists` if the company has one.
    async fn create_policy(
        &self,
        policy: &AttendancePolicy,
    ) -> Result<AttendancePolicy, AttendanceError>;

    async fn list_policies(&self) -> Result<Vec<AttendancePolicy>, AttendanceError>;

    async fn get_policy(&self, id: u64) -> Result<Option<AttendancePolicy>, AttendanceError>;

    async fn update_policy(&self, policy: &AttendancePolicy) -> Result<bool, AttendanceError>;

    async fn delete_policy(&self, id: u64) -> Result<bool, AttendanceError>;
}
