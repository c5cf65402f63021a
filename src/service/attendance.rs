use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, NewAttendance, PunchSource, StoredStatus};
use crate::model::attendance_policy::{AttendancePolicy, PolicyPatch};
use crate::policy::cache::PolicyCache;
use crate::policy::clock::parse_time_of_day;
use crate::policy::evaluator::{
    AttendanceStatus, Evaluation, MAX_GRACE_SPAN_MINUTES, PolicyWindows, evaluate, work_hours,
};
use crate::policy::ledger::{GraceUsageQuery, month_bounds};
use crate::policy::month_lock::MonthLocks;
use crate::store::{AttendanceFilter, AttendanceStore, EmployeeRef};

/// A manual or imported attendance row.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ManualAttendance {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-03-09", format = "date", value_type = String)]
    pub attendance_date: NaiveDate,
    #[schema(example = "2026-03-09T09:20:00", format = "date-time", value_type = String, nullable = true)]
    pub in_time: Option<NaiveDateTime>,
    #[schema(example = "2026-03-09T18:05:00", format = "date-time", value_type = String, nullable = true)]
    pub out_time: Option<NaiveDateTime>,
    /// Replaces the stored status; LEAVE and HOLIDAY also clear the deduction.
    pub status: Option<StoredStatus>,
    pub remarks: Option<String>,
}

/// Explicit correction of an existing record.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AttendancePatch {
    #[schema(example = "2026-03-09T09:05:00", format = "date-time", value_type = String, nullable = true)]
    pub in_time: Option<NaiveDateTime>,
    #[schema(example = "2026-03-09T18:00:00", format = "date-time", value_type = String, nullable = true)]
    pub out_time: Option<NaiveDateTime>,
    pub status: Option<StoredStatus>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PunchKind {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PunchOutcome {
    pub punch: PunchKind,
    pub record: AttendanceRecord,
    pub used_grace_this_time: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

/// Per-month totals payroll reads. `deduction_days` sums the stored
/// deduction fractions, so LATE and EARLY_LEAVE days are counted even
/// though their status column says PRESENT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MonthSummary {
    pub employee_id: u64,
    pub year: i32,
    pub month: u32,
    pub days_recorded: u32,
    pub present: u32,
    pub late: u32,
    pub half_day: u32,
    pub early_leave: u32,
    pub absent: u32,
    pub leave: u32,
    pub holiday: u32,
    pub deduction_days: f64,
    pub total_hours: f64,
    pub overtime_hours: f64,
}

pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    policies: PolicyCache,
    locks: MonthLocks,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn AttendanceStore>, policies: PolicyCache, locks: MonthLocks) -> Self {
        Self {
            store,
            policies,
            locks,
        }
    }

    async fn employee(&self, employee_id: u64) -> Result<EmployeeRef, AttendanceError> {
        self.store
            .find_employee(employee_id)
            .await?
            .ok_or(AttendanceError::EmployeeNotFound(employee_id))
    }

    async fn policy_for(
        &self,
        employee: &EmployeeRef,
    ) -> Result<Option<AttendancePolicy>, AttendanceError> {
        let Some(company_id) = employee.company_id else {
            return Ok(None);
        };
        let store = self.store.clone();
        self.policies
            .get_or_load(company_id, async move { store.policy_for_company(company_id).await })
            .await
    }

    /// Count grace usage and run the evaluator. Callers hold the month lock.
    async fn evaluate_day(
        &self,
        employee_id: u64,
        policy: Option<&AttendancePolicy>,
        day: NaiveDate,
        in_time: Option<NaiveDateTime>,
        out_time: Option<NaiveDateTime>,
    ) -> Result<Evaluation, AttendanceError> {
        let grace_used = match (policy, in_time) {
            (Some(policy), Some(_)) => {
                let windows = PolicyWindows::resolve(policy, day);
                let query = GraceUsageQuery::for_day(employee_id, &windows, day);
                self.store.count_grace_usage(&query).await?
            }
            _ => 0,
        };

        let evaluation = evaluate(policy, in_time, out_time, grace_used);
        debug!(
            employee_id,
            %day,
            grace_used,
            status = %evaluation.status,
            deduction = evaluation.deduction,
            used_grace = evaluation.used_grace_this_time,
            "Attendance evaluated"
        );
        Ok(evaluation)
    }

    #[instrument(skip(self))]
    pub async fn check_in(
        &self,
        employee_id: u64,
        now: NaiveDateTime,
    ) -> Result<PunchOutcome, AttendanceError> {
        let employee = self.employee(employee_id).await?;
        let policy = self.policy_for(&employee).await?;
        let _guard = self.locks.acquire(employee_id, now.date()).await;

        match self.store.find_day(employee_id, now.date()).await? {
            Some(existing) if existing.in_time.is_some() => Err(AttendanceError::AlreadyCheckedIn),
            existing => self.open_day(employee_id, policy.as_ref(), now, existing).await,
        }
    }

    #[instrument(skip(self))]
    pub async fn check_out(
        &self,
        employee_id: u64,
        now: NaiveDateTime,
    ) -> Result<PunchOutcome, AttendanceError> {
        let employee = self.employee(employee_id).await?;
        let policy = self.policy_for(&employee).await?;
        let _guard = self.locks.acquire(employee_id, now.date()).await;

        match self.store.find_day(employee_id, now.date()).await? {
            Some(open) if open.in_time.is_some() && open.out_time.is_none() => {
                self.close_day(policy.as_ref(), open, now).await
            }
            _ => Err(AttendanceError::NoOpenCheckIn),
        }
    }

    /// Single-button punch: first punch opens the day, second closes it.
    #[instrument(skip(self))]
    pub async fn punch(
        &self,
        employee_id: u64,
        now: NaiveDateTime,
    ) -> Result<PunchOutcome, AttendanceError> {
        let employee = self.employee(employee_id).await?;
        let policy = self.policy_for(&employee).await?;
        let _guard = self.locks.acquire(employee_id, now.date()).await;

        match self.store.find_day(employee_id, now.date()).await? {
            Some(record) if record.in_time.is_some() => {
                if record.out_time.is_some() {
                    return Err(AttendanceError::AlreadyClosed);
                }
                self.close_day(policy.as_ref(), record, now).await
            }
            existing => self.open_day(employee_id, policy.as_ref(), now, existing).await,
        }
    }

    async fn open_day(
        &self,
        employee_id: u64,
        policy: Option<&AttendancePolicy>,
        now: NaiveDateTime,
        existing: Option<AttendanceRecord>,
    ) -> Result<PunchOutcome, AttendanceError> {
        let day = now.date();
        let evaluation = self
            .evaluate_day(employee_id, policy, day, Some(now), None)
            .await?;

        let record = match existing {
            // a pre-entered day without an in punch (e.g. marked absent)
            Some(mut record) => {
                record.in_time = Some(now);
                apply_evaluation(&mut record, &evaluation);
                record.policy_id = policy.map(|p| p.id);
                record.source = PunchSource::Punch;
                self.store.update_record(&record).await?;
                record
            }
            None => {
                let draft = new_day(
                    employee_id,
                    day,
                    Some(now),
                    None,
                    &evaluation,
                    policy,
                    PunchSource::Punch,
                    None,
                    None,
                );
                self.store.insert_day(draft).await?
            }
        };

        info!(employee_id, %now, status = %evaluation.status, "Checked in");
        Ok(PunchOutcome {
            punch: PunchKind::In,
            record,
            used_grace_this_time: evaluation.used_grace_this_time,
        })
    }

    async fn close_day(
        &self,
        policy: Option<&AttendancePolicy>,
        mut record: AttendanceRecord,
        now: NaiveDateTime,
    ) -> Result<PunchOutcome, AttendanceError> {
        let evaluation = self
            .evaluate_day(
                record.employee_id,
                policy,
                record.attendance_date,
                record.in_time,
                Some(now),
            )
            .await?;

        record.out_time = Some(now);
        apply_evaluation(&mut record, &evaluation);
        self.store.update_record(&record).await?;

        info!(
            employee_id = record.employee_id,
            %now,
            status = %evaluation.status,
            deduction = evaluation.deduction,
            "Checked out"
        );
        Ok(PunchOutcome {
            punch: PunchKind::Out,
            record,
            used_grace_this_time: evaluation.used_grace_this_time,
        })
    }

    /// Manual entry or one imported row; replaces any existing record for the day.
    #[instrument(skip(self, entry), fields(employee_id = entry.employee_id, date = %entry.attendance_date))]
    pub async fn record_day(
        &self,
        entry: ManualAttendance,
    ) -> Result<AttendanceRecord, AttendanceError> {
        validate_punches(entry.attendance_date, entry.in_time, entry.out_time)?;

        let employee = self.employee(entry.employee_id).await?;
        let policy = self.policy_for(&employee).await?;
        let _guard = self
            .locks
            .acquire(entry.employee_id, entry.attendance_date)
            .await;

        let evaluation = self
            .evaluate_day(
                entry.employee_id,
                policy.as_ref(),
                entry.attendance_date,
                entry.in_time,
                entry.out_time,
            )
            .await?;

        let draft = new_day(
            entry.employee_id,
            entry.attendance_date,
            entry.in_time,
            entry.out_time,
            &evaluation,
            policy.as_ref(),
            PunchSource::Manual,
            entry.status,
            entry.remarks,
        );
        self.store.upsert_day(draft).await
    }

    /// Apply rows in order. Rows naming unknown employees or carrying bad
    /// punches are skipped; ledger and storage failures stop the batch.
    pub async fn record_batch(
        &self,
        rows: Vec<ManualAttendance>,
    ) -> Result<BatchOutcome, AttendanceError> {
        let mut outcome = BatchOutcome::default();

        for row in rows {
            let employee_id = row.employee_id;
            match self.record_day(row).await {
                Ok(_) => outcome.inserted += 1,
                Err(e @ (AttendanceError::EmployeeNotFound(_) | AttendanceError::Validation(_))) => {
                    warn!(error = %e, employee_id, "Skipping attendance row");
                    outcome.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "Attendance batch complete"
        );
        Ok(outcome)
    }

    /// Explicit correction; status and deduction are recomputed when a punch changes.
    #[instrument(skip(self, patch))]
    pub async fn update_record(
        &self,
        id: u64,
        patch: AttendancePatch,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let record = self.get_record(id).await?;
        let employee = self.employee(record.employee_id).await?;
        let policy = self.policy_for(&employee).await?;
        let _guard = self
            .locks
            .acquire(record.employee_id, record.attendance_date)
            .await;

        // re-read under the lock
        let mut record = self.get_record(id).await?;

        let punches_changed = patch.in_time.is_some() || patch.out_time.is_some();
        if punches_changed {
            let in_time = patch.in_time.or(record.in_time);
            let out_time = patch.out_time.or(record.out_time);
            validate_punches(record.attendance_date, in_time, out_time)?;

            let evaluation = self
                .evaluate_day(
                    record.employee_id,
                    policy.as_ref(),
                    record.attendance_date,
                    in_time,
                    out_time,
                )
                .await?;

            record.in_time = in_time;
            record.out_time = out_time;
            record.policy_id = policy.as_ref().map(|p| p.id);
            record.source = PunchSource::Manual;
            apply_evaluation(&mut record, &evaluation);
        }

        if let Some(status) = patch.status {
            record.status = status;
            record.deduction = deduction_for(status, record.deduction);
        }
        if patch.remarks.is_some() {
            record.remarks = patch.remarks;
        }

        self.store.update_record(&record).await?;
        Ok(record)
    }

    pub async fn get_record(&self, id: u64) -> Result<AttendanceRecord, AttendanceError> {
        self.store
            .find_record(id)
            .await?
            .ok_or(AttendanceError::RecordNotFound)
    }

    pub async fn list_records(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), AttendanceError> {
        self.store.list_records(filter).await
    }

    pub async fn delete_record(&self, id: u64) -> Result<(), AttendanceError> {
        if self.store.delete_record(id).await? {
            Ok(())
        } else {
            Err(AttendanceError::RecordNotFound)
        }
    }

    pub async fn month_summary(
        &self,
        employee_id: u64,
        year: i32,
        month: u32,
    ) -> Result<MonthSummary, AttendanceError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            AttendanceError::Validation("month must be between 1 and 12".to_string())
        })?;
        self.employee(employee_id).await?;

        let (start, end) = month_bounds(first);
        let records = self.store.records_between(employee_id, start, end).await?;
        Ok(summarize(employee_id, year, month, &records))
    }

    pub async fn create_policy(
        &self,
        policy: AttendancePolicy,
    ) -> Result<AttendancePolicy, AttendanceError> {
        validate_policy(&policy)?;
        let created = self.store.create_policy(&policy).await?;
        self.policies.invalidate(created.company_id).await;
        info!(policy_id = created.id, company_id = created.company_id, "Attendance policy created");
        Ok(created)
    }

    pub async fn list_policies(&self) -> Result<Vec<AttendancePolicy>, AttendanceError> {
        self.store.list_policies().await
    }

    pub async fn get_policy(&self, id: u64) -> Result<AttendancePolicy, AttendanceError> {
        self.store
            .get_policy(id)
            .await?
            .ok_or(AttendanceError::PolicyNotFound)
    }

    pub async fn update_policy(
        &self,
        id: u64,
        patch: PolicyPatch,
    ) -> Result<AttendancePolicy, AttendanceError> {
        let mut policy = self.get_policy(id).await?;
        patch.apply(&mut policy);
        validate_policy(&policy)?;

        if !self.store.update_policy(&policy).await? {
            return Err(AttendanceError::PolicyNotFound);
        }
        self.policies.invalidate(policy.company_id).await;
        info!(policy_id = id, company_id = policy.company_id, "Attendance policy updated");
        Ok(policy)
    }

    pub async fn delete_policy(&self, id: u64) -> Result<(), AttendanceError> {
        let policy = self.get_policy(id).await?;
        if !self.store.delete_policy(id).await? {
            return Err(AttendanceError::PolicyNotFound);
        }
        self.policies.invalidate(policy.company_id).await;
        info!(policy_id = id, company_id = policy.company_id, "Attendance policy deleted");
        Ok(())
    }
}

fn apply_evaluation(record: &mut AttendanceRecord, evaluation: &Evaluation) {
    let hours = work_hours(record.in_time, record.out_time);
    record.status = evaluation.status.into();
    record.evaluated_status = Some(evaluation.status);
    record.deduction = evaluation.deduction;
    record.total_hours = hours.total_hours;
    record.overtime_hours = hours.overtime_hours;
}

/// Paid leave and holidays carry no deduction; unpaid days are entered as ABSENT.
fn deduction_for(status: StoredStatus, computed: f64) -> f64 {
    match status {
        StoredStatus::Leave | StoredStatus::Holiday => 0.0,
        _ => computed,
    }
}

#[allow(clippy::too_many_arguments)]
fn new_day(
    employee_id: u64,
    day: NaiveDate,
    in_time: Option<NaiveDateTime>,
    out_time: Option<NaiveDateTime>,
    evaluation: &Evaluation,
    policy: Option<&AttendancePolicy>,
    source: PunchSource,
    status_override: Option<StoredStatus>,
    remarks: Option<String>,
) -> NewAttendance {
    let hours = work_hours(in_time, out_time);
    let status = status_override.unwrap_or_else(|| evaluation.status.into());
    NewAttendance {
        employee_id,
        attendance_date: day,
        in_time,
        out_time,
        status,
        evaluated_status: evaluation.status,
        deduction: deduction_for(status, evaluation.deduction),
        total_hours: hours.total_hours,
        overtime_hours: hours.overtime_hours,
        policy_id: policy.map(|p| p.id),
        source,
        remarks,
    }
}

/// Punches must fall on the attendance date, out after in.
fn validate_punches(
    day: NaiveDate,
    in_time: Option<NaiveDateTime>,
    out_time: Option<NaiveDateTime>,
) -> Result<(), AttendanceError> {
    for (name, punch) in [("in_time", in_time), ("out_time", out_time)] {
        if let Some(punch) = punch {
            if punch.date() != day {
                return Err(AttendanceError::Validation(format!(
                    "{name} must fall on {day}"
                )));
            }
        }
    }

    match (in_time, out_time) {
        (None, Some(_)) => Err(AttendanceError::Validation(
            "out_time requires in_time".to_string(),
        )),
        (Some(start), Some(end)) if end < start => Err(AttendanceError::Validation(
            "out_time cannot be before in_time".to_string(),
        )),
        _ => Ok(()),
    }
}

pub fn validate_policy(policy: &AttendancePolicy) -> Result<(), AttendanceError> {
    for (name, value) in policy.time_fields() {
        if let Some(raw) = value {
            if parse_time_of_day(raw).is_none() {
                return Err(AttendanceError::Validation(format!(
                    "{name} must be HH:MM, got {raw:?}"
                )));
            }
        }
    }

    let grace = policy.grace_minutes();
    if grace > MAX_GRACE_SPAN_MINUTES {
        return Err(AttendanceError::Validation(format!(
            "grace_period_mins must be at most {MAX_GRACE_SPAN_MINUTES}"
        )));
    }
    let extended = grace.saturating_mul(i64::from(policy.max_grace()));
    if extended > MAX_GRACE_SPAN_MINUTES {
        return Err(AttendanceError::Validation(format!(
            "grace_period_mins * max_grace_exceptions must be at most {MAX_GRACE_SPAN_MINUTES}"
        )));
    }

    for (name, value) in policy.deduction_fields() {
        if let Some(fraction) = value {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(AttendanceError::Validation(format!(
                    "{name} must be between 0 and 1"
                )));
            }
        }
    }

    Ok(())
}

fn summarize(employee_id: u64, year: i32, month: u32, records: &[AttendanceRecord]) -> MonthSummary {
    let mut summary = MonthSummary {
        employee_id,
        year,
        month,
        ..Default::default()
    };

    for record in records {
        summary.days_recorded += 1;
        summary.deduction_days += record.deduction;
        summary.total_hours += record.total_hours;
        summary.overtime_hours += record.overtime_hours;

        match (record.status, record.evaluated_status) {
            (StoredStatus::Leave, _) => summary.leave += 1,
            (StoredStatus::Holiday, _) => summary.holiday += 1,
            (StoredStatus::Absent, _) => summary.absent += 1,
            (StoredStatus::HalfDay, _) => summary.half_day += 1,
            (StoredStatus::Present, Some(AttendanceStatus::Late)) => summary.late += 1,
            (StoredStatus::Present, Some(AttendanceStatus::EarlyLeave)) => {
                summary.early_leave += 1
            }
            (StoredStatus::Present, _) => summary.present += 1,
        }
    }

    summary.deduction_days = round2(summary.deduction_days);
    summary.total_hours = round2(summary.total_hours);
    summary.overtime_hours = round2(summary.overtime_hours);
    summary
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
