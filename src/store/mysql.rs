use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, AttendanceRow, NewAttendance};
use crate::model::attendance_policy::AttendancePolicy;
use crate::policy::ledger::{GraceUsageLedger, GraceUsageQuery};
use crate::store::{AttendanceFilter, AttendanceStore, EmployeeRef};

const RECORD_COLUMNS: &str = "id, employee_id, attendance_date, in_time, out_time, status, \
     evaluated_status, deduction, total_hours, overtime_hours, policy_id, source, remarks";

const POLICY_COLUMNS: &str = "id, company_id, office_start_time, office_end_time, \
     grace_period_mins, max_grace_exceptions, quarter_day_late_start, quarter_day_late_end, \
     half_day_late_after, quarter_day_early_start, quarter_day_early_end, half_day_early_before, \
     deduction_full_day, deduction_half_day, deduction_quarter_day";

/// MySQL duplicate key / integrity violation
const INTEGRITY_VIOLATION: &str = "23000";

#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn is_duplicate(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        return db_err.code().as_deref() == Some(INTEGRITY_VIOLATION);
    }
    false
}

fn into_records(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

fn push_filters(qb: &mut QueryBuilder<'_, MySql>, filter: &AttendanceFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(employee_id) = filter.employee_id {
        qb.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND attendance_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND attendance_date <= ").push_bind(end);
    }
}

#[async_trait]
impl GraceUsageLedger for MySqlAttendanceStore {
    async fn count_grace_usage(&self, query: &GraceUsageQuery) -> Result<u32, AttendanceError> {
        // seconds past midnight, so bands crossing midnight compare correctly
        let (after, up_to) = query.band_seconds();
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM attendance
            WHERE employee_id = ?
            AND attendance_date >= ?
            AND attendance_date < ?
            AND attendance_date <> ?
            AND in_time IS NOT NULL
            AND TIME_TO_SEC(TIME(in_time)) > ?
            AND TIME_TO_SEC(TIME(in_time)) <= ?
            "#,
        )
        .bind(query.employee_id)
        .bind(query.month_start)
        .bind(query.month_end_exclusive)
        .bind(query.evaluated_date)
        .bind(after)
        .bind(up_to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id = query.employee_id, "Grace usage count failed");
            AttendanceError::Ledger(e.to_string())
        })?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn find_employee(&self, employee_id: u64) -> Result<Option<EmployeeRef>, AttendanceError> {
        let row = sqlx::query_as::<_, (u64, Option<u64>)>(
            "SELECT id, company_id FROM employees WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, company_id)| EmployeeRef { id, company_id }))
    }

    async fn policy_for_company(
        &self,
        company_id: u64,
    ) -> Result<Option<AttendancePolicy>, AttendanceError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM attendance_policies WHERE company_id = ?");
        let policy = sqlx::query_as::<_, AttendancePolicy>(&sql)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(policy)
    }

    async fn find_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance WHERE employee_id = ? AND attendance_date = ?"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn find_record(&self, id: u64) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE id = ?");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn insert_day(&self, day: NewAttendance) -> Result<AttendanceRecord, AttendanceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (employee_id, attendance_date, in_time, out_time, status, evaluated_status,
             deduction, total_hours, overtime_hours, policy_id, source, remarks)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(day.employee_id)
        .bind(day.attendance_date)
        .bind(day.in_time)
        .bind(day.out_time)
        .bind(day.status.to_string())
        .bind(day.evaluated_status.to_string())
        .bind(day.deduction)
        .bind(day.total_hours)
        .bind(day.overtime_hours)
        .bind(day.policy_id)
        .bind(day.source.to_string())
        .bind(day.remarks.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                AttendanceError::AlreadyCheckedIn
            } else {
                AttendanceError::from(e)
            }
        })?;

        Ok(day.into_record(result.last_insert_id()))
    }

    async fn upsert_day(&self, day: NewAttendance) -> Result<AttendanceRecord, AttendanceError> {
        sqlx::query(
            r#"
            INSERT INTO attendance
            (employee_id, attendance_date, in_time, out_time, status, evaluated_status,
             deduction, total_hours, overtime_hours, policy_id, source, remarks)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                in_time = VALUES(in_time),
                out_time = VALUES(out_time),
                status = VALUES(status),
                evaluated_status = VALUES(evaluated_status),
                deduction = VALUES(deduction),
                total_hours = VALUES(total_hours),
                overtime_hours = VALUES(overtime_hours),
                policy_id = VALUES(policy_id),
                source = VALUES(source),
                remarks = COALESCE(VALUES(remarks), remarks)
            "#,
        )
        .bind(day.employee_id)
        .bind(day.attendance_date)
        .bind(day.in_time)
        .bind(day.out_time)
        .bind(day.status.to_string())
        .bind(day.evaluated_status.to_string())
        .bind(day.deduction)
        .bind(day.total_hours)
        .bind(day.overtime_hours)
        .bind(day.policy_id)
        .bind(day.source.to_string())
        .bind(day.remarks.clone())
        .execute(&self.pool)
        .await?;

        self.find_day(day.employee_id, day.attendance_date)
            .await?
            .ok_or_else(|| AttendanceError::Storage("upserted attendance row vanished".into()))
    }

    async fn update_record(&self, record: &AttendanceRecord) -> Result<(), AttendanceError> {
        sqlx::query(
            r#"
            UPDATE attendance
            SET in_time = ?, out_time = ?, status = ?, evaluated_status = ?,
                deduction = ?, total_hours = ?, overtime_hours = ?, policy_id = ?,
                source = ?, remarks = ?
            WHERE id = ?
            "#,
        )
        .bind(record.in_time)
        .bind(record.out_time)
        .bind(record.status.to_string())
        .bind(record.evaluated_status.map(|s| s.to_string()))
        .bind(record.deduction)
        .bind(record.total_hours)
        .bind(record.overtime_hours)
        .bind(record.policy_id)
        .bind(record.source.to_string())
        .bind(record.remarks.clone())
        .bind(record.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_record(&self, id: u64) -> Result<bool, AttendanceError> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_records(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), AttendanceError> {
        let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM attendance");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut data_qb = QueryBuilder::<MySql>::new(format!("SELECT {RECORD_COLUMNS} FROM attendance"));
        push_filters(&mut data_qb, filter);
        data_qb
            .push(" ORDER BY attendance_date DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.per_page()))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset()));

        tracing::debug!(sql = %data_qb.sql(), "Fetching attendance");

        let rows = data_qb
            .build_query_as::<AttendanceRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((into_records(rows)?, total))
    }

    async fn records_between(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance \
             WHERE employee_id = ? AND attendance_date >= ? AND attendance_date < ? \
             ORDER BY attendance_date"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(start)
            .bind(end_exclusive)
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn create_policy(
        &self,
        policy: &AttendancePolicy,
    ) -> Result<AttendancePolicy, AttendanceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_policies
            (company_id, office_start_time, office_end_time, grace_period_mins,
             max_grace_exceptions, quarter_day_late_start, quarter_day_late_end,
             half_day_late_after, quarter_day_early_start, quarter_day_early_end,
             half_day_early_before, deduction_full_day, deduction_half_day, deduction_quarter_day)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(policy.company_id)
        .bind(policy.office_start_time.clone())
        .bind(policy.office_end_time.clone())
        .bind(policy.grace_period_mins)
        .bind(policy.max_grace_exceptions)
        .bind(policy.quarter_day_late_start.clone())
        .bind(policy.quarter_day_late_end.clone())
        .bind(policy.half_day_late_after.clone())
        .bind(policy.quarter_day_early_start.clone())
        .bind(policy.quarter_day_early_end.clone())
        .bind(policy.half_day_early_before.clone())
        .bind(policy.deduction_full_day)
        .bind(policy.deduction_half_day)
        .bind(policy.deduction_quarter_day)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                AttendanceError::PolicyExists
            } else {
                AttendanceError::from(e)
            }
        })?;

        Ok(AttendancePolicy {
            id: result.last_insert_id(),
            ..policy.clone()
        })
    }

    async fn list_policies(&self) -> Result<Vec<AttendancePolicy>, AttendanceError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM attendance_policies ORDER BY id");
        let policies = sqlx::query_as::<_, AttendancePolicy>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(policies)
    }

    async fn get_policy(&self, id: u64) -> Result<Option<AttendancePolicy>, AttendanceError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM attendance_policies WHERE id = ?");
        let policy = sqlx::query_as::<_, AttendancePolicy>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(policy)
    }

    async fn update_policy(&self, policy: &AttendancePolicy) -> Result<bool, AttendanceError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_policies
            SET office_start_time = ?, office_end_time = ?, grace_period_mins = ?,
                max_grace_exceptions = ?, quarter_day_late_start = ?, quarter_day_late_end = ?,
                half_day_late_after = ?, quarter_day_early_start = ?, quarter_day_early_end = ?,
                half_day_early_before = ?, deduction_full_day = ?, deduction_half_day = ?,
                deduction_quarter_day = ?
            WHERE id = ?
            "#,
        )
        .bind(policy.office_start_time.clone())
        .bind(policy.office_end_time.clone())
        .bind(policy.grace_period_mins)
        .bind(policy.max_grace_exceptions)
        .bind(policy.quarter_day_late_start.clone())
        .bind(policy.quarter_day_late_end.clone())
        .bind(policy.half_day_late_after.clone())
        .bind(policy.quarter_day_early_start.clone())
        .bind(policy.quarter_day_early_end.clone())
        .bind(policy.half_day_early_before.clone())
        .bind(policy.deduction_full_day)
        .bind(policy.deduction_half_day)
        .bind(policy.deduction_quarter_day)
        .bind(policy.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_policy(&self, id: u64) -> Result<bool, AttendanceError> {
        let result = sqlx::query("DELETE FROM attendance_policies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
