use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::error::AttendanceError;
use crate::policy::evaluator::AttendanceStatus;

/// Status values the attendance table has always accepted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StoredStatus {
    Present,
    Absent,
    HalfDay,
    Leave,
    Holiday,
}

/// How a day's punches reached the table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PunchSource {
    /// Recorded live by the employee's own punch.
    Punch,
    /// Entered, imported or corrected by HR.
    Manual,
}

/// LATE and EARLY_LEAVE have no column value and collapse to PRESENT.
/// The full status is kept in `evaluated_status`; `deduction` carries the pay impact.
impl From<AttendanceStatus> for StoredStatus {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Absent => StoredStatus::Absent,
            AttendanceStatus::HalfDay => StoredStatus::HalfDay,
            AttendanceStatus::Present | AttendanceStatus::Late | AttendanceStatus::EarlyLeave => {
                StoredStatus::Present
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 1000,
    "attendance_date": "2026-03-09",
    "in_time": "2026-03-09T09:20:00",
    "out_time": "2026-03-09T18:05:00",
    "status": "PRESENT",
    "evaluated_status": "PRESENT",
    "deduction": 0.0,
    "total_hours": 8.75,
    "overtime_hours": 0.75,
    "policy_id": 1,
    "source": "PUNCH",
    "remarks": null
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub attendance_date: NaiveDate,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub in_time: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub out_time: Option<NaiveDateTime>,
    pub status: StoredStatus,
    pub evaluated_status: Option<AttendanceStatus>,
    pub deduction: f64,
    pub total_hours: f64,
    pub overtime_hours: f64,
    pub policy_id: Option<u64>,
    pub source: PunchSource,
    pub remarks: Option<String>,
}

/// Raw `attendance` row; statuses are stored as text.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub employee_id: u64,
    pub attendance_date: NaiveDate,
    pub in_time: Option<NaiveDateTime>,
    pub out_time: Option<NaiveDateTime>,
    pub status: String,
    pub evaluated_status: Option<String>,
    pub deduction: f64,
    pub total_hours: f64,
    pub overtime_hours: f64,
    pub policy_id: Option<u64>,
    pub source: String,
    pub remarks: Option<String>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AttendanceError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = StoredStatus::from_str(&row.status).map_err(|_| {
            AttendanceError::Storage(format!("unknown attendance status {:?}", row.status))
        })?;
        let source = PunchSource::from_str(&row.source).map_err(|_| {
            AttendanceError::Storage(format!("unknown attendance source {:?}", row.source))
        })?;
        // a display hint only; an unknown value is dropped rather than failing the read
        let evaluated_status = row
            .evaluated_status
            .as_deref()
            .and_then(|s| AttendanceStatus::from_str(s).ok());

        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            attendance_date: row.attendance_date,
            in_time: row.in_time,
            out_time: row.out_time,
            status,
            evaluated_status,
            deduction: row.deduction,
            total_hours: row.total_hours,
            overtime_hours: row.overtime_hours,
            policy_id: row.policy_id,
            source,
            remarks: row.remarks,
        })
    }
}

/// A day to be written; upserted on (employee_id, attendance_date).
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub employee_id: u64,
    pub attendance_date: NaiveDate,
    pub in_time: Option<NaiveDateTime>,
    pub out_time: Option<NaiveDateTime>,
    pub status: StoredStatus,
    pub evaluated_status: AttendanceStatus,
    pub deduction: f64,
    pub total_hours: f64,
    pub overtime_hours: f64,
    pub policy_id: Option<u64>,
    pub source: PunchSource,
    pub remarks: Option<String>,
}

impl NewAttendance {
    pub fn into_record(self, id: u64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            employee_id: self.employee_id,
            attendance_date: self.attendance_date,
            in_time: self.in_time,
            out_time: self.out_time,
            status: self.status,
            evaluated_status: Some(self.evaluated_status),
            deduction: self.deduction,
            total_hours: self.total_hours,
            overtime_hours: self.overtime_hours,
            policy_id: self.policy_id,
            source: self.source,
            remarks: self.remarks,
        }
    }
}
