use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceRecord;
use crate::model::attendance_policy::PolicyPatch;
use crate::policy::evaluator::{Evaluation, WorkHours, evaluate, work_hours};
use crate::service::attendance::{
    AttendancePatch, AttendanceService, BatchOutcome, ManualAttendance, MonthSummary, PunchOutcome,
    validate_policy,
};
use crate::store::AttendanceFilter;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 22)]
    pub total: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct YearMonth {
    /// Calendar year, e.g. 2026
    pub year: i32,
    /// Month 1-12
    pub month: u32,
}

/// Punches and policy to classify without saving anything.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    /// Rules to apply; omit to see the no-policy fallback.
    pub policy: Option<PolicyPatch>,
    #[schema(example = "2026-03-09T09:20:00", format = "date-time", value_type = String, nullable = true)]
    pub in_time: Option<NaiveDateTime>,
    #[schema(example = "2026-03-09T18:05:00", format = "date-time", value_type = String, nullable = true)]
    pub out_time: Option<NaiveDateTime>,
    #[serde(default)]
    #[schema(example = 1)]
    pub grace_used_this_month: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EvaluateResponse {
    pub evaluation: Evaluation,
    pub hours: WorkHours,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = PunchOutcome),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Grace usage lookup failed, retry")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let outcome = service.check_in(employee_id, now()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = PunchOutcome),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Grace usage lookup failed, retry")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let outcome = service.check_out(employee_id, now()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Single-button punch: opens the day, or closes it if already open
#[utoipa::path(
    post,
    path = "/api/attendance/punch",
    responses(
        (status = 200, description = "Punch recorded", body = PunchOutcome),
        (status = 400, description = "Attendance already marked fully for today", body = Object, example = json!({
            "message": "Attendance already marked fully for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Grace usage lookup failed, retry")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let outcome = service.punch(employee_id, now()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Record or replace one employee-day (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/manual",
    request_body = ManualAttendance,
    responses(
        (status = 200, description = "Attendance recorded", body = AttendanceRecord),
        (status = 400, description = "Invalid punches"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn manual(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<ManualAttendance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let record = service.record_day(payload.into_inner()).await?;
    info!(
        record_id = record.id,
        employee_id = record.employee_id,
        user_id = auth.user_id,
        by = %auth.username,
        "Manual attendance recorded"
    );
    Ok(HttpResponse::Ok().json(record))
}

/// Import many employee-days at once (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/bulk",
    request_body = Vec<ManualAttendance>,
    responses(
        (status = 200, description = "Rows applied; unknown employees and bad rows are skipped", body = BatchOutcome),
        (status = 403, description = "HR/Admin only"),
        (status = 503, description = "Grace usage lookup failed, retry")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn bulk(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<Vec<ManualAttendance>>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let outcome = service.record_batch(payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// List attendance records. Employees only see their own.
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    let mut filter = query.into_inner();
    if !auth.is_hr_or_admin() {
        filter.employee_id = Some(auth.require_employee()?);
    }

    let (data, total) = service.list_records(&filter).await?;
    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page: filter.page(),
        per_page: filter.per_page(),
        total,
    }))
}

/// Get attendance record by ID
#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance record ID")
    ),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceRecord),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found", body = Object, example = json!({
            "message": "Attendance record not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let record = service.get_record(path.into_inner()).await?;
    auth.require_self_or_hr(record.employee_id)?;
    Ok(HttpResponse::Ok().json(record))
}

/// Correct an attendance record (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance record ID")
    ),
    request_body = AttendancePatch,
    responses(
        (status = 200, description = "Attendance record updated", body = AttendanceRecord),
        (status = 400, description = "Invalid punches"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    payload: web::Json<AttendancePatch>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let record = service
        .update_record(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Delete an attendance record (HR/Admin)
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance record ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let id = path.into_inner();
    service.delete_record(id).await?;
    info!(record_id = id, by = %auth.username, "Attendance record deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Monthly totals for payroll
#[utoipa::path(
    get,
    path = "/api/attendance/summary/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID"),
        YearMonth
    ),
    responses(
        (status = 200, description = "Month summary", body = MonthSummary),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn month_summary(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    query: web::Query<YearMonth>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let summary = service
        .month_summary(employee_id, query.year, query.month)
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Dry-run the evaluator (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/evaluate",
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Evaluation result", body = EvaluateResponse, example = json!({
            "evaluation": { "status": "LATE", "deduction": 0.25, "used_grace_this_time": false },
            "hours": { "total_hours": 8.75, "overtime_hours": 0.75 }
        })),
        (status = 400, description = "Invalid policy"),
        (status = 403, description = "HR/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn evaluate_preview(
    auth: AuthUser,
    payload: web::Json<EvaluateRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let request = payload.into_inner();
    let policy = request.policy.map(|rules| rules.into_policy(0));
    if let Some(policy) = &policy {
        validate_policy(policy)?;
    }

    let evaluation = evaluate(
        policy.as_ref(),
        request.in_time,
        request.out_time,
        request.grace_used_this_month,
    );
    Ok(HttpResponse::Ok().json(EvaluateResponse {
        evaluation,
        hours: work_hours(request.in_time, request.out_time),
    }))
}
