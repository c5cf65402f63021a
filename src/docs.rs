use crate::api::attendance::{AttendanceListResponse, EvaluateRequest, EvaluateResponse};
use crate::api::attendance_policy::CreatePolicy;
use crate::model::attendance::{AttendanceRecord, PunchSource, StoredStatus};
use crate::model::attendance_policy::{AttendancePolicy, PolicyPatch};
use crate::policy::evaluator::{AttendanceStatus, Evaluation, WorkHours};
use crate::service::attendance::{
    AttendancePatch, BatchOutcome, ManualAttendance, MonthSummary, PunchKind, PunchOutcome,
};
use crate::store::AttendanceFilter;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance and Policy Evaluation

Records employee punches and classifies each working day against the
company's **attendance policy**.

### 🔹 Key Features
- **Punches**
  - Check-in, check-out, or a single-button punch
- **Policy evaluation**
  - Grace period, a monthly budget of extended-grace exceptions,
    quarter-day and half-day windows for late arrival and early departure
- **Records**
  - Manual entry, bulk import, corrections, and a monthly summary for payroll
- **Policies**
  - One policy per company, managed by admins

### 🔐 Security
All endpoints require a **JWT Bearer** access token.
HR and Admin roles can act for any employee; employees only see their own days.

### 📦 Statuses
`status` holds the legacy column value (`PRESENT`, `ABSENT`, `HALF_DAY`, `LEAVE`, `HOLIDAY`).
`evaluated_status` adds `LATE` and `EARLY_LEAVE`; `deduction` is the fraction of a day's pay withheld.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::punch,
        crate::api::attendance::manual,
        crate::api::attendance::bulk,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::month_summary,
        crate::api::attendance::evaluate_preview,

        crate::api::attendance_policy::create_policy,
        crate::api::attendance_policy::list_policies,
        crate::api::attendance_policy::get_policy,
        crate::api::attendance_policy::update_policy,
        crate::api::attendance_policy::delete_policy
    ),
    components(
        schemas(
            AttendanceRecord,
            StoredStatus,
            PunchSource,
            AttendanceStatus,
            AttendanceFilter,
            AttendanceListResponse,
            ManualAttendance,
            AttendancePatch,
            PunchKind,
            PunchOutcome,
            BatchOutcome,
            MonthSummary,
            Evaluation,
            WorkHours,
            EvaluateRequest,
            EvaluateResponse,
            AttendancePolicy,
            PolicyPatch,
            CreatePolicy
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Punches, records and monthly summaries"),
        (name = "Attendance Policy", description = "Per-company attendance rules"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
