use crate::auth::auth::AuthUser;
use crate::model::attendance_policy::{AttendancePolicy, PolicyPatch};
use crate::service::attendance::AttendanceService;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePolicy {
    #[schema(example = 1)]
    pub company_id: u64,
    #[serde(flatten)]
    pub rules: PolicyPatch,
}

/// Create the attendance policy of a company (Admin)
#[utoipa::path(
    post,
    path = "/api/attendance-policy",
    request_body = CreatePolicy,
    responses(
        (status = 201, description = "Policy created", body = AttendancePolicy),
        (status = 400, description = "Invalid time or deduction field", body = Object, example = json!({
            "message": "office_start_time must be HH:MM, got \"9am\""
        })),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Company already has a policy")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Policy"
)]
pub async fn create_policy(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<CreatePolicy>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let CreatePolicy { company_id, rules } = payload.into_inner();
    let policy = service.create_policy(rules.into_policy(company_id)).await?;
    Ok(HttpResponse::Created().json(policy))
}

/// List attendance policies (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/attendance-policy",
    responses(
        (status = 200, description = "All policies", body = Vec<AttendancePolicy>),
        (status = 403, description = "HR/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Policy"
)]
pub async fn list_policies(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    Ok(HttpResponse::Ok().json(service.list_policies().await?))
}

/// Get attendance policy by ID (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/attendance-policy/{id}",
    params(
        ("id", Path, description = "Policy ID")
    ),
    responses(
        (status = 200, description = "Policy found", body = AttendancePolicy),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Attendance policy not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Policy"
)]
pub async fn get_policy(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    Ok(HttpResponse::Ok().json(service.get_policy(path.into_inner()).await?))
}

/// Update attendance policy (Admin)
#[utoipa::path(
    put,
    path = "/api/attendance-policy/{id}",
    params(
        ("id", Path, description = "Policy ID")
    ),
    request_body = PolicyPatch,
    responses(
        (status = 200, description = "Policy updated", body = AttendancePolicy),
        (status = 400, description = "Invalid time or deduction field"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance policy not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Policy"
)]
pub async fn update_policy(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    payload: web::Json<PolicyPatch>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let policy = service
        .update_policy(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(policy))
}

/// Delete attendance policy (Admin)
#[utoipa::path(
    delete,
    path = "/api/attendance-policy/{id}",
    params(
        ("id", Path, description = "Policy ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance policy not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Policy"
)]
pub async fn delete_policy(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    service.delete_policy(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}
