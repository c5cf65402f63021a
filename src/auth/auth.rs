use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::Claims;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    http::header::{AUTHORIZATION, HeaderMap},
    error::{ErrorForbidden, ErrorInternalServerError, ErrorUnauthorized},
    web::Data,
};
use futures::future::{Ready, ready};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<Self> {
        Some(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role: Role::from_id(claims.role)?,
            employee_id: claims.employee_id,
        })
    }
}

/// Why a request carried no usable bearer token.
#[derive(Debug, Error)]
pub enum AuthRejection {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header encoding")]
    BadEncoding,
    #[error("Authorization header must start with Bearer")]
    NotBearer,
    #[error("Invalid or expired token")]
    InvalidToken(String),
    #[error("Invalid role")]
    UnknownRole,
}

impl AuthRejection {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AuthRejection::InvalidToken(details) => {
                json!({ "error": self.to_string(), "details": details })
            }
            _ => json!({ "error": self.to_string() }),
        }
    }
}

/// Resolve the caller from the `Authorization: Bearer <jwt>` header.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthUser, AuthRejection> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthRejection::MissingHeader)?
        .to_str()
        .map_err(|_| AuthRejection::BadEncoding)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthRejection::NotBearer)?;
    let claims = verify_token(token, secret).map_err(AuthRejection::InvalidToken)?;
    AuthUser::from_claims(claims).ok_or(AuthRejection::UnknownRole)
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // already verified by auth_middleware
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(ErrorInternalServerError("Config missing")));
        };

        ready(
            authenticate(req.headers(), &config.jwt_secret)
                .map_err(|rejection| ErrorUnauthorized(rejection.to_string())),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(ErrorForbidden("HR/Admin only"))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        self.role.manages_attendance()
    }

    /// The caller's own employee id; punches need one.
    pub fn require_employee(&self) -> actix_web::Result<u64> {
        self.employee_id
            .ok_or_else(|| ErrorForbidden("No employee profile"))
    }

    /// HR and admins may act for anyone, everyone else only for themselves.
    pub fn require_self_or_hr(&self, employee_id: u64) -> actix_web::Result<()> {
        if self.is_hr_or_admin() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(ErrorForbidden("Not allowed to access this employee"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{sign_token, test_claims};
    use crate::models::TokenType;
    use actix_web::http::header::HeaderValue;

    const SECRET: &str = "auth-test-secret";

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_access_token_yields_the_caller() {
        let token = sign_token(&test_claims(2, Some(7), TokenType::Access), SECRET);
        let user = authenticate(&headers(&format!("Bearer {token}")), SECRET).unwrap();
        assert_eq!(user.role, Role::Hr);
        assert_eq!(user.employee_id, Some(7));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(matches!(
            authenticate(&HeaderMap::new(), SECRET),
            Err(AuthRejection::MissingHeader)
        ));
        assert!(matches!(
            authenticate(&headers("Basic abc"), SECRET),
            Err(AuthRejection::NotBearer)
        ));
        assert!(matches!(
            authenticate(&headers("Bearer not-a-jwt"), SECRET),
            Err(AuthRejection::InvalidToken(_))
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let token = sign_token(&test_claims(42, None, TokenType::Access), SECRET);
        let rejection = authenticate(&headers(&format!("Bearer {token}")), SECRET).unwrap_err();
        assert!(matches!(rejection, AuthRejection::UnknownRole));
        assert_eq!(rejection.to_json()["error"], "Invalid role");
    }
}
