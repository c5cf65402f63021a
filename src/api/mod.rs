#[cfg(test)]
macro_rules! test_app {
    ($store:expr) => {{
        let config = crate::api::testing::config();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(config.clone()))
                .app_data(actix_web::web::Data::new(crate::api::testing::service($store)))
                .configure(|cfg| crate::routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

pub mod attendance;
pub mod attendance_policy;

#[cfg(test)]
pub mod testing {
    use crate::auth::jwt::{sign_token, test_claims};
    use crate::config::Config;
    use crate::models::TokenType;
    use crate::policy::cache::PolicyCache;
    use crate::policy::month_lock::MonthLocks;
    use crate::service::attendance::AttendanceService;
    use crate::store::memory::MemoryStore;
    use actix_web::test::TestRequest;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    pub const SECRET: &str = "test-secret";
    pub const ADMIN: u8 = 1;
    pub const HR: u8 = 2;
    pub const EMPLOYEE: u8 = 3;

    pub fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: SECRET.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            api_prefix: "/api".to_string(),
            rate_punch_per_min: 1000,
            rate_protected_per_min: 1000,
            policy_cache_ttl: Duration::from_secs(60),
            month_lock_idle: Duration::from_secs(60),
        }
    }

    pub fn service(store: Arc<MemoryStore>) -> AttendanceService {
        AttendanceService::new(
            store,
            PolicyCache::new(Duration::from_secs(60)),
            MonthLocks::new(Duration::from_secs(60)),
        )
    }

    pub fn bearer(role: u8, employee_id: Option<u64>) -> (&'static str, String) {
        let token = sign_token(&test_claims(role, employee_id, TokenType::Access), SECRET);
        ("Authorization", format!("Bearer {token}"))
    }

    /// A request with a peer address, which the rate limiter keys on.
    pub fn request(req: TestRequest, role: u8, employee_id: Option<u64>) -> TestRequest {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        req.peer_addr(peer).insert_header(bearer(role, employee_id))
    }
}
