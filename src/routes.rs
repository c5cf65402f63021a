use crate::{
    api::{attendance, attendance_policy},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

// Governors built from the same config share its buckets. `configure` runs
// once per worker, so each worker counts separately.
fn build_limiter(requests_per_min: u32) -> GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    GovernorConfigBuilder::default()
        .per_millisecond(replenish_millis(requests_per_min))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default()
}

/// Milliseconds per replenished request; zero would make the builder fail.
fn replenish_millis(requests_per_min: u32) -> u64 {
    (60_000 / u64::from(requests_per_min.max(1))).max(1)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let punch_limiter = build_limiter(config.rate_punch_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&protected_limiter)) // rate limiting
            .service(
                web::scope("/attendance-policy")
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance_policy::create_policy))
                            .route(web::get().to(attendance_policy::list_policies)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance_policy::get_policy))
                            .route(web::put().to(attendance_policy::update_policy))
                            .route(web::delete().to(attendance_policy::delete_policy)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("").route(web::get().to(attendance::list_attendance)),
                    )
                    // punches, tighter limit
                    .service(
                        web::resource("/check-in")
                            .wrap(Governor::new(&punch_limiter))
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out")
                            .wrap(Governor::new(&punch_limiter))
                            .route(web::put().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/punch")
                            .wrap(Governor::new(&punch_limiter))
                            .route(web::post().to(attendance::punch)),
                    )
                    .service(web::resource("/manual").route(web::post().to(attendance::manual)))
                    .service(web::resource("/bulk").route(web::post().to(attendance::bulk)))
                    .service(
                        web::resource("/evaluate")
                            .route(web::post().to(attendance::evaluate_preview)),
                    )
                    // /attendance/summary/{employee_id}?year=&month=
                    .service(
                        web::resource("/summary/{employee_id}")
                            .route(web::get().to(attendance::month_summary)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replenish_period_never_reaches_zero() {
        assert_eq!(replenish_millis(30), 2_000);
        assert_eq!(replenish_millis(0), 60_000);
        assert_eq!(replenish_millis(60_000), 1);
        assert_eq!(replenish_millis(u32::MAX), 1);
    }

    #[test]
    fn high_rates_still_build_a_limiter() {
        let config = GovernorConfigBuilder::default()
            .per_millisecond(replenish_millis(120_000))
            .burst_size(120_000)
            .key_extractor(PeerIpKeyExtractor)
            .finish();
        assert!(config.is_some());
    }
}
