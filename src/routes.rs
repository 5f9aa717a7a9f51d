use crate::{
    api::{attendance, holiday, qr, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP budgets, built once so every worker shares the same counters.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    register: Limiter,
    otp: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            otp: build_limiter(config.rate_otp_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/forgot_password")
                    .wrap(limiters.otp.clone())
                    .route(web::post().to(handlers::forgot_password)),
            )
            .service(
                web::resource("/verify_otp")
                    .wrap(limiters.otp.clone())
                    .route(web::post().to(handlers::verify_otp)),
            )
            .service(
                web::resource("/reset_password")
                    .wrap(limiters.otp.clone())
                    .route(web::post().to(handlers::reset_password)),
            )
            .service(
                web::resource("/set_password")
                    .wrap(limiters.otp.clone())
                    .route(web::post().to(handlers::set_password)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(
                web::scope("/attendance")
                    .service(web::resource("/mark").route(web::post().to(attendance::mark)))
                    .service(web::resource("/history").route(web::get().to(attendance::history)))
                    .service(web::resource("/report").route(web::get().to(attendance::report)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/holidays").route(web::get().to(holiday::list_holidays)),
                    )
                    .service(
                        web::resource("/holidays/check")
                            .route(web::get().to(holiday::check_holiday)),
                    )
                    .service(
                        web::resource("/holidays/stats")
                            .route(web::get().to(holiday::holiday_stats)),
                    )
                    // /attendance/manage_holidays
                    .service(
                        web::resource("/manage_holidays")
                            .route(web::post().to(holiday::create_holiday))
                            .route(web::put().to(holiday::update_holiday))
                            .route(web::delete().to(holiday::delete_holiday)),
                    )
                    .service(
                        web::resource("/sync_holidays")
                            .route(web::post().to(holiday::sync_holidays)),
                    ),
            )
            .service(web::scope("/qr").service(web::resource("/validate").route(web::post().to(qr::validate))))
            .service(
                web::scope("/user")
                    .service(web::resource("/profile").route(web::get().to(user::profile)))
                    .service(web::resource("/update").route(web::put().to(user::update)))
                    .service(web::resource("/count").route(web::get().to(user::count))),
            ),
    );
}
