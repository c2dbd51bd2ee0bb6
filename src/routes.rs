use crate::{
    api::{attendance, employee, office},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, Responder, get, middleware::from_fn, web};
use serde_json::json;
use std::sync::Arc;

type Limiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiters, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct Limiters {
    login: Arc<Limiter>,
    protected: Arc<Limiter>,
}

impl Limiters {
    pub fn new(config: &Config) -> Self {
        Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)),
        }
    }
}

fn build_limiter(requests_per_min: u32) -> Limiter {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    cfg.service(health);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(web::resource("/me").route(web::get().to(employee::me)))
            .service(
                web::scope("/employee")
                    // /employee
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employee/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::replace_employee))
                            .route(web::patch().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/office-location")
                    .service(
                        web::resource("")
                            .route(web::get().to(office::get_office))
                            .route(web::put().to(office::set_office))
                            .route(web::delete().to(office::clear_office)),
                    )
                    .service(
                        web::resource("/current")
                            .route(web::post().to(office::set_office_from_device)),
                    ),
            )
            .service(
                web::scope("/attendance/attempts")
                    // /attendance/attempts
                    .service(web::resource("").route(web::post().to(attendance::start_attempt)))
                    // /attendance/attempts/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attempt))
                            .route(web::delete().to(attendance::discard_attempt)),
                    )
                    // /attendance/attempts/{id}/check-in
                    .service(
                        web::resource("/{id}/check-in")
                            .route(web::post().to(attendance::check_in)),
                    ),
            ),
    );
}
