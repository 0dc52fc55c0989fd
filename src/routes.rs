use crate::{
    api::{attendance, exception, leave},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-scope limiter config
    fn build_limiter(requests_per_min: u32) -> GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap()
    }

    let punch_limiter = build_limiter(config.rate_punch_per_min);
    let read_limiter = build_limiter(config.rate_read_per_min);
    let admin_limiter = build_limiter(config.rate_admin_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/attendance")
                    // punch lifecycle
                    .service(
                        web::resource("/punch-in")
                            .wrap(Governor::new(&punch_limiter))
                            .route(web::post().to(attendance::punch_in)),
                    )
                    .service(
                        web::resource("/punch-out")
                            .wrap(Governor::new(&punch_limiter))
                            .route(web::post().to(attendance::punch_out)),
                    )
                    .service(
                        web::resource("/break/start")
                            .wrap(Governor::new(&punch_limiter))
                            .route(web::post().to(attendance::start_break)),
                    )
                    .service(
                        web::resource("/break/end")
                            .wrap(Governor::new(&punch_limiter))
                            .route(web::post().to(attendance::end_break)),
                    )
                    .service(
                        web::resource("/current-status")
                            .wrap(Governor::new(&read_limiter))
                            .route(web::get().to(attendance::current_status)),
                    ),
            )
            .service(
                web::scope("/exception")
                    .service(
                        web::resource("")
                            .wrap(Governor::new(&admin_limiter))
                            .route(web::post().to(exception::request_exception)),
                    )
                    .service(
                        web::resource("/{id}/resolve")
                            .wrap(Governor::new(&admin_limiter))
                            .route(web::put().to(exception::resolve_exception)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .wrap(Governor::new(&admin_limiter))
                            .route(web::post().to(leave::create_leave)),
                    )
                    .service(
                        web::resource("/balance")
                            .wrap(Governor::new(&admin_limiter))
                            .route(web::post().to(leave::initialize_balance))
                            .route(web::get().to(leave::get_balance)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .wrap(Governor::new(&admin_limiter))
                            .route(web::put().to(leave::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .wrap(Governor::new(&admin_limiter))
                            .route(web::put().to(leave::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .wrap(Governor::new(&admin_limiter))
                            .route(web::put().to(leave::cancel_leave)),
                    ),
            ),
    );
}
