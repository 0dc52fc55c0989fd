use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod config;
mod db;
mod docs;
mod engine;
mod error;
mod events;
mod model;
mod routes;
mod scheduler;
mod utils;

use config::Config;
use db::init_db;
use events::EventBus;

use crate::docs::ApiDoc;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "service": "timeclock",
        "status": "ok"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url, config.store_timeout_secs).await;
    let bus = EventBus::new(config.event_bus_capacity);

    // 👇 clone what you need BEFORE moving config
    let server_addr = config.server_addr.clone();
    let accrual_interval = config.accrual_check_interval_secs;
    let config_data = config.clone();

    // Dashboard feed: observers consume committed transitions from the
    // bus; a slow or absent observer never holds up a punch.
    let mut feed = bus.subscribe();
    actix_web::rt::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => info!(
                    kind = event.kind.as_str(),
                    employee_id = event.employee_id,
                    "domain event"
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event feed lagged behind the bus")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let accrual_pool = pool.clone();
    actix_web::rt::spawn(async move {
        scheduler::run_accrual_loop(accrual_pool, accrual_interval).await;
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(bus.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
