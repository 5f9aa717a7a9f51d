use actix_web::middleware::NormalizePath;
use actix_web::web::{self, Data};
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;
use serde_json::json;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod repository;
mod routes;
mod service;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::error::{json_error_handler, query_error_handler};
use crate::repository::mysql::MySqlStore;
use crate::routes::Limiters;
use crate::service::qr::QrSource;
use crate::utils::holiday_api::NagerDateClient;
use crate::utils::mailer::SendGridMailer;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Smart Attendance API",
    }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");
    if config.dev_mode {
        warn!("DEV_MODE is on: OTPs are echoed in responses and logs");
    }

    let pool = init_db(&config.database).await?;
    let store = Data::new(MySqlStore::new(pool, &config.schema));
    let qr_source = Data::new(QrSource::from_config(&config.qr));
    let mailer = Data::new(SendGridMailer::new(config.mail.clone()).context("mail client")?);
    let holidays = Data::new(NagerDateClient::new(&config.holiday_api).context("holiday client")?);
    let limiters = Limiters::from_config(&config)?;

    if config.mail.api_key.is_none() {
        warn!("SENDGRID_API_KEY not set, e-mail delivery is disabled");
    }

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store.clone())
            .app_data(config_data.clone())
            .app_data(qr_source.clone())
            .app_data(mailer.clone())
            .app_data(holidays.clone())
            .service(index)
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
