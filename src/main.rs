use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use tracing::info;

use attrelay::config::AppConfig;
use attrelay::events::EventLog;
use attrelay::logging::init_logging;
use attrelay::middleware::TenantMiddleware;
use attrelay::outbound::FacebookClient;
use attrelay::routes;
use attrelay::services::ClickDebounce;
use attrelay::services::health::mark_started;
use attrelay::storage::RepositoryFactory;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();
    let _log_guard = init_logging(&config);

    let repository = RepositoryFactory::create(&config.database).await?;
    let events = EventLog::with_repository(repository.clone());
    let facebook = FacebookClient::new(events.clone(), &config.tracker.public_domain);
    let debounce = ClickDebounce::new(Duration::from_millis(config.attribution.debounce_ms));

    mark_started();
    let bind_addr = (config.server.host.clone(), config.server.port);
    info!(
        "Attribution relay listening on {}:{} ({} backend)",
        bind_addr.0,
        bind_addr.1,
        repository.backend_name()
    );

    let app_config = config.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(repository.clone()))
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(events.clone()))
            .app_data(web::Data::new(facebook.clone()))
            .app_data(web::Data::new(debounce.clone()))
            .wrap(middleware::from_fn(TenantMiddleware::resolve))
            .wrap(Cors::permissive())
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
