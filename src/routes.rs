//! Route table, shared by the server binary and the integration tests.

use actix_web::{middleware, web};

use crate::middleware::AuthMiddleware;
use crate::services::{
    AdminService, AppleService, AppsFlyerService, AttributionService, ClickService, HealthService,
    PostbackService,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(HealthService::health));
    cfg.route(
        "/.well-known/apple-app-site-association",
        web::get().to(AppleService::site_association),
    );

    cfg.service(
        web::scope("/api/v1/admin")
            .wrap(middleware::from_fn(AuthMiddleware::admin_auth))
            .route("/apps", web::get().to(AdminService::list_apps))
            .route("/apps", web::post().to(AdminService::create_app))
            .route("/apps/{app_id}", web::put().to(AdminService::update_app))
            .route("/apps/{app_id}", web::delete().to(AdminService::delete_app))
            .route("/clicks", web::get().to(AdminService::recent_clicks))
            .route("/click/{click_id}", web::get().to(AdminService::click_by_id))
            .route(
                "/attributions",
                web::get().to(AdminService::recent_attributions),
            )
            .route("/events", web::get().to(AdminService::events))
            .route("/logs/postbacks", web::get().to(AdminService::postback_logs))
            .route(
                "/logs/postbacks",
                web::delete().to(AdminService::clear_postback_logs),
            )
            .route(
                "/logs/postbacks/{id}/resend",
                web::post().to(AdminService::resend_postback),
            )
            .route("/logs/errors", web::get().to(AdminService::error_logs))
            .route(
                "/logs/errors",
                web::delete().to(AdminService::clear_error_logs),
            )
            .route("/purge/{target}", web::delete().to(AdminService::purge)),
    );

    // The AppsFlyer callback is authenticated by AppsFlyer's own payload,
    // not the per-tenant API key, so it sits outside the guarded scope.
    cfg.route(
        "/api/v1/attribution/appsflyer",
        web::post().to(AppsFlyerService::attribution_callback),
    );
    cfg.service(
        web::scope("/api/v1/attribution")
            .wrap(middleware::from_fn(AuthMiddleware::api_key_auth))
            .route("", web::post().to(AttributionService::fetch))
            .route("/stats", web::get().to(AttributionService::stats)),
    );

    cfg.route(
        "/api/v1/postback/appsflyer",
        web::get().to(AppsFlyerService::postback),
    );
    cfg.route("/api/v1/postback/stats", web::get().to(PostbackService::stats));
    cfg.route("/api/v1/postback", web::get().to(PostbackService::handle));

    cfg.route("/api/v1/clicks/stats", web::get().to(ClickService::stats));
    cfg.route("/api/v1/track/click", web::get().to(ClickService::track_click));
    cfg.route("/t", web::get().to(ClickService::track_click));
    cfg.route("/click", web::get().to(ClickService::track_click));
    cfg.route("/track", web::get().to(ClickService::track_click));
    // Root doubles as a click endpoint when tracking parameters are present.
    cfg.route("/", web::get().to(ClickService::root));
}
