//! Admin API integration tests: bearer auth, tenant CRUD, dashboard feeds.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::middleware::from_fn;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use serde_json::{Value, json};
use tempfile::TempDir;

use attrelay::config::{
    AppConfig, AttributionConfig, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig,
    TenantDefaults, TrackerConfig,
};
use attrelay::events::{EventKind, EventLog};
use attrelay::middleware::TenantMiddleware;
use attrelay::outbound::FacebookClient;
use attrelay::routes;
use attrelay::services::ClickDebounce;
use attrelay::storage::{NewClick, Repository, RepositoryFactory};
use attrelay::utils::generate_click_id;

const ADMIN_TOKEN: &str = "test-admin-token";

fn test_config(db_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            backend: "sqlite".to_string(),
            url: db_url.to_string(),
        },
        attribution: AttributionConfig {
            window_hours: 24,
            min_ua_similarity: 0.7,
            debounce_ms: 2000,
        },
        security: SecurityConfig {
            api_secret: "test_secret".to_string(),
            admin_token: ADMIN_TOKEN.to_string(),
        },
        tracker: TrackerConfig {
            default_campaign_url: "https://trk.example/default".to_string(),
            public_domain: "relay.test".to_string(),
        },
        tenant_defaults: TenantDefaults {
            app_store_url: "https://apps.apple.com/app/id000".to_string(),
            appsflyer_dev_key: String::new(),
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            file: None,
            format: "text".to_string(),
        },
    }
}

async fn test_repository(dir: &TempDir) -> (Arc<dyn Repository>, String) {
    let db_path = dir.path().join("admin_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let repository = RepositoryFactory::create(&DatabaseConfig {
        backend: "sqlite".to_string(),
        url: db_url.clone(),
    })
    .await
    .expect("repository init failed");
    (repository, db_url)
}

macro_rules! test_app {
    ($repository:expr, $config:expr, $events:expr) => {{
        let facebook = FacebookClient::new($events.clone(), &$config.tracker.public_domain);
        let debounce = ClickDebounce::new(Duration::from_millis($config.attribution.debounce_ms));
        test::init_service(
            App::new()
                .app_data(web::Data::new($repository.clone()))
                .app_data(web::Data::new($config.clone()))
                .app_data(web::Data::new($events.clone()))
                .app_data(web::Data::new(facebook))
                .app_data(web::Data::new(debounce))
                .wrap(from_fn(TenantMiddleware::resolve))
                .configure(routes::configure),
        )
        .await
    }};
}

fn authed(req: TestRequest) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", ADMIN_TOKEN)))
}

#[actix_web::test]
async fn admin_requires_valid_bearer_token() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/api/v1/admin/apps").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/admin/apps")
            .insert_header(("Authorization", "Bearer wrong-token"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        authed(TestRequest::get().uri("/api/v1/admin/apps")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn admin_preflight_is_allowed_without_token() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let req = TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/api/v1/admin/apps")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn app_crud_round_trip() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);

    let resp = test::call_service(
        &app,
        authed(TestRequest::post().uri("/api/v1/admin/apps").set_json(json!({
            "app_id": "newapp",
            "domain": "newapp.test",
            "team_id": "TEAM9999",
            "bundle_id": "com.example.new",
            "app_name": "New App",
            "app_store_url": "https://apps.apple.com/app/id222",
        })))
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let api_key = body["app"]["api_key"].as_str().unwrap().to_string();
    assert!(!api_key.is_empty());

    let body: Value = test::read_body_json(
        test::call_service(
            &app,
            authed(TestRequest::get().uri("/api/v1/admin/apps")).to_request(),
        )
        .await,
    )
    .await;
    let apps = body["apps"].as_array().unwrap();
    assert!(apps.iter().any(|a| a["app_id"] == json!("newapp")));

    // Partial update keeps the API key.
    let resp = test::call_service(
        &app,
        authed(
            TestRequest::put()
                .uri("/api/v1/admin/apps/newapp")
                .set_json(json!({ "app_name": "Renamed App", "appsflyer_enabled": true })),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["app"]["app_name"], json!("Renamed App"));
    assert_eq!(body["app"]["appsflyer_enabled"], json!(true));
    assert_eq!(body["app"]["api_key"], json!(api_key));

    let resp = test::call_service(
        &app,
        authed(TestRequest::delete().uri("/api/v1/admin/apps/newapp")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(repository.find_tenant("newapp").await.unwrap().is_none());
}

#[actix_web::test]
async fn duplicate_app_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let payload = json!({
        "app_id": "dupe",
        "domain": "dupe.test",
        "team_id": "TEAM0001",
        "bundle_id": "com.example.dupe",
        "app_name": "Dupe",
    });

    let resp = test::call_service(
        &app,
        authed(TestRequest::post().uri("/api/v1/admin/apps").set_json(payload.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        authed(TestRequest::post().uri("/api/v1/admin/apps").set_json(payload)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn create_app_requires_all_fields() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        authed(
            TestRequest::post()
                .uri("/api/v1/admin/apps")
                .set_json(json!({ "app_id": "partial" })),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn click_feed_and_lookup() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    let click_id = generate_click_id();
    repository
        .insert_click(NewClick {
            click_id: click_id.clone(),
            ip_address: "203.0.113.30".to_string(),
            user_agent: "ua".to_string(),
            sub1: Some("camp7".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let app = test_app!(repository, config, events);
    let body: Value = test::read_body_json(
        test::call_service(
            &app,
            authed(TestRequest::get().uri("/api/v1/admin/clicks?limit=5")).to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["clicks"][0]["click_id"], json!(click_id));

    let resp = test::call_service(
        &app,
        authed(TestRequest::get().uri(&format!("/api/v1/admin/click/{}", click_id))).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        authed(TestRequest::get().uri("/api/v1/admin/click/clk_unknown")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn live_event_feed_is_served() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());
    events.record(EventKind::System, "relay started", None);

    let app = test_app!(repository, config, events);
    let body: Value = test::read_body_json(
        test::call_service(
            &app,
            authed(TestRequest::get().uri("/api/v1/admin/events")).to_request(),
        )
        .await,
    )
    .await;
    let feed = body["events"].as_array().unwrap();
    assert!(feed.iter().any(|e| e["summary"] == json!("relay started")));
}

#[actix_web::test]
async fn audit_log_feeds_and_clear() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    repository
        .log_error("test", "something broke", "{}")
        .await
        .unwrap();

    let app = test_app!(repository, config, events);
    let body: Value = test::read_body_json(
        test::call_service(
            &app,
            authed(TestRequest::get().uri("/api/v1/admin/logs/errors")).to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(body["logs"].as_array().unwrap().len(), 1);

    let resp = test::call_service(
        &app,
        authed(TestRequest::delete().uri("/api/v1/admin/logs/errors")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(repository.recent_error_logs(10).await.unwrap().is_empty());

    let body: Value = test::read_body_json(
        test::call_service(
            &app,
            authed(TestRequest::get().uri("/api/v1/admin/logs/postbacks")).to_request(),
        )
        .await,
    )
    .await;
    assert!(body["logs"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn purge_deletes_rows_by_target() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let config = test_config(&db_url);
    let events = EventLog::with_repository(repository.clone());

    for _ in 0..3 {
        repository
            .insert_click(NewClick {
                click_id: generate_click_id(),
                ip_address: "203.0.113.31".to_string(),
                user_agent: "ua".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let app = test_app!(repository, config, events);
    let body: Value = test::read_body_json(
        test::call_service(
            &app,
            authed(TestRequest::delete().uri("/api/v1/admin/purge/clicks")).to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(body["purged"], json!(3));
    assert!(repository.recent_clicks(10).await.unwrap().is_empty());

    let resp = test::call_service(
        &app,
        authed(TestRequest::delete().uri("/api/v1/admin/purge/everything")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn admin_routes_report_not_found_when_disabled() {
    let dir = TempDir::new().unwrap();
    let (repository, db_url) = test_repository(&dir).await;
    let mut config = test_config(&db_url);
    config.security.admin_token = String::new();
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);

    // Even a well-formed bearer request gets the same 404 as everyone else.
    let resp = test::call_service(
        &app,
        authed(TestRequest::get().uri("/api/v1/admin/apps")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
