//! Click recording, tracker postbacks and the AppsFlyer endpoints.

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
use attrelay::events::EventLog;
use attrelay::middleware::TenantMiddleware;
use attrelay::outbound::FacebookClient;
use attrelay::routes;
use attrelay::services::ClickDebounce;
use attrelay::storage::{AppTenant, NewClick, Repository, RepositoryFactory};
use attrelay::utils::{generate_click_id, generate_os_user_key};

const API_SECRET: &str = "test_secret";
const TENANT_DOMAIN: &str = "relay.test";
const STORE_URL: &str = "https://apps.apple.com/app/id111";

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
            api_secret: API_SECRET.to_string(),
            admin_token: String::new(),
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

async fn test_repository(dir: &TempDir) -> Arc<dyn Repository> {
    let db_path = dir.path().join("click_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    RepositoryFactory::create(&DatabaseConfig {
        backend: "sqlite".to_string(),
        url: db_url,
    })
    .await
    .expect("repository init failed")
}

fn tenant_fixture() -> AppTenant {
    AppTenant {
        app_id: "demoapp".to_string(),
        domain: TENANT_DOMAIN.to_string(),
        team_id: "TEAM1234".to_string(),
        bundle_id: "com.example.demo".to_string(),
        app_name: Some("Demo App".to_string()),
        api_key: "test-api-key".to_string(),
        app_store_url: Some(STORE_URL.to_string()),
        tracker_campaign_url: Some("https://trk.example/base".to_string()),
        appsflyer_dev_key: None,
        appsflyer_enabled: false,
        active: true,
    }
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

fn click_request(uri: &str, ip: &str) -> TestRequest {
    TestRequest::get()
        .uri(uri)
        .insert_header(("Host", TENANT_DOMAIN))
        .insert_header(("X-Forwarded-For", ip.to_string()))
        .insert_header((
            "User-Agent",
            "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) Mobile Safari",
        ))
}

#[actix_web::test]
async fn click_is_recorded_and_redirected() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());
    repository.save_tenant(tenant_fixture()).await.unwrap();

    let app = test_app!(repository, config, events);
    let req = click_request(
        "/t?sub1=camp7&sub2=%7B%7Bcampaign.id%7D%7D&sub3=%20%20&fbclid=fbX&adsetid=adset9",
        "203.0.113.20",
    )
    .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("Location").unwrap().to_str().unwrap(),
        STORE_URL
    );

    let clicks = repository.recent_clicks(10).await.unwrap();
    assert_eq!(clicks.len(), 1);
    let click = &clicks[0];
    assert_eq!(click.sub1.as_deref(), Some("camp7"));
    // Unexpanded macro and whitespace-only values are dropped.
    assert_eq!(click.sub2, None);
    assert_eq!(click.sub3, None);
    assert_eq!(click.fbclid.as_deref(), Some("fbX"));
    assert_eq!(click.adsetid.as_deref(), Some("adset9"));
    assert_eq!(click.ip_address, "203.0.113.20");
    assert!(!click.attributed);
}

#[actix_web::test]
async fn duplicate_click_is_debounced_but_still_redirected() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());
    repository.save_tenant(tenant_fixture()).await.unwrap();

    let app = test_app!(repository, config, events);
    let first = test::call_service(
        &app,
        click_request("/t?sub1=camp7", "203.0.113.21").to_request(),
    )
    .await;
    let second = test::call_service(
        &app,
        click_request("/t?sub1=camp7", "203.0.113.21").to_request(),
    )
    .await;

    assert_eq!(first.status(), StatusCode::FOUND);
    assert_eq!(second.status(), StatusCode::FOUND);
    assert_eq!(repository.recent_clicks(10).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn root_without_parameters_serves_info() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let resp = test::call_service(&app, click_request("/", "203.0.113.22").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], json!("Attribution System"));
}

#[actix_web::test]
async fn root_with_parameters_tracks_click() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());
    repository.save_tenant(tenant_fixture()).await.unwrap();

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        click_request("/?sub1=rootcamp", "203.0.113.23").to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    let clicks = repository.recent_clicks(10).await.unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].sub1.as_deref(), Some("rootcamp"));
}

#[actix_web::test]
async fn postback_without_required_params_is_rejected() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/api/v1/postback").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/postback?subid=clk_x")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn postback_for_unknown_click_is_not_found() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/postback?subid=clk_missing&status=lead")
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["click_id"], json!("clk_missing"));
    assert_eq!(body["status"], json!("lead"));
    // The miss is still audited in the live feed.
    assert!(
        events
            .recent(None)
            .iter()
            .any(|e| e.summary.contains("Click not found"))
    );
}

#[actix_web::test]
async fn postback_without_pixel_credentials_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());

    let click_id = generate_click_id();
    repository
        .insert_click(NewClick {
            click_id: click_id.clone(),
            ip_address: "203.0.113.24".to_string(),
            user_agent: "ua".to_string(),
            sub1: Some("camp7".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri(&format!("/api/v1/postback?subid={}&status=lead", click_id))
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["click_found"], json!(true));
    assert_eq!(body["fb_tracking"], json!(false));
    assert_eq!(body["fb_reason"], json!("Missing fbclid"));
}

#[actix_web::test]
async fn postback_with_invalid_status_is_rejected() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());

    let click_id = generate_click_id();
    repository
        .insert_click(NewClick {
            click_id: click_id.clone(),
            ip_address: "203.0.113.25".to_string(),
            user_agent: "ua".to_string(),
            fbclid: Some("fbX".to_string()),
            fb_id: Some("1234567890".to_string()),
            fb_token: Some("token".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri(&format!("/api/v1/postback?subid={}&status=refund", click_id))
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("lead or sale"));
}

#[actix_web::test]
async fn appsflyer_callback_upserts_attribution() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());
    repository.save_tenant(tenant_fixture()).await.unwrap();

    let app = test_app!(repository, config, events);
    let callback = |campaign: &str| {
        TestRequest::post()
            .uri("/api/v1/attribution/appsflyer")
            .insert_header(("Host", TENANT_DOMAIN))
            .set_json(json!({
                "appsflyer_id": "af-123",
                "customer_user_id": "IDFV-AF",
                "media_source": "unityads",
                "campaign": campaign,
                "af_sub1": "af-camp",
            }))
            .to_request()
    };

    let resp = test::call_service(&app, callback("summer")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["push_sub"], json!("af-camp"));
    assert!(body["final_url"].as_str().unwrap().contains("af-123"));

    let os_user_key = generate_os_user_key("IDFV-AF", API_SECRET);
    let stored = repository
        .find_attribution(&os_user_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.attribution_source, "appsflyer");
    assert_eq!(stored.campaign.as_deref(), Some("summer"));

    // Repeated callbacks refresh campaign fields rather than duplicating.
    test::call_service(&app, callback("autumn")).await;
    let refreshed = repository
        .find_attribution(&os_user_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.campaign.as_deref(), Some("autumn"));
    assert_eq!(repository.recent_attributions(10).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn appsflyer_callback_requires_identifiers() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());

    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/v1/attribution/appsflyer")
            .set_json(json!({ "media_source": "unityads" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn appsflyer_postback_requires_enabled_tenant() {
    let dir = TempDir::new().unwrap();
    let repository = test_repository(&dir).await;
    let config = test_config(&config_url(&dir));
    let events = EventLog::with_repository(repository.clone());

    // The default tenant has no dev key configured, so forwarding must be
    // refused before any S2S call is attempted.
    let app = test_app!(repository, config, events);
    let resp = test::call_service(
        &app,
        TestRequest::get()
            .uri("/api/v1/postback/appsflyer?appsflyer_id=af-1&idfv=IDFV-X&event=registration")
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("not enabled"));
}

fn config_url(dir: &TempDir) -> String {
    format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("click_test.db").display()
    )
}
