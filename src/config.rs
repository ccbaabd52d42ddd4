//! Environment-backed application configuration.
//!
//! Everything is read once at startup from the process environment (with a
//! `.env` file loaded beforehand); handlers receive an immutable `AppConfig`
//! via `web::Data`.

use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub attribution: AttributionConfig,
    pub security: SecurityConfig,
    pub tracker: TrackerConfig,
    pub tenant_defaults: TenantDefaults,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// One of: sqlite, postgres, mysql
    pub backend: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct AttributionConfig {
    /// Trailing click window for candidate search, in hours
    pub window_hours: i64,
    /// Minimum User-Agent similarity score for a click to qualify
    pub min_ua_similarity: f64,
    /// Per-IP click debounce window, in milliseconds
    pub debounce_ms: u64,
}

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Secret mixed into the os_user_key digest
    pub api_secret: String,
    /// Bearer token for the admin API; empty disables the admin surface
    pub admin_token: String,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Fallback campaign URL when the tenant carries none
    pub default_campaign_url: String,
    /// Hostname reported as event_source_url on Facebook events
    pub public_domain: String,
}

/// Values used to synthesize the default tenant for unregistered domains.
#[derive(Clone, Debug)]
pub struct TenantDefaults {
    pub app_store_url: String,
    pub appsflyer_dev_key: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "127.0.0.1"),
                port: env_parse("SERVER_PORT", 8080),
            },
            database: DatabaseConfig {
                backend: env_or("DATABASE_BACKEND", "sqlite"),
                url: env_or("DATABASE_URL", "sqlite://attrelay.db?mode=rwc"),
            },
            attribution: AttributionConfig {
                window_hours: env_parse("ATTRIBUTION_WINDOW_HOURS", 24),
                min_ua_similarity: env_parse("MIN_USER_AGENT_SIMILARITY", 0.7),
                debounce_ms: env_parse("CLICK_DEBOUNCE_MS", 2000),
            },
            security: SecurityConfig {
                api_secret: env_or("API_SECRET_KEY", "change_this_in_production"),
                admin_token: env_or("ADMIN_TOKEN", ""),
            },
            tracker: TrackerConfig {
                default_campaign_url: env_or(
                    "TRACKER_CAMPAIGN_URL",
                    "https://onebuy.pro/2mMKVqHq",
                ),
                public_domain: env_or("DOMAIN", "onebuy.pro"),
            },
            tenant_defaults: TenantDefaults {
                app_store_url: env_or("APP_STORE_URL", "https://apps.apple.com"),
                appsflyer_dev_key: env_or("APPSFLYER_DEV_KEY", ""),
            },
            logging: LoggingConfig {
                level: env_or("LOG_LEVEL", "info"),
                file: env::var("LOG_FILE").ok().filter(|f| !f.is_empty()),
                format: env_or("LOG_FORMAT", "text"),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
