use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub server_key: String,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub base_url: String,
    pub token: String,
    pub country_code: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub gateway: GatewayConfig,
    pub notifier: NotifierConfig,
    pub admin_jwt_secret: String,
    pub http_timeout: Duration,
    pub store_name: String,
    pub sentry_dsn: Option<String>,
}

impl AppConfig {
    /// Build the configuration from the process environment. Call
    /// `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = optional("PORT")
            .map(|raw| {
                raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                    name: "PORT",
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(3000);

        let http_timeout_secs = optional("HTTP_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name: "HTTP_TIMEOUT_SECS",
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(15);

        Ok(Self {
            database_url: optional("DATABASE_URL").unwrap_or_else(|| "shop.db".to_string()),
            port,
            gateway: GatewayConfig {
                base_url: required("PAYMENT_GATEWAY_URL")?,
                server_key: required("PAYMENT_SERVER_KEY")?,
            },
            notifier: NotifierConfig {
                base_url: required("NOTIFIER_URL")?,
                token: required("NOTIFIER_TOKEN")?,
                country_code: optional("PHONE_COUNTRY_CODE").unwrap_or_else(|| "62".to_string()),
            },
            admin_jwt_secret: required("ADMIN_JWT_SECRET")?,
            http_timeout: Duration::from_secs(http_timeout_secs),
            store_name: optional("STORE_NAME").unwrap_or_else(|| "Account Shop".to_string()),
            sentry_dsn: optional("SENTRY_DSN"),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
