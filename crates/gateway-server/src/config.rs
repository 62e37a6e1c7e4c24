//! Environment-driven configuration.
//!
//! Every knob is read once at startup. A variable that is present but
//! unparseable is a hard error; a gateway that silently falls back to
//! defaults is worse than one that refuses to boot.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {detail}")]
    Invalid { key: String, detail: String },
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|err| ConfigError::Invalid {
            key: key.to_string(),
            detail: err.to_string(),
        }),
    }
}

/// One proxied downstream, as configured.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service name: route segment, breaker name, metric label.
    pub name: &'static str,
    pub base_url: String,
    pub auth_secret: Option<String>,
}

/// One login credential for the gateway's own auth endpoint.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub user_id: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_ttl: Duration,
    pub rate_limit_per_minute: u64,
    pub allowed_origins: Vec<String>,
    pub ingress_timeout: Duration,
    pub fraud_fail_open: bool,
    pub demo_seed: bool,
    pub services: Vec<ServiceConfig>,
    pub users: Vec<UserCredential>,
}

/// The seven analytical downstreams, with their conventional in-cluster
/// addresses.
const SERVICES: &[(&str, &str, &str)] = &[
    ("recommendations", "RECOMMENDATIONS_URL", "http://recommender:8001"),
    ("search", "SEARCH_URL", "http://search:8002"),
    ("pricing", "PRICING_URL", "http://pricing:8003"),
    ("chat", "CHAT_URL", "http://chatbot:8004"),
    ("fraud", "FRAUD_URL", "http://fraud:8005"),
    ("forecast", "FORECAST_URL", "http://forecasting:8006"),
    ("vision", "VISION_URL", "http://vision:8007"),
];

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let services = SERVICES
            .iter()
            .map(|(name, url_key, default_url)| {
                let secret_key = format!("SERVICE_AUTH_SECRET_{}", name.to_uppercase());
                ServiceConfig {
                    name,
                    base_url: var(url_key).unwrap_or_else(|| (*default_url).to_string()),
                    auth_secret: var(&secret_key),
                }
            })
            .collect();

        let algorithm = match var("JWT_ALGORITHM") {
            None => Algorithm::HS256,
            Some(raw) => Algorithm::from_str(&raw).map_err(|err| ConfigError::Invalid {
                key: "JWT_ALGORITHM".to_string(),
                detail: err.to_string(),
            })?,
        };

        let users = match var("GATEWAY_USERS") {
            None => Vec::new(),
            Some(raw) => parse_users(&raw)?,
        };

        Ok(Self {
            host: var("GATEWAY_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("GATEWAY_PORT")?.unwrap_or(8080),
            jwt_secret: var("JWT_SECRET").unwrap_or_else(|| {
                tracing::warn!("JWT_SECRET not set, using development default");
                "change-this-secret-key".to_string()
            }),
            jwt_algorithm: algorithm,
            access_token_ttl: Duration::from_secs(
                parsed::<u64>("ACCESS_TOKEN_EXPIRE_MINUTES")?.unwrap_or(30) * 60,
            ),
            rate_limit_per_minute: parsed("RATE_LIMIT_PER_MINUTE")?.unwrap_or(100),
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]),
            ingress_timeout: Duration::from_secs(parsed("INGRESS_TIMEOUT_SECS")?.unwrap_or(60)),
            fraud_fail_open: parsed("FRAUD_FAIL_OPEN")?.unwrap_or(true),
            demo_seed: parsed("DEMO_SEED")?.unwrap_or(false),
            services,
            users,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// `GATEWAY_USERS` format: `email:password[:user_id]`, comma-separated.
fn parse_users(raw: &str) -> Result<Vec<UserCredential>, ConfigError> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let mut parts = entry.trim().splitn(3, ':');
            let email = parts.next().unwrap_or_default();
            let password = parts.next().ok_or_else(|| ConfigError::Invalid {
                key: "GATEWAY_USERS".to_string(),
                detail: format!("entry '{entry}' is missing a password"),
            })?;
            let user_id = parts
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            Ok(UserCredential {
                user_id,
                email: email.to_string(),
                password: password.to_string(),
            })
        })
        .collect()
}
