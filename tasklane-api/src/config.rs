/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 3001)
/// - `API_PRODUCTION`: Enables HSTS and strict CORS (default: false)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, or `*` (default: `FRONTEND_URL`)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing, at least 32 characters (required)
/// - `JWT_EXPIRATION_HOURS`: Access token lifetime, 1 to 8760 (default: 24)
/// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_PRICE_ID`: Payment gateway (required)
/// - `STRIPE_API_BASE`: Gateway base URL (default: https://api.stripe.com/v1)
/// - `STRIPE_API_VERSION`: Pinned gateway API version (default: 2022-08-01)
/// - `STRIPE_TIMEOUT_SECONDS`: Gateway request timeout (default: 30)
/// - `FRONTEND_URL`: Web client origin used for checkout return URLs (default: http://localhost:3000)
/// - `RUST_LOG`, `LOG_FORMAT`: Logging (read in `main`)
///
/// # Example
///
/// ```no_run
/// use tasklane_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tasklane_shared::billing::{
    stripe::{DEFAULT_API_BASE, DEFAULT_API_VERSION},
    ReconcilerSettings, StripeSettings,
};

/// Longest accepted access token lifetime (one year)
pub const MAX_ACCESS_TOKEN_HOURS: i64 = 8760;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub stripe: StripeConfig,
    pub frontend: FrontendConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode: HSTS header on, CORS restricted to `cors_origins`
    pub production: bool,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    /// Access token lifetime in hours
    pub access_token_hours: i64,
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,

    #[serde(skip_serializing)]
    pub webhook_secret: String,

    /// Price of the subscription plan offered at checkout
    pub price_id: String,

    pub api_base: String,

    /// Sent as `Stripe-Version`; event parsing targets this version
    pub api_version: String,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub url: String,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable is required", name))
}

fn parsed<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn check_token_hours(hours: i64) -> anyhow::Result<i64> {
    if !(1..=MAX_ACCESS_TOKEN_HOURS).contains(&hours) {
        anyhow::bail!(
            "JWT_EXPIRATION_HOURS must be between 1 and {}",
            MAX_ACCESS_TOKEN_HOURS
        );
    }
    Ok(hours)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => split_origins(&raw),
            Err(_) => vec![frontend_url.clone()],
        };

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let access_token_hours = check_token_hours(parsed("JWT_EXPIRATION_HOURS", 24i64)?)?;

        Ok(Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed("API_PORT", 3001u16)?,
                production: parsed("API_PRODUCTION", false)?,
                cors_origins,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10u32)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_token_hours,
            },
            stripe: StripeConfig {
                secret_key: required("STRIPE_SECRET_KEY")?,
                webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
                price_id: required("STRIPE_PRICE_ID")?,
                api_base: env::var("STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
                api_version: env::var("STRIPE_API_VERSION")
                    .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
                timeout_seconds: parsed("STRIPE_TIMEOUT_SECONDS", 30u64)?,
            },
            frontend: FrontendConfig { url: frontend_url },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Access token lifetime
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt.access_token_hours)
    }

    /// HTTP settings for the Stripe client
    pub fn stripe_settings(&self) -> StripeSettings {
        StripeSettings {
            secret_key: self.stripe.secret_key.clone(),
            api_base: self.stripe.api_base.clone(),
            api_version: self.stripe.api_version.clone(),
            timeout: Duration::from_secs(self.stripe.timeout_seconds),
        }
    }

    /// Price, webhook secret and return URLs for the reconciler
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings::for_frontend(
            &self.frontend.url,
            self.stripe.price_id.clone(),
            self.stripe.webhook_secret.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                production: false,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                access_token_hours: 2,
            },
            stripe: StripeConfig {
                secret_key: "sk_test_123".to_string(),
                webhook_secret: "whsec_123".to_string(),
                price_id: "price_123".to_string(),
                api_base: DEFAULT_API_BASE.to_string(),
                api_version: "2024-06-20".to_string(),
                timeout_seconds: 5,
            },
            frontend: FrontendConfig {
                url: "https://app.tasklane.dev".to_string(),
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(test_config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_derived_settings() {
        let config = test_config();

        assert_eq!(config.access_token_ttl(), chrono::Duration::hours(2));
        assert_eq!(config.stripe_settings().timeout, Duration::from_secs(5));
        assert_eq!(config.stripe_settings().api_version, "2024-06-20");

        let billing = config.reconciler_settings();
        assert_eq!(billing.price_id, "price_123");
        assert_eq!(billing.success_url, "https://app.tasklane.dev/billing/success");
        assert_eq!(billing.portal_return_url, "https://app.tasklane.dev/billing");
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let json = serde_json::to_string(&test_config()).unwrap();
        assert!(!json.contains("sk_test_123"));
        assert!(!json.contains("whsec_123"));
        assert!(!json.contains("test-secret-key"));
    }

    #[test]
    fn test_token_hours_bounds() {
        assert_eq!(check_token_hours(1).unwrap(), 1);
        assert_eq!(check_token_hours(MAX_ACCESS_TOKEN_HOURS).unwrap(), 8760);
        assert!(check_token_hours(0).is_err());
        assert!(check_token_hours(-5).is_err());
        assert!(check_token_hours(MAX_ACCESS_TOKEN_HOURS + 1).is_err());
        assert!(check_token_hours(i64::MAX).is_err());
    }

    #[test]
    fn test_split_origins() {
        assert_eq!(
            split_origins("https://a.dev/, https://b.dev,,"),
            vec!["https://a.dev".to_string(), "https://b.dev".to_string()]
        );
    }
}
