//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `ACCESS_TOKEN_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `REFRESH_TOKEN_SECRET` - Refresh token signing secret (min 32 chars, high entropy,
//!   must differ from the access secret)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `CLIENT_URL` - Origin of the single-page client (CORS and checkout redirects)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 5000)
//! - `APP_ENV` - `development` or `production` (default: development)
//! - `REDIS_URL` - Redis connection string; the in-memory cache is used when unset
//! - `REDIS_COMMAND_TIMEOUT_SECS` - Per-command Redis timeout (default: 5)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `CHECKOUT_CURRENCY` - ISO currency code for checkout sessions (default: inr)
//! - `GIFT_COUPON_THRESHOLD` - Order total in minor units that earns a gift coupon
//!   (default: 200000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use mercato_core::Money;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_GIFT_COUPON_THRESHOLD: i64 = 200_000;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    /// Cookies carry the `Secure` attribute only in production.
    #[must_use]
    pub const fn secure_cookies(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment
    pub app_env: AppEnv,
    /// Origin of the single-page client
    pub client_url: Url,
    /// Token signing secrets
    pub tokens: TokenSecrets,
    /// Session cache backend configuration; `None` selects the in-memory cache
    pub redis: Option<RedisConfig>,
    /// Stripe configuration
    pub stripe: StripeConfig,
    /// Checkout rules
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors reported to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced by Sentry
    pub sentry_traces_sample_rate: f32,
    /// Log output format
    pub log_format: LogFormat,
}

/// Access and refresh token signing secrets.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct TokenSecrets {
    pub access: SecretString,
    pub refresh: SecretString,
}

impl std::fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSecrets")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Redis session cache configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL (may contain a password)
    pub url: SecretString,
    /// Upper bound on a single command round trip
    pub command_timeout: Duration,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// API secret key (`sk_...`)
    pub secret_key: SecretString,
    /// API base URL, overridable for tests
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Checkout rules.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Lowercase ISO 4217 currency code
    pub currency: String,
    /// Discounted order total at or above which a gift coupon is issued
    pub gift_coupon_threshold: Money,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host = parse_env("HOST", "127.0.0.1")?;
        let port = parse_env("PORT", "5000")?;
        let app_env = match get_env_or_default("APP_ENV", "development").as_str() {
            "production" => AppEnv::Production,
            "development" | "test" => AppEnv::Development,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "APP_ENV".to_string(),
                    format!("unknown environment '{other}'"),
                ));
            }
        };
        let client_url = Url::parse(&get_required_env("CLIENT_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("CLIENT_URL".to_string(), e.to_string()))?;

        let tokens = TokenSecrets::from_env()?;
        let redis = RedisConfig::from_env()?;
        let stripe = StripeConfig {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
        };
        let checkout = CheckoutConfig::from_env()?;

        let log_format = match get_optional_env("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            database_url,
            host,
            port,
            app_env,
            client_url,
            tokens,
            redis,
            stripe,
            checkout,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
            log_format,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The client origin without a trailing slash, for redirect URLs.
    #[must_use]
    pub fn client_origin(&self) -> &str {
        self.client_url.as_str().trim_end_matches('/')
    }
}

impl TokenSecrets {
    fn from_env() -> Result<Self, ConfigError> {
        let access = get_validated_secret("ACCESS_TOKEN_SECRET")?;
        validate_token_secret(&access, "ACCESS_TOKEN_SECRET")?;
        let refresh = get_validated_secret("REFRESH_TOKEN_SECRET")?;
        validate_token_secret(&refresh, "REFRESH_TOKEN_SECRET")?;

        if access.expose_secret() == refresh.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "REFRESH_TOKEN_SECRET".to_string(),
                "must differ from ACCESS_TOKEN_SECRET".to_string(),
            ));
        }

        Ok(Self { access, refresh })
    }
}

impl RedisConfig {
    /// Read `REDIS_URL` and `REDIS_COMMAND_TIMEOUT_SECS`; `None` when no URL is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for an unparsable timeout.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(url) = get_optional_env("REDIS_URL") else {
            return Ok(None);
        };
        let timeout_secs: u64 = parse_env("REDIS_COMMAND_TIMEOUT_SECS", "5")?;

        Ok(Some(Self {
            url: SecretString::from(url),
            command_timeout: Duration::from_secs(timeout_secs),
        }))
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("CHECKOUT_CURRENCY", "inr").to_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_CURRENCY".to_string(),
                "must be a three-letter ISO 4217 code".to_string(),
            ));
        }

        let threshold: i64 = parse_env(
            "GIFT_COUPON_THRESHOLD",
            &DEFAULT_GIFT_COUPON_THRESHOLD.to_string(),
        )?;
        let gift_coupon_threshold = Money::from_minor(threshold).map_err(|e| {
            ConfigError::InvalidEnvVar("GIFT_COUPON_THRESHOLD".to_string(), e.to_string())
        })?;

        Ok(Self {
            currency,
            gift_coupon_threshold,
        })
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "inr".to_string(),
            gift_coupon_threshold: Money::from_minor(DEFAULT_GIFT_COUPON_THRESHOLD)
                .unwrap_or(Money::ZERO),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Configuration with fixed values for unit tests.
#[cfg(test)]
pub(crate) fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/mercato_test"),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 5000,
        app_env: AppEnv::Development,
        client_url: Url::parse("http://localhost:5173").unwrap_or_else(|_| unreachable!()),
        tokens: TokenSecrets {
            access: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6q"),
            refresh: SecretString::from("Zq8%vN1!hG4@tR7#wE2&yU5*iO9^pL3k"),
        },
        redis: None,
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        checkout: CheckoutConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
        log_format: LogFormat::Pretty,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-signing-key-goes-here", "ACCESS_TOKEN_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "ACCESS_TOKEN_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "ACCESS_TOKEN_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_token_secret_too_short() {
        let secret = SecretString::from("aB3$xY9!");
        assert!(validate_token_secret(&secret, "ACCESS_TOKEN_SECRET").is_err());
    }

    #[test]
    fn test_secure_cookies_only_in_production() {
        assert!(AppEnv::Production.secure_cookies());
        assert!(!AppEnv::Development.secure_cookies());
    }

    #[test]
    fn test_client_origin_strips_trailing_slash() {
        let config = test_config();
        assert_eq!(config.client_origin(), "http://localhost:5173");
        assert_eq!(config.socket_addr().port(), 5000);
    }

    #[test]
    fn test_default_checkout_rules() {
        let checkout = CheckoutConfig::default();
        assert_eq!(checkout.currency, "inr");
        assert_eq!(checkout.gift_coupon_threshold.as_minor(), 200_000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let debug_output = format!("{:?} {:?}", config.tokens, config.stripe);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_4eC39HqLyjWDarjtT1zdp7dc"));
        assert!(!debug_output.contains("aB3$xY9"));
    }
}
