//! Startup Configuration
//!
//! Read once from the environment and validated before the listener binds.

use lesson_core::PgStoreConfig;
use lesson_payments::{parse_currency, CheckoutSettings, DEFAULT_TOLERANCE_SECS};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Validated server configuration
#[derive(Clone)]
pub struct AppConfig {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,

    /// Two-letter country for new connected accounts
    pub stripe_account_country: String,

    /// `APP_ENV=production`
    pub strict: bool,

    pub app_url: String,

    /// `None` selects the in-memory store
    pub database_url: Option<String>,
    pub db_max_connections: u32,

    pub bind_addr: String,
    pub webhook_tolerance_secs: i64,
    pub checkout_currency: String,
    pub platform_fee_bps: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("strict", &self.strict)
            .field("app_url", &self.app_url)
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("bind_addr", &self.bind_addr)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("checkout_currency", &self.checkout_currency)
            .field("platform_fee_bps", &self.platform_fee_bps)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let strict = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let app_url = match get("APP_URL") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_string()
            }
            Some(url) => {
                return Err(ConfigError::Invalid {
                    key: "APP_URL",
                    value: url,
                })
            }
            None if strict => return Err(ConfigError::Missing("APP_URL")),
            None => "http://localhost:3000".to_string(),
        };

        let database_url = match get("DATABASE_URL") {
            None if strict => return Err(ConfigError::Missing("DATABASE_URL")),
            url => url,
        };

        let platform_fee_bps = parse_or(&get, "PLATFORM_FEE_BPS", 500u32)?;
        if platform_fee_bps > 10_000 {
            return Err(ConfigError::Invalid {
                key: "PLATFORM_FEE_BPS",
                value: platform_fee_bps.to_string(),
            });
        }

        let webhook_tolerance_secs = parse_or(&get, "WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS)?;
        if webhook_tolerance_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "WEBHOOK_TOLERANCE_SECS",
                value: webhook_tolerance_secs.to_string(),
            });
        }

        let db_max_connections = parse_or(&get, "DB_MAX_CONNECTIONS", if strict { 10 } else { 1 })?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                value: "0".into(),
            });
        }

        let checkout_currency = get("CHECKOUT_CURRENCY")
            .map_or_else(|| "jpy".into(), |c| c.to_ascii_lowercase());
        if parse_currency(&checkout_currency).is_err() {
            return Err(ConfigError::Invalid {
                key: "CHECKOUT_CURRENCY",
                value: checkout_currency,
            });
        }

        Ok(Self {
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            stripe_account_country: get("STRIPE_ACCOUNT_COUNTRY").unwrap_or_else(|| "JP".into()),
            strict,
            app_url,
            database_url,
            db_max_connections,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            webhook_tolerance_secs,
            checkout_currency,
            platform_fee_bps,
        })
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            app_url: self.app_url.clone(),
            currency: self.checkout_currency.clone(),
            strict: self.strict,
            platform_fee_bps: self.platform_fee_bps,
        }
    }

    pub fn pg_config(&self) -> Option<PgStoreConfig> {
        self.database_url.as_ref().map(|url| PgStoreConfig {
            max_connections: self.db_max_connections,
            ..PgStoreConfig::new(url.as_str())
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const KEYS: [(&str, &str); 2] = [
        ("STRIPE_SECRET_KEY", "sk_test_1"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
    ];

    #[test]
    fn test_development_defaults() {
        let config = load(&KEYS).unwrap();
        assert!(!config.strict);
        assert_eq!(config.app_url, "http://localhost:3000");
        assert_eq!(config.database_url, None);
        assert_eq!(config.db_max_connections, 1);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.checkout_currency, "jpy");
        assert_eq!(config.platform_fee_bps, 500);
        assert!(config.pg_config().is_none());
    }

    #[test]
    fn test_stripe_keys_required() {
        assert_eq!(
            load(&[("STRIPE_WEBHOOK_SECRET", "whsec_1")]).unwrap_err(),
            ConfigError::Missing("STRIPE_SECRET_KEY")
        );
        assert_eq!(
            load(&[("STRIPE_SECRET_KEY", "sk_test_1"), ("STRIPE_WEBHOOK_SECRET", "  ")]).unwrap_err(),
            ConfigError::Missing("STRIPE_WEBHOOK_SECRET")
        );
    }

    #[test]
    fn test_production_requires_url_and_database() {
        let mut vars = KEYS.to_vec();
        vars.push(("APP_ENV", "production"));
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("APP_URL"));

        vars.push(("APP_URL", "https://lessons.example/"));
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("DATABASE_URL"));

        vars.push(("DATABASE_URL", "postgres://localhost/lessons"));
        let config = load(&vars).unwrap();
        assert!(config.strict);
        assert_eq!(config.app_url, "https://lessons.example");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.pg_config().unwrap().max_connections, 10);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut vars = KEYS.to_vec();
        vars.push(("PLATFORM_FEE_BPS", "lots"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { key: "PLATFORM_FEE_BPS", .. }
        ));

        let mut vars = KEYS.to_vec();
        vars.push(("PLATFORM_FEE_BPS", "20000"));
        assert!(load(&vars).is_err());

        let mut vars = KEYS.to_vec();
        vars.push(("CHECKOUT_CURRENCY", "doubloons"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { key: "CHECKOUT_CURRENCY", .. }
        ));

        let mut vars = KEYS.to_vec();
        vars.push(("APP_URL", "lessons.example"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { key: "APP_URL", .. }
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = load(&KEYS).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk_test_1"));
        assert!(!debug.contains("whsec_1"));
    }
}
