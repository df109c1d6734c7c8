//! Application configuration loaded from environment variables.

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use domain::LedgerSchema;
use fulfillment::{CheckoutSettings, ReconciliationSettings, SignatureVerifier, WorkflowSettings};
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be used.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Server configuration, read once at startup.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`, `RUST_LOG`: bind address and log filter
/// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: payment provider (required)
/// - `MICROCMS_SERVICE_DOMAIN`, `MICROCMS_API_KEY`: catalog (required)
/// - `GOOGLE_SPREADSHEET_ID`, `GOOGLE_SHEETS_ACCESS_TOKEN`: ledger (required)
/// - `CRON_SECRET`: reconciliation bearer secret; unset rejects every run
/// - `SLACK_WEBHOOK_URL`: operations channel; unset drops notifications
///
/// plus the optional overrides documented on each field.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    /// `STRIPE_API_BASE`, default `https://api.stripe.com`.
    pub stripe_api_base: String,
    /// `PAYMENT_DASHBOARD_URL`, default `https://dashboard.stripe.com`.
    pub payment_dashboard_url: String,
    pub cron_secret: Option<String>,

    pub microcms_service_domain: String,
    pub microcms_api_key: String,
    /// `MICROCMS_API_BASE`; derived from the service domain when unset.
    pub microcms_api_base: Option<String>,

    pub spreadsheet_id: String,
    pub sheets_access_token: String,
    /// `LEDGER_SHEET_RANGE`, default `Orders!A:O`.
    pub ledger_range: String,
    /// `LEDGER_SCHEMA_VERSION`, default `1`.
    pub ledger_schema: LedgerSchema,
    /// `LEDGER_UTC_OFFSET_HOURS`, default `9`.
    pub ledger_offset: FixedOffset,
    /// `SHEETS_API_BASE`, default `https://sheets.googleapis.com`.
    pub sheets_api_base: String,

    pub slack_webhook_url: Option<String>,
    /// `HTTP_TIMEOUT_SECS`, default `10`.
    pub http_timeout: Duration,

    /// `CHECKOUT_CURRENCY`, default `jpy`.
    pub checkout_currency: String,
    /// `CHECKOUT_ALLOWED_COUNTRIES`, comma separated, default `JP`.
    pub allowed_countries: Vec<String>,
    /// `PUBLIC_ORIGIN`, default `http://localhost:3000`.
    pub public_origin: String,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                reason: format!("{e}"),
            })?,
            None => defaults.port,
        };

        let ledger_schema = match get("LEDGER_SCHEMA_VERSION") {
            Some(raw) => raw.parse::<LedgerSchema>().map_err(|e| ConfigError::Invalid {
                var: "LEDGER_SCHEMA_VERSION",
                reason: e.to_string(),
            })?,
            None => defaults.ledger_schema,
        };

        let ledger_offset = match get("LEDGER_UTC_OFFSET_HOURS") {
            Some(raw) => parse_offset(&raw)?,
            None => defaults.ledger_offset,
        };

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    var: "HTTP_TIMEOUT_SECS",
                    reason: format!("{e}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "HTTP_TIMEOUT_SECS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.http_timeout,
        };

        let allowed_countries = match get("CHECKOUT_ALLOWED_COUNTRIES") {
            Some(raw) => raw
                .split(',')
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
            None => defaults.allowed_countries,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            payment_dashboard_url: get("PAYMENT_DASHBOARD_URL")
                .unwrap_or(defaults.payment_dashboard_url),
            cron_secret: get("CRON_SECRET"),
            microcms_service_domain: required("MICROCMS_SERVICE_DOMAIN")?,
            microcms_api_key: required("MICROCMS_API_KEY")?,
            microcms_api_base: get("MICROCMS_API_BASE"),
            spreadsheet_id: required("GOOGLE_SPREADSHEET_ID")?,
            sheets_access_token: required("GOOGLE_SHEETS_ACCESS_TOKEN")?,
            ledger_range: get("LEDGER_SHEET_RANGE").unwrap_or(defaults.ledger_range),
            ledger_schema,
            ledger_offset,
            sheets_api_base: get("SHEETS_API_BASE").unwrap_or(defaults.sheets_api_base),
            slack_webhook_url: get("SLACK_WEBHOOK_URL"),
            http_timeout,
            checkout_currency: get("CHECKOUT_CURRENCY")
                .map(|c| c.trim().to_ascii_lowercase())
                .unwrap_or(defaults.checkout_currency),
            allowed_countries,
            public_origin: get("PUBLIC_ORIGIN")
                .map(|o| o.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_origin),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the fulfillment workflow.
    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            verifier: SignatureVerifier::new(self.stripe_webhook_secret.clone()),
            ledger_offset: self.ledger_offset,
            dashboard_url: self.payment_dashboard_url.clone(),
        }
    }

    /// Settings for checkout session creation.
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            currency: self.checkout_currency.clone(),
            allowed_countries: self.allowed_countries.clone(),
            public_origin: self.public_origin.clone(),
        }
    }

    /// Settings for the reconciliation job.
    pub fn reconciliation_settings(&self) -> ReconciliationSettings {
        ReconciliationSettings {
            secret: self.cron_secret.clone(),
            ..ReconciliationSettings::default()
        }
    }
}

fn parse_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "LEDGER_UTC_OFFSET_HOURS",
        reason,
    };
    let hours: i32 = raw.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| invalid(format!("{hours} is out of range")))
}

impl Default for Config {
    fn default() -> Self {
        let checkout = CheckoutSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base: "https://api.stripe.com".to_string(),
            payment_dashboard_url: "https://dashboard.stripe.com".to_string(),
            cron_secret: None,
            microcms_service_domain: String::new(),
            microcms_api_key: String::new(),
            microcms_api_base: None,
            spreadsheet_id: String::new(),
            sheets_access_token: String::new(),
            ledger_range: "Orders!A:O".to_string(),
            ledger_schema: LedgerSchema::V1,
            ledger_offset: FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix()),
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            slack_webhook_url: None,
            http_timeout: Duration::from_secs(10),
            checkout_currency: checkout.currency,
            allowed_countries: checkout.allowed_countries,
            public_origin: checkout.public_origin,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("stripe_api_base", &self.stripe_api_base)
            .field("cron_secret_set", &self.cron_secret.is_some())
            .field("microcms_service_domain", &self.microcms_service_domain)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("ledger_range", &self.ledger_range)
            .field("ledger_schema", &self.ledger_schema)
            .field("ledger_offset", &self.ledger_offset)
            .field("notifications_enabled", &self.slack_webhook_url.is_some())
            .field("http_timeout", &self.http_timeout)
            .field("checkout_currency", &self.checkout_currency)
            .field("allowed_countries", &self.allowed_countries)
            .field("public_origin", &self.public_origin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const REQUIRED: [(&str, &str); 6] = [
        ("STRIPE_SECRET_KEY", "sk_test_123"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
        ("MICROCMS_SERVICE_DOMAIN", "shop"),
        ("MICROCMS_API_KEY", "cms-key"),
        ("GOOGLE_SPREADSHEET_ID", "sheet-1"),
        ("GOOGLE_SHEETS_ACCESS_TOKEN", "ya29.token"),
    ];

    fn load(extra: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = REQUIRED
            .iter()
            .chain(extra)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.ledger_offset.local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_required_variables_only() {
        let config = load(&[]).unwrap();
        assert_eq!(config.stripe_secret_key, "sk_test_123");
        assert_eq!(config.stripe_api_base, "https://api.stripe.com");
        assert_eq!(config.ledger_range, "Orders!A:O");
        assert_eq!(config.ledger_schema, LedgerSchema::V1);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.allowed_countries, vec!["JP".to_string()]);
        assert!(config.cron_secret.is_none());
        assert!(config.slack_webhook_url.is_none());
    }

    #[test]
    fn test_missing_required_variable() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::Missing("STRIPE_SECRET_KEY"));

        let err = load(&[("GOOGLE_SHEETS_ACCESS_TOKEN", " ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GOOGLE_SHEETS_ACCESS_TOKEN"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("CRON_SECRET", "s3cret"),
            ("LEDGER_UTC_OFFSET_HOURS", "0"),
            ("HTTP_TIMEOUT_SECS", "3"),
            ("CHECKOUT_ALLOWED_COUNTRIES", "jp, us,"),
            ("CHECKOUT_CURRENCY", "USD"),
            ("PUBLIC_ORIGIN", "https://shop.example.com/"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.cron_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.ledger_offset, FixedOffset::east_opt(0).unwrap());
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(config.allowed_countries, vec!["JP", "US"]);
        assert_eq!(config.checkout_currency, "usd");
        assert_eq!(config.public_origin, "https://shop.example.com");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("PORT", "http")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            load(&[("LEDGER_SCHEMA_VERSION", "7")]),
            Err(ConfigError::Invalid { var: "LEDGER_SCHEMA_VERSION", .. })
        ));
        assert!(matches!(
            load(&[("LEDGER_UTC_OFFSET_HOURS", "30")]),
            Err(ConfigError::Invalid { var: "LEDGER_UTC_OFFSET_HOURS", .. })
        ));
        assert!(matches!(
            load(&[("HTTP_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { var: "HTTP_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = load(&[("CRON_SECRET", "s3cret")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk_test_123"));
        assert!(!debug.contains("whsec_123"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env() {
        // SAFETY: serialised with every other test touching the environment.
        unsafe {
            for (key, value) in REQUIRED {
                std::env::set_var(key, value);
            }
            std::env::set_var("PORT", "4000");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.microcms_service_domain, "shop");

        unsafe {
            for (key, _) in REQUIRED {
                std::env::remove_var(key);
            }
            std::env::remove_var("PORT");
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_missing() {
        // SAFETY: serialised with every other test touching the environment.
        unsafe {
            std::env::remove_var("STRIPE_SECRET_KEY");
        }
        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::Missing("STRIPE_SECRET_KEY")
        );
    }
}
