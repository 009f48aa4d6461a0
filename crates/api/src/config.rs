//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::Address;
use tax_client::HttpClientConfig;
use tax_engine::{AdjustmentReason, TaxConfig};
use thiserror::Error;

/// Configuration values that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// Remote service URL given without credentials.
    #[error("{0} must be set when TAX_SERVICE_URL is set")]
    MissingCredential(&'static str),
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `TAX_ENABLED`: `false` bypasses tax computation (default: `true`)
/// - `TAX_COMPANY_CODE`: remote company code (default: `"DEFAULT"`)
/// - `TAX_ADJUSTMENT_REASON`: reason sent with adjustments (default: `PriceAdjusted`)
/// - `TAX_SERVICE_URL`, `TAX_ACCOUNT_ID`, `TAX_LICENSE_KEY`: remote service;
///   without a URL the in-memory flat-rate service is used
/// - `TAX_TIMEOUT_SECS`: per-request timeout (default: `30`)
/// - `SHIP_FROM_LINE1`, `SHIP_FROM_CITY`, `SHIP_FROM_REGION`,
///   `SHIP_FROM_POSTAL_CODE`, `SHIP_FROM_COUNTRY`: origin address
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub tax: TaxConfig,
    pub tax_service: Option<HttpClientConfig>,
    pub ship_from: Address,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's
    /// value if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut tax = defaults.tax;
        if let Some(enabled) = var("TAX_ENABLED") {
            tax.enabled = parse_bool("TAX_ENABLED", &enabled)?;
        }
        if let Some(company) = var("TAX_COMPANY_CODE") {
            tax.company_code = company;
        }
        if let Some(reason) = var("TAX_ADJUSTMENT_REASON") {
            let reason = reason
                .parse::<AdjustmentReason>()
                .map_err(|reason| ConfigError::Invalid {
                    name: "TAX_ADJUSTMENT_REASON",
                    reason,
                })?;
            tax = tax.with_adjustment_reason(reason);
        }

        let tax_service = match var("TAX_SERVICE_URL") {
            Some(url) => {
                let account = var("TAX_ACCOUNT_ID")
                    .ok_or(ConfigError::MissingCredential("TAX_ACCOUNT_ID"))?;
                let key = var("TAX_LICENSE_KEY")
                    .ok_or(ConfigError::MissingCredential("TAX_LICENSE_KEY"))?;
                let mut http = HttpClientConfig::new(url, account, key);
                if let Some(secs) = var("TAX_TIMEOUT_SECS") {
                    let secs = secs.parse::<u64>().map_err(|e| ConfigError::Invalid {
                        name: "TAX_TIMEOUT_SECS",
                        reason: e.to_string(),
                    })?;
                    http = http.with_timeout(Duration::from_secs(secs));
                }
                Some(http)
            }
            None => None,
        };

        let origin = defaults.ship_from;
        let ship_from = Address::new(
            var("SHIP_FROM_LINE1").unwrap_or(origin.line1),
            var("SHIP_FROM_CITY").unwrap_or(origin.city),
            var("SHIP_FROM_REGION").unwrap_or(origin.region),
            var("SHIP_FROM_POSTAL_CODE").unwrap_or(origin.postal_code),
            var("SHIP_FROM_COUNTRY").unwrap_or(origin.country),
        );

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            tax,
            tax_service,
            ship_from,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            tax: TaxConfig::default(),
            tax_service: None,
            ship_from: Address::new("1 Warehouse Way", "Seattle", "WA", "98101", "US"),
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.tax.enabled);
        assert_eq!(config.tax.company_code, "DEFAULT");
        assert!(config.tax_service.is_none());
        assert_eq!(config.ship_from.region, "WA");
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
    fn test_tax_settings_from_env() {
        let config = Config::from_lookup(lookup(&[
            ("TAX_ENABLED", "false"),
            ("TAX_COMPANY_CODE", "ACME"),
            ("TAX_ADJUSTMENT_REASON", "productreturned"),
            ("SHIP_FROM_REGION", "AL"),
        ]))
        .unwrap();
        assert!(!config.tax.enabled);
        assert_eq!(config.tax.company_code, "ACME");
        assert_eq!(config.tax.adjustment_reason, AdjustmentReason::ProductReturned);
        assert_eq!(config.ship_from.region, "AL");
        assert_eq!(config.ship_from.city, "Seattle");
    }

    #[test]
    fn test_remote_service_requires_credentials() {
        let err = Config::from_lookup(lookup(&[("TAX_SERVICE_URL", "https://tax.example.com")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingCredential("TAX_ACCOUNT_ID"));

        let config = Config::from_lookup(lookup(&[
            ("TAX_SERVICE_URL", "https://tax.example.com"),
            ("TAX_ACCOUNT_ID", "1100"),
            ("TAX_LICENSE_KEY", "secret"),
            ("TAX_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        let http = config.tax_service.unwrap();
        assert_eq!(http.account_id, "1100");
        assert_eq!(http.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("TAX_ENABLED", "maybe")])),
            Err(ConfigError::Invalid { name: "TAX_ENABLED", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("TAX_ADJUSTMENT_REASON", "Because")])),
            Err(ConfigError::Invalid { name: "TAX_ADJUSTMENT_REASON", .. })
        ));
    }
}
