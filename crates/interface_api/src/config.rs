//! API configuration
//!
//! Loaded from `API_*` environment variables. Nested sections use a
//! double underscore, e.g. `API_BILLING__VAT__REGISTERED=true` or
//! `API_SCHEDULING__MAX_RESCHEDULES=3`.

use serde::Deserialize;

use core_kernel::Currency;
use domain_billing::BillingConfig;
use domain_booking::SchedulingPolicy;
use infra_db::BusinessHours;

/// Session rates in minor units of one currency
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub currency: Currency,
    pub individual_minor: i64,
    pub couples_minor: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::ZAR,
            individual_minor: 85_000,
            couples_minor: 120_000,
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    pub max_connections: u32,
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    pub scheduling: SchedulingPolicy,
    pub billing: BillingConfig,
    pub pricing: PricingConfig,
    pub business_hours: BusinessHours,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/practice".to_string(),
            max_connections: 10,
            log_level: "info".to_string(),
            log_json: false,
            scheduling: SchedulingPolicy::default(),
            billing: BillingConfig::default(),
            pricing: PricingConfig::default(),
            business_hours: BusinessHours::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
