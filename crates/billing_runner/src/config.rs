//! Runner configuration
//!
//! Read from environment variables prefixed `BILLING_` (for example
//! `BILLING_DATABASE_URL`). Every setting has a default except that the
//! default database URL only suits local development.

use core_kernel::Timezone;
use domain_billing::{OrchestratorConfig, PaymentGatewayKind};
use infra_db::DatabaseConfig;
use serde::Deserialize;
use std::time::Duration;

use crate::error::RunnerError;

/// Environment variable prefix for all settings
pub const ENV_PREFIX: &str = "BILLING";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Billing runner configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Connection pool size
    pub max_connections: u32,
    /// Payment gateway kind
    pub payment_gateway: String,
    /// IANA timezone whose midnights delimit the billing month
    pub billing_timezone: String,
    /// Customer partitions charged at the same time
    pub max_concurrent_customers: usize,
    /// Wall-clock budget for the run in seconds
    pub run_deadline_secs: Option<u64>,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Log format
    pub log_format: LogFormat,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/billing".to_string(),
            max_connections: 10,
            payment_gateway: PaymentGatewayKind::default().to_string(),
            billing_timezone: "UTC".to_string(),
            max_concurrent_customers: 16,
            run_deadline_secs: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RunnerConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads configuration from an `Environment` source
    pub fn from_environment(environment: config::Environment) -> Result<Self, RunnerError> {
        let config: RunnerConfig = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every setting that can be checked without connecting anywhere
    pub fn validate(&self) -> Result<(), RunnerError> {
        self.timezone()?;
        self.gateway_kind()?;
        if self.max_concurrent_customers == 0 {
            return Err(RunnerError::invalid(
                "max_concurrent_customers",
                "must be at least 1",
            ));
        }
        if self.max_connections == 0 {
            return Err(RunnerError::invalid("max_connections", "must be at least 1"));
        }
        if self.run_deadline_secs == Some(0) {
            return Err(RunnerError::invalid("run_deadline_secs", "must be positive"));
        }
        Ok(())
    }

    /// The billing timezone
    pub fn timezone(&self) -> Result<Timezone, RunnerError> {
        self.billing_timezone
            .parse()
            .map_err(|e: core_kernel::TemporalError| RunnerError::invalid("billing_timezone", e.to_string()))
    }

    /// The payment gateway kind
    pub fn gateway_kind(&self) -> Result<PaymentGatewayKind, RunnerError> {
        Ok(self.payment_gateway.parse()?)
    }

    /// Pool settings for the configured database
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_url).max_connections(self.max_connections)
    }

    /// Orchestrator settings
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, RunnerError> {
        let mut config = OrchestratorConfig::default()
            .timezone(self.timezone()?)
            .max_concurrent_customers(self.max_concurrent_customers);
        if let Some(secs) = self.run_deadline_secs {
            config = config.run_deadline(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::BillingError;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<RunnerConfig, RunnerError> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_environment(config::Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.payment_gateway, "online");
        assert_eq!(config.billing_timezone, "UTC");
        assert_eq!(config.max_concurrent_customers, 16);
        assert_eq!(config.run_deadline_secs, None);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_reads_prefixed_variables() {
        let config = load(&[
            ("BILLING_DATABASE_URL", "postgres://db.internal/billing"),
            ("BILLING_MAX_CONCURRENT_CUSTOMERS", "4"),
            ("BILLING_BILLING_TIMEZONE", "Europe/Copenhagen"),
            ("BILLING_RUN_DEADLINE_SECS", "600"),
            ("BILLING_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "postgres://db.internal/billing");
        assert_eq!(config.max_concurrent_customers, 4);
        assert_eq!(config.run_deadline_secs, Some(600));
        assert_eq!(config.log_format, LogFormat::Json);

        let orchestrator = config.orchestrator_config().unwrap();
        assert_eq!(orchestrator.timezone.to_string(), "Europe/Copenhagen");
        assert_eq!(orchestrator.run_deadline, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_unknown_gateway_is_rejected() {
        let result = load(&[("BILLING_PAYMENT_GATEWAY", "offline")]);
        assert!(matches!(
            result,
            Err(RunnerError::Billing(BillingError::UnknownPaymentGateway(_)))
        ));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let result = load(&[("BILLING_BILLING_TIMEZONE", "Mars/Olympus_Mons")]);
        assert!(matches!(
            result,
            Err(RunnerError::InvalidSetting { key: "billing_timezone", .. })
        ));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result = load(&[("BILLING_MAX_CONCURRENT_CUSTOMERS", "0")]);
        assert!(matches!(
            result,
            Err(RunnerError::InvalidSetting { key: "max_concurrent_customers", .. })
        ));
    }

    #[test]
    fn test_database_config_uses_pool_size() {
        let config = RunnerConfig {
            max_connections: 3,
            ..RunnerConfig::default()
        };
        assert_eq!(config.database_config().max_connections, 3);
    }
}
