//! Runner errors

use domain_billing::BillingError;
use infra_db::DatabaseError;
use thiserror::Error;

/// Errors that end a billing run before or while it executes
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration could not be read from the environment
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A configuration value was read but is not acceptable
    #[error("Invalid setting {key}: {message}")]
    InvalidSetting { key: &'static str, message: String },

    /// The logging subscriber could not be installed
    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    /// The database could not be reached
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A store failed its pre-run health check
    #[error("Health check failed for {adapter}: {message}")]
    Unhealthy { adapter: String, message: String },

    /// The billing run itself failed
    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl RunnerError {
    pub(crate) fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        RunnerError::InvalidSetting {
            key,
            message: message.into(),
        }
    }
}
