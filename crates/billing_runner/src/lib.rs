//! Billing Runner
//!
//! Wires the PostgreSQL adapters, the configured payment gateway and the
//! billing orchestrator together and performs exactly one billing run.
//! An external scheduler is expected to start the `billing-runner` binary on
//! the first day of each month.
//!
//! # Example
//!
//! ```rust,ignore
//! use billing_runner::{config::RunnerConfig, init_tracing, run};
//!
//! let config = RunnerConfig::from_env()?;
//! init_tracing(&config)?;
//! run(&config).await?;
//! ```

pub mod config;
pub mod error;

use std::sync::Arc;

use core_kernel::HealthCheckable;
use domain_billing::{
    AccountLedger, BillingOrchestrator, CustomerPort, InvoicePort, PaymentGatewayFactory,
};
use infra_db::{create_pool, PostgresCustomerAdapter, PostgresInvoiceAdapter, PostgresLedgerAdapter};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, RunnerConfig};
pub use crate::error::RunnerError;

/// Installs the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured log level.
pub fn init_tracing(config: &RunnerConfig) -> Result<(), RunnerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
    };
    result.map_err(|e| RunnerError::Logging(e.to_string()))
}

/// Builds an orchestrator over the given ports
pub fn build_orchestrator(
    config: &RunnerConfig,
    customers: Arc<dyn CustomerPort>,
    invoices: Arc<dyn InvoicePort>,
    ledger: Arc<dyn AccountLedger>,
) -> Result<BillingOrchestrator, RunnerError> {
    let gateway = PaymentGatewayFactory::create(&config.payment_gateway, customers)?;
    Ok(BillingOrchestrator::new(gateway, invoices, ledger).with_config(config.orchestrator_config()?))
}

/// Fails with `Unhealthy` unless `adapter` reports itself healthy
pub async fn ensure_healthy(adapter: &dyn HealthCheckable) -> Result<(), RunnerError> {
    let health = adapter.health_check().await;
    if health.is_healthy() {
        info!(adapter = %health.adapter_id, latency_ms = health.latency_ms, "Store is healthy");
        Ok(())
    } else {
        Err(RunnerError::Unhealthy {
            adapter: health.adapter_id,
            message: health.message.unwrap_or_default(),
        })
    }
}

/// Connects to PostgreSQL and performs one billing run
pub async fn run(config: &RunnerConfig) -> Result<(), RunnerError> {
    let pool = create_pool(config.database_config()).await?;

    let customers = Arc::new(PostgresCustomerAdapter::new(pool.clone()));
    let invoices = Arc::new(PostgresInvoiceAdapter::new(pool.clone()));
    let ledger = Arc::new(PostgresLedgerAdapter::new(pool.clone()));
    ensure_healthy(ledger.as_ref()).await?;

    let orchestrator = build_orchestrator(config, customers, invoices, ledger)?;
    info!(
        gateway = %config.payment_gateway,
        timezone = %config.billing_timezone,
        max_concurrent_customers = config.max_concurrent_customers,
        "Starting billing run"
    );
    orchestrator.charge_invoices().await?;

    pool.close().await;
    Ok(())
}
