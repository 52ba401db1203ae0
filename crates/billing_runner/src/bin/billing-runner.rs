//! Billing Runner Binary
//!
//! Performs one billing run and exits: `0` when the run completed (individual
//! invoices may still have been skipped), non-zero on bad configuration, an
//! unreachable database, or a failure to select the due invoices.
//!
//! # Usage
//!
//! ```bash
//! BILLING_DATABASE_URL=postgres://... cargo run --bin billing-runner
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_DATABASE_URL` - PostgreSQL connection string
//! * `BILLING_MAX_CONNECTIONS` - Connection pool size (default: 10)
//! * `BILLING_PAYMENT_GATEWAY` - Payment gateway kind (default: online)
//! * `BILLING_BILLING_TIMEZONE` - IANA timezone of the billing month (default: UTC)
//! * `BILLING_MAX_CONCURRENT_CUSTOMERS` - Customers charged at once (default: 16)
//! * `BILLING_RUN_DEADLINE_SECS` - Abandon unfinished customers after this many seconds
//! * `BILLING_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `BILLING_LOG_FORMAT` - `pretty` or `json` (default: pretty)

use anyhow::Context;
use billing_runner::{config::RunnerConfig, init_tracing, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = RunnerConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config)?;

    tokio::select! {
        result = run(&config) => {
            result.context("Billing run failed")?;
            tracing::info!("Billing run complete");
            Ok(())
        }
        _ = shutdown_signal() => {
            // Dropping the run aborts the partitions; open transactions roll back
            anyhow::bail!("Billing run interrupted; unfinished invoices stay pending")
        }
    }
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
