//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Fixed clocks, periods and amounts used across tests
//! - `builders`: Builders that seed customers and invoices through the ports
//! - `gateways`: Scripted payment gateways for orchestrator tests
//! - `database`: PostgreSQL test containers with the billing schema
//! - `assertions`: Assertion helpers reading state back through the ports
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod gateways;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use gateways::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
