//! # Cold Storage Billing
//!
//! Tariff matching and storage charge calculation for cold storage services.
//!
//! ## Architecture
//!
//! - **domain**: tariff rules, billable items, billing results
//! - **application**: the tariff calculator, billing service and rule DTOs
//! - **infrastructure**: in-memory rule repository, TOML rule files
//! - **config** / **logging**: application configuration and tracing setup
//!
//! Persistence, invoicing, stock moves and scheduling live in the host
//! platform; it hands items and rules in and takes `BillingResult`s out.

pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod shared;

pub use config::{default_config_path, AppConfig, BillingConfig, LoggingConfig};

pub use application::{BillingService, RuleSet, TariffCalculator};
pub use bootstrap::build_billing_service;
pub use domain::{BillableItem, BillingResult, DomainError, DomainResult, TariffRule};
pub use logging::init_tracing;
pub use shared::errors::AppError;
