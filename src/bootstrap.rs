//! Wiring from configuration to a ready billing service

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::application::services::{BillingOptions, BillingService};
use crate::config::AppConfig;
use crate::infrastructure::{load_rule_file, InMemoryTariffRuleRepository};
use crate::shared::errors::AppError;
use crate::shared::{Clock, SystemClock};

/// Build a billing service backed by the configured rule file.
///
/// Without a `rules_path` the repository starts empty and every item is
/// unbillable until rules are added.
pub fn build_billing_service(
    config: &AppConfig,
    config_path: &Path,
) -> Result<BillingService, AppError> {
    build_with_clock(config, config_path, Arc::new(SystemClock))
}

pub fn build_with_clock(
    config: &AppConfig,
    config_path: &Path,
    clock: Arc<dyn Clock>,
) -> Result<BillingService, AppError> {
    let repo = match config.rules_path(config_path) {
        Some(path) => {
            let rules = load_rule_file(&path, &config.billing.currency)?;
            InMemoryTariffRuleRepository::from_rules(rules)?
        }
        None => {
            warn!("No tariff rule file configured; starting with an empty rule set");
            InMemoryTariffRuleRepository::new()
        }
    };

    info!(
        rules = repo.len(),
        amount_scale = config.billing.amount_scale,
        "Billing service ready"
    );

    Ok(BillingService::new(
        Arc::new(repo),
        clock,
        BillingOptions::from(&config.billing),
    ))
}
