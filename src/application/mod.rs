pub mod dto;
pub mod services;

// Re-export key types for convenience
pub use dto::TariffRuleDefinition;
pub use services::{
    compute_amount, compute_duration, match_tariff_rule, BatchReport, BillingOptions,
    BillingPeriod, BillingService, RuleSet, TariffCalculator, UnbillableItem,
};
