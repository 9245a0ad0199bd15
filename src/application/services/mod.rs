//! Application services

mod billing;
mod tariff_calculator;

pub use billing::{BatchReport, BillingOptions, BillingPeriod, BillingService, UnbillableItem};
pub use tariff_calculator::{
    compute_amount, compute_duration, match_tariff_rule, RuleSet, TariffCalculator,
};
