pub mod tariff_rule;

pub use tariff_rule::{validation_message, TariffRuleDefinition};
