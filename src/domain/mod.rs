pub mod billing;
pub mod item;
pub mod tariff;

// Re-export commonly used types
pub use billing::{BilledDuration, BillingResult, BillingStage, ReleaseCharge};
pub use item::{BillableItem, ProductRef};
pub use tariff::{
    DurationUnit, PricingMode, ProductSpecificity, RoundingPolicy, Specificity, TariffRule,
    TariffRuleRepository, TemperatureRange,
};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::{DomainError, DomainResult};
