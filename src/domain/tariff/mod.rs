//! Tariff aggregate
//!
//! Contains the TariffRule entity, its matching filters, rounding policies and
//! the repository interface for the persisted rule set.

pub mod model;
pub mod repository;

pub use model::{
    DurationUnit, PricingMode, ProductSpecificity, RoundingPolicy, Specificity, TariffRule,
    TemperatureRange,
};
pub use repository::TariffRuleRepository;
