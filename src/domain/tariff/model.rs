//! Tariff rule domain entity

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::item::BillableItem;
use crate::shared::errors::{DomainError, DomainResult};

const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_TWO_HOURS: i64 = 2 * MS_PER_HOUR;
const MS_PER_HALF_DAY: i64 = 12 * MS_PER_HOUR;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// What the unit rate is applied against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Rate per kg per day
    PerWeightPerDay,
    /// Rate per m³ per day
    PerVolumePerDay,
    /// Rate per pallet per day
    PerPalletPerDay,
    /// Flat rate per day
    FlatPerDay,
}

impl Default for PricingMode {
    fn default() -> Self {
        Self::PerWeightPerDay
    }
}

impl PricingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerWeightPerDay => "day_weight",
            Self::PerVolumePerDay => "day_volume",
            Self::PerPalletPerDay => "day_pallet",
            Self::FlatPerDay => "flat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "day_weight" => Some(Self::PerWeightPerDay),
            "day_volume" => Some(Self::PerVolumePerDay),
            "day_pallet" => Some(Self::PerPalletPerDay),
            "flat" => Some(Self::FlatPerDay),
            _ => None,
        }
    }

    /// Physical measure of the item the rate is multiplied by.
    pub fn quantity_basis(&self, item: &BillableItem) -> Decimal {
        match self {
            Self::PerWeightPerDay => item.weight,
            Self::PerVolumePerDay => item.volume,
            Self::PerPalletPerDay => Decimal::from(item.pallet_count),
            Self::FlatPerDay => Decimal::ONE,
        }
    }
}

impl std::fmt::Display for PricingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerWeightPerDay => write!(f, "PerWeightPerDay"),
            Self::PerVolumePerDay => write!(f, "PerVolumePerDay"),
            Self::PerPalletPerDay => write!(f, "PerPalletPerDay"),
            Self::FlatPerDay => write!(f, "FlatPerDay"),
        }
    }
}

/// Unit a rounding policy emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Days,
    Hours,
}

/// Maps raw elapsed time to billable units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Any started day counts as a full day
    CeilingDay,
    /// Nearest whole day, half a day rounds up
    HalfUpDay,
    /// Whole hours, remainder dropped
    ExactHours,
    /// Next 2-hour block
    TwoHourStep,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self::CeilingDay
    }
}

impl RoundingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CeilingDay => "ceil_day",
            Self::HalfUpDay => "half_up",
            Self::ExactHours => "exact_hours",
            Self::TwoHourStep => "2h_step",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ceil_day" => Some(Self::CeilingDay),
            "half_up" => Some(Self::HalfUpDay),
            "exact_hours" => Some(Self::ExactHours),
            "2h_step" => Some(Self::TwoHourStep),
            _ => None,
        }
    }

    pub fn unit(&self) -> DurationUnit {
        match self {
            Self::CeilingDay | Self::HalfUpDay => DurationUnit::Days,
            Self::ExactHours | Self::TwoHourStep => DurationUnit::Hours,
        }
    }

    /// Round a non-negative elapsed time into this policy's unit.
    ///
    /// Negative input is clamped to zero; callers reject it before rounding.
    pub fn round(&self, elapsed: Duration) -> i64 {
        let ms = elapsed.num_milliseconds().max(0);
        match self {
            Self::CeilingDay => div_ceil(ms, MS_PER_DAY),
            Self::HalfUpDay => (ms + MS_PER_HALF_DAY) / MS_PER_DAY,
            Self::ExactHours => ms / MS_PER_HOUR,
            Self::TwoHourStep => div_ceil(ms, MS_PER_TWO_HOURS) * 2,
        }
    }

    /// Floor expressed in this policy's unit for a minimum number of days.
    pub fn minimum_units(&self, minimum_days: u32) -> i64 {
        match self.unit() {
            DurationUnit::Days => i64::from(minimum_days),
            DurationUnit::Hours => i64::from(minimum_days) * 24,
        }
    }
}

impl std::fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CeilingDay => write!(f, "CeilingDay"),
            Self::HalfUpDay => write!(f, "HalfUpDay"),
            Self::ExactHours => write!(f, "ExactHours"),
            Self::TwoHourStep => write!(f, "TwoHourStep"),
        }
    }
}

fn div_ceil(value: i64, step: i64) -> i64 {
    (value + step - 1) / step
}

/// Inclusive temperature window in °C. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl TemperatureRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, temperature: f64) -> bool {
        if temperature.is_nan() {
            return false;
        }
        if let Some(min) = self.min {
            if temperature < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if temperature > max {
                return false;
            }
        }
        true
    }
}

/// How narrowly a rule targets the product
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ProductSpecificity {
    Any,
    Category,
    Product,
}

/// Ranking used when several rules match the same item.
///
/// Field order matters: the product level dominates, the temperature filter
/// only separates rules at the same product level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Specificity {
    pub product: ProductSpecificity,
    pub temperature: bool,
}

/// Storage tariff rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffRule {
    pub id: i32,
    pub name: String,
    pub active: bool,
    pub product_id: Option<i32>,
    pub category_id: Option<i32>,
    pub temperature: Option<TemperatureRange>,
    /// Smallest stored quantity the rule applies to
    pub min_quantity: Option<Decimal>,
    pub pricing_mode: PricingMode,
    /// Price per basis unit per day
    pub unit_rate: Decimal,
    pub rounding_policy: RoundingPolicy,
    pub minimum_billable_days: u32,
    /// Lower numbers win among equally specific rules
    pub priority: i32,
    /// Currency code (ISO 4217)
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl TariffRule {
    /// Wildcard rule with the given rate; filters are added by the caller.
    pub fn new(id: i32, name: impl Into<String>, pricing_mode: PricingMode, unit_rate: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            product_id: None,
            category_id: None,
            temperature: None,
            min_quantity: None,
            pricing_mode,
            unit_rate,
            rounding_policy: RoundingPolicy::default(),
            minimum_billable_days: 0,
            priority: 10,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn has_temperature_filter(&self) -> bool {
        self.temperature.map_or(false, |r| r.is_bounded())
    }

    pub fn specificity(&self) -> Specificity {
        let product = if self.product_id.is_some() {
            ProductSpecificity::Product
        } else if self.category_id.is_some() {
            ProductSpecificity::Category
        } else {
            ProductSpecificity::Any
        };
        Specificity {
            product,
            temperature: self.has_temperature_filter(),
        }
    }

    /// Whether every filter set on the rule accepts the item.
    pub fn matches(&self, item: &BillableItem) -> bool {
        if let Some(product_id) = self.product_id {
            if item.product.id != product_id {
                return false;
            }
        }
        if let Some(category_id) = self.category_id {
            if item.product.category_id != Some(category_id) {
                return false;
            }
        }
        if let Some(range) = self.temperature.filter(|r| r.is_bounded()) {
            match item.temperature {
                Some(t) if range.contains(t) => {}
                _ => return false,
            }
        }
        if let Some(min_quantity) = self.min_quantity {
            if item.quantity < min_quantity {
                return false;
            }
        }
        true
    }

    /// Two rules compete for exactly the same items.
    pub fn same_filters(&self, other: &TariffRule) -> bool {
        self.product_id == other.product_id
            && self.category_id == other.category_id
            && self.temperature.filter(|r| r.is_bounded()) == other.temperature.filter(|r| r.is_bounded())
            && self.min_quantity == other.min_quantity
    }

    /// Save-time checks
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("tariff rule name is required".into()));
        }
        if let Some(range) = self.temperature {
            if range.min.map_or(false, f64::is_nan) || range.max.map_or(false, f64::is_nan) {
                return Err(DomainError::Validation(format!(
                    "rule '{}': temperature bounds must be numbers",
                    self.name
                )));
            }
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(DomainError::InvalidTemperatureRange {
                        rule: self.name.clone(),
                        min,
                        max,
                    });
                }
            }
        }
        if self.unit_rate < Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "rule '{}': rate cannot be negative",
                self.name
            )));
        }
        if let Some(min_quantity) = self.min_quantity {
            if min_quantity < Decimal::ZERO {
                return Err(DomainError::Validation(format!(
                    "rule '{}': minimum quantity cannot be negative",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────
