//! Billing result entities

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::item::BillableItem;
use crate::domain::tariff::{DurationUnit, PricingMode, RoundingPolicy};
use crate::shared::errors::{DomainError, DomainResult};

/// Rounded duration in the unit the rule's rounding policy emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilledDuration {
    pub value: i64,
    pub unit: DurationUnit,
}

impl BilledDuration {
    pub fn days(value: i64) -> Self {
        Self {
            value,
            unit: DurationUnit::Days,
        }
    }

    pub fn hours(value: i64) -> Self {
        Self {
            value,
            unit: DurationUnit::Hours,
        }
    }

    /// Duration as a (possibly fractional) number of days
    pub fn billable_days(&self) -> Decimal {
        match self.unit {
            DurationUnit::Days => Decimal::from(self.value),
            DurationUnit::Hours => Decimal::from(self.value) / Decimal::from(24),
        }
    }
}

impl std::fmt::Display for BilledDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit {
            DurationUnit::Days => write!(f, "{} d", self.value),
            DurationUnit::Hours => write!(f, "{} h", self.value),
        }
    }
}

/// Whether the result can still change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStage {
    /// Item still in storage, billed up to `as_of`
    Provisional,
    /// Item released, billed up to the release time
    Final,
}

impl std::fmt::Display for BillingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provisional => write!(f, "Provisional"),
            Self::Final => write!(f, "Final"),
        }
    }
}

/// Billing outcome for one item. Always derived fresh from the rule set and
/// the item's timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingResult {
    pub item: String,
    pub rule_id: i32,
    pub rule_name: String,
    pub pricing_mode: PricingMode,
    pub rounding_policy: RoundingPolicy,
    /// Elapsed time before rounding, in seconds
    pub raw_duration_secs: i64,
    pub duration: BilledDuration,
    pub quantity_basis: Decimal,
    pub unit_rate: Decimal,
    pub amount: Decimal,
    pub currency: String,
    pub as_of: DateTime<Utc>,
    pub stage: BillingStage,
}

impl BillingResult {
    pub fn raw_duration(&self) -> Duration {
        Duration::seconds(self.raw_duration_secs)
    }

    pub fn format_amount(&self) -> String {
        format!("{} {}", self.amount, self.currency)
    }

    /// Share of this result's amount carried by a partial release.
    ///
    /// `already_released` is the quantity taken out by earlier releases of the
    /// same line. A line stored with zero quantity carries a zero charge.
    pub fn prorate_release(
        &self,
        item: &BillableItem,
        quantity_released: Decimal,
        already_released: Decimal,
        scale: u32,
    ) -> DomainResult<ReleaseCharge> {
        let nothing_stored = item.quantity.is_zero();
        if quantity_released < Decimal::ZERO || (quantity_released.is_zero() && !nothing_stored) {
            return Err(DomainError::Validation(format!(
                "item {}: released quantity must be positive",
                item.reference
            )));
        }
        let available = item.quantity - already_released;
        if quantity_released > available {
            return Err(DomainError::Validation(format!(
                "item {}: cannot release {} with only {} in storage",
                item.reference, quantity_released, available
            )));
        }

        let amount = if nothing_stored {
            Decimal::ZERO
        } else {
            self.amount
                .checked_mul(quantity_released)
                .and_then(|a| a.checked_div(item.quantity))
                .ok_or_else(|| {
                    DomainError::Validation(format!(
                        "item {}: release charge is out of range",
                        item.reference
                    ))
                })?
                .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
        };

        Ok(ReleaseCharge {
            item: item.reference.clone(),
            quantity_released,
            stored_quantity: item.quantity,
            remaining_quantity: available - quantity_released,
            amount,
            currency: self.currency.clone(),
        })
    }
}

/// Storage charge for the quantity taken out by one release line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseCharge {
    pub item: String,
    pub quantity_released: Decimal,
    pub stored_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub amount: Decimal,
    pub currency: String,
}
