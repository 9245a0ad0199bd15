//! Billable item domain entity

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::shared::errors::{DomainError, DomainResult};

/// Product reference as snapshotted from the catalog at billing time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: i32,
    pub name: String,
    pub category_id: Option<i32>,
}

impl ProductRef {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            category_id: None,
        }
    }

    pub fn with_category(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// One stored line of an intake, with the physical attributes billing reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillableItem {
    /// Intake line reference (e.g. "IN-0042/1")
    pub reference: String,
    pub product: ProductRef,
    /// Target storage temperature in °C
    pub temperature: Option<f64>,
    /// Quantity received, in the product's unit of measure
    pub quantity: Decimal,
    /// Weight in kilograms
    pub weight: Decimal,
    /// Volume in cubic meters
    pub volume: Decimal,
    pub pallet_count: u32,
    pub checked_in_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    /// End of the last invoiced period
    pub last_billed_at: Option<DateTime<Utc>>,
}

impl BillableItem {
    pub fn new(
        reference: impl Into<String>,
        product: ProductRef,
        checked_in_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference: reference.into(),
            product,
            temperature: None,
            quantity: Decimal::ONE,
            weight: Decimal::ZERO,
            volume: Decimal::ZERO,
            pallet_count: 0,
            checked_in_at,
            released_at: None,
            last_billed_at: None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released_at.is_some()
    }

    /// End of the billable interval: the release time if set, otherwise `as_of`.
    pub fn billing_end(&self, as_of: DateTime<Utc>) -> DateTime<Utc> {
        self.released_at.unwrap_or(as_of)
    }

    /// Rejects attribute snapshots that cannot be billed.
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(temperature) = self.temperature {
            if !temperature.is_finite() {
                return Err(DomainError::Validation(format!(
                    "item {}: temperature {} is not a number of degrees",
                    self.reference, temperature
                )));
            }
        }
        if self.weight < Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "item {}: weight cannot be negative",
                self.reference
            )));
        }
        if self.volume < Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "item {}: volume cannot be negative",
                self.reference
            )));
        }
        if self.quantity < Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "item {}: quantity cannot be negative",
                self.reference
            )));
        }
        Ok(())
    }
}
