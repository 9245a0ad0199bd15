//! Tariff rule DTOs
//!
//! Rules as they are written in rule files and handed over by the platform
//! that stores them. Codes follow the tariff table: `day_weight`, `day_volume`,
//! `day_pallet`, `flat` and `ceil_day`, `half_up`, `exact_hours`, `2h_step`.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::{
    DomainError, DomainResult, PricingMode, RoundingPolicy, TariffRule, TemperatureRange,
};

fn default_active() -> bool {
    true
}

fn default_rounding_policy() -> String {
    RoundingPolicy::default().as_str().to_string()
}

fn default_priority() -> i32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TariffRuleDefinition {
    pub id: Option<i32>,
    #[validate(length(min = 1, max = 100, message = "tariff rule name is required"))]
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub product_id: Option<i32>,
    pub category_id: Option<i32>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_quantity: Option<Decimal>,
    pub basis: String,
    pub rate: Decimal,
    #[serde(default = "default_rounding_policy")]
    pub rounding_policy: String,
    #[serde(default)]
    pub min_bill_days: u32,
    #[validate(range(min = 0, message = "priority must be non-negative"))]
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[validate(custom(function = "validate_currency_code"))]
    pub currency: Option<String>,
}

fn validate_currency_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(());
    }
    let mut err = ValidationError::new("currency_code");
    err.message = Some(Cow::Borrowed("currency must be a 3-letter ISO 4217 code"));
    Err(err)
}

impl TariffRuleDefinition {
    /// Validate and convert into a domain rule.
    ///
    /// `fallback_id` is used when the definition carries no id and
    /// `default_currency` when it names no currency.
    pub fn into_rule(
        self,
        fallback_id: i32,
        default_currency: &str,
        created_at: DateTime<Utc>,
    ) -> DomainResult<TariffRule> {
        self.validate()
            .map_err(|e| DomainError::Validation(format!("rule '{}': {}", self.name, validation_message(&e))))?;

        let pricing_mode = PricingMode::from_str(&self.basis).ok_or_else(|| {
            DomainError::Validation(format!("rule '{}': unknown billing basis '{}'", self.name, self.basis))
        })?;
        let rounding_policy = RoundingPolicy::from_str(&self.rounding_policy).ok_or_else(|| {
            DomainError::Validation(format!(
                "rule '{}': unknown rounding policy '{}'",
                self.name, self.rounding_policy
            ))
        })?;

        let temperature = match (self.min_temp, self.max_temp) {
            (None, None) => None,
            (min, max) => Some(TemperatureRange::new(min, max)),
        };

        let rule = TariffRule {
            id: self.id.unwrap_or(fallback_id),
            name: self.name,
            active: self.active,
            product_id: self.product_id,
            category_id: self.category_id,
            temperature,
            min_quantity: self.min_quantity,
            pricing_mode,
            unit_rate: self.rate,
            rounding_policy,
            minimum_billable_days: self.min_bill_days,
            priority: self.priority,
            currency: self
                .currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| default_currency.to_string()),
            created_at,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl From<&TariffRule> for TariffRuleDefinition {
    fn from(rule: &TariffRule) -> Self {
        Self {
            id: Some(rule.id),
            name: rule.name.clone(),
            active: rule.active,
            product_id: rule.product_id,
            category_id: rule.category_id,
            min_temp: rule.temperature.and_then(|r| r.min),
            max_temp: rule.temperature.and_then(|r| r.max),
            min_quantity: rule.min_quantity,
            basis: rule.pricing_mode.as_str().to_string(),
            rate: rule.unit_rate,
            rounding_policy: rule.rounding_policy.as_str().to_string(),
            min_bill_days: rule.minimum_billable_days,
            priority: rule.priority,
            currency: Some(rule.currency.clone()),
        }
    }
}

/// Flatten field errors into "field: message; field: message".
pub fn validation_message(errors: &ValidationErrors) -> String {
    let field_errors: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let msg = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{:?}", e.code));
                format!("{}: {}", field, msg)
            })
        })
        .collect();

    if field_errors.is_empty() {
        "validation failed".to_string()
    } else {
        field_errors.join("; ")
    }
}
