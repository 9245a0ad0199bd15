//! Billing service for storage charges
//!
//! Loads one rule snapshot per billing pass and prices items against it.
//! Daily refreshes, release-time finalization and monthly cycles all go
//! through here.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::tariff_calculator::{RuleSet, TariffCalculator};
use crate::application::dto::TariffRuleDefinition;
use crate::domain::{
    BillableItem, BillingResult, DomainError, DomainResult, ReleaseCharge, TariffRule,
    TariffRuleRepository,
};
use crate::shared::errors::InfraError;
use crate::shared::Clock;

#[derive(Debug, Clone)]
pub struct BillingOptions {
    /// Decimal places amounts are rounded to
    pub amount_scale: u32,
    /// Currency for rule definitions that do not name one
    pub currency: String,
}

impl Default for BillingOptions {
    fn default() -> Self {
        Self {
            amount_scale: 2,
            currency: "USD".to_string(),
        }
    }
}

/// Half-open billing period `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl BillingPeriod {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> DomainResult<Self> {
        if to <= from {
            return Err(DomainError::Validation(format!(
                "billing period end {} must be after its start {}",
                to, from
            )));
        }
        Ok(Self { from, to })
    }

    /// Calendar month in UTC
    pub fn month(year: i32, month: u32) -> DomainResult<Self> {
        let invalid = || DomainError::Validation(format!("invalid billing month {}-{:02}", year, month));
        let from = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let to = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;
        Self::new(from, to)
    }

    /// Calendar month containing `at`
    pub fn month_of(at: DateTime<Utc>) -> DomainResult<Self> {
        Self::month(at.year(), at.month())
    }
}

/// An item that could not be billed, with the reason for whoever fixes it.
#[derive(Debug, Clone, Serialize)]
pub struct UnbillableItem {
    pub item: String,
    pub reason: String,
    /// Fixed by editing the tariff table rather than the item
    pub configuration: bool,
}

/// Outcome of one billing pass over many items
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub as_of: DateTime<Utc>,
    pub billed: Vec<BillingResult>,
    pub unbillable: Vec<UnbillableItem>,
}

impl BatchReport {
    fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            billed: Vec::new(),
            unbillable: Vec::new(),
        }
    }

    fn record(&mut self, item: &BillableItem, outcome: DomainResult<BillingResult>) {
        match outcome {
            Ok(result) => self.billed.push(result),
            Err(e) => {
                warn!(item = item.reference.as_str(), error = %e, "Item is not billable");
                self.unbillable.push(UnbillableItem {
                    item: item.reference.clone(),
                    reason: e.to_string(),
                    configuration: e.is_configuration(),
                });
            }
        }
    }

    /// Sum of billed amounts. Results in different currencies are not
    /// converted; callers billing multi-currency rule sets group first.
    pub fn total_amount(&self) -> Decimal {
        self.billed.iter().map(|r| r.amount).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unbillable.is_empty()
    }

    /// JSON hand-off for invoicing and reporting.
    pub fn to_json(&self) -> Result<String, InfraError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Service for billing operations
pub struct BillingService {
    rules: Arc<dyn TariffRuleRepository>,
    clock: Arc<dyn Clock>,
    options: BillingOptions,
}

impl BillingService {
    pub fn new(
        rules: Arc<dyn TariffRuleRepository>,
        clock: Arc<dyn Clock>,
        options: BillingOptions,
    ) -> Self {
        Self {
            rules,
            clock,
            options,
        }
    }

    /// Calculator over the rules active right now
    pub async fn snapshot(&self) -> DomainResult<TariffCalculator> {
        let rules = self.rules.find_active().await?;
        Ok(TariffCalculator::new(RuleSet::new(rules)).with_amount_scale(self.options.amount_scale))
    }

    /// Bill one item: up to its release if released, otherwise up to now.
    pub async fn bill_item(&self, item: &BillableItem) -> DomainResult<BillingResult> {
        let calculator = self.snapshot().await?;
        let result = calculator.calculate(item, self.clock.now())?;

        info!(
            item = item.reference.as_str(),
            rule_id = result.rule_id,
            duration = %result.duration,
            amount = %result.amount,
            currency = result.currency.as_str(),
            stage = %result.stage,
            "Storage charge calculated"
        );

        Ok(result)
    }

    /// Bill every item against one snapshot. Items fail independently.
    pub async fn bill_batch(&self, items: &[BillableItem]) -> DomainResult<BatchReport> {
        let calculator = self.snapshot().await?;
        let as_of = self.clock.now();

        let mut report = BatchReport::new(as_of);
        for item in items {
            report.record(item, calculator.calculate(item, as_of));
        }

        info!(
            billed = report.billed.len(),
            unbillable = report.unbillable.len(),
            total = %report.total_amount(),
            "Billing pass completed"
        );

        Ok(report)
    }

    /// Charge for the part of the stay inside `period` that has not been
    /// billed yet. `None` when nothing is left to bill in the period.
    pub async fn bill_period(
        &self,
        item: &BillableItem,
        period: &BillingPeriod,
    ) -> DomainResult<Option<BillingResult>> {
        let calculator = self.snapshot().await?;
        period_charge(&calculator, item, period)
    }

    /// Period billing for many items against one snapshot.
    pub async fn bill_period_batch(
        &self,
        items: &[BillableItem],
        period: &BillingPeriod,
    ) -> DomainResult<BatchReport> {
        let calculator = self.snapshot().await?;

        let mut report = BatchReport::new(period.to);
        for item in items {
            match period_charge(&calculator, item, period) {
                Ok(None) => {}
                Ok(Some(result)) => report.record(item, Ok(result)),
                Err(e) => report.record(item, Err(e)),
            }
        }

        info!(
            from = %period.from,
            to = %period.to,
            billed = report.billed.len(),
            unbillable = report.unbillable.len(),
            total = %report.total_amount(),
            "Period billing completed"
        );

        Ok(report)
    }

    /// Cost preview with an explicitly chosen rule, bypassing matching.
    pub async fn preview(
        &self,
        rule_id: i32,
        item: &BillableItem,
        as_of: DateTime<Utc>,
    ) -> DomainResult<BillingResult> {
        let rule = self
            .rules
            .find_by_id(rule_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "TariffRule",
                field: "id",
                value: rule_id.to_string(),
            })?;
        let calculator = TariffCalculator::new(RuleSet::default())
            .with_amount_scale(self.options.amount_scale);
        calculator.calculate_with_rule(item, &rule, as_of)
    }

    /// Release charge for a partial (or full) release of `item`.
    pub fn prorate_release(
        &self,
        result: &BillingResult,
        item: &BillableItem,
        quantity_released: Decimal,
        already_released: Decimal,
    ) -> DomainResult<ReleaseCharge> {
        let charge = result.prorate_release(
            item,
            quantity_released,
            already_released,
            self.options.amount_scale,
        )?;

        info!(
            item = item.reference.as_str(),
            released = %charge.quantity_released,
            remaining = %charge.remaining_quantity,
            amount = %charge.amount,
            "Release charge prorated"
        );

        Ok(charge)
    }

    pub async fn list_rules(&self) -> DomainResult<Vec<TariffRule>> {
        self.rules.find_all().await
    }

    pub async fn create_rule(&self, rule: TariffRule) -> DomainResult<TariffRule> {
        let rule = self.rules.save(rule).await?;
        info!(rule_id = rule.id, rule = rule.name.as_str(), "Tariff rule created");
        Ok(rule)
    }

    /// Create a rule from its definition. The repository assigns the id and
    /// rules without a currency get the configured one.
    pub async fn define_rule(&self, definition: TariffRuleDefinition) -> DomainResult<TariffRule> {
        let rule = definition.into_rule(0, &self.options.currency, self.clock.now())?;
        self.create_rule(rule).await
    }

    pub async fn update_rule(&self, rule: TariffRule) -> DomainResult<()> {
        self.rules.update(rule).await
    }

    pub async fn delete_rule(&self, id: i32) -> DomainResult<()> {
        self.rules.delete(id).await
    }
}

fn period_charge(
    calculator: &TariffCalculator,
    item: &BillableItem,
    period: &BillingPeriod,
) -> DomainResult<Option<BillingResult>> {
    if let Some(released) = item.released_at {
        if released < item.checked_in_at {
            return Err(DomainError::NegativeDuration {
                item: item.reference.clone(),
                check_in: item.checked_in_at,
                end: released,
            });
        }
    }

    let start = item
        .last_billed_at
        .unwrap_or(item.checked_in_at)
        .max(period.from);
    let end = item
        .released_at
        .map_or(period.to, |released| released.min(period.to));

    if end <= start {
        return Ok(None);
    }
    calculator.calculate_window(item, start, end).map(Some)
}
