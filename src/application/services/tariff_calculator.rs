//! Tariff matching and storage charge calculation
//!
//! Everything here is synchronous and pure: results depend only on the item,
//! the rule snapshot and the instant billed up to.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::domain::{
    BilledDuration, BillableItem, BillingResult, BillingStage, DomainError, DomainResult,
    DurationUnit, TariffRule,
};

/// Immutable snapshot of the active tariff rules, kept in match precedence
/// order so the first matching rule is the selected one.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<TariffRule>,
}

impl RuleSet {
    pub fn new(rules: impl IntoIterator<Item = TariffRule>) -> Self {
        let mut rules: Vec<TariffRule> = rules.into_iter().filter(|r| r.active).collect();
        rules.sort_by(precedence);
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TariffRule> {
        self.rules.iter()
    }

    pub fn get(&self, id: i32) -> Option<&TariffRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Reports the first misconfigured rule: a bad temperature range, or two
    /// rules with identical filters and priority that would tie at billing time.
    pub fn validate(&self) -> DomainResult<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate()?;
            if let Some(other) = self.rules[i + 1..]
                .iter()
                .find(|o| o.priority == rule.priority && o.same_filters(rule))
            {
                return Err(DomainError::Conflict(format!(
                    "tariff rules '{}' and '{}' have the same filters and priority {}",
                    rule.name, other.name, rule.priority
                )));
            }
        }
        Ok(())
    }
}

/// Most specific first, then lower priority, then newest, then highest id.
fn precedence(a: &TariffRule, b: &TariffRule) -> Ordering {
    b.specificity()
        .cmp(&a.specificity())
        .then(a.priority.cmp(&b.priority))
        .then(b.created_at.cmp(&a.created_at))
        .then(b.id.cmp(&a.id))
}

/// Select the single rule that applies to `item`.
///
/// Returns `RuleNotFound` when no active rule matches; there is no fallback
/// rule.
pub fn match_tariff_rule<'a>(rules: &'a RuleSet, item: &BillableItem) -> DomainResult<&'a TariffRule> {
    let rule = rules
        .iter()
        .find(|rule| rule.matches(item))
        .ok_or_else(|| DomainError::RuleNotFound {
            item: item.reference.clone(),
            product_id: item.product.id,
            temperature: item.temperature,
        })?;

    debug!(
        item = item.reference.as_str(),
        rule_id = rule.id,
        rule = rule.name.as_str(),
        specificity = ?rule.specificity(),
        "Tariff rule selected"
    );

    Ok(rule)
}

/// Rounded duration from check-in to the release time, or to `as_of` for
/// items still in storage. The rule's minimum billable days is applied.
pub fn compute_duration(
    item: &BillableItem,
    rule: &TariffRule,
    as_of: DateTime<Utc>,
) -> DomainResult<BilledDuration> {
    let end = item.billing_end(as_of);
    if end < item.checked_in_at {
        return Err(DomainError::NegativeDuration {
            item: item.reference.clone(),
            check_in: item.checked_in_at,
            end,
        });
    }
    Ok(round_window(rule, item.checked_in_at, end, true))
}

/// Round an interval with the rule's policy. `from` must not be after `to`.
pub(crate) fn round_window(
    rule: &TariffRule,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    apply_minimum: bool,
) -> BilledDuration {
    let policy = rule.rounding_policy;
    let mut value = policy.round(to - from);
    if apply_minimum {
        value = value.max(policy.minimum_units(rule.minimum_billable_days));
    }
    BilledDuration {
        value,
        unit: policy.unit(),
    }
}

/// rate × quantity basis × billable days, never negative.
///
/// Fails with `Validation` when the product does not fit a `Decimal`.
pub fn compute_amount(
    item: &BillableItem,
    rule: &TariffRule,
    duration: &BilledDuration,
) -> DomainResult<Decimal> {
    let basis = rule.pricing_mode.quantity_basis(item);
    let amount = rule
        .unit_rate
        .checked_mul(basis)
        .and_then(|a| a.checked_mul(Decimal::from(duration.value)))
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "item {}: charge under rule '{}' is out of range",
                item.reference, rule.name
            ))
        })?;
    let amount = match duration.unit {
        DurationUnit::Days => amount,
        DurationUnit::Hours => amount / Decimal::from(24),
    };
    Ok(amount.max(Decimal::ZERO))
}

/// Calculator bound to one rule snapshot
#[derive(Debug, Clone)]
pub struct TariffCalculator {
    rules: RuleSet,
    amount_scale: u32,
}

impl TariffCalculator {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            amount_scale: 2,
        }
    }

    /// Decimal places amounts are rounded to (half away from zero).
    pub fn with_amount_scale(mut self, scale: u32) -> Self {
        self.amount_scale = scale;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn amount_scale(&self) -> u32 {
        self.amount_scale
    }

    /// Match, round and price `item` up to `as_of`.
    pub fn calculate(&self, item: &BillableItem, as_of: DateTime<Utc>) -> DomainResult<BillingResult> {
        item.validate()?;
        let rule = match_tariff_rule(&self.rules, item)?;
        self.price(item, rule, as_of)
    }

    /// Price `item` with an explicitly chosen rule.
    pub fn calculate_with_rule(
        &self,
        item: &BillableItem,
        rule: &TariffRule,
        as_of: DateTime<Utc>,
    ) -> DomainResult<BillingResult> {
        item.validate()?;
        self.price(item, rule, as_of)
    }

    /// Price the part of the stay that falls in `[from, to]`.
    ///
    /// The rule's minimum billable days only applies when the window starts at
    /// check-in, so an item is not charged the minimum again on every cycle.
    pub fn calculate_window(
        &self,
        item: &BillableItem,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<BillingResult> {
        item.validate()?;
        if to < from {
            return Err(DomainError::NegativeDuration {
                item: item.reference.clone(),
                check_in: from,
                end: to,
            });
        }
        let rule = match_tariff_rule(&self.rules, item)?;
        let duration = round_window(rule, from, to, from == item.checked_in_at);
        self.result(item, rule, from, to, duration)
    }

    fn price(
        &self,
        item: &BillableItem,
        rule: &TariffRule,
        as_of: DateTime<Utc>,
    ) -> DomainResult<BillingResult> {
        let duration = compute_duration(item, rule, as_of)?;
        let end = item.billing_end(as_of);
        self.result(item, rule, item.checked_in_at, end, duration)
    }

    fn result(
        &self,
        item: &BillableItem,
        rule: &TariffRule,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        duration: BilledDuration,
    ) -> DomainResult<BillingResult> {
        let amount = compute_amount(item, rule, &duration)?
            .round_dp_with_strategy(self.amount_scale, RoundingStrategy::MidpointAwayFromZero);
        let stage = match item.released_at {
            Some(released) if released <= to => BillingStage::Final,
            _ => BillingStage::Provisional,
        };

        Ok(BillingResult {
            item: item.reference.clone(),
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            pricing_mode: rule.pricing_mode,
            rounding_policy: rule.rounding_policy,
            raw_duration_secs: (to - from).num_seconds(),
            duration,
            quantity_basis: rule.pricing_mode.quantity_basis(item),
            unit_rate: rule.unit_rate,
            amount,
            currency: rule.currency.clone(),
            as_of: to,
            stage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PricingMode, ProductRef, RoundingPolicy, TemperatureRange};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()
    }

    fn item(product_id: i32, temperature: Option<f64>) -> BillableItem {
        let mut item = BillableItem::new("IN-0007/1", ProductRef::new(product_id, "Fish"), t0());
        item.temperature = temperature;
        item.quantity = Decimal::from(10);
        item.weight = Decimal::from(100);
        item
    }

    fn rule(id: i32, name: &str) -> TariffRule {
        let mut rule = TariffRule::new(id, name, PricingMode::PerWeightPerDay, Decimal::from(2));
        rule.created_at = t0() - Duration::days(30);
        rule
    }

    fn product_rule(id: i32, product_id: i32) -> TariffRule {
        let mut r = rule(id, "product");
        r.product_id = Some(product_id);
        r
    }

    fn frozen_rule(id: i32) -> TariffRule {
        let mut r = rule(id, "frozen");
        r.temperature = Some(TemperatureRange::new(None, Some(-15.0)));
        r
    }

    #[test]
    fn no_rules_is_not_found() {
        let rules = RuleSet::new(vec![]);
        let err = match_tariff_rule(&rules, &item(1, None)).unwrap_err();
        assert!(matches!(err, DomainError::RuleNotFound { product_id: 1, .. }));
    }

    #[test]
    fn no_matching_rule_is_not_found() {
        let rules = RuleSet::new(vec![product_rule(1, 2), frozen_rule(2)]);
        let err = match_tariff_rule(&rules, &item(1, Some(4.0))).unwrap_err();
        assert!(matches!(err, DomainError::RuleNotFound { .. }));
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let mut r = rule(1, "wildcard");
        r.active = false;
        let rules = RuleSet::new(vec![r]);
        assert!(rules.is_empty());
        assert!(match_tariff_rule(&rules, &item(1, None)).is_err());
    }

    #[test]
    fn product_and_temperature_beats_product_only() {
        let mut both = product_rule(1, 1);
        both.temperature = Some(TemperatureRange::between(-25.0, -15.0));
        both.priority = 99;
        let product_only = product_rule(2, 1);

        for rules in [
            RuleSet::new(vec![both.clone(), product_only.clone()]),
            RuleSet::new(vec![product_only, both]),
        ] {
            let chosen = match_tariff_rule(&rules, &item(1, Some(-18.0))).unwrap();
            assert_eq!(chosen.id, 1);
        }
    }

    #[test]
    fn specificity_ladder() {
        let wildcard = rule(1, "wildcard");
        let temperature_only = frozen_rule(2);
        let category = {
            let mut r = rule(3, "category");
            r.category_id = Some(9);
            r
        };
        let product_only = product_rule(4, 1);
        let rules = RuleSet::new(vec![wildcard, temperature_only, category, product_only]);

        let mut frozen = item(1, Some(-18.0));
        frozen.product.category_id = Some(9);
        assert_eq!(match_tariff_rule(&rules, &frozen).unwrap().id, 4);

        frozen.product.id = 2;
        assert_eq!(match_tariff_rule(&rules, &frozen).unwrap().id, 3);

        frozen.product.category_id = None;
        assert_eq!(match_tariff_rule(&rules, &frozen).unwrap().id, 2);

        frozen.temperature = Some(2.0);
        assert_eq!(match_tariff_rule(&rules, &frozen).unwrap().id, 1);
    }

    #[test]
    fn priority_breaks_equal_specificity() {
        let mut a = product_rule(1, 1);
        a.priority = 20;
        let mut b = product_rule(2, 1);
        b.priority = 5;
        let rules = RuleSet::new(vec![a, b]);
        assert_eq!(match_tariff_rule(&rules, &item(1, None)).unwrap().id, 2);
    }

    #[test]
    fn newest_then_highest_id_breaks_full_ties() {
        let older = product_rule(1, 1);
        let mut newer = product_rule(2, 1);
        newer.created_at = older.created_at + Duration::days(1);
        let rules = RuleSet::new(vec![newer.clone(), older.clone()]);
        assert_eq!(match_tariff_rule(&rules, &item(1, None)).unwrap().id, 2);

        let mut same_time = product_rule(3, 1);
        same_time.created_at = newer.created_at;
        let rules = RuleSet::new(vec![same_time, newer, older]);
        assert_eq!(match_tariff_rule(&rules, &item(1, None)).unwrap().id, 3);
    }

    #[test]
    fn validate_reports_duplicate_filters() {
        let rules = RuleSet::new(vec![product_rule(1, 1), product_rule(2, 1)]);
        assert!(matches!(rules.validate(), Err(DomainError::Conflict(_))));

        let mut other_priority = product_rule(2, 1);
        other_priority.priority = 11;
        let rules = RuleSet::new(vec![product_rule(1, 1), other_priority]);
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn validate_reports_bad_temperature_range() {
        let mut r = rule(1, "broken");
        r.temperature = Some(TemperatureRange::between(0.0, -10.0));
        let rules = RuleSet::new(vec![r]);
        assert!(matches!(
            rules.validate(),
            Err(DomainError::InvalidTemperatureRange { .. })
        ));
    }

    #[test]
    fn ceiling_day_durations() {
        let r = rule(1, "ceil");
        let i = item(1, None);
        let d = compute_duration(&i, &r, t0() + Duration::hours(25)).unwrap();
        assert_eq!(d, BilledDuration::days(2));
        let d = compute_duration(&i, &r, t0() + Duration::hours(24)).unwrap();
        assert_eq!(d, BilledDuration::days(1));
    }

    #[test]
    fn two_hour_step_duration() {
        let mut r = rule(1, "2h");
        r.rounding_policy = RoundingPolicy::TwoHourStep;
        let d = compute_duration(&item(1, None), &r, t0() + Duration::hours(3)).unwrap();
        assert_eq!(d, BilledDuration::hours(4));
    }

    #[test]
    fn minimum_billable_days_enforced() {
        let mut r = rule(1, "min3");
        r.minimum_billable_days = 3;
        let d = compute_duration(&item(1, None), &r, t0() + Duration::hours(20)).unwrap();
        assert_eq!(d, BilledDuration::days(3));

        r.rounding_policy = RoundingPolicy::ExactHours;
        let d = compute_duration(&item(1, None), &r, t0() + Duration::hours(20)).unwrap();
        assert_eq!(d, BilledDuration::hours(72));
    }

    #[test]
    fn release_time_takes_precedence_over_as_of() {
        let r = rule(1, "ceil");
        let mut i = item(1, None);
        i.released_at = Some(t0() + Duration::hours(10));
        let d = compute_duration(&i, &r, t0() + Duration::days(10)).unwrap();
        assert_eq!(d, BilledDuration::days(1));
    }

    #[test]
    fn release_before_check_in_is_negative_duration() {
        let r = rule(1, "ceil");
        let mut i = item(1, None);
        i.released_at = Some(t0() - Duration::hours(1));
        let err = compute_duration(&i, &r, t0()).unwrap_err();
        assert!(matches!(err, DomainError::NegativeDuration { .. }));
    }

    #[test]
    fn duration_is_monotonic() {
        for policy in [
            RoundingPolicy::CeilingDay,
            RoundingPolicy::HalfUpDay,
            RoundingPolicy::ExactHours,
            RoundingPolicy::TwoHourStep,
        ] {
            let mut r = rule(1, "m");
            r.rounding_policy = policy;
            r.minimum_billable_days = 1;
            let i = item(1, None);
            let mut previous = 0;
            for minutes in (0..=4 * 24 * 60).step_by(17) {
                let d = compute_duration(&i, &r, t0() + Duration::minutes(minutes)).unwrap();
                assert!(d.value >= previous, "{policy} dropped at {minutes} min");
                previous = d.value;
            }
        }
    }

    #[test]
    fn amount_is_linear_in_weight() {
        let r = rule(1, "kg");
        let mut i = item(1, None);
        let d = BilledDuration::days(3);
        let single = compute_amount(&i, &r, &d).unwrap();
        i.weight = i.weight * Decimal::from(2);
        assert_eq!(compute_amount(&i, &r, &d).unwrap(), single * Decimal::from(2));
    }

    #[test]
    fn zero_basis_is_zero_amount() {
        let mut r = rule(1, "pallet");
        r.pricing_mode = PricingMode::PerPalletPerDay;
        let i = item(1, None);
        assert_eq!(compute_amount(&i, &r, &BilledDuration::days(5)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn oversized_charge_is_an_error() {
        let mut r = rule(1, "kg");
        r.unit_rate = Decimal::from(10_000_000_000i64);
        let mut i = item(1, None);
        i.weight = Decimal::from(1_000_000_000_000_000_000i64);
        let err = compute_amount(&i, &r, &BilledDuration::days(100_000)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_quantity_item_is_billable() {
        let calculator = TariffCalculator::new(RuleSet::new(vec![rule(1, "kg")]));
        let mut i = item(1, None);
        i.quantity = Decimal::ZERO;
        let result = calculator.calculate(&i, t0() + Duration::hours(30)).unwrap();
        assert_eq!(result.amount, Decimal::from(400));

        i.weight = Decimal::ZERO;
        let result = calculator.calculate(&i, t0() + Duration::hours(30)).unwrap();
        assert_eq!(result.amount, Decimal::ZERO);
    }

    #[test]
    fn nan_temperature_is_rejected_before_matching() {
        let mut frozen = rule(1, "frozen");
        frozen.temperature = Some(TemperatureRange::between(-25.0, -15.0));
        let calculator = TariffCalculator::new(RuleSet::new(vec![frozen]));
        let i = item(1, Some(f64::NAN));

        assert!(matches!(
            match_tariff_rule(calculator.rules(), &i),
            Err(DomainError::RuleNotFound { .. })
        ));
        assert!(matches!(
            calculator.calculate(&i, t0() + Duration::hours(30)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn flat_rate_ignores_quantities() {
        let mut r = rule(1, "flat");
        r.pricing_mode = PricingMode::FlatPerDay;
        r.unit_rate = Decimal::from(15);
        assert_eq!(
            compute_amount(&item(1, None), &r, &BilledDuration::days(4)).unwrap(),
            Decimal::from(60)
        );
    }

    #[test]
    fn hour_units_are_priced_per_day() {
        let mut r = rule(1, "hours");
        r.rounding_policy = RoundingPolicy::ExactHours;
        // 100 kg * 2 * 36h / 24 = 300
        assert_eq!(
            compute_amount(&item(1, None), &r, &BilledDuration::hours(36)).unwrap(),
            Decimal::from(300)
        );
    }

    #[test]
    fn weight_rule_over_thirty_hours() {
        let calculator = TariffCalculator::new(RuleSet::new(vec![rule(1, "Frozen per kg/day")]));
        let mut i = item(1, None);
        i.released_at = Some(t0() + Duration::hours(30));

        let result = calculator.calculate(&i, Utc::now()).unwrap();
        assert_eq!(result.duration, BilledDuration::days(2));
        assert_eq!(result.amount, Decimal::from(400));
        assert_eq!(result.raw_duration(), Duration::hours(30));
        assert_eq!(result.stage, BillingStage::Final);
    }

    #[test]
    fn open_item_is_provisional() {
        let calculator = TariffCalculator::new(RuleSet::new(vec![rule(1, "kg")]));
        let result = calculator
            .calculate(&item(1, None), t0() + Duration::hours(5))
            .unwrap();
        assert_eq!(result.stage, BillingStage::Provisional);
        assert_eq!(result.as_of, t0() + Duration::hours(5));
    }

    #[test]
    fn amount_rounded_to_scale() {
        let mut r = rule(1, "2h");
        r.rounding_policy = RoundingPolicy::TwoHourStep;
        r.unit_rate = Decimal::ONE;
        let calculator = TariffCalculator::new(RuleSet::new(vec![r])).with_amount_scale(2);
        let mut i = item(1, None);
        i.weight = Decimal::ONE;
        // 1 * 1 * 2h / 24 = 0.08333..
        let result = calculator.calculate(&i, t0() + Duration::hours(1)).unwrap();
        assert_eq!(result.amount, Decimal::new(8, 2));
    }

    #[test]
    fn window_skips_minimum_after_first_cycle() {
        let mut r = rule(1, "min3");
        r.minimum_billable_days = 3;
        let calculator = TariffCalculator::new(RuleSet::new(vec![r]));
        let i = item(1, None);

        let first = calculator
            .calculate_window(&i, t0(), t0() + Duration::hours(12))
            .unwrap();
        assert_eq!(first.duration, BilledDuration::days(3));

        let later = calculator
            .calculate_window(&i, t0() + Duration::days(5), t0() + Duration::days(6))
            .unwrap();
        assert_eq!(later.duration, BilledDuration::days(1));
    }
}
