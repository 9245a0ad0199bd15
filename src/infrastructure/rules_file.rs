//! TOML rule files
//!
//! ```toml
//! [[rules]]
//! name = "Frozen per kg/day"
//! basis = "day_weight"
//! rate = 2.0
//! max_temp = -15.0
//! rounding_policy = "ceil_day"
//! min_bill_days = 1
//! ```

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::application::dto::TariffRuleDefinition;
use crate::application::services::RuleSet;
use crate::domain::{DomainError, TariffRule};
use crate::shared::errors::AppError;

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<TariffRuleDefinition>,
}

/// Parse rule definitions. Rules without an id are numbered by position
/// (starting at 1); rules without a currency get `default_currency`.
pub fn parse_rules(content: &str, default_currency: &str) -> Result<Vec<TariffRule>, AppError> {
    let file: RuleFile = toml::from_str(content)?;
    let loaded_at = Utc::now();

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(file.rules.len());
    for (index, definition) in file.rules.into_iter().enumerate() {
        let rule = definition.into_rule(index as i32 + 1, default_currency, loaded_at)?;
        if !seen.insert(rule.id) {
            return Err(DomainError::Conflict(format!("tariff rule id {} is used twice", rule.id)).into());
        }
        rules.push(rule);
    }

    RuleSet::new(rules.iter().cloned()).validate()?;
    Ok(rules)
}

pub fn load_rule_file(path: &Path, default_currency: &str) -> Result<Vec<TariffRule>, AppError> {
    let content = std::fs::read_to_string(path)?;
    let rules = parse_rules(&content, default_currency)?;
    info!(path = %path.display(), count = rules.len(), "Tariff rules loaded");
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PricingMode, RoundingPolicy};
    use crate::shared::errors::InfraError;
    use std::io::Write;

    const RULES: &str = r#"
[[rules]]
name = "Frozen per kg/day"
basis = "day_weight"
rate = 2.0
max_temp = -15.0
min_bill_days = 1

[[rules]]
id = 20
name = "Chilled pallets"
basis = "day_pallet"
rate = "35.50"
min_temp = 0.0
max_temp = 8.0
rounding_policy = "2h_step"
currency = "EUR"
"#;

    #[test]
    fn parses_rules() {
        let rules = parse_rules(RULES, "USD").unwrap();
        assert_eq!(rules.len(), 2);

        assert_eq!(rules[0].id, 1);
        assert_eq!(rules[0].pricing_mode, PricingMode::PerWeightPerDay);
        assert_eq!(rules[0].rounding_policy, RoundingPolicy::CeilingDay);
        assert_eq!(rules[0].currency, "USD");

        assert_eq!(rules[1].id, 20);
        assert_eq!(rules[1].unit_rate, rust_decimal::Decimal::new(3550, 2));
        assert_eq!(rules[1].rounding_policy, RoundingPolicy::TwoHourStep);
        assert_eq!(rules[1].currency, "EUR");
    }

    #[test]
    fn empty_file_has_no_rules() {
        assert!(parse_rules("", "USD").unwrap().is_empty());
    }

    #[test]
    fn duplicate_ids_conflict() {
        let content = r#"
[[rules]]
id = 1
name = "a"
basis = "flat"
rate = 1

[[rules]]
id = 1
name = "b"
basis = "flat"
rate = 1
product_id = 3
"#;
        let err = parse_rules(content, "USD").unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn duplicate_specificity_conflicts() {
        let content = r#"
[[rules]]
name = "a"
basis = "flat"
rate = 1

[[rules]]
name = "b"
basis = "day_weight"
rate = 1
"#;
        let err = parse_rules(content, "USD").unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn malformed_toml_is_infra_error() {
        let err = parse_rules("[[rules]\nname = ", "USD").unwrap_err();
        assert!(matches!(err, AppError::Infra(InfraError::Toml(_))));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();
        let rules = load_rule_file(file.path(), "USD").unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_rule_file(Path::new("/nonexistent/rules.toml"), "USD").unwrap_err();
        assert!(matches!(err, AppError::Infra(InfraError::Io(_))));
    }
}
