//! In-memory tariff rule repository

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{DomainError, DomainResult, TariffRule, TariffRuleRepository};

/// In-memory rule store for development, tests and rule-file backed setups.
///
/// Rules are validated on save and update: inverted temperature ranges and
/// duplicates (same filters, same priority) are rejected here rather than at
/// billing time.
pub struct InMemoryTariffRuleRepository {
    rules: DashMap<i32, TariffRule>,
    rule_counter: AtomicI32,
}

impl InMemoryTariffRuleRepository {
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
            rule_counter: AtomicI32::new(1),
        }
    }

    /// Seed the store with already-identified rules.
    pub fn from_rules(rules: impl IntoIterator<Item = TariffRule>) -> DomainResult<Self> {
        let repo = Self::new();
        for rule in rules {
            rule.validate()?;
            repo.check_conflicts(&rule, None)?;
            if repo.rules.contains_key(&rule.id) {
                return Err(DomainError::Conflict(format!("tariff rule id {}", rule.id)));
            }
            let next_id = rule.id.checked_add(1).ok_or_else(|| {
                DomainError::Validation(format!("tariff rule id {} is out of range", rule.id))
            })?;
            repo.rule_counter.fetch_max(next_id, Ordering::SeqCst);
            repo.rules.insert(rule.id, rule);
        }
        Ok(repo)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `replacing` names the stored rule an update overwrites; it is not
    /// compared against itself.
    fn check_conflicts(&self, rule: &TariffRule, replacing: Option<i32>) -> DomainResult<()> {
        if !rule.active {
            return Ok(());
        }
        let clash = self.rules.iter().find(|entry| {
            let other = entry.value();
            Some(other.id) != replacing
                && other.active
                && other.priority == rule.priority
                && other.same_filters(rule)
        });
        if let Some(other) = clash {
            return Err(DomainError::Conflict(format!(
                "tariff rule '{}' has the same filters and priority as '{}'",
                rule.name,
                other.value().name
            )));
        }
        Ok(())
    }

    fn sorted(mut rules: Vec<TariffRule>) -> Vec<TariffRule> {
        rules.sort_by_key(|r| (r.priority, r.id));
        rules
    }
}

impl Default for InMemoryTariffRuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TariffRuleRepository for InMemoryTariffRuleRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<TariffRule>> {
        Ok(self.rules.get(&id).map(|r| r.clone()))
    }

    async fn find_active(&self) -> DomainResult<Vec<TariffRule>> {
        Ok(Self::sorted(
            self.rules
                .iter()
                .filter(|r| r.active)
                .map(|r| r.value().clone())
                .collect(),
        ))
    }

    async fn find_all(&self) -> DomainResult<Vec<TariffRule>> {
        Ok(Self::sorted(
            self.rules.iter().map(|r| r.value().clone()).collect(),
        ))
    }

    async fn save(&self, mut rule: TariffRule) -> DomainResult<TariffRule> {
        rule.validate()?;
        self.check_conflicts(&rule, None)?;
        rule.id = self.rule_counter.fetch_add(1, Ordering::SeqCst);
        self.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn update(&self, rule: TariffRule) -> DomainResult<()> {
        if !self.rules.contains_key(&rule.id) {
            return Err(DomainError::NotFound {
                entity: "TariffRule",
                field: "id",
                value: rule.id.to_string(),
            });
        }
        rule.validate()?;
        self.check_conflicts(&rule, Some(rule.id))?;
        self.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn delete(&self, id: i32) -> DomainResult<()> {
        self.rules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::NotFound {
                entity: "TariffRule",
                field: "id",
                value: id.to_string(),
            })
    }
}
