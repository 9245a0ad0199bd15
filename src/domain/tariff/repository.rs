//! Tariff rule repository interface

use async_trait::async_trait;

use super::model::TariffRule;
use crate::domain::DomainResult;

/// Persisted rule set. Edits are serialized by the backing store; readers take
/// a snapshot per billing pass.
#[async_trait]
pub trait TariffRuleRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<TariffRule>>;
    async fn find_active(&self) -> DomainResult<Vec<TariffRule>>;
    async fn find_all(&self) -> DomainResult<Vec<TariffRule>>;
    async fn save(&self, rule: TariffRule) -> DomainResult<TariffRule>;
    async fn update(&self, rule: TariffRule) -> DomainResult<()>;
    async fn delete(&self, id: i32) -> DomainResult<()>;
}
