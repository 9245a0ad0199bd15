use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// No active tariff rule applies to the item. Billing for the item must stop
    /// until a rule is configured.
    #[error("No tariff rule matches item {item} (product={product_id}, temperature={temperature:?})")]
    RuleNotFound {
        item: String,
        product_id: i32,
        temperature: Option<f64>,
    },

    #[error("Invalid temperature range on rule '{rule}': min {min} is greater than max {max}")]
    InvalidTemperatureRange { rule: String, min: f64, max: f64 },

    #[error("Item {item} is released at {end} before its check-in at {check_in}")]
    NegativeDuration {
        item: String,
        check_in: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),
}

impl DomainError {
    /// Whether the error comes from rule configuration rather than item data.
    /// These go to whoever maintains the tariff table.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DomainError::RuleNotFound { .. }
                | DomainError::InvalidTemperatureRange { .. }
                | DomainError::Conflict(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Infra(InfraError::Io(e))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::Infra(InfraError::Toml(e))
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
