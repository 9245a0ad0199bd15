//! Configuration module
//!
//! Reads `config.toml` from the user config directory
//! (`~/.config/cold-storage-billing/config.toml` on Linux) unless
//! `CS_BILLING_CONFIG` points elsewhere. Every key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::application::services::BillingOptions;
use crate::shared::errors::AppError;

pub const CONFIG_ENV_VAR: &str = "CS_BILLING_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error (or any `EnvFilter` directive)
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Billing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Currency for rules that do not name one (ISO 4217)
    pub currency: String,
    /// Decimal places amounts are rounded to
    pub amount_scale: u32,
    /// TOML file with `[[rules]]` tables
    pub rules_path: Option<PathBuf>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            amount_scale: 2,
            rules_path: None,
        }
    }
}

impl From<&BillingConfig> for BillingOptions {
    fn from(cfg: &BillingConfig) -> Self {
        BillingOptions {
            amount_scale: cfg.amount_scale,
            currency: cfg.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub billing: BillingConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `CS_BILLING_CONFIG` or the default path.
    pub fn load_default() -> Result<Self, AppError> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path());
        Self::load(&path)
    }

    /// Rule file path, resolved against the config file's directory when
    /// relative.
    pub fn rules_path(&self, config_path: &Path) -> Option<PathBuf> {
        self.billing.rules_path.as_ref().map(|p| {
            if p.is_relative() {
                config_path
                    .parent()
                    .map(|dir| dir.join(p))
                    .unwrap_or_else(|| p.clone())
            } else {
                p.clone()
            }
        })
    }
}

pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cold-storage-billing")
        .join("config.toml")
}
