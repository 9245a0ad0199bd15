//! Infrastructure layer - external concerns

pub mod rules_file;
pub mod storage;

pub use rules_file::{load_rule_file, parse_rules};
pub use storage::InMemoryTariffRuleRepository;
