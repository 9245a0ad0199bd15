//! Rule repository implementations

mod memory;

pub use memory::InMemoryTariffRuleRepository;
