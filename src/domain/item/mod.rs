//! Stored item aggregate

pub mod model;

pub use model::{BillableItem, ProductRef};
