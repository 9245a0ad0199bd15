//! Billing results
//!
//! Contains the per-item billing outcome and partial release proration.

pub mod model;

pub use model::{BilledDuration, BillingResult, BillingStage, ReleaseCharge};
