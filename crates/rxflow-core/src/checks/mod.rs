//! Verification checks composed by the dispensing engine.
//!
//! Each check is pure and side-effect-free over the reference store, so the
//! engine may run them in any order (or in parallel) for one order.

mod allergies;
mod dosage;
mod interactions;
mod regulatory;

pub use allergies::*;
pub use dosage::*;
pub use interactions::*;
pub use regulatory::*;
