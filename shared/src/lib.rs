//! Shared types and computations for the AquaCrop irrigation engine
//!
//! This crate contains the domain model and the deterministic soil water
//! balance used by the backend engine and by the browser client (via WASM).

pub mod models;
pub mod types;
pub mod validation;
pub mod water_balance;

pub use models::*;
pub use types::*;
pub use validation::*;
pub use water_balance::*;
