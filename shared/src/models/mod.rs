//! Domain models for the AquaCrop irrigation engine

mod activity;
mod environment;
mod field;
mod irrigation;

pub use activity::*;
pub use environment::*;
pub use field::*;
pub use irrigation::*;
