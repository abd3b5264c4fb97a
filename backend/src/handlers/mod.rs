//! HTTP handlers

pub mod activity;
pub mod environment;
pub mod feed;
pub mod fields;
pub mod health;
pub mod schedule;
pub mod session;

pub use activity::*;
pub use environment::*;
pub use feed::*;
pub use fields::*;
pub use health::*;
pub use schedule::*;
pub use session::*;
