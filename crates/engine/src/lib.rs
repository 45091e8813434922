//! Drop-detection engine.
//!
//! This crate runs the analysis cycle over the watchlist: it pulls quotes
//! from a `PriceSource`, persists them, and hands drops past the threshold
//! to an `AlertNotifier`. At most one cycle runs at a time.

pub mod analyzer;
pub mod guard;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use analyzer::*;
pub use guard::{RunGuard, SingleFlight};
