//! Core data types for the stock watcher.

pub mod alert;
pub mod observation;
pub mod symbol;

pub use alert::*;
pub use observation::*;
pub use symbol::*;
