//! Quote collection for the stock watcher.
//!
//! - `source` - the `PriceSource` trait the analysis cycle consumes
//! - `finnhub` - REST client for the Finnhub quote endpoint
//! - `error` - `FeedError`, every variant of which means "no data"

pub mod error;
pub mod finnhub;
pub mod source;

pub use error::*;
pub use finnhub::{observation_from_quote, FinnhubClient, QuoteResponse};
pub use source::PriceSource;
