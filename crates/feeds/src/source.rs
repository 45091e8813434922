//! Price source abstraction.

use crate::FeedError;
use async_trait::async_trait;
use stockwatch_core::{PriceObservation, Symbol};

/// A provider of current quotes for single symbols.
///
/// Implementations never return partial data: either a complete
/// observation or a `FeedError` describing why there is none.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current observation for a symbol.
    async fn fetch_observation(&self, symbol: &Symbol) -> Result<PriceObservation, FeedError>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}
