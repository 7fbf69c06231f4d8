//! Quote payload sent to connected clients

use serde::{Deserialize, Serialize};

/// A single synthetic price tick
///
/// Serialized as a flat JSON object, e.g. `{"symbol":"MSFT","price":0}`.
/// Built fresh for every broadcast and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTick {
    /// Instrument symbol
    pub symbol: String,
    /// Current price in the demo's unitless counter
    pub price: u64,
}

impl QuoteTick {
    /// Create a new quote tick
    pub fn new(symbol: impl Into<String>, price: u64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}
