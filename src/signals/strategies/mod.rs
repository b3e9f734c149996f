pub mod rsi_reversion;
pub mod sma_cross;

pub use rsi_reversion::RsiReversionStrategy;
pub use sma_cross::SmaCrossStrategy;
