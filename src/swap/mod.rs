//! Swap execution against an external quoting service
//!
//! [`engine`] drives the full pipeline: balance guards, quoting, price
//! impact handling, signing, submission with slippage retry and
//! post-confirmation reconciliation.

pub mod decimals;
pub mod engine;
pub mod quote;
pub mod types;

pub use decimals::DecimalsCache;
pub use engine::SwapExecutionEngine;
pub use quote::{HttpQuoteProvider, QuoteProvider};
pub use types::{Quote, SwapResult, TradeDirection, TradeSignal};
