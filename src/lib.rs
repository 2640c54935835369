//! Memonet - off-chain client for the ME/MEMO token economy
//!
//! Drives a custom Anchor program (user onboarding, daily minting, escrow
//! conversion, pairwise connections) and executes swaps through an
//! external quoting service.

pub mod cli;
pub mod config;
pub mod economy;
pub mod error;
pub mod swap;
pub mod transport;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
