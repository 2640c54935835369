//! Core types for the swap pipeline

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::error::{Error, Result};

/// The native SOL wrapper mint
pub fn native_mint() -> Pubkey {
    spl_token::native_mint::ID
}

/// Which side of the trade holds the native token.
///
/// Token-to-token routing is not supported; the quoting service is only
/// used with one native leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    BuyWithNative,
    SellToNative,
}

/// A request to swap `amount` whole units of `input_mint` into `output_mint`
#[derive(Debug, Clone)]
pub struct TradeSignal {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Whole tokens of the input mint
    pub amount: u64,
}

impl TradeSignal {
    pub fn direction(&self) -> Result<TradeDirection> {
        let native = native_mint();
        match (self.input_mint == native, self.output_mint == native) {
            (true, false) => Ok(TradeDirection::BuyWithNative),
            (false, true) => Ok(TradeDirection::SellToNative),
            _ => Err(Error::Unsupported(
                "one side of a swap must be the native mint".to_string(),
            )),
        }
    }
}

/// A quote from the routing service.
///
/// `route` carries the provider's full response verbatim; it is passed
/// back unmodified when requesting the swap transaction.
#[derive(Debug, Clone)]
pub struct Quote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Base units of the input mint
    pub in_amount: u64,
    /// Expected base units of the output mint
    pub out_amount: u64,
    /// Minimum acceptable output after slippage
    pub min_out_amount: u64,
    /// Estimated price impact, percent
    pub price_impact_pct: f64,
    pub slippage_bps: u16,
    pub route: serde_json::Value,
}

/// Per-wallet result of a batch execution
#[derive(Debug)]
pub struct SwapResult {
    pub wallet: Pubkey,
    pub success: bool,
    pub signature: Option<Signature>,
    /// Base units of the output mint actually received
    pub output_amount: Option<u64>,
    /// Transaction fee actually paid
    pub fee_lamports: Option<u64>,
    /// Slippage the confirmed transaction was built with
    pub slippage_bps: Option<u16>,
    pub error: Option<Error>,
}

impl SwapResult {
    pub fn success(
        wallet: Pubkey,
        signature: Signature,
        output_amount: Option<u64>,
        fee_lamports: Option<u64>,
        slippage_bps: u16,
    ) -> Self {
        Self {
            wallet,
            success: true,
            signature: Some(signature),
            output_amount,
            fee_lamports,
            slippage_bps: Some(slippage_bps),
            error: None,
        }
    }

    pub fn failure(wallet: Pubkey, error: Error) -> Self {
        Self {
            wallet,
            success: false,
            signature: None,
            output_amount: None,
            fee_lamports: None,
            slippage_bps: None,
            error: Some(error),
        }
    }
}
