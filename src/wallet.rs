//! Wallet loading

use solana_sdk::signature::{read_keypair_file, Keypair};
use solana_sdk::signer::Signer;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// A funded wallet participating in batch execution
#[derive(Debug)]
pub struct TradingWallet {
    pub keypair: Keypair,
    /// Display name derived from the keypair file
    pub name: String,
}

impl TradingWallet {
    pub fn address(&self) -> solana_sdk::pubkey::Pubkey {
        self.keypair.pubkey()
    }
}

/// Load wallets from JSON keypair files.
///
/// Unreadable files are skipped with a warning so one bad path does not
/// take the whole batch down; an empty result is still an error.
pub fn load_wallets(paths: &[String]) -> Result<Vec<TradingWallet>> {
    let mut wallets = Vec::with_capacity(paths.len());
    for path in paths {
        match read_keypair_file(path) {
            Ok(keypair) => {
                let name = std::path::Path::new(path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(path)
                    .to_string();
                info!(name, address = %keypair.pubkey(), "wallet loaded");
                wallets.push(TradingWallet { keypair, name });
            }
            Err(e) => {
                warn!(path, error = %e, "skipping unreadable keypair file");
            }
        }
    }
    if wallets.is_empty() {
        return Err(Error::InvalidKeypair(
            "no usable wallet keypairs found".to_string(),
        ));
    }
    Ok(wallets)
}
