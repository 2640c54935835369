//! Mint decimals cache
//!
//! Mint decimals are immutable on-chain, so the first fetched value wins
//! and later writers never overwrite it. The cache is an injected
//! component shared across the engine, not process-global state.

use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::LedgerTransport;

/// Offset of the decimals byte in SPL mint account data
const MINT_DECIMALS_OFFSET: usize = 44;
const MINT_MIN_LEN: usize = MINT_DECIMALS_OFFSET + 1;

#[derive(Default)]
pub struct DecimalsCache {
    entries: DashMap<Pubkey, u8>,
}

impl DecimalsCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Look up a mint's decimals, fetching from the ledger on a miss
    pub async fn get_or_fetch<T: LedgerTransport>(
        &self,
        transport: &T,
        mint: &Pubkey,
    ) -> Result<u8> {
        if let Some(decimals) = self.entries.get(mint) {
            return Ok(*decimals);
        }

        let data = transport
            .get_account_data(mint)
            .await?
            .ok_or_else(|| Error::Validation(format!("mint {} does not exist", mint)))?;
        if data.len() < MINT_MIN_LEN {
            return Err(Error::Codec(format!(
                "mint account too short: {} bytes",
                data.len()
            )));
        }
        let decimals = data[MINT_DECIMALS_OFFSET];
        debug!(%mint, decimals, "cached mint decimals");

        // First writer wins; a concurrent fetch of the same immutable value
        // is harmless.
        Ok(*self.entries.entry(*mint).or_insert(decimals))
    }

    pub fn insert(&self, mint: Pubkey, decimals: u8) {
        self.entries.entry(mint).or_insert(decimals);
    }

    pub fn get(&self, mint: &Pubkey) -> Option<u8> {
        self.entries.get(mint).map(|d| *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransactionDetails;
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::signature::Signature;
    use solana_sdk::transaction::VersionedTransaction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MintLedger {
        data: Option<Vec<u8>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl LedgerTransport for MintLedger {
        async fn get_account_data(&self, _address: &Pubkey) -> Result<Option<Vec<u8>>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.data.clone())
        }

        async fn get_lamport_balance(&self, _address: &Pubkey) -> Result<u64> {
            Ok(0)
        }

        async fn get_token_balance(&self, _token_account: &Pubkey) -> Result<Option<u64>> {
            Ok(None)
        }

        async fn latest_blockhash(&self) -> Result<Hash> {
            Ok(Hash::default())
        }

        async fn send_and_confirm(&self, _tx: &VersionedTransaction) -> Result<Signature> {
            Ok(Signature::default())
        }

        async fn transaction_details(&self, _sig: &Signature) -> Result<TransactionDetails> {
            Ok(TransactionDetails::default())
        }
    }

    fn mint_data(decimals: u8) -> Vec<u8> {
        let mut data = vec![0u8; 82];
        data[MINT_DECIMALS_OFFSET] = decimals;
        data
    }

    #[tokio::test]
    async fn test_fetches_once_then_serves_from_cache() {
        let ledger = MintLedger {
            data: Some(mint_data(6)),
            fetches: AtomicUsize::new(0),
        };
        let cache = DecimalsCache::new();
        let mint = Pubkey::new_unique();

        assert_eq!(cache.get_or_fetch(&ledger, &mint).await.unwrap(), 6);
        assert_eq!(cache.get_or_fetch(&ledger, &mint).await.unwrap(), 6);
        assert_eq!(ledger.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_write_wins() {
        let cache = DecimalsCache::new();
        let mint = Pubkey::new_unique();
        cache.insert(mint, 9);
        cache.insert(mint, 6);
        assert_eq!(cache.get(&mint), Some(9));
    }

    #[tokio::test]
    async fn test_missing_mint_is_an_error() {
        let ledger = MintLedger {
            data: None,
            fetches: AtomicUsize::new(0),
        };
        let cache = DecimalsCache::new();
        assert!(matches!(
            cache
                .get_or_fetch(&ledger, &Pubkey::new_unique())
                .await
                .unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_short_account_is_a_codec_error() {
        let ledger = MintLedger {
            data: Some(vec![0u8; 10]),
            fetches: AtomicUsize::new(0),
        };
        let cache = DecimalsCache::new();
        assert!(matches!(
            cache
                .get_or_fetch(&ledger, &Pubkey::new_unique())
                .await
                .unwrap_err(),
            Error::Codec(_)
        ));
    }
}
