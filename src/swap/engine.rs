//! Swap execution engine
//!
//! Drives one trade signal across a batch of wallets. Wallets are
//! processed serially to stay under RPC and quoting service rate limits;
//! one wallet failing never aborts the rest of the batch.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::swap::decimals::DecimalsCache;
use crate::swap::quote::QuoteProvider;
use crate::swap::types::{native_mint, Quote, SwapResult, TradeDirection, TradeSignal};
use crate::transport::{LedgerTransport, TransactionDetails};

/// Above this price impact the input amount is halved once and re-quoted
pub const PRICE_IMPACT_HALVING_PCT: f64 = 5.0;

/// Slippage bands keyed to quoted price impact
pub const SLIPPAGE_TIGHT_BPS: u16 = 50;
pub const SLIPPAGE_MEDIUM_BPS: u16 = 100;
pub const SLIPPAGE_LOOSE_BPS: u16 = 300;

/// Hard ceiling for the sell-side retry escalation
pub const SLIPPAGE_MAX_BPS: u16 = 1200;

/// Lamports held back for fees and rent on every trade
pub const FEE_BUFFER_LAMPORTS: u64 = 5_000_000;

/// Map quoted price impact to the slippage the swap is built with
pub fn slippage_for_impact(price_impact_pct: f64) -> u16 {
    if price_impact_pct < 0.5 {
        SLIPPAGE_TIGHT_BPS
    } else if price_impact_pct < 1.0 {
        SLIPPAGE_MEDIUM_BPS
    } else {
        SLIPPAGE_LOOSE_BPS
    }
}

pub struct SwapExecutionEngine<T: LedgerTransport, Q: QuoteProvider> {
    transport: Arc<T>,
    provider: Arc<Q>,
    decimals: Arc<DecimalsCache>,
}

impl<T: LedgerTransport, Q: QuoteProvider> SwapExecutionEngine<T, Q> {
    pub fn new(transport: Arc<T>, provider: Arc<Q>, decimals: Arc<DecimalsCache>) -> Self {
        Self {
            transport,
            provider,
            decimals,
        }
    }

    /// Execute one signal for every wallet, serially.
    ///
    /// Always returns one result per wallet, in input order.
    pub async fn execute_batch(
        &self,
        wallets: &[Keypair],
        signal: &TradeSignal,
    ) -> Vec<SwapResult> {
        let mut results = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let address = wallet.pubkey();
            let result = match self.execute_for_wallet(wallet, signal).await {
                Ok(result) => result,
                Err(error) => {
                    warn!(wallet = %address, %error, "swap failed");
                    SwapResult::failure(address, error)
                }
            };
            results.push(result);
        }
        results
    }

    async fn execute_for_wallet(
        &self,
        wallet: &Keypair,
        signal: &TradeSignal,
    ) -> Result<SwapResult> {
        if signal.amount == 0 {
            return Err(Error::Validation(
                "swap amount must be positive".to_string(),
            ));
        }
        let direction = signal.direction()?;
        let address = wallet.pubkey();

        let decimals = self
            .decimals
            .get_or_fetch(self.transport.as_ref(), &signal.input_mint)
            .await?;
        let base_amount = signal
            .amount
            .checked_mul(10u64.pow(decimals as u32))
            .ok_or_else(|| Error::Validation("swap amount overflows base units".to_string()))?;

        // First guard: estimated cost from the signal alone, before any
        // quote round trip is spent on a wallet that cannot afford it.
        let lamports = self.transport.get_lamport_balance(&address).await?;
        let estimated = estimated_lamport_cost(direction, base_amount);
        if lamports < estimated {
            return Err(Error::InsufficientFunds {
                required: estimated,
                available: lamports,
            });
        }

        let mut amount = base_amount;
        let mut quote = self
            .provider
            .get_quote(
                &signal.input_mint,
                &signal.output_mint,
                amount,
                SLIPPAGE_MEDIUM_BPS,
            )
            .await?;

        // Second guard: the quote's exact input requirement.
        let required = quote_required_lamports(direction, &quote);
        if lamports < required {
            return Err(Error::InsufficientFunds {
                required,
                available: lamports,
            });
        }

        // High price impact: halve the input once and re-quote. Never more
        // than once, so a thin pool cannot drive the amount to dust.
        if quote.price_impact_pct > PRICE_IMPACT_HALVING_PCT {
            amount = (amount / 2).max(1);
            warn!(
                wallet = %address,
                price_impact_pct = quote.price_impact_pct,
                halved_amount = amount,
                "price impact above threshold, halving input"
            );
            quote = self
                .provider
                .get_quote(
                    &signal.input_mint,
                    &signal.output_mint,
                    amount,
                    SLIPPAGE_MEDIUM_BPS,
                )
                .await?;
        }

        let mut slippage_bps = slippage_for_impact(quote.price_impact_pct);
        let signature = loop {
            let unsigned = self
                .provider
                .build_swap_transaction(&quote, &address, slippage_bps)
                .await?;
            let signed = VersionedTransaction::try_new(unsigned.message, &[wallet])
                .map_err(|e| Error::InvalidKeypair(e.to_string()))?;

            match self.transport.send_and_confirm(&signed).await {
                Ok(signature) => break signature,
                Err(error)
                    if error.is_slippage_exceeded()
                        && direction == TradeDirection::SellToNative
                        && slippage_bps * 2 <= SLIPPAGE_MAX_BPS =>
                {
                    // Sells must eventually land; buys are simply skipped
                    // rather than chased into a moving market.
                    slippage_bps *= 2;
                    warn!(
                        wallet = %address,
                        slippage_bps,
                        "slippage exceeded on sell, retrying with doubled tolerance"
                    );
                }
                Err(error) => return Err(error),
            }
        };

        let (output_amount, fee_lamports) = match self
            .transport
            .transaction_details(&signature)
            .await
        {
            Ok(details) => (
                reconcile_output(&details, &address, &signal.output_mint, &quote),
                Some(details.fee),
            ),
            Err(error) => {
                warn!(%signature, %error, "could not fetch confirmed transaction meta");
                (Some(quote.out_amount), None)
            }
        };

        info!(
            wallet = %address,
            %signature,
            output_amount,
            fee_lamports,
            slippage_bps,
            "swap confirmed"
        );
        Ok(SwapResult::success(
            address,
            signature,
            output_amount,
            fee_lamports,
            slippage_bps,
        ))
    }
}

fn estimated_lamport_cost(direction: TradeDirection, base_amount: u64) -> u64 {
    match direction {
        TradeDirection::BuyWithNative => base_amount.saturating_add(FEE_BUFFER_LAMPORTS),
        TradeDirection::SellToNative => FEE_BUFFER_LAMPORTS,
    }
}

fn quote_required_lamports(direction: TradeDirection, quote: &Quote) -> u64 {
    match direction {
        TradeDirection::BuyWithNative => quote.in_amount.saturating_add(FEE_BUFFER_LAMPORTS),
        TradeDirection::SellToNative => FEE_BUFFER_LAMPORTS,
    }
}

/// Derive the actual output from confirmed token balance changes.
///
/// Whenever the balance diff cannot be computed the quoted amount stands
/// in: native output never appears in token balance meta (it unwraps to
/// lamports), and some RPC providers omit balance entries entirely.
fn reconcile_output(
    details: &TransactionDetails,
    wallet: &Pubkey,
    output_mint: &Pubkey,
    quote: &Quote,
) -> Option<u64> {
    if *output_mint == native_mint() {
        return Some(quote.out_amount);
    }

    let post = match details
        .post_token_balances
        .iter()
        .find(|b| b.owner == *wallet && b.mint == *output_mint)
    {
        Some(post) => post,
        None => return Some(quote.out_amount),
    };
    let pre = details
        .pre_token_balances
        .iter()
        .find(|b| b.owner == *wallet && b.mint == *output_mint)
        .map(|b| b.amount)
        .unwrap_or(0);
    Some(post.amount.saturating_sub(pre))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProgramErrorKind;
    use crate::transport::TokenBalanceEntry;
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::signature::Signature;
    use solana_sdk::system_instruction;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const SOL: u64 = 1_000_000_000;

    struct MockTransport {
        lamports: u64,
        mint_decimals: u8,
        send_results: Mutex<VecDeque<Result<Signature>>>,
        sends: AtomicUsize,
        details: TransactionDetails,
    }

    impl MockTransport {
        fn new(lamports: u64) -> Self {
            Self {
                lamports,
                mint_decimals: 9,
                send_results: Mutex::new(VecDeque::new()),
                sends: AtomicUsize::new(0),
                details: TransactionDetails::default(),
            }
        }

        fn queue_send(&self, result: Result<Signature>) {
            self.send_results.lock().unwrap().push_back(result);
        }

        fn send_count(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LedgerTransport for MockTransport {
        async fn get_account_data(&self, _address: &Pubkey) -> Result<Option<Vec<u8>>> {
            // SPL mint layout, decimals at offset 44
            let mut data = vec![0u8; 82];
            data[44] = self.mint_decimals;
            Ok(Some(data))
        }

        async fn get_lamport_balance(&self, _address: &Pubkey) -> Result<u64> {
            Ok(self.lamports)
        }

        async fn get_token_balance(&self, _token_account: &Pubkey) -> Result<Option<u64>> {
            Ok(None)
        }

        async fn latest_blockhash(&self) -> Result<Hash> {
            Ok(Hash::default())
        }

        async fn send_and_confirm(&self, _tx: &VersionedTransaction) -> Result<Signature> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.send_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Signature::new_unique()))
        }

        async fn transaction_details(&self, _sig: &Signature) -> Result<TransactionDetails> {
            Ok(self.details.clone())
        }
    }

    struct MockQuoteProvider {
        out_amount: u64,
        price_impact_pct: f64,
        /// Extra input the route demands on top of the requested amount
        in_amount_premium: u64,
        quote_amounts: Mutex<Vec<u64>>,
        build_slippages: Mutex<Vec<u16>>,
    }

    impl MockQuoteProvider {
        fn new(out_amount: u64, price_impact_pct: f64) -> Self {
            Self {
                out_amount,
                price_impact_pct,
                in_amount_premium: 0,
                quote_amounts: Mutex::new(Vec::new()),
                build_slippages: Mutex::new(Vec::new()),
            }
        }

        fn with_premium(mut self, premium: u64) -> Self {
            self.in_amount_premium = premium;
            self
        }

        fn quote_calls(&self) -> Vec<u64> {
            self.quote_amounts.lock().unwrap().clone()
        }

        fn build_calls(&self) -> Vec<u16> {
            self.build_slippages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QuoteProvider for MockQuoteProvider {
        async fn get_quote(
            &self,
            input_mint: &Pubkey,
            output_mint: &Pubkey,
            amount: u64,
            slippage_bps: u16,
        ) -> Result<Quote> {
            self.quote_amounts.lock().unwrap().push(amount);
            Ok(Quote {
                input_mint: *input_mint,
                output_mint: *output_mint,
                in_amount: amount + self.in_amount_premium,
                out_amount: self.out_amount,
                min_out_amount: self.out_amount,
                price_impact_pct: self.price_impact_pct,
                slippage_bps,
                route: serde_json::json!({}),
            })
        }

        async fn build_swap_transaction(
            &self,
            _quote: &Quote,
            user_public_key: &Pubkey,
            slippage_bps: u16,
        ) -> Result<VersionedTransaction> {
            self.build_slippages.lock().unwrap().push(slippage_bps);
            let instruction =
                system_instruction::transfer(user_public_key, user_public_key, 1);
            let message = Message::new(&[instruction], Some(user_public_key));
            Ok(VersionedTransaction {
                signatures: vec![Default::default()],
                message: VersionedMessage::Legacy(message),
            })
        }
    }

    fn engine(
        transport: Arc<MockTransport>,
        provider: Arc<MockQuoteProvider>,
    ) -> SwapExecutionEngine<MockTransport, MockQuoteProvider> {
        SwapExecutionEngine::new(transport, provider, DecimalsCache::new())
    }

    fn buy_signal(amount: u64) -> TradeSignal {
        TradeSignal {
            input_mint: native_mint(),
            output_mint: Pubkey::new_unique(),
            amount,
        }
    }

    fn sell_signal(amount: u64) -> TradeSignal {
        TradeSignal {
            input_mint: Pubkey::new_unique(),
            output_mint: native_mint(),
            amount,
        }
    }

    #[tokio::test]
    async fn test_zero_amount_fails_before_quoting() {
        let transport = Arc::new(MockTransport::new(10 * SOL));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport, provider.clone());

        let results = engine.execute_batch(&[Keypair::new()], &buy_signal(0)).await;
        assert!(!results[0].success);
        assert!(matches!(results[0].error, Some(Error::Validation(_))));
        assert!(provider.quote_calls().is_empty());
    }

    #[tokio::test]
    async fn test_token_to_token_is_rejected() {
        let transport = Arc::new(MockTransport::new(10 * SOL));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport, provider);

        let signal = TradeSignal {
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            amount: 1,
        };
        let results = engine.execute_batch(&[Keypair::new()], &signal).await;
        assert!(matches!(results[0].error, Some(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_insufficient_balance_skips_quote() {
        // 1 SOL buy needs amount + fee buffer; wallet only has 0.5 SOL
        let transport = Arc::new(MockTransport::new(SOL / 2));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport.clone(), provider.clone());

        let results = engine.execute_batch(&[Keypair::new()], &buy_signal(1)).await;
        assert!(matches!(
            results[0].error,
            Some(Error::InsufficientFunds { .. })
        ));
        assert!(provider.quote_calls().is_empty());
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_quote_guard_catches_fee_shortfall() {
        // Passes the coarse check but the routed quote needs more input
        let transport = Arc::new(MockTransport::new(SOL + FEE_BUFFER_LAMPORTS));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1).with_premium(1));
        let engine = engine(transport.clone(), provider.clone());

        let results = engine.execute_batch(&[Keypair::new()], &buy_signal(1)).await;
        assert!(matches!(
            results[0].error,
            Some(Error::InsufficientFunds { .. })
        ));
        assert_eq!(provider.quote_calls().len(), 1);
        assert!(provider.build_calls().is_empty());
    }

    #[tokio::test]
    async fn test_high_price_impact_halves_input_once() {
        let transport = Arc::new(MockTransport::new(100 * SOL));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 6.0));
        let engine = engine(transport, provider.clone());

        let results = engine.execute_batch(&[Keypair::new()], &buy_signal(2)).await;
        assert!(results[0].success);

        let calls = provider.quote_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], 2 * SOL);
        assert_eq!(calls[1], SOL);
        // Impact stays high on the re-quote but the halving never repeats
        assert_eq!(provider.build_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_moderate_price_impact_keeps_input() {
        let transport = Arc::new(MockTransport::new(100 * SOL));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 3.0));
        let engine = engine(transport, provider.clone());

        let results = engine.execute_batch(&[Keypair::new()], &buy_signal(2)).await;
        assert!(results[0].success);
        assert_eq!(provider.quote_calls(), vec![2 * SOL]);
        // 3% impact lands in the loose band
        assert_eq!(provider.build_calls(), vec![SLIPPAGE_LOOSE_BPS]);
    }

    #[tokio::test]
    async fn test_sell_retries_slippage_with_doubled_tolerance() {
        let transport = Arc::new(MockTransport::new(10 * SOL));
        transport.queue_send(Err(Error::Program(ProgramErrorKind::SlippageExceeded)));
        transport.queue_send(Ok(Signature::new_unique()));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport.clone(), provider.clone());

        let results = engine.execute_batch(&[Keypair::new()], &sell_signal(5)).await;
        assert!(results[0].success);
        assert_eq!(transport.send_count(), 2);
        assert_eq!(
            provider.build_calls(),
            vec![SLIPPAGE_TIGHT_BPS, SLIPPAGE_TIGHT_BPS * 2]
        );
        assert_eq!(results[0].slippage_bps, Some(SLIPPAGE_TIGHT_BPS * 2));
    }

    #[tokio::test]
    async fn test_sell_retry_stops_at_ceiling() {
        let transport = Arc::new(MockTransport::new(10 * SOL));
        // 50 -> 100 -> 200 -> 400 -> 800, then 1600 would breach the cap
        for _ in 0..6 {
            transport.queue_send(Err(Error::Program(ProgramErrorKind::SlippageExceeded)));
        }
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport.clone(), provider.clone());

        let results = engine.execute_batch(&[Keypair::new()], &sell_signal(5)).await;
        assert!(!results[0].success);
        assert!(matches!(
            results[0].error,
            Some(Error::Program(ProgramErrorKind::SlippageExceeded))
        ));
        assert_eq!(provider.build_calls(), vec![50, 100, 200, 400, 800]);
    }

    #[tokio::test]
    async fn test_buy_slippage_failure_is_not_retried() {
        let transport = Arc::new(MockTransport::new(10 * SOL));
        transport.queue_send(Err(Error::Program(ProgramErrorKind::SlippageExceeded)));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport.clone(), provider);

        let results = engine.execute_batch(&[Keypair::new()], &buy_signal(1)).await;
        assert!(!results[0].success);
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test]
    async fn test_output_reconciled_from_balance_diff() {
        let wallet = Keypair::new();
        let signal = buy_signal(1);

        let mut transport = MockTransport::new(10 * SOL);
        transport.details = TransactionDetails {
            fee: 7_500,
            pre_token_balances: vec![TokenBalanceEntry {
                mint: signal.output_mint,
                owner: wallet.pubkey(),
                amount: 250,
            }],
            post_token_balances: vec![TokenBalanceEntry {
                mint: signal.output_mint,
                owner: wallet.pubkey(),
                amount: 1_250,
            }],
        };
        let provider = Arc::new(MockQuoteProvider::new(999, 0.1));
        let engine = engine(Arc::new(transport), provider);

        let results = engine.execute_batch(&[wallet], &signal).await;
        assert!(results[0].success);
        assert_eq!(results[0].output_amount, Some(1_000));
        assert_eq!(results[0].fee_lamports, Some(7_500));
    }

    #[tokio::test]
    async fn test_missing_balance_meta_falls_back_to_quote() {
        // Finalized meta with no token balance entries at all; the quoted
        // amount stands in for the diff
        let transport = Arc::new(MockTransport::new(10 * SOL));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport, provider);

        let results = engine.execute_batch(&[Keypair::new()], &buy_signal(1)).await;
        assert!(results[0].success);
        assert_eq!(results[0].output_amount, Some(1_000));
    }

    #[tokio::test]
    async fn test_native_output_falls_back_to_quote() {
        let transport = Arc::new(MockTransport::new(10 * SOL));
        let provider = Arc::new(MockQuoteProvider::new(123_456, 0.1));
        let engine = engine(transport, provider);

        let results = engine.execute_batch(&[Keypair::new()], &sell_signal(5)).await;
        assert!(results[0].success);
        assert_eq!(results[0].output_amount, Some(123_456));
    }

    #[tokio::test]
    async fn test_batch_continues_after_wallet_failure() {
        let transport = Arc::new(MockTransport::new(10 * SOL));
        transport.queue_send(Err(Error::Network("rpc down".to_string())));
        transport.queue_send(Ok(Signature::new_unique()));
        let provider = Arc::new(MockQuoteProvider::new(1_000, 0.1));
        let engine = engine(transport, provider);

        let wallets = [Keypair::new(), Keypair::new()];
        let results = engine.execute_batch(&wallets, &buy_signal(1)).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(results[0].wallet, wallets[0].pubkey());
        assert_eq!(results[1].wallet, wallets[1].pubkey());
    }

    #[test]
    fn test_slippage_bands() {
        assert_eq!(slippage_for_impact(0.0), SLIPPAGE_TIGHT_BPS);
        assert_eq!(slippage_for_impact(0.49), SLIPPAGE_TIGHT_BPS);
        assert_eq!(slippage_for_impact(0.5), SLIPPAGE_MEDIUM_BPS);
        assert_eq!(slippage_for_impact(0.99), SLIPPAGE_MEDIUM_BPS);
        assert_eq!(slippage_for_impact(1.0), SLIPPAGE_LOOSE_BPS);
        assert_eq!(slippage_for_impact(50.0), SLIPPAGE_LOOSE_BPS);
    }
}
