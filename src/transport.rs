//! Ledger transport boundary
//!
//! The client and swap engine talk to the chain through the
//! [`LedgerTransport`] trait so tests can substitute deterministic fakes.
//! This is also the only place raw execution logs are inspected: known
//! program failures are translated into the closed
//! [`ProgramErrorKind`](crate::error::ProgramErrorKind) enum here, and
//! business logic upstream matches on variants instead of log text.

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::UiTransactionEncoding;
use std::time::Duration;

use crate::error::{Error, ProgramErrorKind, Result};

/// A wallet's balance of one mint, as recorded in transaction metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceEntry {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// Finalized transaction metadata needed for reconciliation
#[derive(Debug, Clone, Default)]
pub struct TransactionDetails {
    /// Lamports actually charged, not estimated
    pub fee: u64,
    pub pre_token_balances: Vec<TokenBalanceEntry>,
    pub post_token_balances: Vec<TokenBalanceEntry>,
}

/// Read/submit operations against the ledger
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Raw account data, or None if the account does not exist
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    /// Native balance in lamports
    async fn get_lamport_balance(&self, address: &Pubkey) -> Result<u64>;

    /// Base-unit balance of a token account, or None if it does not exist
    async fn get_token_balance(&self, token_account: &Pubkey) -> Result<Option<u64>>;

    async fn latest_blockhash(&self) -> Result<Hash>;

    /// Submit a signed transaction and block until finality
    async fn send_and_confirm(&self, transaction: &VersionedTransaction) -> Result<Signature>;

    /// Fee and balance metadata of a finalized transaction
    async fn transaction_details(&self, signature: &Signature) -> Result<TransactionDetails>;
}

/// Map known program log lines to the closed error enum.
///
/// Patterns cover the token economy program's error messages and the
/// aggregator's slippage failure. Unrecognized logs yield None and the
/// caller falls back to a generic network error.
pub fn classify_program_logs(logs: &[String]) -> Option<ProgramErrorKind> {
    for log in logs {
        // Ordering: the fully-unlocked message also mentions "unlocked",
        // so it is matched before the per-party variant.
        if log.contains("SlippageToleranceExceeded")
            || log.contains("exceeds desired slippage limit")
            || log.contains("Slippage tolerance exceeded")
        {
            return Some(ProgramErrorKind::SlippageExceeded);
        }
        if log.contains("Daily minting limit") {
            return Some(ProgramErrorKind::DailyLimitReached);
        }
        if log.contains("Invalid PIN") {
            return Some(ProgramErrorKind::InvalidPin);
        }
        if log.contains("Connection already fully unlocked") {
            return Some(ProgramErrorKind::ConnectionFullyUnlocked);
        }
        if log.contains("Already unlocked") {
            return Some(ProgramErrorKind::AlreadyUnlocked);
        }
        if log.contains("Unauthorized user") {
            return Some(ProgramErrorKind::UnauthorizedUser);
        }
        if log.contains("already in use") {
            return Some(ProgramErrorKind::AccountAlreadyInUse);
        }
        if log.contains("User ID too long") {
            return Some(ProgramErrorKind::UserIdTooLong);
        }
        if log.contains("Invalid amount") {
            return Some(ProgramErrorKind::InvalidAmount);
        }
    }
    None
}

/// RPC-backed transport over the nonblocking client
pub struct RpcTransport {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcTransport {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let commitment = CommitmentConfig::finalized();
        Self {
            client: RpcClient::new_with_timeout_and_commitment(endpoint, timeout, commitment),
            commitment,
        }
    }

    /// Translate a send failure: pull preflight simulation logs when present
    /// and classify them, otherwise surface the transport diagnostics.
    fn translate_send_error(error: ClientError) -> Error {
        if let ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(sim),
            ..
        }) = error.kind()
        {
            if let Some(logs) = &sim.logs {
                if let Some(kind) = classify_program_logs(logs) {
                    return Error::Program(kind);
                }
            }
        }
        // Fall back to matching the flattened message: confirmed-but-failed
        // transactions surface their program error in the error string.
        let message = error.to_string();
        if let Some(kind) = classify_program_logs(std::slice::from_ref(&message)) {
            return Error::Program(kind);
        }
        Error::Network(message)
    }
}

#[async_trait]
impl LedgerTransport for RpcTransport {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn get_lamport_balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self.client.get_balance(address).await?)
    }

    async fn get_token_balance(&self, token_account: &Pubkey) -> Result<Option<u64>> {
        match self.client.get_token_account_balance(token_account).await {
            Ok(balance) => {
                let amount = balance.amount.parse::<u64>().map_err(|_| {
                    Error::Codec(format!("invalid token amount: {}", balance.amount))
                })?;
                Ok(Some(amount))
            }
            // The RPC reports a missing token account as an invalid-param
            // error rather than a null response.
            Err(e) if e.to_string().contains("could not find account") => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn send_and_confirm(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        self.client
            .send_and_confirm_transaction(transaction)
            .await
            .map_err(Self::translate_send_error)
    }

    async fn transaction_details(&self, signature: &Signature) -> Result<TransactionDetails> {
        let confirmed = self
            .client
            .get_transaction(signature, UiTransactionEncoding::Json)
            .await?;

        let meta = confirmed
            .transaction
            .meta
            .ok_or_else(|| Error::Network("transaction metadata unavailable".to_string()))?;

        let convert = |balances: Option<Vec<solana_transaction_status::UiTransactionTokenBalance>>| {
            balances
                .unwrap_or_default()
                .into_iter()
                .filter_map(|b| {
                    let owner: Option<String> = b.owner.into();
                    Some(TokenBalanceEntry {
                        mint: b.mint.parse().ok()?,
                        owner: owner?.parse().ok()?,
                        amount: b.ui_token_amount.amount.parse().ok()?,
                    })
                })
                .collect()
        };

        Ok(TransactionDetails {
            fee: meta.fee,
            pre_token_balances: convert(meta.pre_token_balances.into()),
            post_token_balances: convert(meta.post_token_balances.into()),
        })
    }
}
