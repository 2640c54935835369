//! High-level client for the token economy program
//!
//! All operations pre-flight against decoded on-chain state before
//! submitting, so transactions that are certain to be rejected (daily cap
//! reached, PIN mismatch, repeat unlock) never waste a network round trip.
//! The on-chain program remains the final authority for every rule.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use std::sync::Arc;
use tracing::{debug, info};

use crate::economy::accounts::{ConnectionAccount, UserAccount};
use crate::economy::instruction::InstructionData;
use crate::economy::pda;
use crate::economy::program::{to_base_units, DAILY_ME_LIMIT, TOKEN_DECIMALS};
use crate::error::{Error, ProgramErrorKind, Result};
use crate::transport::LedgerTransport;

/// Maximum identifier length accepted by the program
pub const MAX_ID_LEN: usize = 64;

/// Outcome of `initialize_user`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitializeOutcome {
    Initialized { signature: Signature },
    /// The derived user account already exists; no transaction was sent
    AlreadyInitialized,
}

/// Outcome of `mint_daily`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintOutcome {
    pub signature: Signature,
    /// Whole tokens expected to be minted, per the pre-flight quota check
    pub minted: u64,
}

/// Outcome of `unlock_connection`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked {
        signature: Signature,
        /// True when this unlock completed the connection
        both_unlocked: bool,
        /// The reward is issued exactly once, on the transition into
        /// both-unlocked
        reward_issued: bool,
    },
    /// This party already unlocked; nothing was submitted
    AlreadyUnlocked,
}

/// Decoded per-user balances and counters
#[derive(Debug, Clone, PartialEq)]
pub struct UserBalances {
    pub user_id: String,
    /// ME balance in whole tokens
    pub me_balance: f64,
    /// MEMO balance in whole tokens
    pub memo_balance: f64,
    /// Whole ME tokens still mintable today
    pub daily_quota_remaining: u64,
    pub total_me_minted: u64,
    pub total_me_locked: u64,
    pub total_memo_earned: u64,
    pub connections_count: u64,
}

/// Whole tokens still mintable before the daily cap.
///
/// The counter resets at the UTC midnight boundary, not on a rolling 24h
/// window: a mint recorded yesterday leaves the full cap available today.
pub fn remaining_daily_quota(account: &UserAccount, now: DateTime<Utc>) -> u64 {
    match DateTime::<Utc>::from_timestamp(account.last_mint_time, 0) {
        Some(last) if last.date_naive() == now.date_naive() => {
            DAILY_ME_LIMIT.saturating_sub(account.daily_minted_today)
        }
        _ => DAILY_ME_LIMIT,
    }
}

/// Hash a 4-digit PIN the way the on-chain program does.
///
/// Plaintext PINs never leave this function as anything but a digest.
pub fn hash_pin(pin: &str) -> Result<[u8; 32]> {
    if pin.len() != 4 || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Validation(
            "PIN must be exactly 4 digits".to_string(),
        ));
    }
    Ok(Sha256::digest(pin.as_bytes()).into())
}

fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", kind)));
    }
    if id.len() > MAX_ID_LEN {
        return Err(Error::Validation(format!(
            "{} exceeds {} bytes: {}",
            kind,
            MAX_ID_LEN,
            id.len()
        )));
    }
    Ok(())
}

pub struct TokenEconomyClient<T: LedgerTransport> {
    transport: Arc<T>,
    program_id: Pubkey,
}

impl<T: LedgerTransport> TokenEconomyClient<T> {
    pub fn new(transport: Arc<T>, program_id: Pubkey) -> Self {
        Self {
            transport,
            program_id,
        }
    }

    /// Admin bootstrap: create the global state, MEMO mint and ME escrow
    pub async fn initialize_global(&self, admin: &Keypair) -> Result<Signature> {
        let (global_state, _) = pda::global_state(&self.program_id);
        let (memo_mint, _) = pda::memo_mint(&self.program_id);
        let (me_escrow, _) = pda::me_escrow(&self.program_id);

        let data = InstructionData::new("initialize_global").into_bytes();
        let accounts = vec![
            AccountMeta::new(global_state, false),
            AccountMeta::new(memo_mint, false),
            AccountMeta::new(me_escrow, false),
            AccountMeta::new(admin.pubkey(), true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(solana_sdk::sysvar::rent::ID, false),
        ];

        let signature = self.submit(admin, data, accounts).await?;
        info!(%signature, "global state initialized");
        Ok(signature)
    }

    /// Create a user account, personal ME mint and both token accounts.
    ///
    /// Idempotent: if the derived user account already exists on-chain, no
    /// transaction is sent.
    pub async fn initialize_user(
        &self,
        payer: &Keypair,
        user_id: &str,
    ) -> Result<InitializeOutcome> {
        validate_id("user id", user_id)?;

        let user_id_hash = pda::hash_user_id(user_id);
        let (user_account, _) = pda::user_account(&self.program_id, &user_id_hash);

        if self.transport.get_account_data(&user_account).await?.is_some() {
            debug!(user_id, %user_account, "user account already exists");
            return Ok(InitializeOutcome::AlreadyInitialized);
        }

        let (me_mint, _) = pda::me_mint(&self.program_id, &user_id_hash);
        let (global_state, _) = pda::global_state(&self.program_id);
        let (memo_mint, _) = pda::memo_mint(&self.program_id);
        let user_me_ata = pda::associated_token_address(&payer.pubkey(), &me_mint);
        let user_memo_ata = pda::associated_token_address(&payer.pubkey(), &memo_mint);

        let data = InstructionData::new("initialize_user")
            .push_str(user_id)
            .push_bytes32(&user_id_hash)
            .into_bytes();

        // Order matters! Must match the program's declared account context.
        let accounts = vec![
            AccountMeta::new(user_account, false),
            AccountMeta::new(me_mint, false),
            AccountMeta::new(user_me_ata, false),
            AccountMeta::new(user_memo_ata, false),
            AccountMeta::new_readonly(global_state, false),
            AccountMeta::new_readonly(memo_mint, false),
            AccountMeta::new(payer.pubkey(), true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(spl_associated_token_account::ID, false),
            AccountMeta::new_readonly(solana_sdk::sysvar::rent::ID, false),
        ];

        let signature = self.submit(payer, data, accounts).await?;
        info!(user_id, %signature, "user initialized");
        Ok(InitializeOutcome::Initialized { signature })
    }

    /// Mint today's ME allotment, up to the daily cap.
    ///
    /// Pre-flights against the on-chain counter so an attempt that is
    /// certain to exceed the cap never reaches the network.
    pub async fn mint_daily(&self, payer: &Keypair, user_id: &str) -> Result<MintOutcome> {
        validate_id("user id", user_id)?;

        let user_id_hash = pda::hash_user_id(user_id);
        let account = self.fetch_user_account(&user_id_hash).await?;

        let quota = remaining_daily_quota(&account, Utc::now());
        if quota == 0 {
            return Err(Error::Program(ProgramErrorKind::DailyLimitReached));
        }

        let (user_account, _) = pda::user_account(&self.program_id, &user_id_hash);
        let (me_mint, _) = pda::me_mint(&self.program_id, &user_id_hash);
        let user_me_ata = pda::associated_token_address(&payer.pubkey(), &me_mint);

        let data = InstructionData::new("mint_daily_me")
            .push_str(user_id)
            .push_bytes32(&user_id_hash)
            .into_bytes();

        let accounts = vec![
            AccountMeta::new(user_account, false),
            AccountMeta::new(me_mint, false),
            AccountMeta::new(user_me_ata, false),
            AccountMeta::new_readonly(payer.pubkey(), true),
            AccountMeta::new_readonly(spl_token::ID, false),
        ];

        let signature = self.submit(payer, data, accounts).await?;
        info!(user_id, minted = quota, %signature, "daily ME minted");
        Ok(MintOutcome {
            signature,
            minted: quota,
        })
    }

    /// Lock ME in escrow and receive MEMO at the fixed 1:1 ratio
    pub async fn lock_for_conversion(
        &self,
        payer: &Keypair,
        user_id: &str,
        amount: u64,
    ) -> Result<Signature> {
        validate_id("user id", user_id)?;
        if amount == 0 {
            return Err(Error::Validation(
                "lock amount must be a positive whole number".to_string(),
            ));
        }

        let user_id_hash = pda::hash_user_id(user_id);
        let account = self.fetch_user_account(&user_id_hash).await?;

        let (me_mint, _) = pda::me_mint(&self.program_id, &user_id_hash);
        let user_me_ata = pda::associated_token_address(&payer.pubkey(), &me_mint);

        let required = to_base_units(amount);
        let available = self
            .transport
            .get_token_balance(&user_me_ata)
            .await?
            .unwrap_or(0);
        if available < required {
            return Err(Error::InsufficientFunds {
                required,
                available,
            });
        }

        let (user_account, _) = pda::user_account(&self.program_id, &user_id_hash);
        let (global_state, _) = pda::global_state(&self.program_id);
        let (memo_mint, _) = pda::memo_mint(&self.program_id);
        let (me_escrow, _) = pda::me_escrow(&self.program_id);
        let user_memo_ata = pda::associated_token_address(&payer.pubkey(), &memo_mint);

        let data = InstructionData::new("lock_me_for_memo")
            .push_u64(amount)
            .into_bytes();

        let accounts = vec![
            AccountMeta::new(user_account, false),
            AccountMeta::new(user_me_ata, false),
            AccountMeta::new(user_memo_ata, false),
            AccountMeta::new_readonly(global_state, false),
            AccountMeta::new(memo_mint, false),
            AccountMeta::new(me_escrow, false),
            AccountMeta::new_readonly(account.me_mint, false),
            AccountMeta::new_readonly(payer.pubkey(), true),
            AccountMeta::new_readonly(spl_token::ID, false),
        ];

        let signature = self.submit(payer, data, accounts).await?;
        info!(user_id, amount, %signature, "ME locked for MEMO");
        Ok(signature)
    }

    /// Atomically create a connection between two users.
    ///
    /// PINs are hashed locally; plaintext is never stored or resent.
    pub async fn create_connection(
        &self,
        payer: &Keypair,
        connection_id: &str,
        user_a_id: &str,
        user_b_id: &str,
        pin_a: &str,
        pin_b: &str,
    ) -> Result<Signature> {
        validate_id("connection id", connection_id)?;
        validate_id("user id", user_a_id)?;
        validate_id("user id", user_b_id)?;
        if user_a_id == user_b_id {
            return Err(Error::Validation(
                "cannot create a connection between a user and themselves".to_string(),
            ));
        }
        let pin_a_hash = hash_pin(pin_a)?;
        let pin_b_hash = hash_pin(pin_b)?;

        let (connection, _) = pda::connection(&self.program_id, connection_id);
        if self.transport.get_account_data(&connection).await?.is_some() {
            return Err(Error::Validation(format!(
                "connection id '{}' already in use",
                connection_id
            )));
        }

        let (user_a, _) =
            pda::user_account(&self.program_id, &pda::hash_user_id(user_a_id));
        let (user_b, _) =
            pda::user_account(&self.program_id, &pda::hash_user_id(user_b_id));
        let (global_state, _) = pda::global_state(&self.program_id);

        let data = InstructionData::new("create_connection")
            .push_str(connection_id)
            .push_str(user_a_id)
            .push_str(user_b_id)
            .push_bytes32(&pin_a_hash)
            .push_bytes32(&pin_b_hash)
            .into_bytes();

        let accounts = vec![
            AccountMeta::new(connection, false),
            AccountMeta::new(user_a, false),
            AccountMeta::new(user_b, false),
            AccountMeta::new(global_state, false),
            AccountMeta::new(payer.pubkey(), true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ];

        let signature = self.submit(payer, data, accounts).await?;
        info!(connection_id, %signature, "connection created");
        Ok(signature)
    }

    /// Unlock one party's side of a connection.
    ///
    /// Two-phase state machine: each party unlocks with the counterparty's
    /// PIN; the MEMO reward is issued exactly once, when the second unlock
    /// transitions the connection to both-unlocked. A repeat attempt is a
    /// local no-op.
    pub async fn unlock_connection(
        &self,
        payer: &Keypair,
        connection_id: &str,
        user_id: &str,
        pin: &str,
    ) -> Result<UnlockOutcome> {
        validate_id("connection id", connection_id)?;
        validate_id("user id", user_id)?;
        let pin_hash = hash_pin(pin)?;

        let (connection_address, _) = pda::connection(&self.program_id, connection_id);
        let data = self
            .transport
            .get_account_data(&connection_address)
            .await?
            .ok_or_else(|| {
                Error::Validation(format!("connection '{}' does not exist", connection_id))
            })?;
        let connection = ConnectionAccount::decode(&data)?;

        let user_id_hash = pda::hash_user_id(user_id);
        let (user_account, _) = pda::user_account(&self.program_id, &user_id_hash);

        let is_user_a = user_account == connection.user_a;
        let is_user_b = user_account == connection.user_b;
        if !is_user_a && !is_user_b {
            return Err(Error::Program(ProgramErrorKind::UnauthorizedUser));
        }

        // Each party proves they met the other by presenting the
        // counterparty's PIN.
        let (already_unlocked, expected_hash, other_unlocked) = if is_user_a {
            (
                connection.user_a_unlocked,
                connection.pin_b_hash,
                connection.user_b_unlocked,
            )
        } else {
            (
                connection.user_b_unlocked,
                connection.pin_a_hash,
                connection.user_a_unlocked,
            )
        };

        if already_unlocked {
            debug!(connection_id, user_id, "party already unlocked, skipping");
            return Ok(UnlockOutcome::AlreadyUnlocked);
        }
        if pin_hash != expected_hash {
            return Err(Error::Program(ProgramErrorKind::InvalidPin));
        }

        let (global_state, _) = pda::global_state(&self.program_id);
        let (memo_mint, _) = pda::memo_mint(&self.program_id);
        let user_memo_ata = pda::associated_token_address(&payer.pubkey(), &memo_mint);

        // The program takes the raw 4-byte PIN and hashes it on-chain.
        let data = InstructionData::new("unlock_connection")
            .push_bytes(pin.as_bytes())
            .into_bytes();

        let accounts = vec![
            AccountMeta::new(connection_address, false),
            AccountMeta::new(user_account, false),
            AccountMeta::new(user_memo_ata, false),
            AccountMeta::new_readonly(global_state, false),
            AccountMeta::new(memo_mint, false),
            AccountMeta::new_readonly(payer.pubkey(), true),
            AccountMeta::new_readonly(spl_token::ID, false),
        ];

        let signature = self.submit(payer, data, accounts).await?;
        let both_unlocked = other_unlocked;
        info!(
            connection_id,
            user_id,
            both_unlocked,
            %signature,
            "connection unlocked"
        );
        Ok(UnlockOutcome::Unlocked {
            signature,
            both_unlocked,
            reward_issued: both_unlocked,
        })
    }

    /// Read a user's on-chain state and token balances.
    ///
    /// Returns `Ok(None)` when the user account does not exist - callers
    /// must distinguish "not yet initialized" from "zero balance". Any other
    /// decode failure is a hard error: it means the schema drifted.
    pub async fn get_user_balances(
        &self,
        user_id: &str,
        wallet: &Pubkey,
    ) -> Result<Option<UserBalances>> {
        validate_id("user id", user_id)?;

        let user_id_hash = pda::hash_user_id(user_id);
        let (user_account, _) = pda::user_account(&self.program_id, &user_id_hash);

        let data = match self.transport.get_account_data(&user_account).await? {
            Some(data) => data,
            None => return Ok(None),
        };
        let account = UserAccount::decode(&data)?;

        let (me_mint, _) = pda::me_mint(&self.program_id, &user_id_hash);
        let (memo_mint, _) = pda::memo_mint(&self.program_id);
        let me_ata = pda::associated_token_address(wallet, &me_mint);
        let memo_ata = pda::associated_token_address(wallet, &memo_mint);

        let me_base = self.transport.get_token_balance(&me_ata).await?.unwrap_or(0);
        let memo_base = self
            .transport
            .get_token_balance(&memo_ata)
            .await?
            .unwrap_or(0);

        let scale = 10f64.powi(TOKEN_DECIMALS as i32);
        Ok(Some(UserBalances {
            user_id: account.user_id.clone(),
            me_balance: me_base as f64 / scale,
            memo_balance: memo_base as f64 / scale,
            daily_quota_remaining: remaining_daily_quota(&account, Utc::now()),
            total_me_minted: account.total_me_minted,
            total_me_locked: account.total_me_locked,
            total_memo_earned: account.total_memo_earned,
            connections_count: account.connections_count,
        }))
    }

    async fn fetch_user_account(&self, user_id_hash: &[u8; 32]) -> Result<UserAccount> {
        let (address, _) = pda::user_account(&self.program_id, user_id_hash);
        let data = self
            .transport
            .get_account_data(&address)
            .await?
            .ok_or_else(|| Error::Validation("user is not initialized".to_string()))?;
        UserAccount::decode(&data)
    }

    async fn submit(
        &self,
        payer: &Keypair,
        data: Vec<u8>,
        accounts: Vec<AccountMeta>,
    ) -> Result<Signature> {
        let instruction = Instruction {
            program_id: self.program_id,
            accounts,
            data,
        };
        let blockhash = self.transport.latest_blockhash().await?;
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&payer.pubkey()),
            &[payer],
            blockhash,
        );
        self.transport
            .send_and_confirm(&VersionedTransaction::from(transaction))
            .await
    }
}
