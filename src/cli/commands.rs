//! CLI command implementations

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::economy::client::{InitializeOutcome, TokenEconomyClient, UnlockOutcome};
use crate::swap::decimals::DecimalsCache;
use crate::swap::engine::SwapExecutionEngine;
use crate::swap::quote::HttpQuoteProvider;
use crate::swap::types::TradeSignal;
use crate::transport::RpcTransport;
use crate::wallet::{load_wallets, TradingWallet};

fn transport(config: &Config) -> Arc<RpcTransport> {
    Arc::new(RpcTransport::new(
        config.rpc.endpoint.clone(),
        Duration::from_millis(config.rpc.timeout_ms),
    ))
}

fn economy_client(config: &Config) -> TokenEconomyClient<RpcTransport> {
    TokenEconomyClient::new(transport(config), config.program_id())
}

fn wallets(config: &Config) -> Result<Vec<TradingWallet>> {
    Ok(load_wallets(&config.wallets.keypair_paths)?)
}

fn payer(config: &Config, index: usize) -> Result<TradingWallet> {
    let mut loaded = wallets(config)?;
    if index >= loaded.len() {
        anyhow::bail!(
            "wallet index {} out of range ({} configured)",
            index,
            loaded.len()
        );
    }
    Ok(loaded.swap_remove(index))
}

/// Bootstrap the program's global state (admin only)
pub async fn init_global(config: &Config, wallet: usize) -> Result<()> {
    let payer = payer(config, wallet)?;
    let signature = economy_client(config)
        .initialize_global(&payer.keypair)
        .await?;
    println!("Global state initialized: {}", signature);
    Ok(())
}

/// Create a user account and mint the initial ME allotment
pub async fn init_user(config: &Config, user_id: &str, wallet: usize) -> Result<()> {
    let payer = payer(config, wallet)?;
    match economy_client(config)
        .initialize_user(&payer.keypair, user_id)
        .await?
    {
        InitializeOutcome::Initialized { signature } => {
            println!("User '{}' initialized: {}", user_id, signature);
        }
        InitializeOutcome::AlreadyInitialized => {
            println!("User '{}' already initialized, nothing to do", user_id);
        }
    }
    Ok(())
}

/// Mint today's ME allotment
pub async fn mint_daily(config: &Config, user_id: &str, wallet: usize) -> Result<()> {
    let payer = payer(config, wallet)?;
    let outcome = economy_client(config)
        .mint_daily(&payer.keypair, user_id)
        .await?;
    println!(
        "Minted {} ME for '{}': {}",
        outcome.minted, user_id, outcome.signature
    );
    Ok(())
}

/// Lock ME into escrow for MEMO
pub async fn lock(config: &Config, user_id: &str, amount: u64, wallet: usize) -> Result<()> {
    let payer = payer(config, wallet)?;
    let signature = economy_client(config)
        .lock_for_conversion(&payer.keypair, user_id, amount)
        .await?;
    println!("Locked {} ME for '{}': {}", amount, user_id, signature);
    Ok(())
}

/// Create a connection between two users
#[allow(clippy::too_many_arguments)]
pub async fn create_connection(
    config: &Config,
    connection_id: &str,
    user_a: &str,
    user_b: &str,
    pin_a: &str,
    pin_b: &str,
    wallet: usize,
) -> Result<()> {
    let payer = payer(config, wallet)?;
    let signature = economy_client(config)
        .create_connection(&payer.keypair, connection_id, user_a, user_b, pin_a, pin_b)
        .await?;
    println!(
        "Connection '{}' created between '{}' and '{}': {}",
        connection_id, user_a, user_b, signature
    );
    Ok(())
}

/// Unlock one side of a connection
pub async fn unlock(
    config: &Config,
    connection_id: &str,
    user_id: &str,
    pin: &str,
    wallet: usize,
) -> Result<()> {
    let payer = payer(config, wallet)?;
    match economy_client(config)
        .unlock_connection(&payer.keypair, connection_id, user_id, pin)
        .await?
    {
        UnlockOutcome::Unlocked {
            signature,
            both_unlocked,
            reward_issued,
        } => {
            println!("Unlocked '{}' for '{}': {}", connection_id, user_id, signature);
            if both_unlocked {
                println!("Connection fully unlocked");
            }
            if reward_issued {
                println!("MEMO reward issued");
            }
        }
        UnlockOutcome::AlreadyUnlocked => {
            println!(
                "'{}' already unlocked their side of '{}'",
                user_id, connection_id
            );
        }
    }
    Ok(())
}

/// Show a user's balances and counters
pub async fn balances(config: &Config, user_id: &str, wallet: usize) -> Result<()> {
    let payer = payer(config, wallet)?;
    match economy_client(config)
        .get_user_balances(user_id, &payer.address())
        .await?
    {
        Some(balances) => {
            println!("User: {}", balances.user_id);
            println!("  ME balance:        {}", balances.me_balance);
            println!("  MEMO balance:      {}", balances.memo_balance);
            println!("  Daily quota left:  {}", balances.daily_quota_remaining);
            println!("  Total ME minted:   {}", balances.total_me_minted);
            println!("  Total ME locked:   {}", balances.total_me_locked);
            println!("  Total MEMO earned: {}", balances.total_memo_earned);
            println!("  Connections:       {}", balances.connections_count);
        }
        None => {
            println!("User '{}' is not initialized", user_id);
        }
    }
    Ok(())
}

/// Execute a swap across every configured wallet
pub async fn swap(
    config: &Config,
    input_mint: &str,
    output_mint: &str,
    amount: u64,
) -> Result<()> {
    let input_mint = Pubkey::from_str(input_mint).context("Invalid input mint")?;
    let output_mint = Pubkey::from_str(output_mint).context("Invalid output mint")?;

    let wallets = wallets(config)?;
    info!(wallets = wallets.len(), "executing swap batch");

    let provider = Arc::new(HttpQuoteProvider::new(
        config.quoting.base_url.clone(),
        Duration::from_millis(config.quoting.timeout_ms),
    )?);
    let engine = SwapExecutionEngine::new(transport(config), provider, DecimalsCache::new());

    let keypairs: Vec<_> = wallets.into_iter().map(|w| w.keypair).collect();
    let signal = TradeSignal {
        input_mint,
        output_mint,
        amount,
    };
    let results = engine.execute_batch(&keypairs, &signal).await;

    let mut succeeded = 0;
    for result in &results {
        if result.success {
            succeeded += 1;
            println!(
                "{}: ok, signature={}, output={:?}, fee={:?}, slippage={:?}bps",
                result.wallet,
                result.signature.map(|s| s.to_string()).unwrap_or_default(),
                result.output_amount,
                result.fee_lamports,
                result.slippage_bps
            );
        } else {
            let reason = result
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            warn!(wallet = %result.wallet, reason, "swap failed");
            println!("{}: failed ({})", result.wallet, reason);
        }
    }
    println!("{}/{} wallets succeeded", succeeded, results.len());
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
