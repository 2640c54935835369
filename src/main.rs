//! Memonet CLI - token economy operations and batch swap execution

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use memonet::cli::commands;
use memonet::config::Config;

/// Off-chain client for the ME/MEMO token economy
#[derive(Parser)]
#[command(name = "memonet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Index into the configured wallet list used as payer
    #[arg(short, long, default_value_t = 0)]
    wallet: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the program's global state (admin only)
    InitGlobal,

    /// Create a user account and mint the initial ME allotment
    InitUser {
        /// External user identifier (max 64 bytes)
        user_id: String,
    },

    /// Mint today's ME allotment, up to the daily cap
    MintDaily {
        user_id: String,
    },

    /// Lock ME into escrow and receive MEMO 1:1
    Lock {
        user_id: String,

        /// Whole ME tokens to lock
        amount: u64,
    },

    /// Create a connection between two users
    CreateConnection {
        connection_id: String,
        user_a: String,
        user_b: String,

        /// 4-digit PIN held by user A
        #[arg(long)]
        pin_a: String,

        /// 4-digit PIN held by user B
        #[arg(long)]
        pin_b: String,
    },

    /// Unlock one side of a connection with the counterparty's PIN
    Unlock {
        connection_id: String,
        user_id: String,
        pin: String,
    },

    /// Show a user's balances and counters
    Balances {
        user_id: String,
    },

    /// Swap via the quoting service, across every configured wallet
    Swap {
        input_mint: String,
        output_mint: String,

        /// Whole tokens of the input mint
        amount: u64,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("memonet=info".parse()?),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::InitGlobal => commands::init_global(&config, cli.wallet).await,
        Commands::InitUser { user_id } => {
            commands::init_user(&config, &user_id, cli.wallet).await
        }
        Commands::MintDaily { user_id } => {
            commands::mint_daily(&config, &user_id, cli.wallet).await
        }
        Commands::Lock { user_id, amount } => {
            commands::lock(&config, &user_id, amount, cli.wallet).await
        }
        Commands::CreateConnection {
            connection_id,
            user_a,
            user_b,
            pin_a,
            pin_b,
        } => {
            commands::create_connection(
                &config,
                &connection_id,
                &user_a,
                &user_b,
                &pin_a,
                &pin_b,
                cli.wallet,
            )
            .await
        }
        Commands::Unlock {
            connection_id,
            user_id,
            pin,
        } => commands::unlock(&config, &connection_id, &user_id, &pin, cli.wallet).await,
        Commands::Balances { user_id } => {
            commands::balances(&config, &user_id, cli.wallet).await
        }
        Commands::Swap {
            input_mint,
            output_mint,
            amount,
        } => commands::swap(&config, &input_mint, &output_mint, amount).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
