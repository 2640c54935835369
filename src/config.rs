//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;

use crate::economy::program::PROGRAM_ID_STR;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub program: ProgramConfig,
    #[serde(default)]
    pub quoting: QuotingConfig,
    #[serde(default)]
    pub wallets: WalletsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramConfig {
    /// Token economy program ID
    #[serde(default = "default_program_id")]
    pub program_id: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: default_program_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotingConfig {
    /// Base URL of the Jupiter-compatible quoting service
    #[serde(default = "default_quoting_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QuotingConfig {
    fn default() -> Self {
        Self {
            base_url: default_quoting_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WalletsConfig {
    /// Paths to JSON keypair files, one wallet each
    #[serde(default)]
    pub keypair_paths: Vec<String>,
}

fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_program_id() -> String {
    PROGRAM_ID_STR.to_string()
}

fn default_quoting_base_url() -> String {
    "https://quote-api.jup.ag/v6".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix MEMONET_)
            .add_source(
                config::Environment::with_prefix("MEMONET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        Pubkey::from_str(&self.program.program_id)
            .with_context(|| format!("Invalid program_id: {}", self.program.program_id))?;

        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }

        if !self.quoting.base_url.starts_with("http") {
            anyhow::bail!("quoting.base_url must be an http(s) URL");
        }

        Ok(())
    }

    pub fn program_id(&self) -> Pubkey {
        // Checked in validate()
        Pubkey::from_str(&self.program.program_id).unwrap_or_default()
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
  Program:
    program_id: {}
  Quoting:
    base_url: {}
    timeout: {}ms
  Wallets:
    keypairs: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.program.program_id,
            self.quoting.base_url,
            self.quoting.timeout_ms,
            self.wallets.keypair_paths.len(),
        )
    }
}

/// Mask API keys embedded in RPC URLs
fn mask_url(url: &str) -> String {
    match url.split_once("api-key=") {
        Some((prefix, _)) => format!("{}api-key=***", prefix),
        None => url.to_string(),
    }
}
