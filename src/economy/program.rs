//! Token economy program constants and discriminators
//!
//! # How discriminators are calculated
//! The program is Anchor-based: instruction data starts with the first
//! 8 bytes of SHA-256("global:<instruction_name>") and account data starts
//! with the first 8 bytes of SHA-256("account:<AccountName>"). These must
//! match the on-chain derivation exactly or instructions are routed to the
//! wrong handler and account reads return garbage.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Deployed token economy program ID
pub const PROGRAM_ID_STR: &str = "GXnod1W71vzjuFkXHxwQ2dkBe7t1auJMtwMQYL67ytVt";

lazy_static::lazy_static! {
    /// Token economy program ID as Pubkey
    pub static ref PROGRAM_ID: Pubkey =
        Pubkey::from_str(PROGRAM_ID_STR).expect("Invalid token economy program ID");
}

/// Token decimals used by both the ME and MEMO mints
pub const TOKEN_DECIMALS: u8 = 9;

/// ME minted to a user on initialization (whole tokens)
pub const INITIAL_ME_MINT: u64 = 48;

/// Maximum ME mintable per UTC day (whole tokens)
pub const DAILY_ME_LIMIT: u64 = 24;

/// MEMO minted to each party when a connection fully unlocks (whole tokens)
pub const CONNECTION_MEMO_REWARD: u64 = 8;

/// Convert a whole-token amount to base units
pub fn to_base_units(amount: u64) -> u64 {
    amount * 10u64.pow(TOKEN_DECIMALS as u32)
}

/// Instruction discriminators (first 8 bytes of instruction data)
/// Calculated as: SHA-256("global:<instruction_name>")[0..8]
#[allow(non_snake_case)]
pub mod DISCRIMINATORS {
    /// SHA-256("global:initialize_global")[0..8]
    pub const INITIALIZE_GLOBAL: [u8; 8] = [47, 225, 15, 112, 86, 51, 190, 231];

    /// SHA-256("global:initialize_user")[0..8]
    pub const INITIALIZE_USER: [u8; 8] = [111, 17, 185, 250, 60, 122, 38, 254];

    /// SHA-256("global:mint_daily_me")[0..8]
    pub const MINT_DAILY_ME: [u8; 8] = [210, 74, 130, 201, 248, 219, 231, 141];

    /// SHA-256("global:lock_me_for_memo")[0..8]
    pub const LOCK_ME_FOR_MEMO: [u8; 8] = [88, 147, 164, 51, 189, 114, 149, 167];

    /// SHA-256("global:create_connection")[0..8]
    pub const CREATE_CONNECTION: [u8; 8] = [107, 30, 231, 166, 113, 240, 77, 88];

    /// SHA-256("global:unlock_connection")[0..8]
    pub const UNLOCK_CONNECTION: [u8; 8] = [29, 61, 170, 203, 151, 44, 249, 90];
}

/// Account discriminators (first 8 bytes of account data)
/// Calculated as: SHA-256("account:<AccountName>")[0..8]
#[allow(non_snake_case)]
pub mod ACCOUNT_DISCRIMINATORS {
    /// GlobalState account discriminator
    pub const GLOBAL_STATE: [u8; 8] = [163, 46, 74, 168, 216, 123, 133, 98];

    /// UserAccount account discriminator
    pub const USER_ACCOUNT: [u8; 8] = [211, 33, 136, 16, 186, 110, 242, 127];

    /// ConnectionAccount account discriminator
    pub const CONNECTION_ACCOUNT: [u8; 8] = [180, 97, 246, 63, 243, 77, 242, 196];
}

/// Calculate an instruction discriminator from its name
/// Anchor convention: SHA-256("global:<name>")[0..8]
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    discriminator("global", name)
}

/// Calculate an account discriminator from the account struct name
/// Anchor convention: SHA-256("account:<Name>")[0..8]
pub fn account_discriminator(name: &str) -> [u8; 8] {
    discriminator("account", name)
}

fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    use sha2::{Digest, Sha256};

    let preimage = format!("{}:{}", namespace, name);
    let hash = Sha256::digest(preimage.as_bytes());

    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_discriminators() {
        // Verify our hardcoded discriminators match the calculation
        assert_eq!(
            instruction_discriminator("initialize_global"),
            DISCRIMINATORS::INITIALIZE_GLOBAL
        );
        assert_eq!(
            instruction_discriminator("initialize_user"),
            DISCRIMINATORS::INITIALIZE_USER
        );
        assert_eq!(
            instruction_discriminator("mint_daily_me"),
            DISCRIMINATORS::MINT_DAILY_ME
        );
        assert_eq!(
            instruction_discriminator("lock_me_for_memo"),
            DISCRIMINATORS::LOCK_ME_FOR_MEMO
        );
        assert_eq!(
            instruction_discriminator("create_connection"),
            DISCRIMINATORS::CREATE_CONNECTION
        );
        assert_eq!(
            instruction_discriminator("unlock_connection"),
            DISCRIMINATORS::UNLOCK_CONNECTION
        );
    }

    #[test]
    fn test_account_discriminators() {
        assert_eq!(
            account_discriminator("GlobalState"),
            ACCOUNT_DISCRIMINATORS::GLOBAL_STATE
        );
        assert_eq!(
            account_discriminator("UserAccount"),
            ACCOUNT_DISCRIMINATORS::USER_ACCOUNT
        );
        assert_eq!(
            account_discriminator("ConnectionAccount"),
            ACCOUNT_DISCRIMINATORS::CONNECTION_ACCOUNT
        );
    }

    #[test]
    fn test_program_id() {
        assert_eq!(PROGRAM_ID.to_string(), PROGRAM_ID_STR);
    }

    #[test]
    fn test_base_units() {
        assert_eq!(to_base_units(1), 1_000_000_000);
        assert_eq!(to_base_units(DAILY_ME_LIMIT), 24_000_000_000);
    }
}
