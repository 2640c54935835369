//! Program-derived address derivation
//!
//! Every account the client touches is a pure function of a fixed seed
//! literal, a hashed identifier and the program id. User identifiers are
//! always passed through SHA-256 before being used as seed material: PDA
//! seed components are capped at 32 bytes, and raw caller-supplied ids must
//! not appear on-chain. Connection ids are caller-chosen and bounded, so
//! they are used as raw bytes.

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Seed literals. These must match the on-chain program's seeds exactly.
pub const SEED_GLOBAL_STATE: &[u8] = b"global_state";
pub const SEED_MEMO_MINT: &[u8] = b"memo_mint";
pub const SEED_ME_ESCROW: &[u8] = b"me_escrow";
pub const SEED_USER: &[u8] = b"user";
pub const SEED_ME_MINT: &[u8] = b"me_mint";
pub const SEED_CONNECTION: &[u8] = b"connection";

/// Hash a caller-supplied user id into fixed-size seed material
pub fn hash_user_id(user_id: &str) -> [u8; 32] {
    let digest = Sha256::digest(user_id.as_bytes());
    digest.into()
}

/// Global state PDA (singleton)
pub fn global_state(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_GLOBAL_STATE], program_id)
}

/// Shared MEMO mint PDA (singleton)
pub fn memo_mint(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_MEMO_MINT], program_id)
}

/// Shared ME escrow PDA (singleton, holds locked collateral)
pub fn me_escrow(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_ME_ESCROW], program_id)
}

/// Per-user account PDA, keyed by the hashed user id
pub fn user_account(program_id: &Pubkey, user_id_hash: &[u8; 32]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_USER, user_id_hash.as_ref()], program_id)
}

/// Per-user personal ME mint PDA, keyed by the hashed user id
pub fn me_mint(program_id: &Pubkey, user_id_hash: &[u8; 32]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_ME_MINT, user_id_hash.as_ref()], program_id)
}

/// Per-connection PDA, keyed by the raw connection id bytes
pub fn connection(program_id: &Pubkey, connection_id: &str) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_CONNECTION, connection_id.as_bytes()], program_id)
}

/// Associated token account for a wallet and mint
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::program::PROGRAM_ID;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_user_id("telegram:12345"), hash_user_id("telegram:12345"));
        assert_ne!(hash_user_id("telegram:12345"), hash_user_id("telegram:12346"));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let hash = hash_user_id("user-a");
        let (addr1, bump1) = user_account(&PROGRAM_ID, &hash);
        let (addr2, bump2) = user_account(&PROGRAM_ID, &hash);
        assert_eq!(addr1, addr2);
        assert_eq!(bump1, bump2);
    }

    #[test]
    fn test_distinct_ids_yield_distinct_addresses() {
        let (a, _) = user_account(&PROGRAM_ID, &hash_user_id("user-a"));
        let (b, _) = user_account(&PROGRAM_ID, &hash_user_id("user-b"));
        assert_ne!(a, b);

        // The per-user mint tree is disjoint from the per-user account tree
        let (mint_a, _) = me_mint(&PROGRAM_ID, &hash_user_id("user-a"));
        assert_ne!(a, mint_a);
    }

    #[test]
    fn test_connection_uses_raw_id() {
        let (c1, _) = connection(&PROGRAM_ID, "conn-1");
        let (c2, _) = connection(&PROGRAM_ID, "conn-2");
        assert_ne!(c1, c2);
        assert_eq!(c1, connection(&PROGRAM_ID, "conn-1").0);
    }

    #[test]
    fn test_singletons_do_not_collide() {
        let (global, _) = global_state(&PROGRAM_ID);
        let (memo, _) = memo_mint(&PROGRAM_ID);
        let (escrow, _) = me_escrow(&PROGRAM_ID);
        assert_ne!(global, memo);
        assert_ne!(global, escrow);
        assert_ne!(memo, escrow);
    }

    #[test]
    fn test_ata_is_deterministic() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        assert_eq!(
            associated_token_address(&wallet, &mint),
            associated_token_address(&wallet, &mint)
        );
    }
}
