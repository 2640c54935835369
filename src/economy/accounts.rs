//! Account state decoding for the token economy program
//!
//! Each account type has exactly one schema module holding its byte offsets;
//! the decoder (and the test-facing encoder) read and write through these
//! constants so a layout change has a single place to land. Offsets are
//! schema-defined, not computed at runtime - a wrong offset corrupts every
//! downstream read silently, so decode is strict: wrong length or wrong
//! discriminator is a hard error, never a fallback.

use solana_sdk::pubkey::Pubkey;

use crate::economy::instruction::{read_bool, read_i64, read_pubkey, read_u64};
use crate::economy::program::ACCOUNT_DISCRIMINATORS;
use crate::error::{Error, Result};

/// GlobalState byte layout
pub mod global_schema {
    pub const MEMO_MINT: usize = 8;
    pub const ME_ESCROW: usize = 40;
    pub const ADMIN: usize = 72;
    pub const TOTAL_USERS: usize = 104;
    pub const TOTAL_CONNECTIONS: usize = 112;
    pub const LEN: usize = 120;
}

/// UserAccount byte layout
pub mod user_schema {
    pub const USER_ID: usize = 8; // [u8; 64], zero padded
    pub const ME_MINT: usize = 72;
    pub const LAST_MINT_TIME: usize = 104;
    pub const DAILY_MINTED_TODAY: usize = 112;
    pub const TOTAL_ME_MINTED: usize = 120;
    pub const TOTAL_ME_LOCKED: usize = 128;
    pub const TOTAL_MEMO_EARNED: usize = 136;
    pub const CONNECTIONS_COUNT: usize = 144;
    pub const BUMP: usize = 152;
    pub const LEN: usize = 153;
}

/// ConnectionAccount byte layout
pub mod connection_schema {
    pub const CONNECTION_ID: usize = 8; // [u8; 64], zero padded
    pub const USER_A: usize = 72;
    pub const USER_B: usize = 104;
    pub const PIN_A_HASH: usize = 136;
    pub const PIN_B_HASH: usize = 168;
    pub const USER_A_UNLOCKED: usize = 200;
    pub const USER_B_UNLOCKED: usize = 201;
    pub const CREATED_AT: usize = 202;
    pub const BUMP: usize = 210;
    pub const LEN: usize = 211;
}

fn check_layout(data: &[u8], expected_len: usize, discriminator: &[u8; 8], name: &str) -> Result<()> {
    if data.len() != expected_len {
        return Err(Error::Codec(format!(
            "{} data length mismatch: expected {}, got {}",
            name,
            expected_len,
            data.len()
        )));
    }
    if &data[..8] != discriminator {
        return Err(Error::Codec(format!(
            "wrong discriminator for {}: expected {:?}, got {:?}",
            name,
            discriminator,
            &data[..8]
        )));
    }
    Ok(())
}

/// Decode a zero-padded fixed 64-byte identifier field into a String
fn read_padded_id(data: &[u8], offset: usize) -> Result<String> {
    let raw = &data[offset..offset + 64];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(64);
    String::from_utf8(raw[..end].to_vec())
        .map_err(|_| Error::Codec("invalid UTF-8 in identifier field".to_string()))
}

fn write_padded_id(buf: &mut Vec<u8>, id: &str) {
    let mut arr = [0u8; 64];
    let bytes = id.as_bytes();
    let len = bytes.len().min(64);
    arr[..len].copy_from_slice(&bytes[..len]);
    buf.extend_from_slice(&arr);
}

/// Process-wide singleton holding token-supply and escrow references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalState {
    pub memo_mint: Pubkey,
    pub me_escrow: Pubkey,
    pub admin: Pubkey,
    pub total_users: u64,
    pub total_connections: u64,
}

impl GlobalState {
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_layout(
            data,
            global_schema::LEN,
            &ACCOUNT_DISCRIMINATORS::GLOBAL_STATE,
            "GlobalState",
        )?;

        let mut offset = global_schema::MEMO_MINT;
        Ok(Self {
            memo_mint: read_pubkey(data, &mut offset)?,
            me_escrow: read_pubkey(data, &mut offset)?,
            admin: read_pubkey(data, &mut offset)?,
            total_users: read_u64(data, &mut offset)?,
            total_connections: read_u64(data, &mut offset)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(global_schema::LEN);
        buf.extend_from_slice(&ACCOUNT_DISCRIMINATORS::GLOBAL_STATE);
        buf.extend_from_slice(self.memo_mint.as_ref());
        buf.extend_from_slice(self.me_escrow.as_ref());
        buf.extend_from_slice(self.admin.as_ref());
        buf.extend_from_slice(&self.total_users.to_le_bytes());
        buf.extend_from_slice(&self.total_connections.to_le_bytes());
        buf
    }
}

/// Per-user economy state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub user_id: String,
    pub me_mint: Pubkey,
    pub last_mint_time: i64,
    pub daily_minted_today: u64,
    pub total_me_minted: u64,
    pub total_me_locked: u64,
    pub total_memo_earned: u64,
    pub connections_count: u64,
    pub bump: u8,
}

impl UserAccount {
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_layout(
            data,
            user_schema::LEN,
            &ACCOUNT_DISCRIMINATORS::USER_ACCOUNT,
            "UserAccount",
        )?;

        let user_id = read_padded_id(data, user_schema::USER_ID)?;
        let mut offset = user_schema::ME_MINT;
        Ok(Self {
            user_id,
            me_mint: read_pubkey(data, &mut offset)?,
            last_mint_time: read_i64(data, &mut offset)?,
            daily_minted_today: read_u64(data, &mut offset)?,
            total_me_minted: read_u64(data, &mut offset)?,
            total_me_locked: read_u64(data, &mut offset)?,
            total_memo_earned: read_u64(data, &mut offset)?,
            connections_count: read_u64(data, &mut offset)?,
            bump: data[user_schema::BUMP],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(user_schema::LEN);
        buf.extend_from_slice(&ACCOUNT_DISCRIMINATORS::USER_ACCOUNT);
        write_padded_id(&mut buf, &self.user_id);
        buf.extend_from_slice(self.me_mint.as_ref());
        buf.extend_from_slice(&self.last_mint_time.to_le_bytes());
        buf.extend_from_slice(&self.daily_minted_today.to_le_bytes());
        buf.extend_from_slice(&self.total_me_minted.to_le_bytes());
        buf.extend_from_slice(&self.total_me_locked.to_le_bytes());
        buf.extend_from_slice(&self.total_memo_earned.to_le_bytes());
        buf.extend_from_slice(&self.connections_count.to_le_bytes());
        buf.push(self.bump);
        buf
    }
}

/// Two-party connection record gated by PIN hashes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAccount {
    pub connection_id: String,
    pub user_a: Pubkey,
    pub user_b: Pubkey,
    pub pin_a_hash: [u8; 32],
    pub pin_b_hash: [u8; 32],
    pub user_a_unlocked: bool,
    pub user_b_unlocked: bool,
    pub created_at: i64,
    pub bump: u8,
}

impl ConnectionAccount {
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_layout(
            data,
            connection_schema::LEN,
            &ACCOUNT_DISCRIMINATORS::CONNECTION_ACCOUNT,
            "ConnectionAccount",
        )?;

        let connection_id = read_padded_id(data, connection_schema::CONNECTION_ID)?;
        let mut offset = connection_schema::USER_A;
        let user_a = read_pubkey(data, &mut offset)?;
        let user_b = read_pubkey(data, &mut offset)?;
        let pin_a_hash: [u8; 32] = data[connection_schema::PIN_A_HASH..connection_schema::PIN_B_HASH]
            .try_into()
            .map_err(|_| Error::Codec("invalid pin_a_hash field".to_string()))?;
        let pin_b_hash: [u8; 32] = data
            [connection_schema::PIN_B_HASH..connection_schema::USER_A_UNLOCKED]
            .try_into()
            .map_err(|_| Error::Codec("invalid pin_b_hash field".to_string()))?;

        let mut offset = connection_schema::USER_A_UNLOCKED;
        let user_a_unlocked = read_bool(data, &mut offset)?;
        let user_b_unlocked = read_bool(data, &mut offset)?;
        let created_at = read_i64(data, &mut offset)?;

        Ok(Self {
            connection_id,
            user_a,
            user_b,
            pin_a_hash,
            pin_b_hash,
            user_a_unlocked,
            user_b_unlocked,
            created_at,
            bump: data[connection_schema::BUMP],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(connection_schema::LEN);
        buf.extend_from_slice(&ACCOUNT_DISCRIMINATORS::CONNECTION_ACCOUNT);
        write_padded_id(&mut buf, &self.connection_id);
        buf.extend_from_slice(self.user_a.as_ref());
        buf.extend_from_slice(self.user_b.as_ref());
        buf.extend_from_slice(&self.pin_a_hash);
        buf.extend_from_slice(&self.pin_b_hash);
        buf.push(self.user_a_unlocked as u8);
        buf.push(self.user_b_unlocked as u8);
        buf.extend_from_slice(&self.created_at.to_le_bytes());
        buf.push(self.bump);
        buf
    }

    /// Terminal state: both parties have unlocked
    pub fn both_unlocked(&self) -> bool {
        self.user_a_unlocked && self.user_b_unlocked
    }
}
