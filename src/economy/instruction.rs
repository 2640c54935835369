//! Instruction data encoding
//!
//! Field byte contracts, shared with the on-chain program:
//! - strings: 4-byte little-endian length prefix + raw UTF-8, no terminator
//! - fixed 32-byte arrays: exactly 32 raw bytes
//! - u64: 8 bytes little-endian
//!
//! The decode helpers below are the inverse of the builder and are also used
//! by the account schemas, so every field codec has a single source of truth.

use crate::economy::program::instruction_discriminator;
use crate::error::{Error, Result};
use solana_sdk::pubkey::Pubkey;

/// Builder for instruction payloads: 8-byte discriminator followed by the
/// ordered fields.
#[derive(Debug, Clone)]
pub struct InstructionData {
    buf: Vec<u8>,
}

impl InstructionData {
    /// Start a payload for the named instruction
    pub fn new(instruction_name: &str) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&instruction_discriminator(instruction_name));
        Self { buf }
    }

    /// Append a length-prefixed UTF-8 string
    pub fn push_str(mut self, s: &str) -> Self {
        self.buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Append a fixed 32-byte array
    pub fn push_bytes32(mut self, bytes: &[u8; 32]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append raw bytes with no length prefix (fixed-size fields)
    pub fn push_bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a little-endian u64
    pub fn push_u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Read a length-prefixed UTF-8 string, advancing the offset
pub fn read_str(data: &[u8], offset: &mut usize) -> Result<String> {
    if *offset + 4 > data.len() {
        return Err(Error::Codec("string length out of bounds".to_string()));
    }

    let len = u32::from_le_bytes(
        data[*offset..*offset + 4]
            .try_into()
            .map_err(|_| Error::Codec("invalid string length".to_string()))?,
    ) as usize;
    *offset += 4;

    if *offset + len > data.len() {
        return Err(Error::Codec("string content out of bounds".to_string()));
    }

    let s = String::from_utf8(data[*offset..*offset + len].to_vec())
        .map_err(|_| Error::Codec("invalid UTF-8 in string".to_string()))?;
    *offset += len;

    Ok(s)
}

/// Read a fixed 32-byte array, advancing the offset
pub fn read_bytes32(data: &[u8], offset: &mut usize) -> Result<[u8; 32]> {
    if *offset + 32 > data.len() {
        return Err(Error::Codec("32-byte field out of bounds".to_string()));
    }

    let bytes: [u8; 32] = data[*offset..*offset + 32]
        .try_into()
        .map_err(|_| Error::Codec("invalid 32-byte field".to_string()))?;
    *offset += 32;

    Ok(bytes)
}

/// Read a little-endian u64, advancing the offset
pub fn read_u64(data: &[u8], offset: &mut usize) -> Result<u64> {
    if *offset + 8 > data.len() {
        return Err(Error::Codec("u64 field out of bounds".to_string()));
    }

    let value = u64::from_le_bytes(
        data[*offset..*offset + 8]
            .try_into()
            .map_err(|_| Error::Codec("invalid u64 field".to_string()))?,
    );
    *offset += 8;

    Ok(value)
}

/// Read a little-endian i64 (unix timestamps), advancing the offset
pub fn read_i64(data: &[u8], offset: &mut usize) -> Result<i64> {
    read_u64(data, offset).map(|v| v as i64)
}

/// Read a single-byte bool, advancing the offset
pub fn read_bool(data: &[u8], offset: &mut usize) -> Result<bool> {
    if *offset >= data.len() {
        return Err(Error::Codec("bool field out of bounds".to_string()));
    }

    let value = data[*offset];
    *offset += 1;

    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::Codec(format!("invalid bool byte: {}", other))),
    }
}

/// Read a 32-byte pubkey, advancing the offset
pub fn read_pubkey(data: &[u8], offset: &mut usize) -> Result<Pubkey> {
    read_bytes32(data, offset).map(Pubkey::new_from_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::program::DISCRIMINATORS;

    #[test]
    fn test_discriminator_prefix() {
        let data = InstructionData::new("initialize_user").into_bytes();
        assert_eq!(data.len(), 8);
        assert_eq!(data[..8], DISCRIMINATORS::INITIALIZE_USER);
    }

    #[test]
    fn test_string_round_trip() {
        // Empty string, a typical id, and the on-chain maximum of 64 bytes
        let max = "x".repeat(64);
        for s in ["", "telegram:12345", max.as_str()] {
            let data = InstructionData::new("initialize_user")
                .push_str(s)
                .into_bytes();
            let mut offset = 8;
            assert_eq!(read_str(&data, &mut offset).unwrap(), s);
            assert_eq!(offset, data.len());
        }
    }

    #[test]
    fn test_string_has_no_terminator() {
        let data = InstructionData::new("initialize_user")
            .push_str("ab")
            .into_bytes();
        // 8 discriminator + 4 length + 2 content, nothing else
        assert_eq!(data.len(), 14);
        assert_eq!(&data[8..12], &2u32.to_le_bytes());
        assert_eq!(&data[12..], b"ab");
    }

    #[test]
    fn test_bytes32_round_trip() {
        for arr in [[0u8; 32], [0xFF; 32]] {
            let data = InstructionData::new("create_connection")
                .push_bytes32(&arr)
                .into_bytes();
            let mut offset = 8;
            assert_eq!(read_bytes32(&data, &mut offset).unwrap(), arr);
        }
    }

    #[test]
    fn test_u64_round_trip() {
        for v in [0u64, 1, u64::MAX] {
            let data = InstructionData::new("lock_me_for_memo")
                .push_u64(v)
                .into_bytes();
            let mut offset = 8;
            assert_eq!(read_u64(&data, &mut offset).unwrap(), v);
        }
    }

    #[test]
    fn test_mixed_fields_in_order() {
        let hash = [7u8; 32];
        let data = InstructionData::new("initialize_user")
            .push_str("user-1")
            .push_bytes32(&hash)
            .into_bytes();

        let mut offset = 8;
        assert_eq!(read_str(&data, &mut offset).unwrap(), "user-1");
        assert_eq!(read_bytes32(&data, &mut offset).unwrap(), hash);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn test_truncated_data_is_rejected() {
        let data = InstructionData::new("lock_me_for_memo")
            .push_u64(42)
            .into_bytes();
        let mut offset = 8;
        assert!(read_str(&data[..10], &mut offset).is_err());
        let mut offset = 12;
        assert!(read_u64(&data, &mut offset).is_err());
    }

    #[test]
    fn test_bool_rejects_garbage() {
        let data = [2u8];
        let mut offset = 0;
        assert!(read_bool(&data, &mut offset).is_err());
    }
}
