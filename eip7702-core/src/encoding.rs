//! Canonical integer and byte-width helpers shared by the authorization and
//! envelope encoders. Integers are minimal big-endian; zero is the empty string.

use alloy::{
    hex,
    primitives::{Address, U256},
    rlp,
};
use sponsor_core::error::EngineError;

pub fn canonical_hex_u64(value: u64) -> String {
    canonical_hex_u256(U256::from(value))
}

pub fn canonical_hex_u256(value: U256) -> String {
    if value.is_zero() {
        return "0x".to_string();
    }
    format!("0x{}", hex::encode(value.to_be_bytes_trimmed_vec()))
}

/// 32-byte, zero-padded hex form used for signature components.
pub fn word_hex(value: U256) -> String {
    format!("0x{}", hex::encode(value.to_be_bytes::<32>()))
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, EngineError> {
    let digits = value
        .trim()
        .strip_prefix("0x")
        .unwrap_or_else(|| value.trim());
    if digits.is_empty() {
        return Ok(Vec::new());
    }
    // odd-length quantities like "0x1" are accepted
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };
    hex::decode(digits).map_err(|e| EngineError::encoding(format!("{field}: invalid hex: {e}")))
}

/// Parses a hex quantity. `0x` and any run of zero bytes both mean zero.
pub fn parse_hex_u256(field: &str, value: &str) -> Result<U256, EngineError> {
    let bytes = decode_hex(field, value)?;
    if bytes.len() > 32 {
        return Err(EngineError::encoding(format!(
            "{field}: {} bytes does not fit in 256 bits",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(&bytes))
}

pub fn parse_hex_u64(field: &str, value: &str) -> Result<u64, EngineError> {
    let wide = parse_hex_u256(field, value)?;
    u64::try_from(wide)
        .map_err(|_| EngineError::encoding(format!("{field}: value does not fit in 64 bits")))
}

/// Exactly 20 bytes of hex; no checksum enforcement at the wire layer.
pub fn parse_address_exact(field: &str, value: &str) -> Result<Address, EngineError> {
    let bytes = decode_hex(field, value)?;
    if bytes.len() != 20 {
        return Err(EngineError::encoding(format!(
            "{field}: expected 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Exactly 32 bytes of hex, as carried by signature components.
pub fn parse_word(field: &str, value: &str) -> Result<U256, EngineError> {
    let bytes = decode_hex(field, value)?;
    if bytes.len() != 32 {
        return Err(EngineError::encoding(format!(
            "{field}: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(&bytes))
}

pub(crate) fn rlp_error(context: &str, error: rlp::Error) -> EngineError {
    EngineError::encoding(format!("{context}: {error}"))
}
