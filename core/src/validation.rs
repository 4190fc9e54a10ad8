//! Pure syntactic checks on user supplied addresses and keys. Nothing here touches the network.

use alloy::{
    primitives::{Address, B256},
    signers::local::PrivateKeySigner,
};

use crate::error::EngineError;

const ADDRESS_HEX_LEN: usize = 40;
const PRIVATE_KEY_HEX_LEN: usize = 64;

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parses a 20-byte hex address. All-lowercase and all-uppercase forms are accepted as is;
/// mixed case must carry a valid EIP-55 checksum.
pub fn parse_address(s: &str) -> Result<Address, EngineError> {
    let trimmed = s.trim();
    let digits = strip_hex_prefix(trimmed);

    if !is_hex_of_len(digits, ADDRESS_HEX_LEN) {
        return Err(EngineError::invalid_address(
            s,
            "expected 20 bytes of hex (40 characters)",
        ));
    }

    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());

    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{digits}"), None)
            .map_err(|_| EngineError::invalid_address(s, "checksum mismatch"))
    } else {
        digits
            .parse::<Address>()
            .map_err(|e| EngineError::invalid_address(s, e.to_string()))
    }
}

pub fn is_valid_address(s: &str) -> bool {
    parse_address(s).is_ok()
}

/// Returns the `0x`-prefixed form of a 32-byte hex key.
pub fn normalize_private_key(s: &str) -> Result<String, EngineError> {
    let trimmed = s.trim();
    let digits = strip_hex_prefix(trimmed);

    if !is_hex_of_len(digits, PRIVATE_KEY_HEX_LEN) {
        return Err(EngineError::MalformedKey {
            message: format!(
                "expected 32 bytes of hex ({PRIVATE_KEY_HEX_LEN} characters), got {} characters",
                digits.len()
            ),
        });
    }

    Ok(format!("0x{digits}"))
}

pub fn is_valid_private_key(s: &str) -> bool {
    normalize_private_key(s).is_ok()
}

/// Builds a local signer from a key in any accepted spelling.
pub fn parse_private_key(s: &str) -> Result<PrivateKeySigner, EngineError> {
    let normalized = normalize_private_key(s)?;
    let bytes = normalized
        .parse::<B256>()
        .map_err(|e| EngineError::MalformedKey {
            message: e.to_string(),
        })?;

    PrivateKeySigner::from_bytes(&bytes).map_err(|e| EngineError::MalformedKey {
        message: format!("not a valid secp256k1 secret key: {e}"),
    })
}

pub fn derive_address(private_key: &str) -> Result<Address, EngineError> {
    parse_private_key(private_key).map(|signer| signer.address())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ANVIL_KEY_0: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn accepts_addresses_in_every_casing() {
        assert!(is_valid_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
        assert!(is_valid_address("0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266"));
        assert!(is_valid_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(is_valid_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("0x"));
        assert!(!is_valid_address("0x1234"));
        assert!(!is_valid_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb9226g"));
        assert!(!is_valid_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb9226600"));
        // one flipped letter breaks the checksum
        assert!(!is_valid_address("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
    }

    #[test]
    fn validation_is_repeatable() {
        for input in ["0x1111111111111111111111111111111111111111", "nope", ANVIL_KEY_0] {
            assert_eq!(is_valid_address(input), is_valid_address(input));
            assert_eq!(is_valid_private_key(input), is_valid_private_key(input));
        }
    }

    #[test]
    fn normalizes_keys_with_and_without_prefix() {
        let prefixed = format!("0x{ANVIL_KEY_0}");
        assert_eq!(normalize_private_key(ANVIL_KEY_0).unwrap(), prefixed);
        assert_eq!(normalize_private_key(&prefixed).unwrap(), prefixed);
        assert!(is_valid_private_key(ANVIL_KEY_0));
    }

    #[test]
    fn rejects_short_or_non_hex_keys() {
        assert!(matches!(
            normalize_private_key("0x1234"),
            Err(EngineError::MalformedKey { .. })
        ));
        let not_hex = format!("0x{}", "z".repeat(64));
        assert!(!is_valid_private_key(&not_hex));
    }

    #[test]
    fn derives_the_well_known_anvil_account() {
        let expected = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(derive_address(ANVIL_KEY_0).unwrap(), expected);
        assert_eq!(derive_address(&format!("0x{ANVIL_KEY_0}")).unwrap(), expected);
    }

    #[test]
    fn zero_key_is_malformed() {
        let zero = format!("0x{}", "0".repeat(64));
        assert!(is_valid_private_key(&zero));
        assert!(matches!(
            derive_address(&zero),
            Err(EngineError::MalformedKey { .. })
        ));
    }
}
