use alloy::primitives::{Address, Bytes};

/// EIP-7702 delegation prefix bytes
pub const EIP_7702_DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];

/// EIP-7702 delegation code length (prefix + address)
pub const EIP_7702_DELEGATION_CODE_LENGTH: usize = 23;

/// Prefix of the preimage an authority signs (`MAGIC ‖ rlp([chain_id, address, nonce])`)
pub const EIP_7702_AUTHORIZATION_MAGIC: u8 = 0x05;

/// Typed envelope identifier for set-code transactions
pub const EIP_7702_TX_TYPE: u8 = 0x04;

/// Code the protocol installs on an account that delegated to `delegate`.
pub fn delegation_designator(delegate: Address) -> Bytes {
    let mut code = Vec::with_capacity(EIP_7702_DELEGATION_CODE_LENGTH);
    code.extend_from_slice(&EIP_7702_DELEGATION_PREFIX);
    code.extend_from_slice(delegate.as_slice());
    code.into()
}

/// Returns the delegate iff `code` is exactly a delegation designator.
pub fn delegation_target(code: &[u8]) -> Option<Address> {
    if code.len() != EIP_7702_DELEGATION_CODE_LENGTH || !code.starts_with(&EIP_7702_DELEGATION_PREFIX)
    {
        return None;
    }
    Some(Address::from_slice(&code[EIP_7702_DELEGATION_PREFIX.len()..]))
}
