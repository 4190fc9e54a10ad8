use alloy::{
    primitives::{Address, B256, Bytes, Signature, U256, keccak256},
    rlp::{self, BufMut, Decodable, Encodable, Header},
};
use serde::{Deserialize, Serialize};
use sponsor_core::{error::EngineError, signer::AccountSigner, validation::parse_address};

use crate::{
    constants::EIP_7702_AUTHORIZATION_MAGIC,
    encoding::{
        canonical_hex_u64, parse_address_exact, parse_hex_u64, parse_word, rlp_error, word_hex,
    },
};

/// `(yParity, r, s)` with `yParity ∈ {0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParts {
    pub y_parity: u8,
    pub r: U256,
    pub s: U256,
}

impl SignatureParts {
    pub fn new(y_parity: u8, r: U256, s: U256) -> Result<Self, EngineError> {
        if y_parity > 1 {
            return Err(EngineError::encoding(format!(
                "yParity must be 0 or 1, got {y_parity}"
            )));
        }
        Ok(Self { y_parity, r, s })
    }

    /// Parses hex components. `r` and `s` must be exactly 32 bytes.
    pub fn from_hex(y_parity: &str, r: &str, s: &str) -> Result<Self, EngineError> {
        let y_parity = parse_hex_u64("yParity", y_parity)?;
        if y_parity > 1 {
            return Err(EngineError::encoding(format!(
                "yParity must be 0 or 1, got {y_parity}"
            )));
        }
        Ok(Self {
            y_parity: y_parity as u8,
            r: parse_word("r", r)?,
            s: parse_word("s", s)?,
        })
    }

    pub fn to_signature(&self) -> Signature {
        Signature::new(self.r, self.s, self.y_parity == 1)
    }

    pub fn recover_from_prehash(&self, digest: &B256) -> Result<Address, EngineError> {
        self.to_signature()
            .recover_address_from_prehash(digest)
            .map_err(|e| EngineError::encoding(format!("signature does not recover: {e}")))
    }

    pub(crate) fn fields_len(&self) -> usize {
        self.y_parity.length() + self.r.length() + self.s.length()
    }

    pub(crate) fn encode_fields(&self, out: &mut dyn BufMut) {
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    pub(crate) fn decode_fields(buf: &mut &[u8]) -> rlp::Result<Self> {
        let y_parity = u8::decode(buf)?;
        if y_parity > 1 {
            return Err(rlp::Error::Custom("yParity must be 0 or 1"));
        }
        Ok(Self {
            y_parity,
            r: U256::decode(buf)?,
            s: U256::decode(buf)?,
        })
    }
}

impl From<Signature> for SignatureParts {
    fn from(signature: Signature) -> Self {
        Self {
            y_parity: signature.v() as u8,
            r: signature.r(),
            s: signature.s(),
        }
    }
}

/// Splits off exactly one RLP list payload from `buf`.
pub(crate) fn take_list<'a>(buf: &mut &'a [u8]) -> rlp::Result<&'a [u8]> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(rlp::Error::UnexpectedString);
    }
    if buf.len() < header.payload_length {
        return Err(rlp::Error::InputTooShort);
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(payload)
}

pub(crate) fn ensure_consumed(payload: &[u8], expected: usize) -> rlp::Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(rlp::Error::ListLengthMismatch {
            expected,
            got: expected - payload.len(),
        })
    }
}

/// An unsigned EIP-7702 delegation grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    pub chain_id: u64,
    pub address: Address,
    /// Must equal the authority's on-chain nonce when the transaction is included.
    pub nonce: u64,
}

impl Authorization {
    pub fn new(chain_id: u64, address: Address, nonce: u64) -> Self {
        Self {
            chain_id,
            address,
            nonce,
        }
    }

    fn fields_len(&self) -> usize {
        self.chain_id.length() + self.address.length() + self.nonce.length()
    }

    /// `0x05 ‖ rlp([chain_id, address, nonce])`
    pub fn preimage(&self) -> Bytes {
        let mut out = Vec::with_capacity(1 + self.length());
        out.push(EIP_7702_AUTHORIZATION_MAGIC);
        self.encode(&mut out);
        out.into()
    }

    pub fn digest(&self) -> B256 {
        keccak256(self.preimage())
    }

    /// Signs the digest as the authority. The nonce is taken as given.
    pub async fn sign<S: AccountSigner>(self, signer: &S) -> Result<SignedAuthorization, EngineError> {
        let signature = signer.sign_hash(self.digest()).await?;

        tracing::debug!(
            authority = ?signer.address(),
            chain_id = self.chain_id,
            delegate = ?self.address,
            nonce = self.nonce,
            "Signed EIP-7702 authorization"
        );

        Ok(SignedAuthorization::new(self, signature.into()))
    }
}

impl Encodable for Authorization {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.fields_len(),
        }
        .encode(out);
        self.chain_id.encode(out);
        self.address.encode(out);
        self.nonce.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_len();
        payload_length + rlp::length_of_length(payload_length)
    }
}

/// Digest for a delegate given as user input.
pub fn build_digest(chain_id: u64, delegate_address: &str, nonce: u64) -> Result<B256, EngineError> {
    let address = parse_address(delegate_address)?;
    Ok(Authorization::new(chain_id, address, nonce).digest())
}

/// An authorization together with the authority's signature. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SignedAuthorizationHex", try_from = "SignedAuthorizationHex")]
pub struct SignedAuthorization {
    inner: Authorization,
    signature: SignatureParts,
}

impl SignedAuthorization {
    pub fn new(inner: Authorization, signature: SignatureParts) -> Self {
        Self { inner, signature }
    }

    /// Builds an authorization signed elsewhere from its hex components.
    pub fn from_hex_parts(
        chain_id: &str,
        address: &str,
        nonce: &str,
        y_parity: &str,
        r: &str,
        s: &str,
    ) -> Result<Self, EngineError> {
        let inner = Authorization::new(
            parse_hex_u64("chainId", chain_id)?,
            parse_address_exact("address", address)?,
            parse_hex_u64("nonce", nonce)?,
        );
        Ok(Self::new(inner, SignatureParts::from_hex(y_parity, r, s)?))
    }

    pub fn authorization(&self) -> &Authorization {
        &self.inner
    }

    pub fn signature(&self) -> &SignatureParts {
        &self.signature
    }

    /// Address whose key produced the signature.
    pub fn recover_authority(&self) -> Result<Address, EngineError> {
        self.signature.recover_from_prehash(&self.inner.digest())
    }

    pub fn to_hex(&self) -> SignedAuthorizationHex {
        SignedAuthorizationHex {
            chain_id: canonical_hex_u64(self.inner.chain_id),
            address: self.inner.address.to_checksum(None),
            nonce: canonical_hex_u64(self.inner.nonce),
            y_parity: canonical_hex_u64(self.signature.y_parity as u64),
            r: word_hex(self.signature.r),
            s: word_hex(self.signature.s),
        }
    }

    fn fields_len(&self) -> usize {
        self.inner.fields_len() + self.signature.fields_len()
    }

    /// Strict decode of a single `[chain_id, address, nonce, y_parity, r, s]` tuple.
    pub fn decode_exact(bytes: &[u8]) -> Result<Self, EngineError> {
        let mut buf = bytes;
        let decoded = Self::decode(&mut buf).map_err(|e| rlp_error("authorization", e))?;
        if !buf.is_empty() {
            return Err(EngineError::encoding(format!(
                "authorization: {} trailing bytes",
                buf.len()
            )));
        }
        Ok(decoded)
    }
}

impl Encodable for SignedAuthorization {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.fields_len(),
        }
        .encode(out);
        self.inner.chain_id.encode(out);
        self.inner.address.encode(out);
        self.inner.nonce.encode(out);
        self.signature.encode_fields(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_len();
        payload_length + rlp::length_of_length(payload_length)
    }
}

impl Decodable for SignedAuthorization {
    fn decode(buf: &mut &[u8]) -> rlp::Result<Self> {
        let mut payload = take_list(buf)?;
        let expected = payload.len();

        let inner = Authorization {
            chain_id: u64::decode(&mut payload)?,
            address: Address::decode(&mut payload)?,
            nonce: u64::decode(&mut payload)?,
        };
        let signature = SignatureParts::decode_fields(&mut payload)?;
        ensure_consumed(payload, expected)?;

        Ok(Self { inner, signature })
    }
}

/// Canonical hex form: integers minimal (`0x` for zero), `r`/`s` padded to 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorizationHex {
    pub chain_id: String,
    pub address: String,
    pub nonce: String,
    pub y_parity: String,
    pub r: String,
    pub s: String,
}

impl From<SignedAuthorization> for SignedAuthorizationHex {
    fn from(value: SignedAuthorization) -> Self {
        value.to_hex()
    }
}

impl TryFrom<SignedAuthorizationHex> for SignedAuthorization {
    type Error = EngineError;

    fn try_from(value: SignedAuthorizationHex) -> Result<Self, Self::Error> {
        Self::from_hex_parts(
            &value.chain_id,
            &value.address,
            &value.nonce,
            &value.y_parity,
            &value.r,
            &value.s,
        )
    }
}
