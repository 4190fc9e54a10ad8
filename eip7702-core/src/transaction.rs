use alloy::{
    eips::eip2930::AccessList,
    hex,
    primitives::{Address, B256, Bytes, TxHash, U256, keccak256},
    rlp::{self, BufMut, Decodable, Encodable, Header},
};
use serde::Serialize;
use sponsor_core::{error::EngineError, signer::AccountSigner};

use crate::{
    authorization::{SignatureParts, SignedAuthorization, SignedAuthorizationHex, ensure_consumed, take_list},
    constants::EIP_7702_TX_TYPE,
    encoding::{canonical_hex_u64, canonical_hex_u256, rlp_error, word_hex},
};

/// Body of a set-code transaction, before the sender signs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type4Transaction {
    pub chain_id: u64,
    /// The sender's (relayer's) nonce
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub access_list: AccessList,
    /// Kept in the order it was signed in
    pub authorization_list: Vec<SignedAuthorization>,
}

impl Type4Transaction {
    fn fields_len(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.input.length()
            + self.access_list.length()
            + self.authorization_list.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.input.encode(out);
        self.access_list.encode(out);
        self.authorization_list.encode(out);
    }

    fn decode_fields(buf: &mut &[u8]) -> rlp::Result<Self> {
        Ok(Self {
            chain_id: Decodable::decode(buf)?,
            nonce: Decodable::decode(buf)?,
            max_priority_fee_per_gas: Decodable::decode(buf)?,
            max_fee_per_gas: Decodable::decode(buf)?,
            gas_limit: Decodable::decode(buf)?,
            to: Decodable::decode(buf)?,
            value: Decodable::decode(buf)?,
            input: Decodable::decode(buf)?,
            access_list: Decodable::decode(buf)?,
            authorization_list: Decodable::decode(buf)?,
        })
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.authorization_list.is_empty() {
            return Err(EngineError::encoding(
                "a set-code transaction needs at least one authorization",
            ));
        }
        Ok(())
    }

    /// `rlp([chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas, gas_limit, to, value,
    /// data, access_list, authorization_list])`
    pub fn build_unsigned_payload(self) -> Result<UnsignedType4Payload, EngineError> {
        self.validate()?;

        let payload_length = self.fields_len();
        let mut rlp = Vec::with_capacity(payload_length + rlp::length_of_length(payload_length));
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut rlp);
        self.encode_fields(&mut rlp);

        Ok(UnsignedType4Payload {
            transaction: self,
            rlp: rlp.into(),
        })
    }
}

/// An encoded, not yet signed set-code transaction. The authorizations it
/// carries are frozen into `rlp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedType4Payload {
    transaction: Type4Transaction,
    rlp: Bytes,
}

impl UnsignedType4Payload {
    pub fn transaction(&self) -> &Type4Transaction {
        &self.transaction
    }

    pub fn rlp(&self) -> &Bytes {
        &self.rlp
    }

    /// `keccak256(0x04 ‖ rlp(payload))`
    pub fn signing_digest(&self) -> B256 {
        let mut preimage = Vec::with_capacity(1 + self.rlp.len());
        preimage.push(EIP_7702_TX_TYPE);
        preimage.extend_from_slice(&self.rlp);
        keccak256(preimage)
    }

    /// Appends the sender signature and produces the broadcastable envelope.
    pub fn assemble_signed(self, signature: SignatureParts) -> SignedType4Transaction {
        let payload_length = self.transaction.fields_len() + signature.fields_len();
        let mut raw =
            Vec::with_capacity(1 + payload_length + rlp::length_of_length(payload_length));
        raw.push(EIP_7702_TX_TYPE);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut raw);
        self.transaction.encode_fields(&mut raw);
        signature.encode_fields(&mut raw);

        SignedType4Transaction {
            transaction: self.transaction,
            signature,
            raw: raw.into(),
        }
    }

    pub async fn sign<S: AccountSigner>(self, signer: &S) -> Result<SignedType4Transaction, EngineError> {
        let signature = signer.sign_hash(self.signing_digest()).await?;
        let signed = self.assemble_signed(signature.into());

        tracing::debug!(
            sender = ?signer.address(),
            chain_id = signed.transaction.chain_id,
            nonce = signed.transaction.nonce,
            tx_hash = ?signed.hash(),
            "Signed set-code transaction"
        );

        Ok(signed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedType4Transaction {
    transaction: Type4Transaction,
    signature: SignatureParts,
    raw: Bytes,
}

impl SignedType4Transaction {
    pub fn transaction(&self) -> &Type4Transaction {
        &self.transaction
    }

    pub fn signature(&self) -> &SignatureParts {
        &self.signature
    }

    /// `0x04 ‖ rlp(...)`, ready for `eth_sendRawTransaction`
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        hex::encode_prefixed(&self.raw)
    }

    /// The hash the node reports for this transaction.
    pub fn hash(&self) -> TxHash {
        keccak256(&self.raw)
    }

    /// Recovers the sender from the envelope signature.
    pub fn recover_sender(&self) -> Result<Address, EngineError> {
        let unsigned = self.transaction.clone().build_unsigned_payload()?;
        self.signature.recover_from_prehash(&unsigned.signing_digest())
    }

    pub fn summary(&self) -> SignedType4Summary {
        let tx = &self.transaction;
        SignedType4Summary {
            hash: self.hash(),
            chain_id: canonical_hex_u64(tx.chain_id),
            nonce: canonical_hex_u64(tx.nonce),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas.to_string(),
            max_fee_per_gas: tx.max_fee_per_gas.to_string(),
            gas_limit: tx.gas_limit,
            to: tx.to,
            value: canonical_hex_u256(tx.value),
            data: tx.input.clone(),
            access_list: tx.access_list.clone(),
            authorization_list: tx.authorization_list.iter().map(|a| a.to_hex()).collect(),
            y_parity: canonical_hex_u64(self.signature.y_parity as u64),
            r: word_hex(self.signature.r),
            s: word_hex(self.signature.s),
            raw: self.raw.clone(),
        }
    }
}

/// Strict inverse of [`UnsignedType4Payload::assemble_signed`].
pub fn decode_signed(bytes: &[u8]) -> Result<SignedType4Transaction, EngineError> {
    let Some((&tx_type, mut buf)) = bytes.split_first() else {
        return Err(EngineError::encoding("empty transaction"));
    };
    if tx_type != EIP_7702_TX_TYPE {
        return Err(EngineError::encoding(format!(
            "expected type 0x04 envelope, got type byte 0x{tx_type:02x}"
        )));
    }

    let mut payload = take_list(&mut buf).map_err(|e| rlp_error("envelope", e))?;
    if !buf.is_empty() {
        return Err(EngineError::encoding(format!(
            "{} trailing bytes after envelope",
            buf.len()
        )));
    }

    let expected = payload.len();
    let transaction =
        Type4Transaction::decode_fields(&mut payload).map_err(|e| rlp_error("transaction", e))?;
    let signature =
        SignatureParts::decode_fields(&mut payload).map_err(|e| rlp_error("signature", e))?;
    ensure_consumed(payload, expected).map_err(|e| rlp_error("envelope", e))?;

    transaction.validate()?;

    Ok(SignedType4Transaction {
        transaction,
        signature,
        raw: Bytes::copy_from_slice(bytes),
    })
}

pub fn decode_signed_hex(raw: &str) -> Result<SignedType4Transaction, EngineError> {
    let bytes = hex::decode(raw.trim())
        .map_err(|e| EngineError::encoding(format!("raw transaction is not hex: {e}")))?;
    decode_signed(&bytes)
}

/// JSON view of a signed envelope with every integer in canonical form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedType4Summary {
    pub hash: TxHash,
    pub chain_id: String,
    pub nonce: String,
    pub max_priority_fee_per_gas: String,
    pub max_fee_per_gas: String,
    pub gas_limit: u64,
    pub to: Address,
    pub value: String,
    pub data: Bytes,
    pub access_list: AccessList,
    pub authorization_list: Vec<SignedAuthorizationHex>,
    pub y_parity: String,
    pub r: String,
    pub s: String,
    pub raw: Bytes,
}
