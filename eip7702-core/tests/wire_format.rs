use alloy::{
    consensus::{SignableTransaction, TxEip7702},
    eips::{
        eip2718::Encodable2718,
        eip2930::{AccessList, AccessListItem},
        eip7702::Authorization as AlloyAuthorization,
    },
    primitives::{Address, B256, Bytes, U256, address, keccak256},
};
use sponsor_core::signer::{AccountSigner, LocalAccountSigner};
use sponsor_eip7702_core::{
    authorization::{Authorization, SignedAuthorization},
    transaction::{Type4Transaction, decode_signed},
};

const DELEGATE: Address = address!("0x1111111111111111111111111111111111111111");

fn signer() -> LocalAccountSigner {
    LocalAccountSigner::from_private_key(
        "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    )
    .unwrap()
}

fn to_alloy(signed: &SignedAuthorization) -> alloy::eips::eip7702::SignedAuthorization {
    let auth = signed.authorization();
    let sig = signed.signature();
    alloy::eips::eip7702::SignedAuthorization::new_unchecked(
        AlloyAuthorization {
            chain_id: U256::from(auth.chain_id),
            address: auth.address,
            nonce: auth.nonce,
        },
        sig.y_parity,
        sig.r,
        sig.s,
    )
}

#[test]
fn authorization_digest_matches_alloy() {
    for (chain_id, nonce) in [(0u64, 0u64), (1, 0), (1, 1), (8453, 127), (11155111, 1 << 40)] {
        let ours = Authorization::new(chain_id, DELEGATE, nonce);
        let theirs = AlloyAuthorization {
            chain_id: U256::from(chain_id),
            address: DELEGATE,
            nonce,
        };
        assert_eq!(ours.digest(), theirs.signature_hash(), "chain {chain_id} nonce {nonce}");
    }
}

#[test]
fn digest_is_keccak_of_preimage() {
    let auth = Authorization::new(1, DELEGATE, 0);
    let preimage = auth.preimage();
    assert_eq!(preimage[0], 0x05);
    assert_eq!(keccak256(&preimage), auth.digest());
}

#[tokio::test]
async fn signed_envelope_matches_alloy_encoding() {
    let authority = signer();
    let authorization = Authorization::new(1, DELEGATE, 0)
        .sign(&authority)
        .await
        .unwrap();

    let access_list = AccessList(vec![AccessListItem {
        address: address!("0x2222222222222222222222222222222222222222"),
        storage_keys: vec![B256::with_last_byte(1)],
    }]);

    let tx = Type4Transaction {
        chain_id: 1,
        nonce: 0,
        max_priority_fee_per_gas: 2_000_000_000,
        max_fee_per_gas: 30_000_000_000,
        gas_limit: 120_000,
        to: authority.address(),
        value: U256::from(150_000_000_000_000_000u128),
        input: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        access_list: access_list.clone(),
        authorization_list: vec![authorization],
    };

    let alloy_tx = TxEip7702 {
        chain_id: 1,
        nonce: 0,
        gas_limit: 120_000,
        max_fee_per_gas: 30_000_000_000,
        max_priority_fee_per_gas: 2_000_000_000,
        to: authority.address(),
        value: U256::from(150_000_000_000_000_000u128),
        access_list,
        authorization_list: vec![to_alloy(&authorization)],
        input: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
    };

    let unsigned = tx.clone().build_unsigned_payload().unwrap();
    assert_eq!(unsigned.signing_digest(), alloy_tx.signature_hash());

    let relayer = LocalAccountSigner::from_private_key(
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    )
    .unwrap();
    let signed = unsigned.sign(&relayer).await.unwrap();

    let alloy_signed = alloy_tx.into_signed(signed.signature().to_signature());
    assert_eq!(signed.raw().as_ref(), alloy_signed.encoded_2718().as_slice());
    assert_eq!(signed.hash(), *alloy_signed.hash());

    let decoded = decode_signed(signed.raw()).unwrap();
    assert_eq!(decoded.transaction(), &tx);
    assert_eq!(decoded.recover_sender().unwrap(), relayer.address());
    assert_eq!(
        decoded.transaction().authorization_list[0]
            .recover_authority()
            .unwrap(),
        authority.address()
    );
}

#[test]
fn zero_valued_fields_stay_empty_in_the_envelope() {
    let authorization = SignedAuthorization::from_hex_parts(
        "0x",
        "0x1111111111111111111111111111111111111111",
        "0x",
        "0x",
        &format!("0x{}", "01".repeat(32)),
        &format!("0x{}", "02".repeat(32)),
    )
    .unwrap();

    let unsigned = Type4Transaction {
        chain_id: 1,
        nonce: 0,
        max_priority_fee_per_gas: 0,
        max_fee_per_gas: 0,
        gas_limit: 0,
        to: DELEGATE,
        value: U256::ZERO,
        input: Bytes::new(),
        access_list: AccessList::default(),
        authorization_list: vec![authorization],
    }
    .build_unsigned_payload()
    .unwrap();

    let mut body = unsigned.rlp().as_ref();
    let header = alloy::rlp::Header::decode(&mut body).unwrap();
    assert!(header.list);
    assert_eq!(header.payload_length, body.len());

    // chain id 1, then four zero integers before the address
    assert_eq!(&body[..5], &[0x01, 0x80, 0x80, 0x80, 0x80]);
    assert_eq!(body[5], 0x94);
    // value, data, empty access list
    assert_eq!(&body[26..29], &[0x80, 0x80, 0xc0]);

    // skip the authorization list header and the tuple header
    let tuple = &body[29 + 2 + 2..];
    assert_eq!(tuple[0], 0x80);
    assert_eq!(tuple[1], 0x94);
    assert_eq!(tuple[22], 0x80);
    assert_eq!(tuple[23], 0x80);
}
