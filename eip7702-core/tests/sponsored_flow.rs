
use std::sync::Arc;

use alloy::primitives::{Address, U256, address, utils::parse_ether};
use fixtures::*;
use sponsor_core::{error::EngineError, gas::GWEI, signer::AccountSigner};
use sponsor_eip7702_core::{
    calldata::{SequenceAction, SequenceOperation},
    constants::delegation_designator,
    draft::{SimulationPolicy, SimulationState, SponsorRequest, SponsoredCall},
    executor::SimulationOutcome,
    transaction::decode_signed,
};

const DELEGATE: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

fn request(call: SponsoredCall) -> SponsorRequest {
    SponsorRequest {
        chain_id: SEPOLIA,
        delegate_address: DELEGATE,
        call,
        gas_limit: Some(250_000),
        access_list: Default::default(),
    }
}

fn sweep_sequence() -> SponsoredCall {
    SponsoredCall::Sequence {
        operations: vec![
            SequenceOperation::enabled(SequenceAction::SendEth {
                amount: parse_ether("0.1").unwrap(),
            }),
            SequenceOperation::enabled(SequenceAction::SweepTokens {
                token_address: "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238".to_string(),
            }),
            SequenceOperation::enabled(SequenceAction::ExecuteCall {
                target: "0x2222222222222222222222222222222222222222".to_string(),
                call_data: "0x".to_string(),
                eth_amount: parse_ether("0.05").unwrap(),
            }),
        ],
    }
}

fn mock_chain() -> Arc<MockRpc> {
    Arc::new(
        MockRpc::new(SEPOLIA)
            .with_nonce(authority().address(), 5)
            .with_nonce(relayer().address(), 9),
    )
}

#[tokio::test]
async fn prepare_signs_with_fresh_nonces() {
    setup_tracing();
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);
    let authority = authority();

    let draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority)
        .await
        .unwrap();
    let prepared = draft.prepared().unwrap();

    assert_eq!(prepared.nonces.authority_nonce, 5);
    assert_eq!(prepared.nonces.relayer_nonce, 9);
    assert_eq!(prepared.authorization.authorization().nonce, 5);
    assert_eq!(prepared.authorization.recover_authority().unwrap(), authority.address());

    let decoded = decode_signed(prepared.transaction.raw()).unwrap();
    let tx = decoded.transaction();
    assert_eq!(tx.chain_id, SEPOLIA);
    assert_eq!(tx.nonce, 9);
    assert_eq!(tx.to, authority.address());
    assert_eq!(tx.gas_limit, 250_000);
    assert_eq!(tx.authorization_list, vec![prepared.authorization]);
    // no fee data and no gas API: static Sepolia entry
    assert_eq!(tx.max_fee_per_gas, 20 * GWEI);
    assert_eq!(tx.max_priority_fee_per_gas, 2 * GWEI);
    assert_eq!(decoded.recover_sender().unwrap(), executor.relayer_address());

    let overrides = &prepared.simulation_call.code_overrides;
    assert_eq!(
        overrides.get(&authority.address()),
        Some(&delegation_designator(DELEGATE))
    );
    assert_eq!(prepared.simulation_call.from, executor.relayer_address());
}

#[tokio::test]
async fn self_sponsored_authorization_uses_next_nonce() {
    let rpc = Arc::new(MockRpc::new(SEPOLIA).with_nonce(relayer().address(), 3));
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);

    let draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &relayer())
        .await
        .unwrap();
    let prepared = draft.prepared().unwrap();

    assert_eq!(prepared.transaction.transaction().nonce, 3);
    assert_eq!(prepared.authorization.authorization().nonce, 4);
}

#[tokio::test]
async fn reverted_simulation_blocks_execution_without_rpc_calls() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::reverting());
    let executor = executor(&rpc, &simulator);

    let mut draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority())
        .await
        .unwrap();
    let outcome = executor.simulate(&mut draft).await.unwrap();
    assert!(matches!(
        outcome,
        SimulationOutcome::Completed { ref verdict } if !verdict.success
    ));

    let calls_before = rpc.call_count();
    let err = executor.execute(&mut draft).await.unwrap_err();

    match err {
        EngineError::SimulationReverted {
            message,
            dashboard_url,
        } => {
            assert!(message.contains("exceeds balance"));
            assert!(dashboard_url.unwrap().ends_with("/simulator/sim-1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(rpc.call_count(), calls_before);
    assert!(rpc.sent().is_empty());
}

#[tokio::test]
async fn unsimulated_draft_is_not_executable() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);

    let mut draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority())
        .await
        .unwrap();
    let calls_before = rpc.call_count();

    assert!(matches!(
        executor.execute(&mut draft).await,
        Err(EngineError::SimulationRequired { .. })
    ));
    assert_eq!(rpc.call_count(), calls_before);
}

#[tokio::test]
async fn unavailable_simulation_follows_policy() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::unavailable());

    let blocking = executor(&rpc, &simulator);
    let mut draft = blocking
        .draft(request(SponsoredCall::DelegateOnly), &authority())
        .await
        .unwrap();
    assert!(matches!(
        blocking.simulate(&mut draft).await.unwrap(),
        SimulationOutcome::Unavailable { .. }
    ));
    assert!(matches!(
        blocking.execute(&mut draft).await,
        Err(EngineError::SimulationUnavailable { .. })
    ));
    assert!(rpc.sent().is_empty());

    let permissive =
        executor(&rpc, &simulator).with_policy(SimulationPolicy::AllowWhenUnavailable);
    let receipt = permissive.execute(&mut draft).await.unwrap();
    assert_eq!(rpc.sent().len(), 1);
    assert_eq!(receipt.tx_hash, draft.prepared().unwrap().transaction.hash());
}

#[tokio::test]
async fn passing_simulation_broadcasts_exactly_once() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);
    let authority = authority();

    let mut draft = executor
        .draft(request(sweep_sequence()), &authority)
        .await
        .unwrap();
    executor.simulate(&mut draft).await.unwrap();
    let receipt = executor.execute(&mut draft).await.unwrap();

    let sent = rpc.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0], draft.prepared().unwrap().transaction.raw());
    assert_eq!(receipt.authority, authority.address());
    assert_eq!(receipt.delegate, DELEGATE);

    let tx = decode_signed(&sent[0]).unwrap();
    assert_eq!(tx.transaction().value, parse_ether("0.15").unwrap());

    let simulated = simulator.last_call.lock().unwrap().clone().unwrap();
    assert_eq!(simulated.to, tx.transaction().to);
    assert_eq!(simulated.data, tx.transaction().input);
    assert_eq!(simulated.value, tx.transaction().value);
}

#[tokio::test]
async fn moved_nonce_aborts_before_broadcast() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);
    let authority = authority();

    let mut draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority)
        .await
        .unwrap();
    executor.simulate(&mut draft).await.unwrap();

    rpc.set_nonce(authority.address(), 6);

    match executor.execute(&mut draft).await {
        Err(EngineError::StaleNonceRisk {
            address,
            expected,
            actual,
        }) => {
            assert_eq!(address, authority.address());
            assert_eq!(expected, 5);
            assert_eq!(actual, 6);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(rpc.sent().is_empty());
}

#[tokio::test]
async fn changed_parameters_make_the_verdict_stale() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);
    let authority = authority();

    let mut draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority)
        .await
        .unwrap();
    executor.simulate(&mut draft).await.unwrap();

    draft.update(request(sweep_sequence()));
    executor.prepare(&mut draft, &authority).await.unwrap();

    assert!(matches!(
        executor.execute(&mut draft).await,
        Err(EngineError::SimulationRequired { .. })
    ));
    assert!(rpc.sent().is_empty());
}

#[tokio::test]
async fn late_verdicts_are_ignored() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);
    let authority = authority();

    let mut draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority)
        .await
        .unwrap();
    let ticket = draft.begin_simulation().unwrap();

    // a rebuild lands before the in-flight simulation answers
    executor.prepare(&mut draft, &authority).await.unwrap();

    assert!(!draft.record_verdict(ticket, verdict(true)));
    assert_eq!(draft.simulation(), &SimulationState::NotRun);
}

#[tokio::test]
async fn invalid_operation_fails_before_any_rpc_call() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);

    let call = SponsoredCall::Sequence {
        operations: vec![
            SequenceOperation::enabled(SequenceAction::SweepEth {
                amount: U256::from(1),
            }),
            SequenceOperation::enabled(SequenceAction::ExecuteCall {
                target: "0xnot-an-address".to_string(),
                call_data: "0x".to_string(),
                eth_amount: U256::ZERO,
            }),
        ],
    };

    match executor.draft(request(call), &authority()).await {
        Err(EngineError::InvalidOperationParams { index, field, .. }) => {
            assert_eq!(index, 2);
            assert_eq!(field, "target");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn node_rejection_is_not_retried() {
    let mut chain = MockRpc::new(SEPOLIA);
    chain.reject_broadcast = Some("nonce too low".to_string());
    let rpc = Arc::new(chain);
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);

    let mut draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority())
        .await
        .unwrap();
    executor.simulate(&mut draft).await.unwrap();

    let calls_before = rpc.call_count();
    assert!(matches!(
        executor.execute(&mut draft).await,
        Err(EngineError::RpcError { .. })
    ));
    // two nonce reads, one broadcast
    assert_eq!(rpc.call_count(), calls_before + 3);
    assert!(draft.is_submitted());

    // the same signed bytes are never sent a second time
    let calls_after_failure = rpc.call_count();
    assert!(matches!(
        executor.execute(&mut draft).await,
        Err(EngineError::SimulationRequired { .. })
    ));
    assert_eq!(rpc.call_count(), calls_after_failure);
}

#[tokio::test]
async fn spent_draft_needs_a_fresh_prepare() {
    let rpc = mock_chain();
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);
    let authority = authority();

    let mut draft = executor
        .draft(request(SponsoredCall::DelegateOnly), &authority)
        .await
        .unwrap();
    executor.simulate(&mut draft).await.unwrap();
    executor.execute(&mut draft).await.unwrap();
    assert_eq!(rpc.sent().len(), 1);

    assert!(matches!(
        executor.execute(&mut draft).await,
        Err(EngineError::SimulationRequired { .. })
    ));
    assert_eq!(rpc.sent().len(), 1);

    rpc.set_nonce(executor.relayer_address(), 10);
    executor.prepare(&mut draft, &authority).await.unwrap();
    assert!(!draft.is_submitted());
    executor.simulate(&mut draft).await.unwrap();
    executor.execute(&mut draft).await.unwrap();

    let sent = rpc.sent();
    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0], sent[1]);
    assert_eq!(decode_signed(&sent[1]).unwrap().transaction().nonce, 10);
}

#[tokio::test]
async fn wrong_chain_is_rejected() {
    let rpc = Arc::new(MockRpc::new(1));
    let simulator = Arc::new(MockSimulator::passing());
    let executor = executor(&rpc, &simulator);

    assert!(matches!(
        executor
            .draft(request(SponsoredCall::DelegateOnly), &authority())
            .await,
        Err(EngineError::ValidationError { .. })
    ));
}
