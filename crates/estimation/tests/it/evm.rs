use alloy_primitives::{Address, Bytes, I256, TxKind, U256};
use alloy_rpc_types::TransactionRequest;
use confirm_common::{ConfirmConfig, config::FeeStepConfig};
use confirm_estimation::{
    EstimationRunner, FeeStep, Pipeline, PendingOperationPayload,
    balances::ETH_SLUG,
    evm::{
        EvmGasSuggestion, EvmInput, EvmOverrides, EvmPayload, EvmPipeline, GasPrice,
        SimulatedCall,
    },
};
use confirm_test_utils::{
    EvmCall, MockEvmClient,
    evm::{CHAIN_ID, GWEI, RECIPIENT, SENDER},
};
use similar_asserts::assert_eq;
use std::sync::Arc;

const STEP: FeeStep = FeeStep::new(10, 1);
const ETHER: u128 = 1_000_000_000_000_000_000;

fn transfer() -> TransactionRequest {
    TransactionRequest {
        to: Some(TxKind::Call(RECIPIENT)),
        value: Some(U256::from(ETHER)),
        ..Default::default()
    }
}

fn input(payload: EvmPayload, overrides: EvmOverrides) -> EvmInput {
    EvmInput { payload: Arc::new(payload), overrides }
}

fn pipeline(client: &MockEvmClient) -> EvmPipeline {
    EvmPipeline::new(Arc::new(client.clone()), STEP)
}

#[tokio::test]
async fn priority_fee_tiers() {
    let client = MockEvmClient::new();
    let tx = TransactionRequest {
        max_fee_per_gas: Some(50 * GWEI),
        max_priority_fee_per_gas: Some(2 * GWEI),
        gas: Some(21_000),
        ..transfer()
    };

    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, tx), Default::default()), None)
        .await
        .unwrap();

    assert_eq!(snapshot.baseline.gas_price, GasPrice::eip1559(50 * GWEI, Some(2 * GWEI)));
    assert_eq!(snapshot.options.prices.fast.max_fee(), 55 * GWEI);
    assert_eq!(snapshot.options.prices.slow.max_fee(), 45 * GWEI);
    // 21000 × 50 gwei and 21000 × 55 gwei.
    assert_eq!(snapshot.options.displayed.mid, "0.00105");
    assert_eq!(snapshot.options.displayed.fast, "0.001155");
    // Declared gas values are not fetched again.
    assert_eq!(client.calls(EvmCall::Eip1559Fees), 0);
    assert_eq!(client.calls(EvmCall::EstimateGas), 0);
}

#[tokio::test]
async fn fills_missing_fields_from_the_node() {
    let client = MockEvmClient::new().with_nonce(12);

    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, transfer()), Default::default()), None)
        .await
        .unwrap();

    assert_eq!(snapshot.chain_id, Some(CHAIN_ID));
    assert_eq!(snapshot.suggestion.nonce, Some(12));
    // Plain transfers use the transfer gas limit without asking the node.
    assert_eq!(snapshot.baseline.gas_limit, 21_000);
    assert_eq!(client.calls(EvmCall::EstimateGas), 0);

    let resolved = &snapshot.resolved;
    assert_eq!(resolved.from, Some(SENDER));
    assert_eq!(resolved.nonce, Some(12));
    assert_eq!(resolved.max_fee_per_gas, Some(50 * GWEI));
    assert_eq!(snapshot.serialized.as_ref().map(|bytes| bytes[0]), Some(2));
}

#[tokio::test]
async fn configured_step_and_transfer_limit() {
    let client = MockEvmClient::new();
    let config = ConfirmConfig {
        evm: FeeStepConfig { step_percent: 20, min_step: 1 },
        transfer_gas_limit: 30_000,
        ..Default::default()
    };
    let pipeline = EvmPipeline::from_config(Arc::new(client.clone()), &config);
    assert_eq!(pipeline.step(), FeeStep::new(20, 1));

    let snapshot = pipeline
        .estimate(input(EvmPayload::new(SENDER, transfer()), Default::default()), None)
        .await
        .unwrap();
    assert_eq!(snapshot.baseline.gas_limit, 30_000);
    assert_eq!(snapshot.options.prices.fast.max_fee(), 60 * GWEI);
    // 30000 × 50 gwei.
    assert_eq!(snapshot.options.displayed.mid, "0.0015");
    assert_eq!(client.calls(EvmCall::EstimateGas), 0);
}

#[tokio::test]
async fn contract_calls_estimate_gas() {
    let client = MockEvmClient::new().with_gas_estimate(84_000).with_gas_price(20 * GWEI);
    let tx = TransactionRequest {
        gas_price: Some(30 * GWEI),
        input: Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb]).into(),
        ..transfer()
    };

    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, tx), Default::default()), None)
        .await
        .unwrap();

    assert_eq!(snapshot.baseline.gas_limit, 84_000);
    assert_eq!(snapshot.baseline.gas_price, GasPrice::Legacy { gas_price: 30 * GWEI });
    assert_eq!(snapshot.options.prices.fast, GasPrice::Legacy { gas_price: 33 * GWEI });
    assert_eq!(client.calls(EvmCall::GasPrice), 0);
    assert!(snapshot.resolved.max_fee_per_gas.is_none());
}

#[tokio::test]
async fn reuses_payload_and_previous_suggestions() {
    let client = MockEvmClient::new();
    let suggestion = EvmGasSuggestion {
        gas_price: GasPrice::Legacy { gas_price: 10 * GWEI },
        gas_limit: 50_000,
        nonce: Some(3),
    };
    let payload = EvmPayload { suggestion: Some(suggestion), ..EvmPayload::new(SENDER, transfer()) };
    let pipeline = pipeline(&client);

    let first = pipeline.estimate(input(payload, Default::default()), None).await.unwrap();
    // The skeleton has no legacy price, so the suggestion moves to the priority fee market.
    assert_eq!(first.baseline.gas_price, GasPrice::eip1559(10 * GWEI, None));
    assert_eq!(first.baseline.gas_limit, 50_000);
    assert_eq!(first.resolved.nonce, Some(3));

    let previous = Some(Arc::new(first.clone()));
    let second = pipeline
        .estimate(input(EvmPayload::new(SENDER, transfer()), Default::default()), previous)
        .await
        .unwrap();
    assert_eq!(second.baseline, first.baseline);
    assert_eq!(client.calls(EvmCall::Eip1559Fees), 0);
    assert_eq!(client.calls(EvmCall::TransactionCount), 0);
}

#[tokio::test]
async fn unknown_nonce_omits_serialization() {
    let client = MockEvmClient::new();
    client.fail(EvmCall::TransactionCount);

    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, transfer()), Default::default()), None)
        .await
        .unwrap();
    assert!(snapshot.resolved.nonce.is_none());
    assert!(snapshot.serialized.is_none());

    let overrides = EvmOverrides { custom_nonce: Some(4), ..Default::default() };
    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, transfer()), overrides), None)
        .await
        .unwrap();
    assert_eq!(snapshot.resolved.nonce, Some(4));
    assert!(snapshot.serialized.is_some());
}

#[tokio::test]
async fn custom_values_flow_into_the_request() {
    let client = MockEvmClient::new();
    let overrides = EvmOverrides {
        custom_gas_price: Some(70 * GWEI),
        custom_gas_limit: Some(30_000),
        ..Default::default()
    };

    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, transfer()), overrides), None)
        .await
        .unwrap();
    assert_eq!(snapshot.resolved.gas, Some(30_000));
    assert_eq!(snapshot.resolved.max_fee_per_gas, Some(70 * GWEI));
    assert_eq!(snapshot.resolved.max_priority_fee_per_gas, Some(2 * GWEI));
    // The baseline stays what the node suggested.
    assert_eq!(snapshot.baseline.gas_price.max_fee(), 50 * GWEI);
    assert_eq!(client.simulated()[0].gas, Some(30_000));
}

#[tokio::test]
async fn simulated_balance_changes() {
    let client = MockEvmClient::new();

    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, transfer()), Default::default()), None)
        .await
        .unwrap();

    let eth = snapshot.balances_changes.get(ETH_SLUG).unwrap();
    assert_eq!(eth.atomic_amount, -I256::try_from(ETHER).unwrap());
    assert!(!eth.is_collectible);
}

#[tokio::test]
async fn failed_simulations_keep_previous_changes() {
    let client = MockEvmClient::new();
    let runner = EstimationRunner::new(pipeline(&client));
    let payload = Arc::new(EvmPayload::new(SENDER, transfer()));
    let input = || EvmInput { payload: payload.clone(), overrides: Default::default() };

    runner.run_now(input()).await;
    let first = runner.store().get_data().unwrap();

    client.fail(EvmCall::Simulate);
    runner.run_now(input()).await;
    let second = runner.store().get_data().unwrap();
    assert_eq!(second.balances_changes, first.balances_changes);
    assert!(runner.errors().get_data().is_none());
}

#[tokio::test]
async fn reverted_simulation_yields_no_changes() {
    let client = MockEvmClient::new().with_simulator(|_| {
        Ok(SimulatedCall { success: false, ..Default::default() })
    });

    let snapshot = pipeline(&client)
        .estimate(input(EvmPayload::new(SENDER, transfer()), Default::default()), None)
        .await
        .unwrap();
    assert!(snapshot.balances_changes.is_empty());
}

#[tokio::test]
async fn unknown_sender() {
    let client = MockEvmClient::new();
    let payload = EvmPayload { tx: transfer(), ..Default::default() };

    let runner = EstimationRunner::new(pipeline(&client));
    runner.run_now(input(payload, Default::default())).await;
    assert_eq!(
        runner.errors().get_data().as_deref(),
        Some(&confirm_common::EstimationError::SourceUnknown)
    );
    assert!(runner.store().get_data().is_none());
    assert_eq!(client.calls(EvmCall::ChainId), 0);
}

#[test]
fn payload_from_json() {
    let payload: PendingOperationPayload = serde_json::from_value(serde_json::json!({
        "chain": "evm",
        "tx": {
            "from": Address::repeat_byte(0x11),
            "to": RECIPIENT,
            "maxFeePerGas": "0xba43b7400",
            "gas": "0x5208"
        }
    }))
    .unwrap();
    let PendingOperationPayload::Evm(payload) = payload else { panic!("expected evm payload") };
    assert_eq!(payload.sender(), Some(SENDER));
    assert_eq!(GasPrice::from_request(&payload.tx), Some(GasPrice::eip1559(50 * GWEI, None)));
}
