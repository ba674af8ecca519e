use confirm_common::{
    ConfirmConfig, EstimationError, config::FeeStepConfig, to_display, units::TEZ_DECIMALS,
};
use confirm_estimation::{
    EstimationRunner, FeeOptionLabel, FeeStep, Pipeline, PipelineError,
    balances::TEZ_SLUG,
    tezos::{
        BalancesSource, OperationKind, TezosInput, TezosOperation, TezosOverrides, TezosPayload,
        TezosPipeline,
    },
};
use confirm_test_utils::{
    MockTezosRpc, TezosCall, init_tracing,
    tezos::{RECIPIENT_PKH, estimate, payload},
};
use alloy_primitives::{I256, U256};
use similar_asserts::assert_eq;
use std::{sync::Arc, time::Duration};

const STEP: FeeStep = FeeStep::new(10, 1);

fn transfers() -> Vec<TezosOperation> {
    vec![
        TezosOperation::transfer(RECIPIENT_PKH, 1_000),
        TezosOperation::transfer(RECIPIENT_PKH, 2_000),
        TezosOperation::transfer(RECIPIENT_PKH, 3_000),
    ]
}

fn input(payload: TezosPayload, overrides: TezosOverrides) -> TezosInput {
    TezosInput { payload: Arc::new(payload), overrides }
}

fn pipeline(rpc: &MockTezosRpc) -> TezosPipeline {
    TezosPipeline::new(Arc::new(rpc.clone()), STEP)
}

fn tez(amount: i64) -> I256 {
    I256::try_from(amount).unwrap()
}

#[tokio::test]
async fn tiers_around_declared_estimates() {
    init_tracing();
    let rpc = MockTezosRpc::new();
    let payload = TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    };

    let snapshot =
        pipeline(&rpc).estimate(input(payload, Default::default()), None).await.unwrap();

    assert_eq!(snapshot.baseline.gas_fee, 600);
    assert_eq!(snapshot.baseline.reveal_fee, 0);
    assert_eq!(snapshot.options.fees.slow, 540);
    assert_eq!(snapshot.options.fees.mid, 600);
    assert_eq!(snapshot.options.fees.fast, 660);
    assert_eq!(snapshot.options.displayed.mid, "0.0006");
    assert_eq!(snapshot.fee, 600);
    assert_eq!(snapshot.contents.iter().map(|c| c.fee).collect::<Vec<_>>(), vec![100, 200, 300]);
    assert_eq!(snapshot.contents.iter().map(|c| c.counter).collect::<Vec<_>>(), vec![42, 43, 44]);
    // Declared estimates skip the estimation round trip.
    assert_eq!(rpc.calls(TezosCall::ManagerKey), 0);
}

#[tokio::test]
async fn configured_step() {
    let rpc = MockTezosRpc::new();
    let config = ConfirmConfig {
        tezos: FeeStepConfig { step_percent: 20, min_step: 1 },
        ..Default::default()
    };
    let payload = TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    };

    let snapshot = TezosPipeline::from_config(Arc::new(rpc), &config)
        .estimate(input(payload, Default::default()), None)
        .await
        .unwrap();
    assert_eq!(snapshot.options.fees.slow, 480);
    assert_eq!(snapshot.options.fees.fast, 720);
}

#[tokio::test]
async fn estimates_through_the_node() {
    let rpc = MockTezosRpc::new();
    let pipeline = pipeline(&rpc);
    let input = input(payload(transfers()), Default::default());

    let first = pipeline.estimate(input.clone(), None).await.unwrap();
    let second = pipeline.estimate(input, None).await.unwrap();
    assert_eq!(first.baseline, second.baseline);

    // 224 forged bytes plus the signature, spread over three contents.
    let bytes = 96;
    let gas_limit = 1_100;
    let expected = 100 + gas_limit / 10 + bytes;
    assert!(first.baseline.estimates.iter().all(|e| e.suggested_fee == expected));
    assert!(first.contents.iter().all(|c| c.gas_limit == gas_limit));
    assert_eq!(first.baseline.gas_fee, 3 * expected);
    assert_eq!(first.balances_source, BalancesSource::Simulation);
}

#[tokio::test]
async fn previous_estimates_are_reused() {
    let rpc = MockTezosRpc::new();
    let pipeline = pipeline(&rpc);
    let input = input(payload(transfers()), Default::default());

    let first = Arc::new(pipeline.estimate(input.clone(), None).await.unwrap());
    let simulations = rpc.calls(TezosCall::Simulate);
    let second = pipeline.estimate(input, Some(first.clone())).await.unwrap();

    assert_eq!(first.baseline, second.baseline);
    assert_eq!(rpc.calls(TezosCall::ManagerKey), 1);
    // Only the balance simulation runs again.
    assert_eq!(rpc.calls(TezosCall::Simulate), simulations + 1);
}

#[tokio::test]
async fn reveals_unrevealed_sources_first() {
    let rpc = MockTezosRpc::new().unrevealed();

    let snapshot = pipeline(&rpc)
        .estimate(input(payload(transfers()), Default::default()), None)
        .await
        .unwrap();

    let reveal = snapshot.baseline.estimates[0];
    assert_eq!(snapshot.baseline.estimates.len(), 4);
    assert_eq!(snapshot.baseline.reveal_fee, reveal.suggested_fee + reveal.burn_fee);
    assert_eq!(snapshot.baseline.total_fee, snapshot.baseline.gas_fee + snapshot.baseline.burn_fee);
    assert!(matches!(snapshot.contents[0].kind, OperationKind::Reveal { .. }));
    assert_eq!(snapshot.contents.len(), 4);
    assert_eq!(snapshot.contents.iter().map(|c| c.fee).sum::<u64>(), snapshot.fee);
}

#[tokio::test]
async fn reveal_fee_follows_estimate_count() {
    let rpc = MockTezosRpc::new();
    let ops = vec![TezosOperation::transfer(RECIPIENT_PKH, 1)];

    let with_reveal = TezosPayload {
        estimates: Some(vec![estimate(374), estimate(400)]),
        ..payload(ops.clone())
    };
    let snapshot =
        pipeline(&rpc).estimate(input(with_reveal, Default::default()), None).await.unwrap();
    assert_eq!(snapshot.baseline.reveal_fee, 374);
    assert_eq!(snapshot.baseline.total_fee, 774);

    let without = TezosPayload { estimates: Some(vec![estimate(400)]), ..payload(ops) };
    let snapshot = pipeline(&rpc).estimate(input(without, Default::default()), None).await.unwrap();
    assert_eq!(snapshot.baseline.reveal_fee, 0);
    assert_eq!(snapshot.baseline.total_fee, 400);
}

#[tokio::test]
async fn overrides_resolve_fee() {
    let rpc = MockTezosRpc::new();
    let payload = TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    };

    let fast = TezosOverrides { selected: Some(FeeOptionLabel::Fast), ..Default::default() };
    let snapshot = pipeline(&rpc).estimate(input(payload.clone(), fast), None).await.unwrap();
    assert_eq!(snapshot.fee, 660);
    assert_eq!(snapshot.contents.iter().map(|c| c.fee).collect::<Vec<_>>(), vec![110, 220, 330]);

    let custom = TezosOverrides {
        custom_fee: Some(1_000),
        custom_storage_limit: Some(300),
        selected: Some(FeeOptionLabel::Fast),
    };
    let snapshot = pipeline(&rpc).estimate(input(payload, custom), None).await.unwrap();
    assert_eq!(snapshot.fee, 1_000);
    assert_eq!(snapshot.storage_limit, 300);
    assert_eq!(snapshot.contents.iter().map(|c| c.fee).sum::<u64>(), 1_000);
    assert_eq!(snapshot.contents.iter().map(|c| c.storage_limit).sum::<u64>(), 300);
}

#[tokio::test]
async fn simulated_balance_changes() {
    let rpc = MockTezosRpc::new();
    let snapshot = pipeline(&rpc)
        .estimate(input(payload(transfers()), Default::default()), None)
        .await
        .unwrap();

    assert_eq!(snapshot.balances_source, BalancesSource::Simulation);
    assert_eq!(snapshot.balances_changes.get(TEZ_SLUG).unwrap().atomic_amount, tez(-6_000));
}

#[tokio::test]
async fn falls_back_to_declared_operations() {
    let rpc = MockTezosRpc::new();
    let payload = TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    };
    rpc.fail(TezosCall::Simulate);

    let runner = EstimationRunner::new(pipeline(&rpc));
    runner.run_now(input(payload, Default::default())).await;

    let snapshot = runner.store().get_data().unwrap();
    assert_eq!(snapshot.balances_source, BalancesSource::Declared);
    assert_eq!(snapshot.balances_changes.get(TEZ_SLUG).unwrap().atomic_amount, tez(-6_000));
    assert!(runner.errors().get_data().is_none());
    // The full batch, then the batch at its estimated limits.
    assert_eq!(rpc.calls(TezosCall::Simulate), 2);
}

#[tokio::test]
async fn retries_simulation_with_estimated_limits() {
    let rpc = MockTezosRpc::new().with_simulator(|contents| {
        let mut results = confirm_test_utils::tezos::applied_results(contents);
        if contents.iter().map(|c| c.fee).sum::<u64>() > 600 {
            results[0].operation_result.status = confirm_estimation::tezos::OperationStatus::Failed;
        }
        Ok(results)
    });
    let payload = TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    };
    let overrides = TezosOverrides { custom_fee: Some(5_000), ..Default::default() };

    let snapshot = pipeline(&rpc).estimate(input(payload, overrides), None).await.unwrap();
    assert_eq!(snapshot.balances_source, BalancesSource::Simulation);
    assert_eq!(snapshot.fee, 5_000);
    let simulated = rpc.simulated();
    assert_eq!(simulated.len(), 2);
    assert_eq!(simulated[1].iter().map(|c| c.fee).collect::<Vec<_>>(), vec![100, 200, 300]);
}

#[tokio::test]
async fn forge_failures_keep_previous_snapshot() {
    let rpc = MockTezosRpc::new();
    let runner = EstimationRunner::new(pipeline(&rpc));
    let payload = Arc::new(TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    });
    let input = |custom_fee| TezosInput {
        payload: payload.clone(),
        overrides: TezosOverrides { custom_fee, ..Default::default() },
    };

    rpc.fail(TezosCall::Forge);
    runner.run_now(input(None)).await;
    assert!(!runner.store().get_data().unwrap().is_forged());

    rpc.recover(TezosCall::Forge);
    runner.run_now(input(Some(2_000))).await;
    assert_eq!(runner.store().get_data().unwrap().fee, 2_000);

    rpc.fail(TezosCall::Forge);
    runner.run_now(input(Some(3_000))).await;
    assert_eq!(runner.store().get_data().unwrap().fee, 2_000);
    assert!(runner.errors().get_data().is_none());
}

#[tokio::test]
async fn fees_publish_before_the_first_forge() {
    let rpc = MockTezosRpc::new();
    let runner = EstimationRunner::new(pipeline(&rpc));
    let payload = TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    };

    rpc.fail(TezosCall::Head);
    runner.run_now(input(payload.clone(), Default::default())).await;

    let snapshot = runner.store().get_data().unwrap();
    assert_eq!(snapshot.options.fees.mid, 600);
    assert_eq!(snapshot.fee, 600);
    assert!(!snapshot.is_forged());
    assert!(snapshot.contents.is_empty());
    assert_eq!(snapshot.balances_source, BalancesSource::Declared);
    assert_eq!(snapshot.balances_changes.get(TEZ_SLUG).unwrap().atomic_amount, tez(-6_000));
    assert_eq!(rpc.calls(TezosCall::Forge), 0);

    // Tier changes still reach the unforged snapshot.
    let overrides = TezosOverrides { selected: Some(FeeOptionLabel::Fast), ..Default::default() };
    runner.run_now(input(payload.clone(), overrides)).await;
    assert_eq!(runner.store().get_data().unwrap().fee, 660);

    rpc.recover(TezosCall::Head);
    runner.run_now(input(payload, overrides)).await;
    let snapshot = runner.store().get_data().unwrap();
    assert!(snapshot.is_forged());
    assert_eq!(snapshot.contents.len(), 3);
    assert!(runner.errors().get_data().is_none());
}

#[tokio::test]
async fn estimation_errors() {
    let rpc = MockTezosRpc::new();
    let pipeline = pipeline(&rpc);

    let unknown = TezosPayload { source_public_key: None, ..payload(transfers()) };
    let err = pipeline.estimate(input(unknown, Default::default()), None).await.unwrap_err();
    assert_eq!(err, PipelineError::Estimation(EstimationError::SourceUnknown));

    let external = TezosPayload { error: Some("counter in the past".into()), ..payload(transfers()) };
    let err = pipeline.estimate(input(external, Default::default()), None).await.unwrap_err();
    let expected = EstimationError::External("counter in the past".into());
    assert_eq!(err, PipelineError::Estimation(expected));

    rpc.fail(TezosCall::Counter);
    let err = pipeline
        .estimate(input(payload(transfers()), Default::default()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Estimation(EstimationError::Network(_))), "{err:?}");
}

#[tokio::test(start_paused = true)]
async fn latest_request_wins() {
    let rpc = MockTezosRpc::new();
    let runner = EstimationRunner::new(pipeline(&rpc));
    let payload = Arc::new(TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(transfers())
    });
    let input = |custom_fee| TezosInput {
        payload: payload.clone(),
        overrides: TezosOverrides { custom_fee: Some(custom_fee), ..Default::default() },
    };

    // The first request waits longer on the head than the second.
    rpc.delay_heads([Duration::from_millis(500), Duration::from_millis(100)]);
    let a = runner.trigger(input(1_000));
    let b = runner.trigger(input(2_000));

    b.await.unwrap();
    assert_eq!(runner.store().get_data().unwrap().fee, 2_000);
    a.await.unwrap();
    assert_eq!(runner.store().get_data().unwrap().fee, 2_000);
    assert_eq!(
        runner.store().get_data().unwrap().options.displayed.mid,
        to_display(U256::from(600), TEZ_DECIMALS)
    );
}
