use alloy_primitives::{TxKind, U256};
use alloy_rpc_types::TransactionRequest;
use confirm_common::{ConfirmConfig, EstimationError, SubmitError, config::FeeStepConfig};
use confirm_estimation::{
    FeeOptionLabel, FeeStep,
    evm::{EvmPayload, EvmPipeline},
    tezos::{TezosOperation, TezosPayload, TezosPipeline},
};
use confirm_form::{
    FieldError, FormError, FormField, Session, SubmitPayload, SubmitRejection, Tab,
    TxFormController, TxParamsFormData,
};
use confirm_test_utils::{
    EvmCall, MockEvmClient, MockTezosRpc, TezosCall, init_tracing,
    evm::{GWEI, RECIPIENT, SENDER},
    tezos::{RECIPIENT_PKH, estimate, payload},
};
use similar_asserts::assert_eq;
use std::{sync::Arc, time::Duration};

const STEP: FeeStep = FeeStep::new(10, 1);
const DEBOUNCE: Duration = Duration::from_millis(300);

fn tezos_payload() -> TezosPayload {
    TezosPayload {
        estimates: Some(vec![estimate(100), estimate(200), estimate(300)]),
        ..payload(vec![
            TezosOperation::transfer(RECIPIENT_PKH, 1_000),
            TezosOperation::transfer(RECIPIENT_PKH, 2_000),
            TezosOperation::transfer(RECIPIENT_PKH, 3_000),
        ])
    }
}

fn tezos_controller(rpc: &MockTezosRpc, payload: TezosPayload) -> TxFormController {
    let pipeline = TezosPipeline::new(Arc::new(rpc.clone()), STEP);
    TxFormController::new(Session::tezos(pipeline, payload), DEBOUNCE)
}

fn evm_controller(client: &MockEvmClient) -> TxFormController {
    let tx = TransactionRequest {
        to: Some(TxKind::Call(RECIPIENT)),
        value: Some(U256::from(1)),
        ..Default::default()
    };
    let pipeline = EvmPipeline::new(Arc::new(client.clone()), STEP);
    TxFormController::new(Session::evm(pipeline, EvmPayload::new(SENDER, tx)), DEBOUNCE)
}

fn tezos_form(controller: &TxFormController) -> confirm_form::TezosFormData {
    match controller.form() {
        TxParamsFormData::Tezos(form) => form,
        TxParamsFormData::Evm(_) => panic!("expected a tezos form"),
    }
}

#[tokio::test(start_paused = true)]
async fn submits_declared_mid_fee() {
    init_tracing();
    let rpc = MockTezosRpc::new();
    let controller = tezos_controller(&rpc, tezos_payload());

    // Nothing estimated yet: the declared estimates give the baseline.
    assert_eq!(
        controller.on_submit(),
        Ok(SubmitPayload::Tezos { fee: 600, storage_limit: 0 })
    );

    controller.start().await.unwrap();
    controller.refresh();
    assert_eq!(tezos_form(&controller).fee, "0.0006");
    assert!(tezos_form(&controller).forged_bytes.is_some());
    assert_eq!(
        controller.on_submit(),
        Ok(SubmitPayload::Tezos { fee: 600, storage_limit: 0 })
    );
}

#[tokio::test(start_paused = true)]
async fn no_fee_without_any_baseline() {
    let rpc = MockTezosRpc::new();
    let controller = tezos_controller(&rpc, TezosPayload { estimates: None, ..tezos_payload() });
    assert_eq!(controller.on_submit(), Err(SubmitRejection::NoFee));

    controller.set_field(FormField::Fee, "0.001").unwrap();
    assert_eq!(
        controller.on_submit(),
        Ok(SubmitPayload::Tezos { fee: 1_000, storage_limit: 0 })
    );
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_collapse_into_one_recomputation() {
    let rpc = MockTezosRpc::new();
    let controller = tezos_controller(&rpc, tezos_payload());

    for fee in ["0.001", "0.002", "0.003"] {
        controller.set_field(FormField::Fee, fee).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(rpc.calls(TezosCall::Forge), 0);

    tokio::time::sleep(DEBOUNCE).await;
    assert_eq!(rpc.calls(TezosCall::Forge), 1);
    controller.refresh();
    let form = tezos_form(&controller);
    assert_eq!(form.fee, "0.003");
    assert_eq!(form.storage_limit, "0");
    assert_eq!(controller.on_submit(), Ok(SubmitPayload::Tezos { fee: 3_000, storage_limit: 0 }));
}

#[tokio::test(start_paused = true)]
async fn config_sets_debounce_and_tiers() {
    let rpc = MockTezosRpc::new();
    let config = ConfirmConfig {
        debounce_ms: 50,
        tezos: FeeStepConfig { step_percent: 20, min_step: 1 },
        ..Default::default()
    };
    let pipeline = TezosPipeline::from_config(Arc::new(rpc.clone()), &config);
    let session = Session::tezos(pipeline, tezos_payload());
    let controller = TxFormController::with_config(session, &config);

    controller.set_field(FormField::Fee, "0.001").unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(rpc.calls(TezosCall::Forge), 1);

    controller.select_tier(FeeOptionLabel::Slow).await.unwrap();
    assert_eq!(controller.on_submit(), Ok(SubmitPayload::Tezos { fee: 480, storage_limit: 0 }));
}

#[tokio::test(start_paused = true)]
async fn selecting_a_tier_drops_the_custom_fee() {
    let rpc = MockTezosRpc::new();
    let controller = tezos_controller(&rpc, tezos_payload());

    controller.set_field(FormField::Fee, "0.005").unwrap();
    controller.select_tier(FeeOptionLabel::Fast).await.unwrap();
    assert_eq!(controller.selected_tier(), Some(FeeOptionLabel::Fast));
    assert!(!controller.form().is_touched(FormField::Fee));

    controller.refresh();
    assert_eq!(tezos_form(&controller).fee, "0.00066");
    assert_eq!(controller.on_submit(), Ok(SubmitPayload::Tezos { fee: 660, storage_limit: 0 }));

    // Any edit deselects the tier again.
    controller.set_field(FormField::StorageLimit, "300").unwrap();
    assert_eq!(controller.selected_tier(), None);
    assert_eq!(controller.on_submit(), Ok(SubmitPayload::Tezos { fee: 600, storage_limit: 300 }));
}

#[tokio::test(start_paused = true)]
async fn invalid_fields_stay_inline() {
    let rpc = MockTezosRpc::new();
    let controller = tezos_controller(&rpc, tezos_payload());

    let err = controller.set_field(FormField::Fee, "1,5").unwrap_err();
    assert!(matches!(err, FieldError::Invalid(_)));
    assert!(matches!(
        controller.on_submit(),
        Err(SubmitRejection::InvalidField { field: FormField::Fee, .. })
    ));
    assert!(matches!(
        controller.set_field(FormField::Nonce, "1"),
        Err(FieldError::NotApplicable { field: FormField::Nonce, .. })
    ));

    tokio::time::sleep(DEBOUNCE * 2).await;
    controller.refresh();
    assert_eq!(rpc.calls(TezosCall::Forge), 0);
    assert_eq!(controller.error(), None);
    assert!(!controller.available_tabs().contains(&Tab::Error));
}

#[tokio::test(start_paused = true)]
async fn new_errors_force_the_error_tab() {
    let rpc = MockTezosRpc::new();
    let payload = TezosPayload { source_public_key: None, ..tezos_payload() };
    let controller = tezos_controller(&rpc, payload);
    assert!(!controller.select_tab(Tab::Error));

    controller.start().await.unwrap();
    controller.refresh();
    assert_eq!(controller.selected_tab(), Tab::Error);
    assert_eq!(controller.error(), Some(FormError::Estimation(EstimationError::SourceUnknown)));

    // The same error does not take the user back.
    assert!(controller.select_tab(Tab::Details));
    controller.start().await.unwrap();
    controller.refresh();
    assert_eq!(controller.selected_tab(), Tab::Details);

    let submit = SubmitError::Broadcast("fee too low".to_string());
    controller.report_submit_error(submit.clone());
    assert_eq!(controller.selected_tab(), Tab::Error);
    assert_eq!(controller.error(), Some(FormError::Submit(submit)));
}

#[tokio::test(start_paused = true)]
async fn evm_submit_needs_a_nonce() {
    let client = MockEvmClient::new();
    client.fail(EvmCall::TransactionCount);
    let controller = evm_controller(&client);

    controller.start().await.unwrap();
    controller.refresh();
    assert_eq!(controller.form().value(FormField::Nonce), Some(""));
    assert_eq!(controller.form().value(FormField::GasPrice), Some("50"));
    assert_eq!(controller.on_submit(), Err(SubmitRejection::Incomplete));

    controller.set_field(FormField::Nonce, "5").unwrap();
    controller.set_field(FormField::GasPrice, "70").unwrap();
    let Ok(SubmitPayload::Evm { request, serialized }) = controller.on_submit() else {
        panic!("expected a resolved transaction")
    };
    assert_eq!(request.nonce, Some(5));
    assert_eq!(request.max_fee_per_gas, Some(70 * GWEI));
    assert_eq!(request.gas, Some(21_000));
    assert_eq!(serialized[0], 2);
}

#[tokio::test(start_paused = true)]
async fn evm_gas_edits_recompute() {
    let client = MockEvmClient::new();
    let controller = evm_controller(&client);
    controller.start().await.unwrap();
    let simulations = client.calls(EvmCall::Simulate);

    controller.set_field(FormField::GasLimit, "30000").unwrap();
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(client.calls(EvmCall::Simulate), simulations + 1);
    assert_eq!(client.simulated().last().and_then(|tx| tx.gas), Some(30_000));

    controller.refresh();
    assert_eq!(controller.form().value(FormField::GasLimit), Some("30000"));
    assert_eq!(controller.form().value(FormField::Nonce), Some("7"));
}
