//! The confirmation form of one pending operation.

use crate::{
    fields::{EvmFormData, FieldError, FormField, TezosFormData, TxParamsFormData},
    tabs::{FormError, Tab, TabState},
};
use alloy_primitives::Bytes;
use alloy_rpc_types::TransactionRequest;
use confirm_common::{ConfirmConfig, Debouncer, InvalidNumericInput, SubmitError};
use confirm_estimation::{
    EstimationRunner, ErrorCell, FeeOptionLabel,
    evm::{
        EvmFeeBaseline, EvmGasSuggestion, EvmInput, EvmPayload, EvmPipeline, GasMarket, GasPrice,
        serialize_unsigned,
    },
    options::{EvmFeeOptions, TezosFeeOptions},
    tezos::{TezosFeeBaseline, TezosInput, TezosPayload, TezosPipeline},
};
use parking_lot::Mutex;
use std::{fmt, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

/// The chain specific half of a confirmation session: the pending operation and the runner that
/// estimates it.
pub enum Session {
    /// A Tezos batch.
    Tezos {
        /// Runner of the Tezos pipeline.
        runner: EstimationRunner<TezosPipeline>,
        /// The pending batch.
        payload: Arc<TezosPayload>,
    },
    /// An EVM transaction.
    Evm {
        /// Runner of the EVM pipeline.
        runner: EstimationRunner<EvmPipeline>,
        /// The pending transaction.
        payload: Arc<EvmPayload>,
    },
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tezos { runner, .. } => f.debug_tuple("Tezos").field(runner).finish(),
            Self::Evm { runner, .. } => f.debug_tuple("Evm").field(runner).finish(),
        }
    }
}

impl Session {
    /// A session estimating `payload` with `pipeline`.
    pub fn tezos(pipeline: TezosPipeline, payload: impl Into<Arc<TezosPayload>>) -> Self {
        Self::Tezos { runner: EstimationRunner::new(pipeline), payload: payload.into() }
    }

    /// A session estimating `payload` with `pipeline`.
    pub fn evm(pipeline: EvmPipeline, payload: impl Into<Arc<EvmPayload>>) -> Self {
        Self::Evm { runner: EstimationRunner::new(pipeline), payload: payload.into() }
    }

    /// The estimation error cell of the runner.
    pub fn errors(&self) -> &ErrorCell {
        match self {
            Self::Tezos { runner, .. } => runner.errors(),
            Self::Evm { runner, .. } => runner.errors(),
        }
    }

    fn empty_form(&self) -> TxParamsFormData {
        match self {
            Self::Tezos { .. } => TxParamsFormData::Tezos(TezosFormData::default()),
            Self::Evm { .. } => TxParamsFormData::Evm(EvmFormData::default()),
        }
    }
}

/// What the signer receives once the user confirms.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitPayload {
    /// Final values of a Tezos batch.
    Tezos {
        /// Total fee, in mutez.
        fee: u64,
        /// Total storage limit, in bytes.
        storage_limit: u64,
    },
    /// A fully resolved EVM transaction.
    Evm {
        /// The request, every field set.
        request: TransactionRequest,
        /// Its unsigned encoding.
        serialized: Bytes,
    },
}

/// Why a submit was refused without calling the signer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejection {
    /// A field does not parse.
    #[error("invalid {field}: {error}")]
    InvalidField {
        /// The offending field.
        field: FormField,
        /// Why it does not parse.
        #[source]
        error: InvalidNumericInput,
    },
    /// Neither a custom fee, a tier nor a baseline is available.
    #[error("no fee could be resolved")]
    NoFee,
    /// The transaction still misses a chain id, nonce or gas value.
    #[error("transaction is not fully resolved")]
    Incomplete,
}

#[derive(Debug)]
struct State {
    form: TxParamsFormData,
    selected: Option<FeeOptionLabel>,
    tabs: TabState,
    submit_error: Option<SubmitError>,
}

/// Binds the form of one pending operation to its estimation runner.
///
/// Edits are validated right away and recomputed after the debounce window; the snapshot they
/// produce is pulled back into the form by [`refresh`](Self::refresh). Must be used from within a
/// tokio runtime.
#[derive(Clone, Debug)]
pub struct TxFormController {
    session: Arc<Session>,
    state: Arc<Mutex<State>>,
    debouncer: Debouncer<FormField>,
}

impl TxFormController {
    /// Creates a controller recomputing `debounce` after the last edit of a field.
    pub fn new(session: Session, debounce: Duration) -> Self {
        let state = State {
            form: session.empty_form(),
            selected: None,
            tabs: TabState::new(),
            submit_error: None,
        };
        let this = Self {
            session: Arc::new(session),
            state: Arc::new(Mutex::new(state)),
            debouncer: Debouncer::new(debounce),
        };
        this.refresh();
        this
    }

    /// Creates a controller with the configured debounce window.
    pub fn with_config(session: Session, config: &ConfirmConfig) -> Self {
        Self::new(session, config.debounce())
    }

    /// The session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs the first estimation.
    pub fn start(&self) -> JoinHandle<()> {
        self.recompute()
    }

    /// Replaces the text of `field`.
    ///
    /// Any edit deselects the fee tier. Text that parses schedules a recomputation once the
    /// field has been quiet for the debounce window; text that does not is kept with its error
    /// and recomputes nothing.
    pub fn set_field(&self, field: FormField, text: impl Into<String>) -> Result<(), FieldError> {
        {
            let mut state = self.state.lock();
            let result = state.form.edit(field, text);
            if matches!(result, Err(FieldError::NotApplicable { .. })) {
                return result;
            }
            state.selected = None;
            result?;
        }

        trace!(target: "confirm::form", %field, "scheduling recomputation");
        let this = self.clone();
        self.debouncer.call(field, move || {
            this.recompute();
        });
        Ok(())
    }

    /// Selects a fee tier, dropping the custom fee, and recomputes right away.
    pub fn select_tier(&self, label: FeeOptionLabel) -> JoinHandle<()> {
        {
            let mut state = self.state.lock();
            state.selected = Some(label);
            let fee_field = match &*self.session {
                Session::Tezos { .. } => FormField::Fee,
                Session::Evm { .. } => FormField::GasPrice,
            };
            state.form.untouch(fee_field);
        }
        self.recompute()
    }

    /// Starts a recomputation with the current form values.
    pub fn recompute(&self) -> JoinHandle<()> {
        let state = self.state.lock();
        match &*self.session {
            Session::Tezos { runner, payload } => runner.trigger(TezosInput {
                payload: payload.clone(),
                overrides: state.form.tezos_overrides(state.selected),
            }),
            Session::Evm { runner, payload } => runner.trigger(EvmInput {
                payload: payload.clone(),
                overrides: state.form.evm_overrides(state.selected),
            }),
        }
    }

    /// Pulls the latest snapshot and error into the form.
    ///
    /// Untouched fields follow the snapshot; the error tab is forced when a new error shows up.
    pub fn refresh(&self) {
        let mut state = self.state.lock();
        match (&*self.session, &mut state.form) {
            (Session::Tezos { runner, .. }, TxParamsFormData::Tezos(form)) => {
                if let Some(snapshot) = runner.store().get_data() {
                    form.sync(&snapshot);
                }
            }
            (Session::Evm { runner, .. }, TxParamsFormData::Evm(form)) => {
                if let Some(snapshot) = runner.store().get_data() {
                    form.sync(&snapshot);
                }
            }
            // The form is created for the session and never changes chain.
            _ => {}
        }

        let estimation = self.session.errors().get_data();
        let error = FormError::current(state.submit_error.as_ref(), estimation.as_deref());
        state.tabs.observe(error);
    }

    /// Records an error reported by the broadcaster and shows it.
    pub fn report_submit_error(&self, err: SubmitError) {
        warn!(target: "confirm::form", %err, "submit failed");
        self.state.lock().submit_error = Some(err);
        self.refresh();
    }

    /// Resolves the values to hand to the signer.
    ///
    /// A custom value wins over the selected tier, which wins over the baseline. Before the first
    /// snapshot arrives the baseline comes from the estimates declared in the payload.
    pub fn on_submit(&self) -> Result<SubmitPayload, SubmitRejection> {
        let state = self.state.lock();
        if let Some((field, error)) = state.form.first_error() {
            return Err(SubmitRejection::InvalidField { field, error: error.clone() });
        }

        let payload = match &*self.session {
            Session::Tezos { runner, payload } => {
                let overrides = state.form.tezos_overrides(state.selected);
                let (baseline, options) = match runner.store().get_data() {
                    Some(snapshot) => {
                        (Some(snapshot.baseline.clone()), Some(snapshot.options.clone()))
                    }
                    None => {
                        let baseline = payload.usable_estimates().map(|estimates| {
                            TezosFeeBaseline::from_estimates(estimates, payload.operations.len())
                        });
                        let step = runner.pipeline().step();
                        let options = baseline.as_ref().map(|b| TezosFeeOptions::new(b, step));
                        (baseline, options)
                    }
                };

                let fee = match (overrides.custom_fee, &options) {
                    (Some(fee), _) => fee,
                    (None, Some(options)) => overrides.resolve_fee(options),
                    (None, None) => return Err(SubmitRejection::NoFee),
                };
                let storage_limit = match &baseline {
                    Some(baseline) => overrides.resolve_storage_limit(baseline),
                    None => overrides.custom_storage_limit.unwrap_or_else(|| {
                        payload.operations.iter().filter_map(|op| op.storage_limit).sum()
                    }),
                };
                SubmitPayload::Tezos { fee, storage_limit }
            }
            Session::Evm { runner, payload } => {
                let overrides = state.form.evm_overrides(state.selected);
                let snapshot = runner.store().get_data();
                let (baseline, suggestion, chain_id) = match snapshot.as_deref() {
                    Some(snapshot) => (snapshot.baseline, snapshot.suggestion, snapshot.chain_id),
                    None => {
                        let suggestion = declared_suggestion(payload, overrides.custom_gas_price)
                            .ok_or(SubmitRejection::NoFee)?;
                        let baseline = EvmFeeBaseline {
                            gas_price: suggestion.gas_price.into_market(GasMarket::of(&payload.tx)),
                            gas_limit: suggestion.gas_limit,
                        };
                        (baseline, suggestion, payload.chain_id.or(payload.tx.chain_id))
                    }
                };
                let options = match snapshot.as_deref() {
                    Some(snapshot) => snapshot.options.clone(),
                    None => EvmFeeOptions::new(&baseline, runner.pipeline().step()),
                };

                let request =
                    overrides.resolve_request(payload, chain_id, &suggestion, &baseline, &options);
                let serialized =
                    serialize_unsigned(&request).ok_or(SubmitRejection::Incomplete)?;
                SubmitPayload::Evm { request, serialized }
            }
        };
        debug!(target: "confirm::form", ?payload, "resolved submit payload");
        Ok(payload)
    }

    /// A copy of the form.
    pub fn form(&self) -> TxParamsFormData {
        self.state.lock().form.clone()
    }

    /// The selected fee tier, `None` while a custom value is used or nothing was picked.
    pub fn selected_tier(&self) -> Option<FeeOptionLabel> {
        self.state.lock().selected
    }

    /// The selected tab.
    pub fn selected_tab(&self) -> Tab {
        self.state.lock().tabs.selected()
    }

    /// Tabs the user can pick from.
    pub fn available_tabs(&self) -> Vec<Tab> {
        self.state.lock().tabs.available()
    }

    /// Selects a tab, returning `false` if it is not available.
    pub fn select_tab(&self, tab: Tab) -> bool {
        self.state.lock().tabs.select(tab)
    }

    /// The error shown in the error tab.
    pub fn error(&self) -> Option<FormError> {
        self.state.lock().tabs.error().cloned()
    }
}

/// Gas values declared by the requester: its suggestion, else the priced skeleton, else a custom
/// gas price with the declared gas limit.
fn declared_suggestion(
    payload: &EvmPayload,
    custom_gas_price: Option<u128>,
) -> Option<EvmGasSuggestion> {
    if let Some(suggestion) = payload.suggestion {
        return Some(suggestion);
    }
    let tx = &payload.tx;
    let gas_price = GasPrice::from_request(tx).or_else(|| {
        let market = GasMarket::of(tx);
        custom_gas_price.map(|price| GasPrice::Legacy { gas_price: price }.into_market(market))
    })?;
    Some(EvmGasSuggestion { gas_price, gas_limit: tx.gas?, nonce: tx.nonce })
}
