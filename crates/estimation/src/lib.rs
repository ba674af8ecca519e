//! Fee estimation for pending Tezos and EVM operations.
//!
//! A [`Pipeline`](runner::Pipeline) turns a pending operation plus the user's overrides into an
//! estimation snapshot: fee baseline, tiered options, the raw operation and its simulated balance
//! changes. The [`EstimationRunner`] runs pipelines with latest-request-wins semantics and
//! publishes their snapshots in an [`EstimationStore`].

#![warn(missing_docs)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod balances;
pub mod evm;
pub mod options;
pub mod payload;
pub mod runner;
pub mod store;
pub mod tezos;

pub use balances::{AssetClassifier, BalanceChange, BalancesChanges, NoCollectibles};
pub use options::{DisplayedFeeOptions, FeeOptionLabel, FeeStep, FeeTiers};
pub use payload::PendingOperationPayload;
pub use runner::{EstimationRunner, Pipeline, PipelineError};
pub use store::{ErrorCell, EstimationStore};
