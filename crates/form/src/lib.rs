//! Transaction form controller.
//!
//! Binds the user editable parameters of a pending operation (fee, gas price, limits, nonce) to
//! debounced recomputation through an [`EstimationRunner`](confirm_estimation::EstimationRunner),
//! tracks which tab is shown, and resolves the final values handed to the signer on submit.

#![warn(missing_docs)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod controller;
pub mod fields;
pub mod tabs;

pub use controller::{Session, SubmitPayload, SubmitRejection, TxFormController};
pub use fields::{EvmFormData, FieldError, FormField, TezosFormData, TxParamsFormData};
pub use tabs::{FormError, Tab, TabState};
