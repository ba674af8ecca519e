//! Common utilities for the transaction confirmation core.

#![warn(missing_docs)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod debounce;
pub mod errors;
pub mod serde_helpers;
pub mod supersede;
pub mod units;

pub use config::ConfirmConfig;
pub use debounce::Debouncer;
pub use errors::{EstimationError, InvalidNumericInput, SimulationError, SubmitError};
pub use supersede::{Supersede, Ticket};
pub use units::{to_atomic, to_display};
