//! EVM transactions: gas market normalization, unsigned encoding and transfer simulation.

pub mod balances;

mod client;
pub use client::{EvmClient, ProviderClient, SimulatedCall};

mod gas;
pub use gas::{GasMarket, GasPrice};

mod payload;
pub use payload::{EvmGasSuggestion, EvmPayload};

mod pipeline;
pub use pipeline::{EvmFeeBaseline, EvmInput, EvmOverrides, EvmPipeline, EvmSnapshot};

mod serialize;
pub use serialize::serialize_unsigned;
