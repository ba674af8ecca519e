//! Tezos batches: reveal aware fee baseline, forging and simulation through the node.

mod baseline;
pub use baseline::TezosFeeBaseline;

pub mod balances;
pub mod estimate;
pub mod micheline;

mod operation;
pub use operation::{
    OperationContent, OperationKind, TezosEstimate, TezosOperation, TransactionParameters,
};

mod pipeline;
pub use pipeline::{
    BalancesSource, TezosInput, TezosOverrides, TezosPayload, TezosPipeline, TezosSnapshot,
    distribute,
};

mod rpc;
pub use rpc::{
    BalanceUpdate, BlockHead, ContentResult, InternalOperationResult, OperationResult,
    OperationStatus, TezosRpc,
};

mod signer;
pub use signer::{ReadOnlySigner, SignerError, TezosSigner};
