//! Commonly used errors

mod private {
    use eyre::Chain;
    use std::error::Error;

    pub trait ErrorChain {
        fn chain(&self) -> Chain<'_>;
    }

    impl ErrorChain for dyn Error + 'static {
        fn chain(&self) -> Chain<'_> {
            Chain::new(self)
        }
    }

    impl ErrorChain for eyre::Report {
        fn chain(&self) -> Chain<'_> {
            self.chain()
        }
    }
}

/// Displays a chain of errors in a single line.
pub fn display_chain<E: private::ErrorChain + ?Sized>(error: &E) -> String {
    dedup_chain(error).join("; ")
}

/// Deduplicates a chain of errors.
pub fn dedup_chain<E: private::ErrorChain + ?Sized>(error: &E) -> Vec<String> {
    let mut causes = all_sources(error);
    // Deduplicate the common pattern `msg1: msg2; msg2` -> `msg1: msg2`.
    causes.dedup_by(|b, a| a.contains(b.as_str()));
    causes
}

fn all_sources<E: private::ErrorChain + ?Sized>(err: &E) -> Vec<String> {
    err.chain().map(|cause| cause.to_string().trim().to_string()).collect()
}

/// Why a user supplied number was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NumericInputReason {
    /// Nothing was entered.
    #[error("value is empty")]
    Empty,
    /// A leading minus sign.
    #[error("value must not be negative")]
    Negative,
    /// Not a plain decimal number.
    #[error("value is not a decimal number")]
    Malformed,
    /// More fractional digits than the asset supports.
    #[error("value has more than {decimals} decimal places")]
    TooManyDecimals {
        /// Decimals supported by the asset.
        decimals: u8,
    },
    /// Does not fit the target integer type.
    #[error("value is too large")]
    Overflow,
}

/// A user-entered fee, limit or nonce that does not parse.
///
/// These are reported next to the offending field and never reach the error tab.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid number `{input}`: {reason}")]
pub struct InvalidNumericInput {
    /// The raw input.
    pub input: String,
    /// The reason it was rejected.
    pub reason: NumericInputReason,
}

impl InvalidNumericInput {
    /// Creates a new error for the given raw input.
    pub fn new(input: impl Into<String>, reason: NumericInputReason) -> Self {
        Self { input: input.into(), reason }
    }
}

/// The baseline fee could not be computed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EstimationError {
    /// The sending account is not known yet.
    #[error("source account cannot be determined")]
    SourceUnknown,
    /// A request to the node failed.
    #[error("network request failed: {0}")]
    Network(String),
    /// The node rejected the operation while estimating it.
    #[error("operation rejected by the node: {0}")]
    Rejected(String),
    /// The requesting party attached an estimation error to the payload.
    #[error("{0}")]
    External(String),
}

impl EstimationError {
    /// Wraps a collaborator error as a network failure.
    pub fn network(err: &eyre::Report) -> Self {
        Self::Network(display_chain(err))
    }
}

/// Simulating an operation did not produce trustworthy balance changes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// The simulation request itself failed.
    #[error("simulation request failed: {0}")]
    Rpc(String),
    /// The node simulated the operation but did not apply one of its contents.
    #[error("operation #{index} was not applied: {status}")]
    NotApplied {
        /// Position of the offending content.
        index: usize,
        /// Status reported by the node.
        status: String,
    },
    /// The simulated transaction reverted.
    #[error("simulated transaction reverted: {0}")]
    Reverted(String),
}

impl SimulationError {
    /// Wraps a collaborator error as a failed simulation request.
    pub fn rpc(err: &eyre::Report) -> Self {
        Self::Rpc(display_chain(err))
    }
}

/// Final submission failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The broadcaster reported an error.
    #[error("failed to broadcast: {0}")]
    Broadcast(String),
    /// The user or the signer rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}
