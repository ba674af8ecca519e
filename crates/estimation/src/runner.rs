//! Runs pipelines with latest-request-wins semantics and publishes their results.

use crate::store::{ErrorCell, EstimationStore};
use async_trait::async_trait;
use confirm_common::{EstimationError, Supersede, Ticket};
use std::{fmt, sync::Arc};
use tokio::task::JoinHandle;

/// Errors a pipeline hands back to its runner.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The baseline could not be computed; surfaced to the user.
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    /// Building or forging the operation failed; logged, the previous snapshot stays.
    #[error("failed to build operation: {0}")]
    Forge(String),
}

/// A chain specific estimation pipeline.
#[async_trait]
pub trait Pipeline: Send + Sync + 'static {
    /// Everything a single recomputation needs.
    type Input: Send + 'static;
    /// What a successful recomputation publishes.
    type Snapshot: Send + Sync + 'static;

    /// Recomputes the snapshot.
    ///
    /// `previous` is the snapshot currently published, used to keep values that are expensive to
    /// fetch or that must survive a failed simulation.
    async fn estimate(
        &self,
        input: Self::Input,
        previous: Option<Arc<Self::Snapshot>>,
    ) -> Result<Self::Snapshot, PipelineError>;
}

/// Owns a pipeline and the stores it writes to.
///
/// Every [`trigger`](Self::trigger) supersedes the recomputations started before it: their
/// results are discarded when they arrive, whatever order the network answers in.
pub struct EstimationRunner<P: Pipeline> {
    pipeline: Arc<P>,
    store: EstimationStore<P::Snapshot>,
    errors: ErrorCell,
    supersede: Supersede,
}

impl<P: Pipeline> Clone for EstimationRunner<P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            store: self.store.clone(),
            errors: self.errors.clone(),
            supersede: self.supersede.clone(),
        }
    }
}

impl<P: Pipeline> fmt::Debug for EstimationRunner<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimationRunner")
            .field("generation", &self.supersede.generation())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<P: Pipeline> EstimationRunner<P> {
    /// Creates a runner with fresh stores.
    pub fn new(pipeline: P) -> Self {
        Self::with_stores(pipeline, EstimationStore::new(), ErrorCell::new())
    }

    /// Creates a runner writing into existing stores.
    pub fn with_stores(pipeline: P, store: EstimationStore<P::Snapshot>, errors: ErrorCell) -> Self {
        Self { pipeline: Arc::new(pipeline), store, errors, supersede: Supersede::new() }
    }

    /// The snapshot store.
    pub fn store(&self) -> &EstimationStore<P::Snapshot> {
        &self.store
    }

    /// The estimation error cell.
    pub fn errors(&self) -> &ErrorCell {
        &self.errors
    }

    /// The pipeline.
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Starts a recomputation in the background, superseding any earlier one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self, input: P::Input) -> JoinHandle<()> {
        let ticket = self.supersede.next();
        let this = self.clone();
        tokio::spawn(async move { this.run(ticket, input).await })
    }

    /// Runs a recomputation to completion on the current task.
    pub async fn run_now(&self, input: P::Input) {
        let ticket = self.supersede.next();
        self.run(ticket, input).await
    }

    async fn run(&self, ticket: Ticket, input: P::Input) {
        let generation = ticket.generation();
        trace!(target: "confirm::runner", generation, "recomputing");

        let result = self.pipeline.estimate(input, self.store.get_data()).await;
        if !ticket.is_current() {
            debug!(target: "confirm::runner", generation, "discarding superseded result");
            return;
        }

        match result {
            Ok(snapshot) => {
                if self.store.set_data_if_current(&ticket, snapshot) {
                    self.errors.clear_if_current(&ticket);
                    trace!(target: "confirm::runner", generation, "published snapshot");
                }
            }
            Err(PipelineError::Estimation(err)) => {
                warn!(target: "confirm::runner", generation, %err, "estimation failed");
                self.errors.set_data_if_current(&ticket, err);
            }
            Err(PipelineError::Forge(err)) => {
                warn!(target: "confirm::runner", generation, %err, "keeping previous snapshot");
            }
        }
    }
}
