//! Ordered ingest of client update batches
//!
//! A client streams batches of data model updates over a connection. Every
//! submission passes through an [`IngestPipeline`] of stages, then the
//! connection applies whatever batches are next in sequence, one durable
//! ledger write per pair.

mod batch;
mod channel;
mod error;
mod pipeline;
mod sequencer;

pub use batch::{Batch, BatchId, BatchOutcome, IngestReport, ScormElement};
pub use channel::{IngestChannel, IngestConnection};
pub use error::IngestError;
pub use pipeline::{
    Authenticate, AuthorizeAttemptOwner, ConnectionId, EnforceSequence, IngestContext,
    IngestPipeline, IngestStage,
};
pub use sequencer::Sequencer;
