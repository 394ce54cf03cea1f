//! Diagnostics: the structured event log and the failure context chain.
//!
//! - [`EventLog`] collects what a run did and why it left sites untouched
//! - [`ReconstructionFailure`] carries a hard failure with its bytecode context

mod events;
mod failure;

pub use events::{Event, EventBuilder, EventKind, EventLog, EventLogIter, TransformStats};
pub use failure::{
    BytecodeLocation, FailureContext, FailureFrame, FrameKind, ReconstructionFailure,
};
