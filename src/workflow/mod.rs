//! Prompt workflow state machine
//!
//! Gates the three remote operations behind per-operation
//! `idle / in-flight / failed` states, resets prompt-scoped results when a
//! new prompt is requested, and drops completions that were superseded while
//! they were in flight.

pub mod action;
pub mod controller;
pub mod session;

pub use action::{Action, Outcome};
pub use controller::{Controller, WorkflowServices};
pub use session::{
    OperationState, OperationStatus, Operations, Session, UploadError, UploadErrors, UploadSlot,
};
